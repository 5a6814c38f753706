mod tasks;

use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use weft_config::{Bundle, IdentifierFilter};
use weft_engine::{ControlPlane, LaunchPlan};
use weft_literal::{LiteralMap, from_json, to_json};
use weft_runtime::{ExecutionPhase, ExecutionSnapshot, RuntimeConfig};

/// Weft - a minimal workflow orchestration core
#[derive(Parser)]
#[command(name = "weft")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to a runtime config file (JSON)
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Register a bundle and print the digest of every compiled workflow
  Compile {
    /// Path to the definitions bundle (JSON)
    bundle: PathBuf,
  },

  /// Register a bundle and list its workflows
  List {
    bundle: PathBuf,

    #[arg(long)]
    project: String,

    #[arg(long)]
    domain: String,

    #[arg(long, default_value_t = 20)]
    limit: usize,

    /// Page token from a previous listing
    #[arg(long)]
    token: Option<String>,
  },

  /// Register a bundle and run a launch plan with inputs read from stdin
  Run {
    bundle: PathBuf,

    #[arg(long)]
    project: String,

    #[arg(long)]
    domain: String,

    /// Launch plan name; every workflow has a default plan with its own name
    #[arg(long)]
    name: String,

    /// Launch plan version (default: the most recently registered)
    #[arg(long)]
    version: Option<String>,
  },
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(io::stderr)
    .init();

  let cli = Cli::parse();
  let config = load_config(cli.config.as_deref())?;

  let Some(command) = cli.command else {
    println!("weft - use --help to see available commands");
    return Ok(());
  };

  let rt = tokio::runtime::Runtime::new()?;
  rt.block_on(async {
    match command {
      Commands::Compile { bundle } => compile(&bundle, config).await,
      Commands::List {
        bundle,
        project,
        domain,
        limit,
        token,
      } => list(&bundle, config, &project, &domain, limit, token.as_deref()).await,
      Commands::Run {
        bundle,
        project,
        domain,
        name,
        version,
      } => run(&bundle, config, &project, &domain, &name, version.as_deref()).await,
    }
  })
}

fn load_config(path: Option<&Path>) -> Result<RuntimeConfig> {
  let Some(path) = path else {
    return Ok(RuntimeConfig::default());
  };
  let content = std::fs::read_to_string(path)
    .with_context(|| format!("failed to read config file: {}", path.display()))?;
  serde_json::from_str(&content)
    .with_context(|| format!("failed to parse config file: {}", path.display()))
}

fn load_bundle(path: &Path) -> Result<Bundle> {
  let content = std::fs::read_to_string(path)
    .with_context(|| format!("failed to read bundle file: {}", path.display()))?;
  Bundle::from_json(&content)
    .with_context(|| format!("failed to parse bundle file: {}", path.display()))
}

/// A control plane with the built-in tasks and every definition of `bundle`.
async fn control_plane(bundle: &Path, config: RuntimeConfig) -> Result<ControlPlane> {
  let bundle = load_bundle(bundle)?;
  let catalog = tasks::catalog().context("failed to build task catalog")?;
  let control = ControlPlane::new(catalog, config);
  let registered = control
    .register_bundle(&bundle)
    .await
    .context("failed to register bundle")?;
  info!(definitions = registered.len(), "bundle_registered");
  Ok(control)
}

async fn compile(bundle: &Path, config: RuntimeConfig) -> Result<()> {
  let definitions = load_bundle(bundle)?;
  let control = control_plane(bundle, config).await?;

  let mut compiled = Vec::new();
  for def in &definitions.workflows {
    let graph = control.get_workflow(&def.id).await?;
    compiled.push(serde_json::json!({
      "workflow": graph.id.to_string(),
      "digest": graph.digest,
      "nodes": graph.nodes.iter().map(|n| n.node_id.as_str()).collect::<Vec<_>>(),
    }));
  }

  println!("{}", serde_json::to_string_pretty(&compiled)?);
  Ok(())
}

async fn list(
  bundle: &Path,
  config: RuntimeConfig,
  project: &str,
  domain: &str,
  limit: usize,
  token: Option<&str>,
) -> Result<()> {
  let control = control_plane(bundle, config).await?;
  let page = control
    .list_workflows(&IdentifierFilter::new(project, domain), limit, token)
    .await?;

  let entries: Vec<_> = page
    .entries
    .iter()
    .map(|e| {
      serde_json::json!({
        "workflow": e.id.to_string(),
        "digest": e.definition.digest,
        "registered_at": e.registered_at.to_rfc3339(),
      })
    })
    .collect();
  let output = serde_json::json!({
    "entries": entries,
    "next_token": page.next_token,
  });

  println!("{}", serde_json::to_string_pretty(&output)?);
  Ok(())
}

async fn run(
  bundle: &Path,
  config: RuntimeConfig,
  project: &str,
  domain: &str,
  name: &str,
  version: Option<&str>,
) -> Result<()> {
  let control = control_plane(bundle, config).await?;
  let plan = find_launch_plan(&control, project, domain, name, version).await?;

  let payload = read_payload_from_stdin()?;
  let inputs = parse_inputs(&plan, payload)?;

  let handle = control
    .launch_plans()
    .launch(&plan, inputs)
    .context("failed to launch")?;
  eprintln!("Launched execution: {}", handle.id());

  let snapshot = tokio::select! {
    snapshot = handle.wait() => snapshot,
    _ = tokio::signal::ctrl_c() => {
      warn!(execution_id = %handle.id(), "interrupted, aborting execution");
      handle.abort();
      handle.wait().await
    }
  };

  println!("{}", serde_json::to_string_pretty(&render(&snapshot)?)?);

  if snapshot.phase != ExecutionPhase::Succeeded {
    bail!(
      "execution {} finished {:?}: {}",
      snapshot.execution_id,
      snapshot.phase,
      snapshot.error.as_deref().unwrap_or("no error recorded")
    );
  }
  Ok(())
}

async fn find_launch_plan(
  control: &ControlPlane,
  project: &str,
  domain: &str,
  name: &str,
  version: Option<&str>,
) -> Result<std::sync::Arc<LaunchPlan>> {
  if let Some(version) = version {
    let id = weft_config::Identifier::new(project, domain, name, version);
    return control
      .get_launch_plan(&id)
      .await
      .with_context(|| format!("launch plan {id} not found"));
  }

  // Listings are in registration order, so the last entry is the newest.
  let filter = IdentifierFilter::new(project, domain).with_name(name);
  let mut latest = None;
  let mut token = None;
  loop {
    let page = control
      .list_launch_plans(&filter, 100, token.as_deref())
      .await?;
    if let Some(entry) = page.entries.last() {
      latest = Some(std::sync::Arc::clone(&entry.definition));
    }
    match page.next_token {
      Some(next) => token = Some(next),
      None => break,
    }
  }
  latest.with_context(|| format!("no launch plan named {project}/{domain}/{name}"))
}

/// Read plain JSON inputs, typed by the workflow's declared inputs.
fn parse_inputs(plan: &LaunchPlan, payload: serde_json::Value) -> Result<LiteralMap> {
  let serde_json::Value::Object(fields) = payload else {
    bail!("inputs must be a JSON object");
  };

  let mut inputs = LiteralMap::new();
  for (name, value) in fields {
    let ty = plan
      .workflow
      .inputs
      .get(&name)
      .with_context(|| format!("workflow {} declares no input '{name}'", plan.workflow.id))?;
    let literal = from_json(ty, value).with_context(|| format!("invalid input '{name}'"))?;
    inputs.insert(name, literal);
  }
  Ok(inputs)
}

/// The snapshot as JSON, with outputs rendered as plain values.
fn render(snapshot: &ExecutionSnapshot) -> Result<serde_json::Value> {
  let mut json = serde_json::to_value(snapshot)?;
  if let (Some(outputs), Some(object)) = (&snapshot.outputs, json.as_object_mut()) {
    let plain: serde_json::Map<_, _> = outputs
      .iter()
      .map(|(name, literal)| (name.clone(), to_json(literal)))
      .collect();
    object.insert("outputs".to_string(), serde_json::Value::Object(plain));
  }
  Ok(json)
}

fn read_payload_from_stdin() -> Result<serde_json::Value> {
  use std::io::IsTerminal;

  if io::stdin().is_terminal() {
    return Ok(serde_json::json!({}));
  }

  let mut input = String::new();
  io::stdin()
    .read_to_string(&mut input)
    .context("failed to read inputs from stdin")?;

  if input.trim().is_empty() {
    Ok(serde_json::json!({}))
  } else {
    serde_json::from_str(&input).context("failed to parse input JSON from stdin")
  }
}
