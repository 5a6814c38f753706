use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::Notify;
use weft_config::{
  BindingDef, Bundle, Definition, Identifier, IdentifierFilter, InvocationDef, LaunchPlanDef,
  TaskDef, WorkflowDef,
};
use weft_engine::{ControlPlane, ControlPlaneError, LaunchError};
use weft_literal::{
  Check, ColumnData, ColumnType, Field, LiteralMap, LiteralType, Schema, SlotKey, TypedLiteral,
  Value, from_json,
};
use weft_registry::RegistryError;
use weft_runtime::{
  ChannelNotifier, ExecutionEvent, ExecutionPhase, NodeState, RuntimeConfig,
};
use weft_task::{TaskCatalog, TaskCatalogBuilder, TaskContext, TaskError, TaskSpec, input};

const PROJECT: &str = "flytesnacks";
const DOMAIN: &str = "development";

fn id(name: &str) -> Identifier {
  Identifier::new(PROJECT, DOMAIN, name, "v1")
}

fn in_schema() -> Schema {
  Schema::new("InSchema")
    .field(Field::new("hourly_pay", ColumnType::Float).ge(7.0))
    .field(Field::new("hours_worked", ColumnType::Float).ge(10.0))
    .check(Check::columns(
      "check_numbers_are_positive",
      ["hourly_pay", "hours_worked"],
    ))
}

fn intermediate_schema() -> Schema {
  in_schema()
    .extend("IntermediateSchema")
    .field(Field::new("total_pay", ColumnType::Float))
    .check(Check::frame("check_total_pay"))
}

fn out_schema() -> Schema {
  intermediate_schema()
    .extend("OutSchema")
    .field(Field::new("worker_id", ColumnType::String).unique())
}

fn total_pay_spec() -> TaskSpec {
  TaskSpec::new("total_pay")
    .input("df", LiteralType::dataframe(in_schema()))
    .output("total_pay_col", LiteralType::dataframe(intermediate_schema()))
}

fn add_id_spec() -> TaskSpec {
  TaskSpec::new("add_id")
    .input("total_pay_col", LiteralType::dataframe(intermediate_schema()))
    .input("id", LiteralType::String)
    .output("out", LiteralType::dataframe(out_schema()))
}

fn float_column<'a>(
  frame: &'a weft_literal::DataFrame,
  name: &str,
) -> Result<&'a [f64], TaskError> {
  frame
    .column(name)
    .and_then(ColumnData::as_float)
    .ok_or_else(|| TaskError::permanent(format!("missing float column '{name}'")))
}

async fn total_pay(_ctx: TaskContext, inputs: LiteralMap) -> Result<LiteralMap, TaskError> {
  let df = input(&inputs, "df")?
    .value()
    .as_frame()
    .ok_or_else(|| TaskError::permanent("df is not a dataframe"))?;
  let pay = float_column(df, "hourly_pay")?;
  let hours = float_column(df, "hours_worked")?;
  let total = pay.iter().zip(hours).map(|(p, h)| p * h).collect();

  let out = df.clone().with_column("total_pay", ColumnData::Float(total))?;
  let out = TypedLiteral::frame(intermediate_schema(), out)?;
  Ok(LiteralMap::from([("total_pay_col".to_string(), out)]))
}

async fn add_id(_ctx: TaskContext, inputs: LiteralMap) -> Result<LiteralMap, TaskError> {
  let df = input(&inputs, "total_pay_col")?
    .value()
    .as_frame()
    .ok_or_else(|| TaskError::permanent("total_pay_col is not a dataframe"))?;
  let worker_id = input(&inputs, "id")?
    .value()
    .as_str()
    .ok_or_else(|| TaskError::permanent("id is not a string"))?;

  let rows = df.num_rows().unwrap_or(0);
  let ids = ColumnData::String(vec![worker_id.to_string(); rows]);
  let out = df.clone().with_column("worker_id", ids)?;
  let out = TypedLiteral::frame(out_schema(), out)?;
  Ok(LiteralMap::from([("out".to_string(), out)]))
}

fn make_catalog() -> TaskCatalogBuilder {
  TaskCatalog::builder()
    .register_fn(total_pay_spec(), total_pay)
    .register_fn(add_id_spec(), add_id)
}

fn pandera_workflow() -> WorkflowDef {
  WorkflowDef::new(id("pandera_workflow"))
    .input("df", LiteralType::dataframe(in_schema()))
    .input("worker_id", LiteralType::String)
    .node(InvocationDef::new("n0", id("total_pay")).bind("df", BindingDef::input("df")))
    .node(
      InvocationDef::new("n1", id("add_id"))
        .bind("total_pay_col", BindingDef::node("n0", "total_pay_col"))
        .bind("id", BindingDef::input("worker_id")),
    )
    .output(
      "out",
      LiteralType::dataframe(out_schema()),
      BindingDef::node("n1", "out"),
    )
}

fn pandera_bundle() -> Bundle {
  Bundle {
    tasks: vec![
      total_pay_spec().task_def(id("total_pay")),
      add_id_spec().task_def(id("add_id")),
    ],
    workflows: vec![pandera_workflow()],
    launch_plans: Vec::new(),
  }
}

fn input_frame() -> TypedLiteral {
  from_json(
    &LiteralType::dataframe(in_schema()),
    json!({
      "hourly_pay": [12.0, 13.5, 10.1],
      "hours_worked": [30.5, 40.0, 41.75],
    }),
  )
  .unwrap()
}

fn inputs(pairs: Vec<(&str, TypedLiteral)>) -> LiteralMap {
  pairs
    .into_iter()
    .map(|(name, literal)| (name.to_string(), literal))
    .collect()
}

async fn make_control_plane() -> ControlPlane {
  let control = ControlPlane::new(make_catalog().build().unwrap(), RuntimeConfig::default());
  control.register_bundle(&pandera_bundle()).await.unwrap();
  control
}

fn output_frame(outputs: &LiteralMap) -> &weft_literal::DataFrame {
  match outputs["out"].value() {
    Value::Frame(frame) => frame,
    other => panic!("expected a frame, got {}", other.kind()),
  }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_pandera_workflow_succeeds() {
  let control = make_control_plane().await;

  let execution_id = control
    .launch(
      PROJECT,
      DOMAIN,
      "pandera_workflow",
      "v1",
      inputs(vec![
        ("df", input_frame()),
        ("worker_id", TypedLiteral::string("qwerty")),
      ]),
    )
    .await
    .unwrap();
  let snapshot = tokio::time::timeout(Duration::from_secs(5), control.wait(&execution_id))
    .await
    .unwrap()
    .unwrap();

  assert_eq!(snapshot.phase, ExecutionPhase::Succeeded);
  assert_eq!(snapshot.launch_plan, Some(id("pandera_workflow")));
  let outputs = snapshot.into_result().unwrap();
  assert_eq!(
    outputs["out"].ty(),
    &LiteralType::dataframe(out_schema())
  );

  let frame = output_frame(&outputs);
  let ids = frame.column("worker_id").and_then(ColumnData::as_str).unwrap();
  assert_eq!(ids, ["qwerty", "qwerty", "qwerty"]);
  let total = frame.column("total_pay").and_then(ColumnData::as_float).unwrap();
  assert_eq!(total, [12.0 * 30.5, 13.5 * 40.0, 10.1 * 41.75]);
}

#[tokio::test]
async fn test_missing_input_creates_no_execution() {
  let control = make_control_plane().await;

  let err = control
    .launch(
      PROJECT,
      DOMAIN,
      "pandera_workflow",
      "v1",
      inputs(vec![("worker_id", TypedLiteral::string("qwerty"))]),
    )
    .await
    .unwrap_err();

  match err {
    ControlPlaneError::Launch(LaunchError::MissingInput { names }) => {
      assert_eq!(names, vec!["df"]);
    }
    other => panic!("unexpected error: {other}"),
  }
  assert!(control.executions(PROJECT, DOMAIN).is_empty());
}

#[tokio::test]
async fn test_launch_plan_defaults_and_overrides() {
  let control = make_control_plane().await;
  let mut plan = LaunchPlanDef::new(id("pandera_lp"), id("pandera_workflow"));
  plan
    .default_inputs
    .insert("worker_id".to_string(), TypedLiteral::string("qwerty"));
  control
    .register(Definition::LaunchPlan(plan))
    .await
    .unwrap();

  let defaulted = control
    .launch(
      PROJECT,
      DOMAIN,
      "pandera_lp",
      "v1",
      inputs(vec![("df", input_frame())]),
    )
    .await
    .unwrap();
  let overridden = control
    .launch(
      PROJECT,
      DOMAIN,
      "pandera_lp",
      "v1",
      inputs(vec![
        ("df", input_frame()),
        ("worker_id", TypedLiteral::string("abc")),
      ]),
    )
    .await
    .unwrap();

  for (execution_id, expected) in [(defaulted, "qwerty"), (overridden, "abc")] {
    let outputs = control
      .wait(&execution_id)
      .await
      .unwrap()
      .into_result()
      .unwrap();
    let ids = output_frame(&outputs)
      .column("worker_id")
      .and_then(ColumnData::as_str)
      .unwrap();
    assert!(ids.iter().all(|id| id == expected));
  }

  let err = control
    .launch(
      PROJECT,
      DOMAIN,
      "pandera_lp",
      "v1",
      inputs(vec![
        ("df", input_frame()),
        ("worker_id", TypedLiteral::integer(7)),
      ]),
    )
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    ControlPlaneError::Launch(LaunchError::TypeMismatch { ref input, .. }) if input == "worker_id"
  ));
}

#[tokio::test]
async fn test_launch_plan_rejects_mistyped_default() {
  let control = make_control_plane().await;
  let mut plan = LaunchPlanDef::new(id("bad_lp"), id("pandera_workflow"));
  plan
    .default_inputs
    .insert("worker_id".to_string(), TypedLiteral::boolean(true));

  let err = control.register_launch_plan(plan).await.unwrap_err();
  assert!(matches!(
    err,
    ControlPlaneError::Launch(LaunchError::TypeMismatch { .. })
  ));

  let missing = LaunchPlanDef::new(id("orphan_lp"), id("no_such_workflow"));
  let err = control.register_launch_plan(missing).await.unwrap_err();
  assert!(matches!(
    err,
    ControlPlaneError::Launch(LaunchError::Registry(RegistryError::NotFound { .. }))
  ));
}

#[tokio::test]
async fn test_registration_errors() {
  let control = make_control_plane().await;

  let unknown = TaskDef {
    id: id("mystery"),
    handler: "mystery".to_string(),
    interface: Default::default(),
    retry: None,
    timeout_ms: None,
  };
  assert!(matches!(
    control.register_task(unknown).await,
    Err(ControlPlaneError::UnknownHandler { .. })
  ));

  let mut mismatched = total_pay_spec().task_def(id("total_pay_v2"));
  mismatched.interface.inputs.clear();
  assert!(matches!(
    control.register_task(mismatched).await,
    Err(ControlPlaneError::InterfaceMismatch { .. })
  ));

  let err = control.register_workflow(pandera_workflow()).await.unwrap_err();
  assert!(matches!(
    err,
    ControlPlaneError::Registry(RegistryError::DuplicateIdentifier { .. })
  ));

  let cyclic = WorkflowDef::new(id("cyclic"))
    .node(
      InvocationDef::new("a", id("total_pay"))
        .bind("df", BindingDef::node("b", "total_pay_col")),
    )
    .node(
      InvocationDef::new("b", id("total_pay"))
        .bind("df", BindingDef::node("a", "total_pay_col")),
    );
  let err = control.register_workflow(cyclic).await.unwrap_err();
  assert!(matches!(err, ControlPlaneError::Validation(_)));
  assert!(control.get_workflow(&id("cyclic")).await.is_err());
}

#[tokio::test]
async fn test_workflow_clashing_with_plan_is_not_registered() {
  let control = make_control_plane().await;
  control
    .register_launch_plan(LaunchPlanDef::new(id("second"), id("pandera_workflow")))
    .await
    .unwrap();

  let mut def = pandera_workflow();
  def.id = id("second");
  let err = control.register_workflow(def).await.unwrap_err();
  assert!(matches!(
    err,
    ControlPlaneError::Registry(RegistryError::DuplicateIdentifier { .. })
  ));

  assert!(matches!(
    control.get_workflow(&id("second")).await,
    Err(ControlPlaneError::Registry(RegistryError::NotFound { .. }))
  ));
  let plan = control.get_launch_plan(&id("second")).await.unwrap();
  assert_eq!(plan.workflow.id, id("pandera_workflow"));
}

#[tokio::test]
async fn test_bundle_round_trip_and_listing() {
  let control = ControlPlane::new(make_catalog().build().unwrap(), RuntimeConfig::default());

  let mut bundle = pandera_bundle();
  for version in ["v2", "v3", "v4"] {
    let mut task = total_pay_spec().task_def(id("total_pay"));
    task.id.version = version.to_string();
    bundle.tasks.push(task);
  }
  let json = serde_json::to_string(&bundle).unwrap();
  let bundle = Bundle::from_json(&json).unwrap();

  let registered = control.register_bundle(&bundle).await.unwrap();
  assert_eq!(registered.len(), 6);
  assert_eq!(registered[5], id("pandera_workflow"));

  let filter = IdentifierFilter::new(PROJECT, DOMAIN).with_name("total_pay");
  let first = control.list_tasks(&filter, 2, None).await.unwrap();
  let versions: Vec<_> = first.entries.iter().map(|e| e.id.version.as_str()).collect();
  assert_eq!(versions, vec!["v1", "v2"]);

  let token = first.next_token.unwrap();
  let second = control.list_tasks(&filter, 2, Some(&token)).await.unwrap();
  let versions: Vec<_> = second.entries.iter().map(|e| e.id.version.as_str()).collect();
  assert_eq!(versions, vec!["v3", "v4"]);
  assert!(second.next_token.is_none());

  let all = IdentifierFilter::new(PROJECT, DOMAIN);
  let workflows = control.list_workflows(&all, 10, None).await.unwrap();
  assert_eq!(workflows.entries.len(), 1);
  let plans = control.list_launch_plans(&all, 10, None).await.unwrap();
  assert_eq!(plans.entries[0].id, id("pandera_workflow"));
}

#[tokio::test]
async fn test_abort_running_and_waiting_nodes() {
  let started = Arc::new(Notify::new());
  let release = Arc::new(Notify::new());
  let (on_start, on_release) = (Arc::clone(&started), Arc::clone(&release));
  let hold_spec = || {
    TaskSpec::new("hold")
      .input("x", LiteralType::Integer)
      .output("y", LiteralType::Integer)
  };
  let catalog = TaskCatalog::builder()
    .register_fn(hold_spec(), move |_ctx, inputs| {
      let (on_start, on_release) = (Arc::clone(&on_start), Arc::clone(&on_release));
      async move {
        on_start.notify_one();
        on_release.notified().await;
        Ok::<_, TaskError>(LiteralMap::from([(
          "y".to_string(),
          input(&inputs, "x")?.clone(),
        )]))
      }
    })
    .build()
    .unwrap();

  let (notifier, mut events) = ChannelNotifier::channel();
  let control = ControlPlane::with_notifier(catalog, RuntimeConfig::default(), notifier);
  control
    .register_task(hold_spec().task_def(id("hold")))
    .await
    .unwrap();
  let workflow = WorkflowDef::new(id("held"))
    .input("x", LiteralType::Integer)
    .node(InvocationDef::new("first", id("hold")).bind("x", BindingDef::input("x")))
    .node(InvocationDef::new("second", id("hold")).bind("x", BindingDef::node("first", "y")));
  control.register_workflow(workflow).await.unwrap();

  let execution_id = control
    .launch(
      PROJECT,
      DOMAIN,
      "held",
      "v1",
      inputs(vec![("x", TypedLiteral::integer(1))]),
    )
    .await
    .unwrap();
  started.notified().await;

  let status = control.status(&execution_id).unwrap();
  assert_eq!(status.node("first").unwrap().state, NodeState::Running);
  assert_eq!(status.node("second").unwrap().state, NodeState::Waiting);

  assert!(control.abort(&execution_id).unwrap());
  let status = control.wait(&execution_id).await.unwrap();
  assert_eq!(status.phase, ExecutionPhase::Aborted);
  assert_eq!(status.node("first").unwrap().state, NodeState::Aborted);
  assert_eq!(status.node("second").unwrap().state, NodeState::Aborted);

  release.notify_one();
  tokio::time::timeout(Duration::from_secs(5), async {
    while let Some(event) = events.recv().await {
      if matches!(event, ExecutionEvent::NodeResultDiscarded { .. }) {
        break;
      }
    }
  })
  .await
  .unwrap();

  let handle = control.handle(&execution_id).unwrap();
  assert!(handle.literal(&SlotKey::output("first", "y")).is_err());
  assert_eq!(handle.phase(), ExecutionPhase::Aborted);
}
