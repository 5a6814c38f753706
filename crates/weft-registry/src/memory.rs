use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use tracing::debug;
use weft_config::{Identifier, IdentifierFilter};

use crate::error::RegistryError;
use crate::registry::{Entry, Page, Registry};

/// In-process registry backed by a hash map.
///
/// Registration timestamps are strictly increasing, so a listing token issued at
/// any point sorts before every entry registered afterwards.
pub struct InMemoryRegistry<D> {
  inner: RwLock<Inner<D>>,
}

struct Inner<D> {
  entries: HashMap<Identifier, Slot<D>>,
  next_sequence: u64,
  last_registered_at: Option<DateTime<Utc>>,
}

struct Slot<D> {
  entry: Entry<D>,
  sequence: u64,
}

/// Listing order: registration time, then name, then registration sequence.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct SortKey {
  micros: i64,
  name: String,
  sequence: u64,
}

impl SortKey {
  fn of<D>(slot: &Slot<D>) -> Self {
    Self {
      micros: slot.entry.registered_at.timestamp_micros(),
      name: slot.entry.id.name.clone(),
      sequence: slot.sequence,
    }
  }

  fn encode(&self) -> String {
    format!("{}:{}:{}", self.micros, self.sequence, self.name)
  }

  fn decode(token: &str) -> Result<Self, RegistryError> {
    let invalid = || RegistryError::InvalidToken {
      token: token.to_string(),
    };
    let mut parts = token.splitn(3, ':');
    let micros = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
    let sequence = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
    let name = parts.next().ok_or_else(invalid)?.to_string();
    Ok(Self {
      micros,
      name,
      sequence,
    })
  }
}

impl<D> InMemoryRegistry<D> {
  pub fn new() -> Self {
    Self {
      inner: RwLock::new(Inner {
        entries: HashMap::new(),
        next_sequence: 0,
        last_registered_at: None,
      }),
    }
  }

  pub fn len(&self) -> usize {
    self
      .inner
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .entries
      .len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl<D> Default for InMemoryRegistry<D> {
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait]
impl<D> Registry<D> for InMemoryRegistry<D>
where
  D: Send + Sync + 'static,
{
  async fn register(&self, id: Identifier, definition: D) -> Result<Arc<D>, RegistryError> {
    if let Some(part) = id.empty_part() {
      return Err(RegistryError::InvalidIdentifier { id, part });
    }

    let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
    if inner.entries.contains_key(&id) {
      return Err(RegistryError::DuplicateIdentifier { id });
    }

    let mut registered_at = Utc::now();
    if let Some(last) = inner.last_registered_at {
      if registered_at.timestamp_micros() <= last.timestamp_micros() {
        registered_at = last + TimeDelta::microseconds(1);
      }
    }
    inner.last_registered_at = Some(registered_at);

    let sequence = inner.next_sequence;
    inner.next_sequence += 1;

    let definition = Arc::new(definition);
    debug!(id = %id, sequence, "definition_registered");
    inner.entries.insert(
      id.clone(),
      Slot {
        entry: Entry {
          id,
          definition: Arc::clone(&definition),
          registered_at,
        },
        sequence,
      },
    );

    Ok(definition)
  }

  async fn resolve(&self, id: &Identifier) -> Result<Arc<D>, RegistryError> {
    let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
    inner
      .entries
      .get(id)
      .map(|slot| Arc::clone(&slot.entry.definition))
      .ok_or_else(|| RegistryError::NotFound { id: id.clone() })
  }

  async fn list(
    &self,
    filter: &IdentifierFilter,
    limit: usize,
    token: Option<&str>,
  ) -> Result<Page<D>, RegistryError> {
    if limit == 0 {
      return Err(RegistryError::InvalidLimit);
    }
    let after = token.map(SortKey::decode).transpose()?;

    let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
    let mut matching: Vec<(SortKey, &Slot<D>)> = inner
      .entries
      .values()
      .filter(|slot| filter.matches(&slot.entry.id))
      .map(|slot| (SortKey::of(slot), slot))
      .filter(|(key, _)| after.as_ref().is_none_or(|after| key > after))
      .collect();
    matching.sort_by(|a, b| a.0.cmp(&b.0));

    let has_more = matching.len() > limit;
    matching.truncate(limit);

    let next_token = if has_more {
      matching.last().map(|(key, _)| key.encode())
    } else {
      None
    };

    Ok(Page {
      entries: matching
        .into_iter()
        .map(|(_, slot)| slot.entry.clone())
        .collect(),
      next_token,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn id(name: &str, version: &str) -> Identifier {
    Identifier::new("flytesnacks", "development", name, version)
  }

  #[tokio::test]
  async fn test_register_and_resolve() {
    let registry = InMemoryRegistry::new();
    registry.register(id("wf", "v1"), 1u32).await.unwrap();

    assert_eq!(*registry.resolve(&id("wf", "v1")).await.unwrap(), 1);
    let err = registry.resolve(&id("wf", "v2")).await.unwrap_err();
    assert!(matches!(err, RegistryError::NotFound { .. }));
  }

  #[tokio::test]
  async fn test_duplicate_identifier() {
    let registry = InMemoryRegistry::new();
    registry.register(id("wf", "v1"), 1u32).await.unwrap();

    let err = registry.register(id("wf", "v1"), 2).await.unwrap_err();
    assert!(matches!(err, RegistryError::DuplicateIdentifier { .. }));
    assert_eq!(*registry.resolve(&id("wf", "v1")).await.unwrap(), 1);

    // Same name, new version is a distinct identifier.
    registry.register(id("wf", "v2"), 2).await.unwrap();
    assert_eq!(registry.len(), 2);
  }

  #[tokio::test]
  async fn test_invalid_identifier() {
    let registry = InMemoryRegistry::<u32>::new();
    let err = registry
      .register(Identifier::new("p", "d", "", "v1"), 1)
      .await
      .unwrap_err();
    assert!(matches!(
      err,
      RegistryError::InvalidIdentifier { part: "name", .. }
    ));
  }

  #[tokio::test]
  async fn test_list_pages_in_registration_order() {
    let registry = InMemoryRegistry::new();
    for (i, name) in ["c", "a", "b", "e", "d"].iter().enumerate() {
      registry.register(id(name, "v1"), i).await.unwrap();
    }
    registry
      .register(Identifier::new("other", "development", "x", "v1"), 99)
      .await
      .unwrap();

    let filter = IdentifierFilter::new("flytesnacks", "development");
    let first = registry.list(&filter, 2, None).await.unwrap();
    let names: Vec<_> = first.entries.iter().map(|e| e.id.name.as_str()).collect();
    assert_eq!(names, vec!["c", "a"]);

    let token = first.next_token.unwrap();
    let second = registry.list(&filter, 2, Some(&token)).await.unwrap();
    let names: Vec<_> = second.entries.iter().map(|e| e.id.name.as_str()).collect();
    assert_eq!(names, vec!["b", "e"]);

    let token = second.next_token.unwrap();
    let third = registry.list(&filter, 2, Some(&token)).await.unwrap();
    assert_eq!(third.entries.len(), 1);
    assert_eq!(third.entries[0].id.name, "d");
    assert!(third.next_token.is_none());
  }

  #[tokio::test]
  async fn test_token_stable_across_new_registrations() {
    let registry = InMemoryRegistry::new();
    registry.register(id("a", "v1"), 0u32).await.unwrap();
    registry.register(id("b", "v1"), 1).await.unwrap();
    registry.register(id("c", "v1"), 2).await.unwrap();

    let filter = IdentifierFilter::new("flytesnacks", "development");
    let first = registry.list(&filter, 2, None).await.unwrap();
    let token = first.next_token.unwrap();

    registry.register(id("0-new", "v1"), 3).await.unwrap();

    let rest = registry.list(&filter, 10, Some(&token)).await.unwrap();
    let names: Vec<_> = rest.entries.iter().map(|e| e.id.name.as_str()).collect();
    assert_eq!(names, vec!["c", "0-new"]);
  }

  #[tokio::test]
  async fn test_list_filter_by_name() {
    let registry = InMemoryRegistry::new();
    registry.register(id("wf", "v1"), 0u32).await.unwrap();
    registry.register(id("other", "v1"), 1).await.unwrap();
    registry.register(id("wf", "v2"), 2).await.unwrap();

    let filter = IdentifierFilter::new("flytesnacks", "development").with_name("wf");
    let page = registry.list(&filter, 10, None).await.unwrap();
    let versions: Vec<_> = page.entries.iter().map(|e| e.id.version.as_str()).collect();
    assert_eq!(versions, vec!["v1", "v2"]);
  }

  #[tokio::test]
  async fn test_list_rejects_bad_arguments() {
    let registry = InMemoryRegistry::<u32>::new();
    let filter = IdentifierFilter::new("p", "d");

    assert!(matches!(
      registry.list(&filter, 0, None).await.unwrap_err(),
      RegistryError::InvalidLimit
    ));
    assert!(matches!(
      registry.list(&filter, 1, Some("garbage")).await.unwrap_err(),
      RegistryError::InvalidToken { .. }
    ));
  }
}
