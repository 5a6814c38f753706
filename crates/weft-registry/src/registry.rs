use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use weft_config::{Identifier, IdentifierFilter};

use crate::error::RegistryError;

/// A registered definition with its registration metadata.
#[derive(Debug)]
pub struct Entry<D> {
  pub id: Identifier,
  pub definition: Arc<D>,
  pub registered_at: DateTime<Utc>,
}

impl<D> Clone for Entry<D> {
  fn clone(&self) -> Self {
    Self {
      id: self.id.clone(),
      definition: Arc::clone(&self.definition),
      registered_at: self.registered_at,
    }
  }
}

/// One page of a listing.
#[derive(Debug)]
pub struct Page<D> {
  pub entries: Vec<Entry<D>>,
  /// Pass back to `list` to continue after the last entry; `None` when exhausted.
  pub next_token: Option<String>,
}

/// Identifier-keyed store of immutable definitions.
///
/// Registration is the only mutation. Resolution and listing are read-only and
/// may be called concurrently.
#[async_trait]
pub trait Registry<D>: Send + Sync
where
  D: Send + Sync + 'static,
{
  /// Register a definition under `id`.
  ///
  /// Fails with `DuplicateIdentifier` if the exact tuple exists.
  async fn register(&self, id: Identifier, definition: D) -> Result<Arc<D>, RegistryError>;

  /// Look up a definition by its exact identifier.
  async fn resolve(&self, id: &Identifier) -> Result<Arc<D>, RegistryError>;

  /// List definitions matching `filter`, ordered by registration time with ties
  /// broken by name.
  ///
  /// Tokens are stable: entries registered after a token was issued never appear
  /// on pages before it.
  async fn list(
    &self,
    filter: &IdentifierFilter,
    limit: usize,
    token: Option<&str>,
  ) -> Result<Page<D>, RegistryError>;
}

#[async_trait]
impl<D, R> Registry<D> for Arc<R>
where
  D: Send + Sync + 'static,
  R: Registry<D> + ?Sized,
{
  async fn register(&self, id: Identifier, definition: D) -> Result<Arc<D>, RegistryError> {
    (**self).register(id, definition).await
  }

  async fn resolve(&self, id: &Identifier) -> Result<Arc<D>, RegistryError> {
    (**self).resolve(id).await
  }

  async fn list(
    &self,
    filter: &IdentifierFilter,
    limit: usize,
    token: Option<&str>,
  ) -> Result<Page<D>, RegistryError> {
    (**self).list(filter, limit, token).await
  }
}
