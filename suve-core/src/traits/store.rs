//! Staged state storage abstract Traits
//!
//! Both the agent (volatile) and the stash files (durable) speak `StateStore`,
//! which is all the transfer protocols need.

use async_trait::async_trait;

use crate::error::CoreResult;
use crate::types::{Entry, Service, State, TagEntry};

/// Read-and-consume / replace access to staged state
///
/// Platform implementation:
/// - Agent: `InMemoryAgent`
/// - Stash: `FileStateStore`, `CompositeFileStore` (suve-app)
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Read the state of a scope
    ///
    /// # Arguments
    /// * `service` - scope (`None` = all services)
    /// * `keep` - when `false`, the scope is removed from the store by the same call
    ///
    /// A store holding nothing returns an empty `State`, not an error.
    async fn drain(&self, service: Option<Service>, keep: bool) -> CoreResult<State>;

    /// Replace the content of a scope with `state` limited to that scope
    ///
    /// An empty scoped state clears the scope.
    async fn write_state(&self, service: Option<Service>, state: &State) -> CoreResult<()>;
}

/// Durable stash file store
#[async_trait]
pub trait FileStore: StateStore {
    /// Whether a stash document is present
    async fn exists(&self) -> CoreResult<bool>;

    /// Whether a present stash document carries the encryption marker
    ///
    /// Never attempts decryption.
    async fn is_encrypted(&self) -> CoreResult<bool>;

    /// Remove the stash without reading or decrypting it
    async fn delete(&self) -> CoreResult<()>;
}

/// Fine-grained staging access to the agent
#[async_trait]
pub trait StagingStore: StateStore {
    /// Staged entry of a name
    async fn get_entry(&self, service: Service, name: &str) -> CoreResult<Option<Entry>>;

    /// Stage (or replace) an entry
    async fn stage_entry(&self, service: Service, name: &str, entry: Entry) -> CoreResult<()>;

    /// Unstage an entry, returning whether one existed
    async fn unstage_entry(&self, service: Service, name: &str) -> CoreResult<bool>;

    /// Staged tag change of a name
    async fn get_tag(&self, service: Service, name: &str) -> CoreResult<Option<TagEntry>>;

    /// Stage (or replace) a tag change; an empty change unstages the name
    async fn stage_tag(&self, service: Service, name: &str, tag: TagEntry) -> CoreResult<()>;

    /// Unstage a tag change, returning whether one existed
    async fn unstage_tag(&self, service: Service, name: &str) -> CoreResult<bool>;

    /// Unstage everything in a scope
    async fn unstage_all(&self, service: Option<Service>) -> CoreResult<()>;
}
