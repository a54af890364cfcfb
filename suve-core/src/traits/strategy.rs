//! Remote service access abstract Trait

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::CoreResult;
use crate::types::{DeleteOptions, RemoteItem, Service, TagEntry};

/// Remote key-value service client
///
/// One implementation per `Service` (parameter store, secret store).
#[async_trait]
pub trait ServiceStrategy: Send + Sync {
    /// Service this strategy talks to
    fn service(&self) -> Service;

    /// Current remote state of an item
    ///
    /// # Returns
    /// * `Ok(Some(item))` - item exists
    /// * `Ok(None)` - item does not exist
    async fn fetch_current(&self, name: &str) -> CoreResult<Option<RemoteItem>>;

    /// Historical state of an item
    ///
    /// # Arguments
    /// * `version` - service specific version selector (version number, label, version id)
    async fn fetch_version(&self, name: &str, version: &str) -> CoreResult<Option<RemoteItem>>;

    /// Create a new item
    async fn create(&self, name: &str, value: &str, description: Option<&str>) -> CoreResult<()>;

    /// Write a new value for an existing item
    async fn update(&self, name: &str, value: &str, description: Option<&str>) -> CoreResult<()>;

    /// Delete an item
    ///
    /// # Arguments
    /// * `options` - secret deletion options; ignored by services without recovery
    async fn delete(&self, name: &str, options: Option<&DeleteOptions>) -> CoreResult<()>;

    /// Current tags of an item
    async fn list_tags(&self, name: &str) -> CoreResult<BTreeMap<String, String>>;

    /// Set and remove tags of an item
    async fn apply_tags(&self, name: &str, tags: &TagEntry) -> CoreResult<()>;
}
