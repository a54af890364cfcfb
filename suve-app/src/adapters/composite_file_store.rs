//! Per-service fan-out over stash documents

use async_trait::async_trait;
use suve_core::error::CoreResult;
use suve_core::traits::{FileStore, StateStore};
use suve_core::types::{Service, State};

use super::FileStateStore;
use crate::config::AppConfig;

/// One `FileStateStore` per service behind a single `FileStore`
///
/// Unscoped calls visit every service; scoped calls reach one document only.
pub struct CompositeFileStore {
    stores: Vec<FileStateStore>,
}

impl CompositeFileStore {
    /// Documents of every service in the configured scope directory
    #[must_use]
    pub fn new(config: &AppConfig) -> Self {
        Self::from_stores(
            Service::ALL
                .into_iter()
                .map(|svc| FileStateStore::new(config, svc))
                .collect(),
        )
    }

    #[must_use]
    pub fn from_stores(stores: Vec<FileStateStore>) -> Self {
        Self { stores }
    }

    /// Put back documents removed by a destructive drain that failed midway
    async fn restore(removed: &[(&FileStateStore, State)]) {
        for (store, state) in removed {
            if let Err(e) = store.write_state(Some(store.service()), state).await {
                log::error!("Failed to restore {} stash: {e}", store.service());
            }
        }
    }

    fn routed(&self, service: Option<Service>) -> impl Iterator<Item = &FileStateStore> {
        self.stores
            .iter()
            .filter(move |s| service.map_or(true, |svc| s.service() == svc))
    }
}

#[async_trait]
impl StateStore for CompositeFileStore {
    async fn drain(&self, service: Option<Service>, keep: bool) -> CoreResult<State> {
        // Read every routed document before removing any of them
        let mut peeked = Vec::new();
        for store in self.routed(service) {
            log::debug!("Reading {} stash", store.service());
            peeked.push((store, store.drain(Some(store.service()), true).await?));
        }

        if !keep {
            for (i, (store, _)) in peeked.iter().enumerate() {
                if let Err(e) = store.delete().await {
                    Self::restore(&peeked[..i]).await;
                    return Err(e);
                }
            }
        }

        let mut merged = State::new();
        for (_, state) in peeked {
            merged.merge(state);
        }
        Ok(merged)
    }

    async fn write_state(&self, service: Option<Service>, state: &State) -> CoreResult<()> {
        for store in self.routed(service) {
            log::debug!("Writing {} stash", store.service());
            store.write_state(Some(store.service()), state).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl FileStore for CompositeFileStore {
    async fn exists(&self) -> CoreResult<bool> {
        for store in &self.stores {
            if store.exists().await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn is_encrypted(&self) -> CoreResult<bool> {
        for store in &self.stores {
            if store.is_encrypted().await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn delete(&self) -> CoreResult<()> {
        for store in &self.stores {
            store.delete().await?;
        }
        Ok(())
    }
}
