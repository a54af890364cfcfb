//! Platform-agnostic application bootstrap for suve.
//!
//! Provides `AppState` (service container), `AppStateBuilder` (adapter
//! injection), the filesystem stash adapters and configuration resolution.

pub mod adapters;
pub mod config;

use std::sync::Arc;

use suve_core::error::{CoreError, CoreResult};
use suve_core::services::{ApplyService, ServiceContext, StagingService, TransferService};
use suve_core::traits::{
    FileStore, InMemoryAgent, NonInteractive, Pinger, Prompter, ServiceStrategy, StagingStore,
    Starter,
};

use crate::adapters::CompositeFileStore;
use crate::config::AppConfig;

/// Platform-agnostic application state.
///
/// Holds all services and the `ServiceContext`. Every frontend constructs this
/// once at startup via `AppStateBuilder`.
pub struct AppState {
    /// Service context (holds all adapters)
    pub ctx: Arc<ServiceContext>,
    /// add / edit / delete / tag / untag / reset / status / diff
    pub staging_service: StagingService,
    /// stash push / pop / show / drop
    pub transfer_service: TransferService,
    /// apply
    pub apply_service: ApplyService,
}

struct AgentParts {
    store: Arc<dyn StagingStore>,
    starter: Arc<dyn Starter>,
    pinger: Arc<dyn Pinger>,
}

/// Builder for constructing `AppState` with platform-specific adapters.
///
/// # Required
/// - `config` or `file_store` - where the stash lives
///
/// # Optional
/// - agent - defaults to a stopped `InMemoryAgent`
/// - `prompter` - defaults to `NonInteractive`
/// - `strategy` - one per remote service; apply/diff fail for services without one
pub struct AppStateBuilder {
    config: Option<AppConfig>,
    file_store: Option<Arc<dyn FileStore>>,
    agent: Option<AgentParts>,
    prompter: Option<Arc<dyn Prompter>>,
    strategies: Vec<Arc<dyn ServiceStrategy>>,
}

impl AppStateBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: None,
            file_store: None,
            agent: None,
            prompter: None,
            strategies: Vec::new(),
        }
    }

    /// Stash location and passphrase; builds a `CompositeFileStore` unless
    /// `file_store` is set
    #[must_use]
    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = Some(config);
        self
    }

    #[must_use]
    pub fn file_store(mut self, store: Arc<dyn FileStore>) -> Self {
        self.file_store = Some(store);
        self
    }

    /// Agent living in this process
    #[must_use]
    pub fn in_process_agent(self, agent: InMemoryAgent) -> Self {
        self.agent(
            Arc::new(agent.clone()),
            Arc::new(agent.clone()),
            Arc::new(agent),
        )
    }

    /// Agent reached through an external transport
    #[must_use]
    pub fn agent(
        mut self,
        store: Arc<dyn StagingStore>,
        starter: Arc<dyn Starter>,
        pinger: Arc<dyn Pinger>,
    ) -> Self {
        self.agent = Some(AgentParts {
            store,
            starter,
            pinger,
        });
        self
    }

    #[must_use]
    pub fn prompter(mut self, prompter: Arc<dyn Prompter>) -> Self {
        self.prompter = Some(prompter);
        self
    }

    #[must_use]
    pub fn strategy(mut self, strategy: Arc<dyn ServiceStrategy>) -> Self {
        self.strategies.push(strategy);
        self
    }

    /// Build the `AppState`.
    ///
    /// # Errors
    /// Returns `CoreError::ValidationError` if neither `config` nor `file_store` is set.
    pub fn build(self) -> CoreResult<AppState> {
        let file_store: Arc<dyn FileStore> = match (self.file_store, &self.config) {
            (Some(store), _) => store,
            (None, Some(config)) => Arc::new(CompositeFileStore::new(config)),
            (None, None) => {
                return Err(CoreError::ValidationError(
                    "config or file_store is required".to_string(),
                ))
            }
        };
        let AgentParts {
            store,
            starter,
            pinger,
        } = self.agent.unwrap_or_else(|| {
            let agent = InMemoryAgent::new();
            AgentParts {
                store: Arc::new(agent.clone()),
                starter: Arc::new(agent.clone()),
                pinger: Arc::new(agent),
            }
        });
        let prompter = self.prompter.unwrap_or_else(|| Arc::new(NonInteractive));

        let ctx = self.strategies.into_iter().fold(
            ServiceContext::new(store, starter, pinger, file_store, prompter),
            ServiceContext::with_strategy,
        );
        let ctx = Arc::new(ctx);

        Ok(AppState {
            staging_service: StagingService::new(Arc::clone(&ctx)),
            transfer_service: TransferService::new(Arc::clone(&ctx)),
            apply_service: ApplyService::new(Arc::clone(&ctx)),
            ctx,
        })
    }
}

impl Default for AppStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}
