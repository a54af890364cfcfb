//! In-process staging agent

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{CoreError, CoreResult};
use crate::traits::{Pinger, StagingStore, Starter, StateStore};
use crate::types::{Entry, Service, State, TagEntry};

/// In-memory staging agent
///
/// Default implementation used when the agent runs inside the current
/// process. Clones share the same state.
#[derive(Clone)]
pub struct InMemoryAgent {
    state: Arc<RwLock<State>>,
    running: Arc<AtomicBool>,
}

impl InMemoryAgent {
    /// Create a stopped agent with an empty staging area
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(State::new())),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Create an already running agent
    #[must_use]
    pub fn running() -> Self {
        let agent = Self::new();
        agent.running.store(true, Ordering::SeqCst);
        agent
    }

    /// Whether the agent has been started
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop the agent, discarding everything it holds
    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        *self.state.write().await = State::new();
    }

    /// Copy of everything currently staged
    pub async fn snapshot(&self) -> State {
        self.state.read().await.clone()
    }
}

impl Default for InMemoryAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Starter for InMemoryAgent {
    async fn start(&self) -> CoreResult<()> {
        if !self.running.swap(true, Ordering::SeqCst) {
            log::debug!("In-process agent started");
        }
        Ok(())
    }
}

#[async_trait]
impl Pinger for InMemoryAgent {
    async fn ping(&self) -> CoreResult<()> {
        if self.is_running() {
            Ok(())
        } else {
            Err(CoreError::AgentUnavailable("agent is not running".to_string()))
        }
    }
}

#[async_trait]
impl StateStore for InMemoryAgent {
    async fn drain(&self, service: Option<Service>, keep: bool) -> CoreResult<State> {
        if keep {
            return Ok(self.state.read().await.scoped(service));
        }
        let mut state = self.state.write().await;
        let drained = state.scoped(service);
        state.remove_scope(service);
        Ok(drained)
    }

    async fn write_state(&self, service: Option<Service>, incoming: &State) -> CoreResult<()> {
        let mut state = self.state.write().await;
        state.remove_scope(service);
        state.merge(incoming.scoped(service));
        Ok(())
    }
}

#[async_trait]
impl StagingStore for InMemoryAgent {
    async fn get_entry(&self, service: Service, name: &str) -> CoreResult<Option<Entry>> {
        Ok(self.state.read().await.entry(service, name).cloned())
    }

    async fn stage_entry(&self, service: Service, name: &str, entry: Entry) -> CoreResult<()> {
        self.state.write().await.set_entry(service, name, entry);
        Ok(())
    }

    async fn unstage_entry(&self, service: Service, name: &str) -> CoreResult<bool> {
        Ok(self
            .state
            .write()
            .await
            .remove_entry(service, name)
            .is_some())
    }

    async fn get_tag(&self, service: Service, name: &str) -> CoreResult<Option<TagEntry>> {
        Ok(self.state.read().await.tag(service, name).cloned())
    }

    async fn stage_tag(&self, service: Service, name: &str, tag: TagEntry) -> CoreResult<()> {
        self.state.write().await.set_tag(service, name, tag);
        Ok(())
    }

    async fn unstage_tag(&self, service: Service, name: &str) -> CoreResult<bool> {
        Ok(self.state.write().await.remove_tag(service, name).is_some())
    }

    async fn unstage_all(&self, service: Option<Service>) -> CoreResult<()> {
        self.state.write().await.remove_scope(service);
        Ok(())
    }
}
