//! 业务逻辑服务层

pub mod lifecycle;

mod apply_service;
mod staging_service;
mod transfer_service;

pub use apply_service::ApplyService;
pub use lifecycle::{
    execute_file, execute_read, execute_write, FileCommand, ReadCommand, ReadOutcome,
    WriteCommand,
};
pub use staging_service::StagingService;
pub use transfer_service::TransferService;

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{CoreError, CoreResult};
use crate::traits::{FileStore, Pinger, Prompter, ServiceStrategy, StagingStore, Starter};
use crate::types::Service;

/// 服务上下文 - 持有所有依赖
///
/// The platform layer creates this context and injects the agent transport,
/// the stash file store, the prompter and one strategy per remote service.
pub struct ServiceContext {
    /// Agent staging area
    pub agent: Arc<dyn StagingStore>,
    /// Agent auto-start
    pub starter: Arc<dyn Starter>,
    /// Agent liveness probe
    pub pinger: Arc<dyn Pinger>,
    /// Durable stash
    pub file_store: Arc<dyn FileStore>,
    /// Interactive choices
    pub prompter: Arc<dyn Prompter>,
    strategies: HashMap<Service, Arc<dyn ServiceStrategy>>,
}

impl ServiceContext {
    /// 创建服务上下文
    #[must_use]
    pub fn new(
        agent: Arc<dyn StagingStore>,
        starter: Arc<dyn Starter>,
        pinger: Arc<dyn Pinger>,
        file_store: Arc<dyn FileStore>,
        prompter: Arc<dyn Prompter>,
    ) -> Self {
        Self {
            agent,
            starter,
            pinger,
            file_store,
            prompter,
            strategies: HashMap::new(),
        }
    }

    /// Register the strategy of the service it reports
    #[must_use]
    pub fn with_strategy(mut self, strategy: Arc<dyn ServiceStrategy>) -> Self {
        self.strategies.insert(strategy.service(), strategy);
        self
    }

    /// 获取 Strategy 实例
    pub fn strategy(&self, service: Service) -> CoreResult<Arc<dyn ServiceStrategy>> {
        self.strategies.get(&service).cloned().ok_or_else(|| {
            CoreError::UnknownService(format!("{service} (no strategy configured)"))
        })
    }
}
