//! 测试辅助模块
//!
//! 提供 mock 实现和便捷的测试工厂方法。

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::error::{CoreError, CoreResult};
use crate::services::{ApplyService, ServiceContext, StagingService, TransferService};
use crate::traits::{
    Choice, FileStore, InMemoryAgent, Pinger, Prompter, ServiceStrategy, StagingStore, Starter,
    StateStore,
};
use crate::types::{DeleteOptions, Entry, RemoteItem, Service, State, TagEntry};

// ===== Agents =====

/// Agent that records `start` and always answers `ping`
pub struct RecordingAgent {
    started: AtomicBool,
}

impl RecordingAgent {
    pub fn new() -> Self {
        Self {
            started: AtomicBool::new(false),
        }
    }

    pub fn started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Starter for RecordingAgent {
    async fn start(&self) -> CoreResult<()> {
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl Pinger for RecordingAgent {
    async fn ping(&self) -> CoreResult<()> {
        Ok(())
    }
}

/// Agent that can neither be started nor reached
pub struct FailingAgent;

#[async_trait]
impl Starter for FailingAgent {
    async fn start(&self) -> CoreResult<()> {
        Err(CoreError::AgentUnavailable("spawn failed".to_string()))
    }
}

#[async_trait]
impl Pinger for FailingAgent {
    async fn ping(&self) -> CoreResult<()> {
        Err(CoreError::AgentUnavailable("connection refused".to_string()))
    }
}

// ===== MemoryFileStore =====

/// File store kept in memory; `None` means no document on disk
pub struct MemoryFileStore {
    document: RwLock<Option<State>>,
}

impl MemoryFileStore {
    pub fn new() -> Self {
        Self {
            document: RwLock::new(None),
        }
    }

    pub async fn snapshot(&self) -> State {
        self.document.read().await.clone().unwrap_or_default()
    }
}

#[async_trait]
impl StateStore for MemoryFileStore {
    async fn drain(&self, service: Option<Service>, keep: bool) -> CoreResult<State> {
        let mut document = self.document.write().await;
        let Some(current) = document.as_mut() else {
            return Ok(State::new());
        };
        let scoped = current.scoped(service);
        if !keep {
            current.remove_scope(service);
            if current.is_empty() {
                *document = None;
            }
        }
        Ok(scoped)
    }

    async fn write_state(&self, service: Option<Service>, state: &State) -> CoreResult<()> {
        let mut document = self.document.write().await;
        let mut next = document.take().unwrap_or_default();
        next.remove_scope(service);
        next.merge(state.scoped(service));
        if !next.is_empty() {
            *document = Some(next);
        }
        Ok(())
    }
}

#[async_trait]
impl FileStore for MemoryFileStore {
    async fn exists(&self) -> CoreResult<bool> {
        Ok(self.document.read().await.is_some())
    }

    async fn is_encrypted(&self) -> CoreResult<bool> {
        Ok(false)
    }

    async fn delete(&self) -> CoreResult<()> {
        *self.document.write().await = None;
        Ok(())
    }
}

/// Store whose destructive drain fails; everything else is delegated
pub struct FailingDrainStore {
    inner: Arc<MemoryFileStore>,
}

impl FailingDrainStore {
    pub fn new(inner: Arc<MemoryFileStore>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl StateStore for FailingDrainStore {
    async fn drain(&self, service: Option<Service>, keep: bool) -> CoreResult<State> {
        if !keep {
            return Err(CoreError::StorageError("permission denied".to_string()));
        }
        self.inner.drain(service, keep).await
    }

    async fn write_state(&self, service: Option<Service>, state: &State) -> CoreResult<()> {
        self.inner.write_state(service, state).await
    }
}

// ===== MockPrompter =====

/// Prompter with a canned answer
pub struct MockPrompter {
    interactive: bool,
    answer: Option<usize>,
    asked: AtomicUsize,
}

impl MockPrompter {
    /// Interactive prompter returning `answer` (`None` = cancel)
    pub fn answering(answer: Option<usize>) -> Self {
        Self {
            interactive: true,
            answer,
            asked: AtomicUsize::new(0),
        }
    }

    pub fn asked(&self) -> usize {
        self.asked.load(Ordering::SeqCst)
    }
}

impl Default for MockPrompter {
    fn default() -> Self {
        Self {
            interactive: false,
            answer: None,
            asked: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Prompter for MockPrompter {
    fn is_interactive(&self) -> bool {
        self.interactive
    }

    async fn choose(&self, _message: &str, choices: &[Choice]) -> CoreResult<Option<usize>> {
        self.asked.fetch_add(1, Ordering::SeqCst);
        Ok(self.answer.filter(|i| *i < choices.len()))
    }
}

// ===== MockStrategy =====

pub struct MockStrategy {
    service: Service,
    items: RwLock<HashMap<String, RemoteItem>>,
    versions: RwLock<HashMap<(String, String), String>>,
    /// 对这些名称的任何调用都返回错误
    failing: RwLock<HashSet<String>>,
    calls: RwLock<Vec<String>>,
}

impl MockStrategy {
    pub fn new(service: Service) -> Self {
        Self {
            service,
            items: RwLock::new(HashMap::new()),
            versions: RwLock::new(HashMap::new()),
            failing: RwLock::new(HashSet::new()),
            calls: RwLock::new(Vec::new()),
        }
    }

    pub async fn set_item(&self, name: &str, value: &str, last_modified: Option<DateTime<Utc>>) {
        self.items
            .write()
            .await
            .insert(name.to_string(), RemoteItem::new(value, last_modified));
    }

    pub async fn set_version(&self, name: &str, version: &str, value: &str) {
        self.versions
            .write()
            .await
            .insert((name.to_string(), version.to_string()), value.to_string());
    }

    pub async fn fail_on(&self, name: &str) {
        self.failing.write().await.insert(name.to_string());
    }

    pub async fn value(&self, name: &str) -> Option<String> {
        self.items.read().await.get(name).map(|i| i.value.clone())
    }

    pub async fn tags(&self, name: &str) -> BTreeMap<String, String> {
        self.items
            .read()
            .await
            .get(name)
            .map(|i| i.tags.clone())
            .unwrap_or_default()
    }

    /// Mutating calls in order, as `"<op> <name>"`
    pub async fn calls(&self) -> Vec<String> {
        self.calls.read().await.clone()
    }

    async fn check(&self, name: &str) -> CoreResult<()> {
        if self.failing.read().await.contains(name) {
            return Err(CoreError::Remote {
                service: self.service.to_string(),
                message: format!("throttled on {name}"),
            });
        }
        Ok(())
    }

    async fn record(&self, op: &str, name: &str) {
        self.calls.write().await.push(format!("{op} {name}"));
    }

    fn not_found(&self, name: &str) -> CoreError {
        CoreError::NotFound(format!("{} {name}", self.service))
    }
}

#[async_trait]
impl ServiceStrategy for MockStrategy {
    fn service(&self) -> Service {
        self.service
    }

    async fn fetch_current(&self, name: &str) -> CoreResult<Option<RemoteItem>> {
        self.check(name).await?;
        Ok(self.items.read().await.get(name).cloned())
    }

    async fn fetch_version(&self, name: &str, version: &str) -> CoreResult<Option<RemoteItem>> {
        self.check(name).await?;
        let key = (name.to_string(), version.to_string());
        Ok(self
            .versions
            .read()
            .await
            .get(&key)
            .map(|value| RemoteItem::new(value.clone(), None)))
    }

    async fn create(&self, name: &str, value: &str, _description: Option<&str>) -> CoreResult<()> {
        self.check(name).await?;
        self.record("create", name).await;
        let mut items = self.items.write().await;
        if items.contains_key(name) {
            return Err(CoreError::AlreadyExists(name.to_string()));
        }
        items.insert(name.to_string(), RemoteItem::new(value, Some(Utc::now())));
        Ok(())
    }

    async fn update(&self, name: &str, value: &str, _description: Option<&str>) -> CoreResult<()> {
        self.check(name).await?;
        self.record("update", name).await;
        let mut items = self.items.write().await;
        let item = items.get_mut(name).ok_or_else(|| self.not_found(name))?;
        item.value = value.to_string();
        item.last_modified = Some(Utc::now());
        Ok(())
    }

    async fn delete(&self, name: &str, _options: Option<&DeleteOptions>) -> CoreResult<()> {
        self.check(name).await?;
        self.record("delete", name).await;
        self.items
            .write()
            .await
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| self.not_found(name))
    }

    async fn list_tags(&self, name: &str) -> CoreResult<BTreeMap<String, String>> {
        self.check(name).await?;
        self.items
            .read()
            .await
            .get(name)
            .map(|i| i.tags.clone())
            .ok_or_else(|| self.not_found(name))
    }

    async fn apply_tags(&self, name: &str, tags: &TagEntry) -> CoreResult<()> {
        self.check(name).await?;
        self.record("tag", name).await;
        let mut items = self.items.write().await;
        let item = items.get_mut(name).ok_or_else(|| self.not_found(name))?;
        for key in &tags.remove {
            item.tags.remove(key);
        }
        item.tags
            .extend(tags.add.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(())
    }
}

/// Agent transport that serves reads and writes but refuses to unstage
pub struct StickyAgent(pub InMemoryAgent);

impl StickyAgent {
    fn refused() -> CoreError {
        CoreError::AgentUnavailable("connection reset".to_string())
    }
}

#[async_trait]
impl StateStore for StickyAgent {
    async fn drain(&self, service: Option<Service>, keep: bool) -> CoreResult<State> {
        self.0.drain(service, keep).await
    }

    async fn write_state(&self, service: Option<Service>, state: &State) -> CoreResult<()> {
        self.0.write_state(service, state).await
    }
}

#[async_trait]
impl StagingStore for StickyAgent {
    async fn get_entry(&self, service: Service, name: &str) -> CoreResult<Option<Entry>> {
        self.0.get_entry(service, name).await
    }

    async fn stage_entry(&self, service: Service, name: &str, entry: Entry) -> CoreResult<()> {
        self.0.stage_entry(service, name, entry).await
    }

    async fn unstage_entry(&self, _service: Service, _name: &str) -> CoreResult<bool> {
        Err(Self::refused())
    }

    async fn get_tag(&self, service: Service, name: &str) -> CoreResult<Option<TagEntry>> {
        self.0.get_tag(service, name).await
    }

    async fn stage_tag(&self, service: Service, name: &str, tag: TagEntry) -> CoreResult<()> {
        self.0.stage_tag(service, name, tag).await
    }

    async fn unstage_tag(&self, _service: Service, _name: &str) -> CoreResult<bool> {
        Err(Self::refused())
    }

    async fn unstage_all(&self, _service: Option<Service>) -> CoreResult<()> {
        Err(Self::refused())
    }
}

// ===== 测试工厂 =====

/// Services wired to in-memory collaborators
pub struct TestContext {
    pub agent: InMemoryAgent,
    pub file: Arc<MemoryFileStore>,
    pub prompter: Arc<MockPrompter>,
    pub param: Arc<MockStrategy>,
    pub secret: Arc<MockStrategy>,
    pub ctx: Arc<ServiceContext>,
    pub apply: ApplyService,
    pub staging: StagingService,
    pub transfer: TransferService,
}

impl TestContext {
    fn build(
        agent: InMemoryAgent,
        file: Arc<MemoryFileStore>,
        prompter: Arc<MockPrompter>,
        strategies: &[Service],
        sticky: bool,
    ) -> Self {
        let param = Arc::new(MockStrategy::new(Service::Param));
        let secret = Arc::new(MockStrategy::new(Service::Secret));

        let staging: Arc<dyn StagingStore> = if sticky {
            Arc::new(StickyAgent(agent.clone()))
        } else {
            Arc::new(agent.clone())
        };
        let mut ctx = ServiceContext::new(
            staging,
            Arc::new(agent.clone()),
            Arc::new(agent.clone()),
            file.clone(),
            prompter.clone(),
        );
        for service in strategies {
            let strategy = match service {
                Service::Param => param.clone(),
                Service::Secret => secret.clone(),
            };
            ctx = ctx.with_strategy(strategy);
        }
        let ctx = Arc::new(ctx);

        Self {
            agent,
            file,
            prompter,
            param,
            secret,
            apply: ApplyService::new(Arc::clone(&ctx)),
            staging: StagingService::new(Arc::clone(&ctx)),
            transfer: TransferService::new(Arc::clone(&ctx)),
            ctx,
        }
    }

    /// Same agent and file store, different prompter
    pub fn with_prompter(self, prompter: MockPrompter) -> Self {
        Self::build(self.agent, self.file, Arc::new(prompter), &Service::ALL, false)
    }

    /// Same agent and file store, no strategy registered
    pub fn without_strategies(self) -> Self {
        Self::build(self.agent, self.file, self.prompter, &[], false)
    }

    /// Same agent and file store, strategies for the given services only
    pub fn with_strategies_for(self, services: &[Service]) -> Self {
        Self::build(self.agent, self.file, self.prompter, services, false)
    }

    /// Same agent behind a transport whose unstage calls fail
    pub fn with_sticky_agent(self) -> Self {
        Self::build(self.agent, self.file, self.prompter, &Service::ALL, true)
    }
}

/// Running agent, empty stash, non-interactive prompter, mock strategies
pub fn create_test_context() -> TestContext {
    TestContext::build(
        InMemoryAgent::running(),
        Arc::new(MemoryFileStore::new()),
        Arc::new(MockPrompter::default()),
        &Service::ALL,
        false,
    )
}
