//! Staging service
//!
//! Stages, unstages and inspects changes held by the agent. Write commands
//! auto-start the agent; read commands report "nothing staged" when no agent
//! is running.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{CoreError, CoreResult};
use crate::services::lifecycle::{
    execute_read, execute_write, ReadCommand, ReadOutcome, WriteCommand,
};
use crate::services::ServiceContext;
use crate::types::{
    DeleteOptions, DiffEntry, Entry, Operation, Service, StagedEntry, StagedTag, StatusReport,
    TagEntry,
};

/// Staging service
pub struct StagingService {
    ctx: Arc<ServiceContext>,
}

impl StagingService {
    /// 创建 staging 服务实例
    #[must_use]
    pub fn new(ctx: Arc<ServiceContext>) -> Self {
        Self { ctx }
    }

    // ===== Write commands =====

    /// `add`: stage creation of an item that does not exist remotely
    ///
    /// A pending create of the same name is replaced.
    pub async fn add(
        &self,
        service: Service,
        name: &str,
        value: &str,
        description: Option<String>,
    ) -> CoreResult<()> {
        execute_write(self.ctx.starter.as_ref(), WriteCommand::ADD, || async {
            match self.ctx.agent.get_entry(service, name).await? {
                Some(staged) if staged.operation != Operation::Create => {
                    return Err(CoreError::ValidationError(format!(
                        "{name} is already staged for {}; reset it first",
                        staged.operation
                    )));
                }
                Some(_) => {}
                None => {
                    let strategy = self.ctx.strategy(service)?;
                    if strategy.fetch_current(name).await?.is_some() {
                        return Err(CoreError::AlreadyExists(format!(
                            "{service} {name}; use edit instead"
                        )));
                    }
                }
            }

            self.ctx
                .agent
                .stage_entry(service, name, Entry::create(value, description))
                .await?;
            log::info!("Staged create of {service} {name}");
            Ok(())
        })
        .await
    }

    /// `edit`: stage a new value for an item
    ///
    /// # Returns
    /// `false` when the value matches the remote value and the entry was
    /// unstaged instead
    pub async fn edit(
        &self,
        service: Service,
        name: &str,
        value: &str,
        description: Option<String>,
    ) -> CoreResult<bool> {
        execute_write(self.ctx.starter.as_ref(), WriteCommand::EDIT, || async {
            let staged = self.ctx.agent.get_entry(service, name).await?;

            // Editing a pending create keeps it a create
            if let Some(entry) = staged.as_ref().filter(|e| e.operation == Operation::Create) {
                let description = description.or_else(|| entry.description.clone());
                self.ctx
                    .agent
                    .stage_entry(service, name, Entry::create(value, description))
                    .await?;
                return Ok(true);
            }

            let strategy = self.ctx.strategy(service)?;
            let remote = strategy
                .fetch_current(name)
                .await?
                .ok_or_else(|| CoreError::NotFound(format!("{service} {name}")))?;

            if remote.value == value && description.is_none() {
                if self.ctx.agent.unstage_entry(service, name).await? {
                    log::info!("{service} {name} matches remote, unstaged");
                }
                return Ok(false);
            }

            // Keep the first observed baseline across repeated edits
            let baseline = match staged {
                Some(entry) if entry.operation == Operation::Update => entry.base_modified_at,
                _ => remote.last_modified,
            };
            let entry = Entry::update(value, description).with_base_modified_at(baseline);
            self.ctx.agent.stage_entry(service, name, entry).await?;
            log::info!("Staged update of {service} {name}");
            Ok(true)
        })
        .await
    }

    /// `delete`: stage removal of an item
    ///
    /// Deleting a pending create unstages it (and its tags) instead.
    pub async fn delete(
        &self,
        service: Service,
        name: &str,
        options: Option<DeleteOptions>,
    ) -> CoreResult<()> {
        if let Some(options) = &options {
            if service != Service::Secret {
                return Err(CoreError::ValidationError(format!(
                    "delete options are only supported for {}",
                    Service::Secret
                )));
            }
            options.validate()?;
        }

        execute_write(self.ctx.starter.as_ref(), WriteCommand::DELETE, || async {
            if let Some(entry) = self.ctx.agent.get_entry(service, name).await? {
                if entry.operation == Operation::Create {
                    self.ctx.agent.unstage_entry(service, name).await?;
                    self.ctx.agent.unstage_tag(service, name).await?;
                    log::info!("Unstaged pending create of {service} {name}");
                    return Ok(());
                }
            }

            let strategy = self.ctx.strategy(service)?;
            let remote = strategy
                .fetch_current(name)
                .await?
                .ok_or_else(|| CoreError::NotFound(format!("{service} {name}")))?;

            let entry = Entry::delete(options).with_base_modified_at(remote.last_modified);
            self.ctx.agent.stage_entry(service, name, entry).await?;
            // Tag changes are moot once the item is gone
            self.ctx.agent.unstage_tag(service, name).await?;
            log::info!("Staged delete of {service} {name}");
            Ok(())
        })
        .await
    }

    /// `tag`: stage tags to set on an item
    pub async fn tag(
        &self,
        service: Service,
        name: &str,
        tags: BTreeMap<String, String>,
    ) -> CoreResult<()> {
        if tags.is_empty() {
            return Err(CoreError::ValidationError("no tags given".to_string()));
        }
        execute_write(self.ctx.starter.as_ref(), WriteCommand::TAG, || {
            self.update_tags(service, name, |entry| entry.add_tags(tags))
        })
        .await
    }

    /// `untag`: stage tag keys to remove from an item
    pub async fn untag(&self, service: Service, name: &str, keys: Vec<String>) -> CoreResult<()> {
        if keys.is_empty() {
            return Err(CoreError::ValidationError("no tag keys given".to_string()));
        }
        execute_write(self.ctx.starter.as_ref(), WriteCommand::UNTAG, || {
            self.update_tags(service, name, |entry| entry.remove_keys(keys))
        })
        .await
    }

    async fn update_tags(
        &self,
        service: Service,
        name: &str,
        change: impl FnOnce(&mut TagEntry),
    ) -> CoreResult<()> {
        match self.ctx.agent.get_entry(service, name).await? {
            Some(entry) if entry.operation == Operation::Delete => {
                return Err(CoreError::ValidationError(format!(
                    "{name} is staged for deletion"
                )));
            }
            Some(entry) if entry.operation == Operation::Create => {}
            _ => {
                let strategy = self.ctx.strategy(service)?;
                if strategy.fetch_current(name).await?.is_none() {
                    return Err(CoreError::NotFound(format!("{service} {name}")));
                }
            }
        }

        let mut tag = self
            .ctx
            .agent
            .get_tag(service, name)
            .await?
            .unwrap_or_default();
        change(&mut tag);
        self.ctx.agent.stage_tag(service, name, tag).await?;
        log::info!("Staged tag change of {service} {name}");
        Ok(())
    }

    /// `reset <name>@<version>`: stage the value of a previous version
    ///
    /// # Returns
    /// `false` when that version already is the current value (nothing staged)
    pub async fn reset_to_version(
        &self,
        service: Service,
        name: &str,
        version: &str,
    ) -> CoreResult<bool> {
        execute_write(
            self.ctx.starter.as_ref(),
            WriteCommand::RESET_WITH_VERSION,
            || async {
                let strategy = self.ctx.strategy(service)?;
                let target = strategy
                    .fetch_version(name, version)
                    .await?
                    .ok_or_else(|| CoreError::NotFound(format!("{service} {name}@{version}")))?;
                let current = strategy
                    .fetch_current(name)
                    .await?
                    .ok_or_else(|| CoreError::NotFound(format!("{service} {name}")))?;

                if current.value == target.value {
                    self.ctx.agent.unstage_entry(service, name).await?;
                    return Ok(false);
                }

                let entry =
                    Entry::update(target.value, None).with_base_modified_at(current.last_modified);
                self.ctx.agent.stage_entry(service, name, entry).await?;
                log::info!("Staged {service} {name} back to version {version}");
                Ok(true)
            },
        )
        .await
    }

    // ===== Read commands =====

    /// `reset`: unstage one name, one service or everything
    ///
    /// # Returns
    /// Number of unstaged entries and tag changes
    pub async fn reset(
        &self,
        service: Option<Service>,
        name: Option<&str>,
    ) -> CoreResult<ReadOutcome<usize>> {
        execute_read(self.ctx.pinger.as_ref(), ReadCommand::RESET, || async {
            let Some(name) = name else {
                let count = self.ctx.agent.drain(service, true).await?.total_count();
                self.ctx.agent.unstage_all(service).await?;
                log::info!("Unstaged {count} change(s)");
                return Ok(count);
            };

            let mut count = 0;
            for &svc in Service::scope(service) {
                count += usize::from(self.ctx.agent.unstage_entry(svc, name).await?);
                count += usize::from(self.ctx.agent.unstage_tag(svc, name).await?);
            }
            Ok(count)
        })
        .await
    }

    /// `status`: list staged changes, entries in staging order
    pub async fn status(&self, service: Option<Service>) -> CoreResult<ReadOutcome<StatusReport>> {
        execute_read(self.ctx.pinger.as_ref(), ReadCommand::STATUS, || async {
            let state = self.ctx.agent.drain(service, true).await?;

            let mut entries: Vec<StagedEntry> = state
                .entries
                .iter()
                .flat_map(|(svc, items)| {
                    items.iter().map(move |(name, entry)| StagedEntry {
                        service: svc,
                        name: name.clone(),
                        entry: entry.clone(),
                    })
                })
                .collect();
            entries.sort_by(|a, b| a.entry.staged_at.cmp(&b.entry.staged_at));

            let tags = state
                .tags
                .iter()
                .flat_map(|(svc, items)| {
                    items.iter().map(move |(name, tag)| StagedTag {
                        service: svc,
                        name: name.clone(),
                        tag: tag.clone(),
                    })
                })
                .collect();

            Ok(StatusReport { entries, tags })
        })
        .await
    }

    /// `diff`: staged values next to the current remote values
    pub async fn diff(&self, service: Option<Service>) -> CoreResult<ReadOutcome<Vec<DiffEntry>>> {
        execute_read(self.ctx.pinger.as_ref(), ReadCommand::DIFF, || async {
            let state = self.ctx.agent.drain(service, true).await?;

            let mut diffs = Vec::with_capacity(state.entries.len());
            for (svc, items) in state.entries.iter() {
                if items.is_empty() {
                    continue;
                }
                let strategy = self.ctx.strategy(svc)?;
                for (name, entry) in items {
                    let remote = strategy.fetch_current(name).await?.map(|item| item.value);
                    diffs.push(DiffEntry {
                        service: svc,
                        name: name.clone(),
                        operation: entry.operation,
                        remote,
                        staged: entry.value.clone(),
                    });
                }
            }
            Ok(diffs)
        })
        .await
    }
}
