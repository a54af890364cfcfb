//! Apply service
//!
//! Commits staged entries and tag changes to the remote services. Each entry
//! is re-checked against the remote before it is written; entries whose remote
//! changed since staging are withheld as conflicts.

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::CoreResult;
use crate::services::lifecycle::{execute_read, ReadCommand, ReadOutcome};
use crate::services::ServiceContext;
use crate::traits::ServiceStrategy;
use crate::types::{
    ApplyOptions, ApplyReport, Entry, EntryOutcome, EntryResult, Operation, RemoteItem, Service,
    TagEntry, TagOutcome, TagResult,
};

/// Apply service
pub struct ApplyService {
    ctx: Arc<ServiceContext>,
}

impl ApplyService {
    /// 创建 apply 服务实例
    #[must_use]
    pub fn new(ctx: Arc<ServiceContext>) -> Self {
        Self { ctx }
    }

    /// `apply`: commit staged changes of a running agent
    ///
    /// Returns `NothingStaged` when no agent is running. Per-item conflicts and
    /// failures are collected in the report; successfully applied items are
    /// unstaged, the rest stay staged. Tag changes of a name whose entry did
    /// not apply are withheld.
    pub async fn apply(&self, options: &ApplyOptions) -> CoreResult<ReadOutcome<ApplyReport>> {
        execute_read(self.ctx.pinger.as_ref(), ReadCommand::APPLY, || {
            self.apply_staged(options)
        })
        .await
    }

    async fn apply_staged(&self, options: &ApplyOptions) -> CoreResult<ApplyReport> {
        let staged = self.ctx.agent.drain(options.service, true).await?;
        let wanted = |name: &String| options.name.as_ref().map_or(true, |n| n == name);

        // Resolve every strategy before the first remote call
        let mut work = Vec::new();
        for &service in Service::scope(options.service) {
            let entries: Vec<(&String, &Entry)> = staged
                .entries
                .get(service)
                .iter()
                .filter(|&(name, _)| wanted(name))
                .collect();
            let tags: Vec<(&String, &TagEntry)> = staged
                .tags
                .get(service)
                .iter()
                .filter(|&(name, _)| wanted(name))
                .collect();
            if entries.is_empty() && tags.is_empty() {
                continue;
            }
            work.push((service, self.ctx.strategy(service)?, entries, tags));
        }

        let mut report = ApplyReport::default();
        for (service, strategy, entries, tags) in work {
            let mut not_applied = HashSet::new();

            // Entries first: a staged create must exist before its tags can be set
            for (name, entry) in entries {
                let outcome =
                    Self::apply_entry(strategy.as_ref(), name, entry, options.ignore_conflicts)
                        .await;
                if !outcome.is_success() {
                    not_applied.insert(name.as_str());
                }
                let result = self.record_entry(service, name, entry.operation, outcome).await;
                report.entries.push(result);
            }

            for (name, tag) in tags {
                let result = if not_applied.contains(name.as_str()) {
                    log::warn!("Withholding tags of {service} {name}: entry was not applied");
                    TagResult {
                        service,
                        name: name.clone(),
                        outcome: TagOutcome::Withheld("entry was not applied".to_string()),
                        unstage_error: None,
                    }
                } else {
                    self.apply_tag(strategy.as_ref(), service, name, tag).await
                };
                report.tags.push(result);
            }
        }

        log::info!(
            "Apply finished: {} succeeded, {} conflict(s), {} failed, {} withheld",
            report.succeeded(),
            report.conflicts(),
            report.failed(),
            report.withheld()
        );
        Ok(report)
    }

    async fn record_entry(
        &self,
        service: Service,
        name: &str,
        operation: Operation,
        outcome: EntryOutcome,
    ) -> EntryResult {
        let mut unstage_error = None;
        match &outcome {
            o if o.is_success() => {
                if let Err(e) = self.ctx.agent.unstage_entry(service, name).await {
                    log::warn!("Applied {service} {name} but could not unstage it: {e}");
                    unstage_error = Some(e.to_string());
                }
            }
            EntryOutcome::Conflict(reason) => {
                log::warn!("Conflict on {service} {name}: {reason}");
            }
            EntryOutcome::Failed(reason) => {
                log::error!("Failed to apply {operation} of {service} {name}: {reason}");
            }
            _ => {}
        }
        EntryResult {
            service,
            name: name.to_string(),
            operation,
            outcome,
            unstage_error,
        }
    }

    async fn apply_tag(
        &self,
        strategy: &dyn ServiceStrategy,
        service: Service,
        name: &str,
        tag: &TagEntry,
    ) -> TagResult {
        let mut unstage_error = None;
        let outcome = match strategy.apply_tags(name, tag).await {
            Ok(()) => {
                if let Err(e) = self.ctx.agent.unstage_tag(service, name).await {
                    log::warn!("Applied tags of {service} {name} but could not unstage them: {e}");
                    unstage_error = Some(e.to_string());
                }
                TagOutcome::Applied
            }
            Err(e) => {
                log::error!("Failed to apply tags of {service} {name}: {e}");
                TagOutcome::Failed(e.to_string())
            }
        };
        TagResult {
            service,
            name: name.to_string(),
            outcome,
            unstage_error,
        }
    }

    async fn apply_entry(
        strategy: &dyn ServiceStrategy,
        name: &str,
        entry: &Entry,
        ignore_conflicts: bool,
    ) -> EntryOutcome {
        if !ignore_conflicts {
            let remote = match strategy.fetch_current(name).await {
                Ok(remote) => remote,
                Err(e) => return EntryOutcome::Failed(e.to_string()),
            };
            if let Some(reason) = detect_conflict(entry, remote.as_ref()) {
                return EntryOutcome::Conflict(reason);
            }
        }

        let description = entry.description.as_deref();
        let result = match entry.operation {
            Operation::Create | Operation::Update => {
                let Some(value) = entry.value.as_deref() else {
                    return EntryOutcome::Failed("staged entry has no value".to_string());
                };
                if entry.operation == Operation::Create {
                    strategy
                        .create(name, value, description)
                        .await
                        .map(|()| EntryOutcome::Created)
                } else {
                    strategy
                        .update(name, value, description)
                        .await
                        .map(|()| EntryOutcome::Updated)
                }
            }
            Operation::Delete => strategy
                .delete(name, entry.delete_options.as_ref())
                .await
                .map(|()| EntryOutcome::Deleted),
        };
        result.unwrap_or_else(|e| EntryOutcome::Failed(e.to_string()))
    }
}

/// Compare a staged entry with the current remote state
///
/// # Returns
/// `Some(reason)` when the remote diverged from the staging-time baseline
pub fn detect_conflict(entry: &Entry, remote: Option<&RemoteItem>) -> Option<String> {
    match (entry.operation, remote) {
        (Operation::Create, Some(_)) => Some("item was created remotely after staging".to_string()),
        (Operation::Create, None) => None,
        (Operation::Update | Operation::Delete, None) => {
            Some("item no longer exists remotely".to_string())
        }
        (Operation::Update | Operation::Delete, Some(item)) => match item.last_modified {
            Some(modified) if modified > entry.baseline() => Some(format!(
                "item was modified remotely at {} after staging",
                modified.to_rfc3339()
            )),
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::error::CoreError;
    use crate::test_utils::create_test_context;
    use crate::traits::StagingStore;
    use crate::types::DeleteOptions;

    #[test]
    fn conflict_rules() {
        let now = Utc::now();
        let old = now - Duration::hours(1);
        let newer = now + Duration::hours(1);

        let create = Entry::create("v", None);
        assert!(detect_conflict(&create, None).is_none());
        assert!(detect_conflict(&create, Some(&RemoteItem::new("x", None))).is_some());

        let update = Entry::update("v", None).with_base_modified_at(Some(old));
        assert!(detect_conflict(&update, None).is_some());
        assert!(detect_conflict(&update, Some(&RemoteItem::new("x", Some(old)))).is_none());
        assert!(detect_conflict(&update, Some(&RemoteItem::new("x", Some(newer)))).is_some());
        assert!(detect_conflict(&update, Some(&RemoteItem::new("x", None))).is_none());

        let delete = Entry::delete(None);
        assert!(detect_conflict(&delete, None).is_some());
    }

    #[tokio::test]
    async fn apply_without_agent_is_nothing_staged() {
        let t = create_test_context();
        t.agent.stop().await;
        let outcome = t.apply.apply(&ApplyOptions::default()).await.unwrap();
        assert_eq!(outcome, ReadOutcome::NothingStaged);
        assert_eq!(t.param.calls().await.len(), 0);
    }

    #[tokio::test]
    async fn apply_commits_each_operation_and_unstages() {
        let t = create_test_context();
        let base = Utc::now() - Duration::days(1);
        t.param.set_item("/app/existing", "old", Some(base)).await;
        t.secret.set_item("gone-soon", "x", Some(base)).await;

        t.agent
            .stage_entry(Service::Param, "/app/new", Entry::create("n", None))
            .await
            .unwrap();
        t.agent
            .stage_entry(
                Service::Param,
                "/app/existing",
                Entry::update("new", Some("desc".to_string())).with_base_modified_at(Some(base)),
            )
            .await
            .unwrap();
        t.agent
            .stage_entry(
                Service::Secret,
                "gone-soon",
                Entry::delete(Some(DeleteOptions::force())).with_base_modified_at(Some(base)),
            )
            .await
            .unwrap();

        let report = t
            .apply
            .apply(&ApplyOptions::default())
            .await
            .unwrap()
            .into_option()
            .unwrap();

        assert_eq!(report.succeeded(), 3);
        assert!(!report.has_problems());
        let outcome_of = |name: &str| {
            report
                .entries
                .iter()
                .find(|r| r.name == name)
                .map(|r| r.outcome.clone())
        };
        assert_eq!(outcome_of("/app/new"), Some(EntryOutcome::Created));
        assert_eq!(outcome_of("/app/existing"), Some(EntryOutcome::Updated));
        assert_eq!(outcome_of("gone-soon"), Some(EntryOutcome::Deleted));

        assert_eq!(t.param.value("/app/existing").await.as_deref(), Some("new"));
        assert!(t.secret.value("gone-soon").await.is_none());
        assert!(t.agent.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn conflicting_entry_is_withheld_but_others_apply() {
        let t = create_test_context();
        let base = Utc::now() - Duration::days(1);
        t.param
            .set_item("/app/changed", "theirs", Some(Utc::now()))
            .await;

        t.agent
            .stage_entry(
                Service::Param,
                "/app/changed",
                Entry::update("mine", None).with_base_modified_at(Some(base)),
            )
            .await
            .unwrap();
        t.agent
            .stage_entry(Service::Param, "/app/fresh", Entry::create("v", None))
            .await
            .unwrap();

        let report = t
            .apply
            .apply(&ApplyOptions::default())
            .await
            .unwrap()
            .into_option()
            .unwrap();

        assert_eq!(report.conflicts(), 1);
        assert_eq!(report.succeeded(), 1);
        assert_eq!(t.param.value("/app/changed").await.as_deref(), Some("theirs"));
        assert!(t
            .agent
            .get_entry(Service::Param, "/app/changed")
            .await
            .unwrap()
            .is_some());
        assert!(t
            .agent
            .get_entry(Service::Param, "/app/fresh")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn ignore_conflicts_applies_anyway() {
        let t = create_test_context();
        t.param
            .set_item("/app/changed", "theirs", Some(Utc::now()))
            .await;
        t.agent
            .stage_entry(
                Service::Param,
                "/app/changed",
                Entry::update("mine", None)
                    .with_base_modified_at(Some(Utc::now() - Duration::days(1))),
            )
            .await
            .unwrap();

        let options = ApplyOptions {
            ignore_conflicts: true,
            ..ApplyOptions::default()
        };
        let report = t.apply.apply(&options).await.unwrap().into_option().unwrap();
        assert_eq!(report.succeeded(), 1);
        assert_eq!(t.param.value("/app/changed").await.as_deref(), Some("mine"));
    }

    #[tokio::test]
    async fn remote_failure_is_per_entry() {
        let t = create_test_context();
        t.param.fail_on("/app/broken").await;
        t.agent
            .stage_entry(Service::Param, "/app/broken", Entry::create("v", None))
            .await
            .unwrap();
        t.agent
            .stage_entry(Service::Param, "/app/ok", Entry::create("v", None))
            .await
            .unwrap();

        let report = t
            .apply
            .apply(&ApplyOptions::default())
            .await
            .unwrap()
            .into_option()
            .unwrap();
        assert_eq!(report.failed(), 1);
        assert_eq!(report.succeeded(), 1);
        assert_eq!(t.agent.snapshot().await.total_count(), 1);
    }

    #[tokio::test]
    async fn apply_tags_after_entries_and_filter_by_name() {
        let t = create_test_context();
        t.param.set_item("/app/a", "a", None).await;
        t.param.set_item("/app/b", "b", None).await;
        let mut tag = TagEntry::default();
        tag.add_tags([("env", "prod")]);
        t.agent
            .stage_tag(Service::Param, "/app/a", tag.clone())
            .await
            .unwrap();
        t.agent
            .stage_tag(Service::Param, "/app/b", tag)
            .await
            .unwrap();

        let options = ApplyOptions {
            service: Some(Service::Param),
            name: Some("/app/a".to_string()),
            ..ApplyOptions::default()
        };
        let report = t.apply.apply(&options).await.unwrap().into_option().unwrap();
        assert_eq!(report.tags.len(), 1);
        assert_eq!(report.tags[0].outcome, TagOutcome::Applied);
        assert_eq!(
            t.param.tags("/app/a").await.get("env").map(String::as_str),
            Some("prod")
        );
        assert!(t.agent.get_tag(Service::Param, "/app/b").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn missing_strategy_fails_before_anything_is_applied() {
        let t = create_test_context().with_strategies_for(&[Service::Param]);
        t.agent
            .stage_entry(Service::Param, "/app/p", Entry::create("v", None))
            .await
            .unwrap();
        t.agent
            .stage_entry(Service::Secret, "s", Entry::create("v", None))
            .await
            .unwrap();

        let result = t.apply.apply(&ApplyOptions::default()).await;
        assert!(matches!(result, Err(CoreError::UnknownService(_))));
        assert!(t.param.calls().await.is_empty());
        assert!(t.param.value("/app/p").await.is_none());
        assert_eq!(t.agent.snapshot().await.total_count(), 2);
    }

    #[tokio::test]
    async fn tags_of_unapplied_entry_are_withheld() {
        let t = create_test_context();
        t.param.set_item("/app/taken", "theirs", None).await;
        let mut tag = TagEntry::default();
        tag.add_tags([("team", "core")]);
        t.agent
            .stage_entry(Service::Param, "/app/taken", Entry::create("mine", None))
            .await
            .unwrap();
        t.agent
            .stage_tag(Service::Param, "/app/taken", tag.clone())
            .await
            .unwrap();
        t.agent
            .stage_entry(Service::Param, "/app/free", Entry::create("v", None))
            .await
            .unwrap();
        t.agent
            .stage_tag(Service::Param, "/app/free", tag)
            .await
            .unwrap();

        let report = t
            .apply
            .apply(&ApplyOptions::default())
            .await
            .unwrap()
            .into_option()
            .unwrap();

        assert_eq!(report.conflicts(), 1);
        assert_eq!(report.withheld(), 1);
        assert!(report.has_problems());
        let taken = report.tags.iter().find(|r| r.name == "/app/taken").unwrap();
        assert!(matches!(taken.outcome, TagOutcome::Withheld(_)));

        let calls = t.param.calls().await;
        assert!(!calls.contains(&"tag /app/taken".to_string()));
        assert!(calls.contains(&"tag /app/free".to_string()));
        assert!(t.param.tags("/app/taken").await.is_empty());
        assert!(t.agent.get_tag(Service::Param, "/app/taken").await.unwrap().is_some());
        assert!(t.agent.get_tag(Service::Param, "/app/free").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unstage_failure_is_reported_per_item() {
        let t = create_test_context().with_sticky_agent();
        t.param.set_item("/app/a", "a", None).await;
        let mut tag = TagEntry::default();
        tag.add_tags([("env", "dev")]);
        t.agent
            .stage_entry(Service::Param, "/app/new", Entry::create("n", None))
            .await
            .unwrap();
        t.agent
            .stage_tag(Service::Param, "/app/a", tag)
            .await
            .unwrap();
        t.agent
            .stage_entry(Service::Secret, "s", Entry::create("v", None))
            .await
            .unwrap();

        let report = t
            .apply
            .apply(&ApplyOptions::default())
            .await
            .unwrap()
            .into_option()
            .unwrap();

        assert_eq!(report.succeeded(), 3);
        assert_eq!(report.still_staged(), 3);
        assert!(report.has_problems());
        assert!(report.entries.iter().all(|r| r.unstage_error.is_some()));
        assert_eq!(t.param.value("/app/new").await.as_deref(), Some("n"));
        assert_eq!(t.secret.value("s").await.as_deref(), Some("v"));
        assert_eq!(t.agent.snapshot().await.total_count(), 3);
    }
}
