//! Apply / status / diff related types

use serde::Serialize;

use crate::types::{Entry, Operation, Service, TagEntry};

/// Options of an apply run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyOptions {
    /// Limit to one service (`None` = all)
    pub service: Option<Service>,
    /// Limit to one item name
    pub name: Option<String>,
    /// Apply entries even when the remote changed since staging
    pub ignore_conflicts: bool,
}

/// Outcome of applying one staged entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum EntryOutcome {
    /// Item created remotely
    Created,
    /// Item updated remotely
    Updated,
    /// Item deleted remotely
    Deleted,
    /// Remote changed since staging; entry withheld and left staged
    Conflict(String),
    /// Remote call failed; entry left staged
    Failed(String),
}

impl EntryOutcome {
    /// Whether the entry reached the remote service
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Created | Self::Updated | Self::Deleted)
    }
}

/// Per-entry apply result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryResult {
    /// Target service
    pub service: Service,
    /// Item name
    pub name: String,
    /// Staged intent
    pub operation: Operation,
    /// What happened
    pub outcome: EntryOutcome,
    /// Set when the entry reached the remote but could not be unstaged
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unstage_error: Option<String>,
}

/// Outcome of applying one staged tag change
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum TagOutcome {
    /// Tags applied remotely
    Applied,
    /// Remote call failed; tag change left staged
    Failed(String),
    /// Not attempted because the entry of the same name did not apply
    Withheld(String),
}

/// Per-name tag apply result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagResult {
    /// Target service
    pub service: Service,
    /// Item name
    pub name: String,
    /// What happened
    pub outcome: TagOutcome,
    /// Set when the tags reached the remote but could not be unstaged
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unstage_error: Option<String>,
}

/// Aggregate apply report
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    /// Entry results in apply order
    pub entries: Vec<EntryResult>,
    /// Tag results in apply order
    pub tags: Vec<TagResult>,
}

impl ApplyReport {
    /// Whether nothing was attempted
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.tags.is_empty()
    }

    /// Entries and tag changes that reached the remote service
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.entries.iter().filter(|r| r.outcome.is_success()).count()
            + self
                .tags
                .iter()
                .filter(|r| r.outcome == TagOutcome::Applied)
                .count()
    }

    /// Entries withheld because of a conflict
    #[must_use]
    pub fn conflicts(&self) -> usize {
        self.entries
            .iter()
            .filter(|r| matches!(r.outcome, EntryOutcome::Conflict(_)))
            .count()
    }

    /// Entries and tag changes whose remote call failed
    #[must_use]
    pub fn failed(&self) -> usize {
        self.entries
            .iter()
            .filter(|r| matches!(r.outcome, EntryOutcome::Failed(_)))
            .count()
            + self
                .tags
                .iter()
                .filter(|r| matches!(r.outcome, TagOutcome::Failed(_)))
                .count()
    }

    /// Tag changes skipped because their entry did not apply
    #[must_use]
    pub fn withheld(&self) -> usize {
        self.tags
            .iter()
            .filter(|r| matches!(r.outcome, TagOutcome::Withheld(_)))
            .count()
    }

    /// Applied items that are still staged
    #[must_use]
    pub fn still_staged(&self) -> usize {
        self.entries
            .iter()
            .filter(|r| r.unstage_error.is_some())
            .count()
            + self
                .tags
                .iter()
                .filter(|r| r.unstage_error.is_some())
                .count()
    }

    /// Whether any item needs attention
    #[must_use]
    pub fn has_problems(&self) -> bool {
        self.conflicts() > 0 || self.failed() > 0 || self.withheld() > 0 || self.still_staged() > 0
    }
}

/// One line of `status` output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StagedEntry {
    /// Target service
    pub service: Service,
    /// Item name
    pub name: String,
    /// Staged entry
    pub entry: Entry,
}

/// One staged tag change in `status` output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StagedTag {
    /// Target service
    pub service: Service,
    /// Item name
    pub name: String,
    /// Staged change
    pub tag: TagEntry,
}

/// Snapshot of the staging area
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    /// Entries ordered by staging time
    pub entries: Vec<StagedEntry>,
    /// Tag changes ordered by service then name
    pub tags: Vec<StagedTag>,
}

impl StatusReport {
    /// Whether nothing is staged
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.tags.is_empty()
    }
}

/// Staged value next to the current remote value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffEntry {
    /// Target service
    pub service: Service,
    /// Item name
    pub name: String,
    /// Staged intent
    pub operation: Operation,
    /// Current remote value (`None` when the item does not exist)
    pub remote: Option<String>,
    /// Staged value (`None` for deletes)
    pub staged: Option<String>,
}
