//! Staged state model
//!
//! A `State` holds at most one staged `Entry` and one staged `TagEntry` per
//! (service, name). It is a transient value; the agent and the stash files are
//! the systems of record.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::types::Service;

/// Current state / document format version
pub const STATE_VERSION: u32 = 3;

/// Secret recovery window bounds (days)
pub const MIN_RECOVERY_WINDOW: u32 = 7;
/// Secret recovery window bounds (days)
pub const MAX_RECOVERY_WINDOW: u32 = 30;
/// Recovery window used when none is given
pub const DEFAULT_RECOVERY_WINDOW: u32 = 30;

/// Staged intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Item does not exist remotely yet
    Create,
    /// Item exists remotely and gets a new value
    Update,
    /// Item gets removed remotely
    Delete,
}

impl Operation {
    /// Lowercase label
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Secret deletion options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeleteOptions {
    /// Delete immediately without a recovery window
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub force: bool,
    /// Recovery window in days
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery_window: Option<u32>,
}

impl DeleteOptions {
    /// Immediate deletion
    #[must_use]
    pub const fn force() -> Self {
        Self {
            force: true,
            recovery_window: None,
        }
    }

    /// Deletion with an explicit recovery window
    pub fn with_recovery_window(days: u32) -> CoreResult<Self> {
        let options = Self {
            force: false,
            recovery_window: Some(days),
        };
        options.validate()?;
        Ok(options)
    }

    /// Check the recovery window bounds and force/window exclusivity
    pub fn validate(&self) -> CoreResult<()> {
        match (self.force, self.recovery_window) {
            (true, Some(_)) => Err(CoreError::ValidationError(
                "force and recovery window are mutually exclusive".to_string(),
            )),
            (false, Some(days)) if !(MIN_RECOVERY_WINDOW..=MAX_RECOVERY_WINDOW).contains(&days) => {
                Err(CoreError::ValidationError(format!(
                    "recovery window must be between {MIN_RECOVERY_WINDOW} and {MAX_RECOVERY_WINDOW} days, got {days}"
                )))
            }
            _ => Ok(()),
        }
    }

    /// Window that will be sent to the remote service (`None` when forced)
    #[must_use]
    pub fn effective_recovery_window(&self) -> Option<u32> {
        if self.force {
            None
        } else {
            Some(self.recovery_window.unwrap_or(DEFAULT_RECOVERY_WINDOW))
        }
    }
}

/// One staged mutation for a single (service, name)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Staged intent
    pub operation: Operation,
    /// New value (create / update only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Description metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Secret deletion options (delete only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_options: Option<DeleteOptions>,
    /// When the entry was staged
    #[serde(with = "crate::utils::datetime")]
    pub staged_at: DateTime<Utc>,
    /// Remote last-modified time observed while staging
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "crate::utils::datetime::option"
    )]
    pub base_modified_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn new(operation: Operation, value: Option<String>, description: Option<String>) -> Self {
        Self {
            operation,
            value,
            description,
            delete_options: None,
            staged_at: Utc::now(),
            base_modified_at: None,
        }
    }

    /// Stage creation of a new item
    #[must_use]
    pub fn create(value: impl Into<String>, description: Option<String>) -> Self {
        Self::new(Operation::Create, Some(value.into()), description)
    }

    /// Stage a new value for an existing item
    #[must_use]
    pub fn update(value: impl Into<String>, description: Option<String>) -> Self {
        Self::new(Operation::Update, Some(value.into()), description)
    }

    /// Stage deletion of an existing item
    #[must_use]
    pub fn delete(options: Option<DeleteOptions>) -> Self {
        Self {
            delete_options: options,
            ..Self::new(Operation::Delete, None, None)
        }
    }

    /// Record the remote baseline used for conflict detection
    #[must_use]
    pub fn with_base_modified_at(mut self, at: Option<DateTime<Utc>>) -> Self {
        self.base_modified_at = at;
        self
    }

    /// Baseline the remote state is compared against at apply time
    #[must_use]
    pub fn baseline(&self) -> DateTime<Utc> {
        self.base_modified_at.unwrap_or(self.staged_at)
    }
}

/// One staged tag-only change for a (service, name)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TagEntry {
    /// Tags to set (key -> value)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub add: BTreeMap<String, String>,
    /// Tag keys to remove
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub remove: BTreeSet<String>,
}

impl TagEntry {
    /// Whether the change is a no-op
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }

    /// Stage tags to set; a key pending removal is no longer removed
    pub fn add_tags<I, K, V>(&mut self, tags: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in tags {
            let key = key.into();
            self.remove.remove(&key);
            self.add.insert(key, value.into());
        }
    }

    /// Stage tag keys to remove; a key pending addition is no longer added
    pub fn remove_keys<I, K>(&mut self, keys: I)
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        for key in keys {
            let key = key.into();
            self.add.remove(&key);
            self.remove.insert(key);
        }
    }
}

/// Per-service map of name -> item
///
/// Only the two known services have a slot, so a `State` can never carry an
/// unknown service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ServiceMap<T> {
    /// Parameter store items
    #[serde(default)]
    pub param: BTreeMap<String, T>,
    /// Secret store items
    #[serde(default)]
    pub secret: BTreeMap<String, T>,
}

impl<T> Default for ServiceMap<T> {
    fn default() -> Self {
        Self {
            param: BTreeMap::new(),
            secret: BTreeMap::new(),
        }
    }
}

impl<T> ServiceMap<T> {
    /// Items of one service
    #[must_use]
    pub fn get(&self, service: Service) -> &BTreeMap<String, T> {
        match service {
            Service::Param => &self.param,
            Service::Secret => &self.secret,
        }
    }

    /// Mutable items of one service
    pub fn get_mut(&mut self, service: Service) -> &mut BTreeMap<String, T> {
        match service {
            Service::Param => &mut self.param,
            Service::Secret => &mut self.secret,
        }
    }

    /// Iterate `(service, items)` in stable order
    pub fn iter(&self) -> impl Iterator<Item = (Service, &BTreeMap<String, T>)> {
        Service::ALL.into_iter().map(move |svc| (svc, self.get(svc)))
    }

    /// Total item count across services
    #[must_use]
    pub fn len(&self) -> usize {
        self.param.len() + self.secret.len()
    }

    /// Whether every service map is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.param.is_empty() && self.secret.is_empty()
    }
}

/// Root aggregate of staged changes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    /// Format version
    pub version: u32,
    /// Staged entries per service
    #[serde(default)]
    pub entries: ServiceMap<Entry>,
    /// Staged tag changes per service
    #[serde(default)]
    pub tags: ServiceMap<TagEntry>,
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}

impl State {
    /// Empty state at the current version
    #[must_use]
    pub fn new() -> Self {
        Self {
            version: STATE_VERSION,
            entries: ServiceMap::default(),
            tags: ServiceMap::default(),
        }
    }

    /// Whether nothing is staged for any service
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.tags.is_empty()
    }

    /// Whether nothing is staged for the given scope
    #[must_use]
    pub fn is_empty_in(&self, service: Option<Service>) -> bool {
        Service::scope(service)
            .iter()
            .all(|svc| self.entries.get(*svc).is_empty() && self.tags.get(*svc).is_empty())
    }

    /// Number of staged entries plus tag changes across services
    #[must_use]
    pub fn total_count(&self) -> usize {
        self.entries.len() + self.tags.len()
    }

    /// Number of staged entries plus tag changes of one service
    #[must_use]
    pub fn service_count(&self, service: Service) -> usize {
        self.entries.get(service).len() + self.tags.get(service).len()
    }

    /// Copy of this state holding only one service's data
    #[must_use]
    pub fn extract_service(&self, service: Service) -> State {
        let mut extracted = State {
            version: self.version,
            ..State::new()
        };
        extracted
            .entries
            .get_mut(service)
            .clone_from(self.entries.get(service));
        extracted
            .tags
            .get_mut(service)
            .clone_from(self.tags.get(service));
        extracted
    }

    /// Copy of this state limited to a scope (`None` keeps everything)
    #[must_use]
    pub fn scoped(&self, service: Option<Service>) -> State {
        match service {
            Some(svc) => self.extract_service(svc),
            None => self.clone(),
        }
    }

    /// Drop all entries and tags of one service in place
    pub fn remove_service(&mut self, service: Service) {
        self.entries.get_mut(service).clear();
        self.tags.get_mut(service).clear();
    }

    /// Drop everything covered by a scope in place
    pub fn remove_scope(&mut self, service: Option<Service>) {
        for svc in Service::scope(service) {
            self.remove_service(*svc);
        }
    }

    /// Per-name union; items of `other` replace same-named items of `self`
    pub fn merge(&mut self, other: State) {
        let State { entries, tags, .. } = other;
        self.entries.param.extend(entries.param);
        self.entries.secret.extend(entries.secret);

        for (svc, items) in [(Service::Param, tags.param), (Service::Secret, tags.secret)] {
            for (name, tag) in items {
                self.set_tag(svc, name, tag);
            }
        }
    }

    /// Staged entry of a name
    #[must_use]
    pub fn entry(&self, service: Service, name: &str) -> Option<&Entry> {
        self.entries.get(service).get(name)
    }

    /// Stage (or replace) an entry
    pub fn set_entry(&mut self, service: Service, name: impl Into<String>, entry: Entry) {
        self.entries.get_mut(service).insert(name.into(), entry);
    }

    /// Unstage an entry
    pub fn remove_entry(&mut self, service: Service, name: &str) -> Option<Entry> {
        self.entries.get_mut(service).remove(name)
    }

    /// Staged tag change of a name
    #[must_use]
    pub fn tag(&self, service: Service, name: &str) -> Option<&TagEntry> {
        self.tags.get(service).get(name)
    }

    /// Stage (or replace) a tag change; an empty change unstages the name
    pub fn set_tag(&mut self, service: Service, name: impl Into<String>, tag: TagEntry) {
        let name = name.into();
        if tag.is_empty() {
            self.tags.get_mut(service).remove(&name);
        } else {
            self.tags.get_mut(service).insert(name, tag);
        }
    }

    /// Unstage a tag change
    pub fn remove_tag(&mut self, service: Service, name: &str) -> Option<TagEntry> {
        self.tags.get_mut(service).remove(name)
    }
}
