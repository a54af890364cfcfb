//! Remote item snapshots returned by service strategies

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current remote state of one item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteItem {
    /// Current value
    pub value: String,
    /// Last modification time reported by the service
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "crate::utils::datetime::option"
    )]
    pub last_modified: Option<DateTime<Utc>>,
    /// Current tags
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

impl RemoteItem {
    /// Snapshot with a value and modification time
    #[must_use]
    pub fn new(value: impl Into<String>, last_modified: Option<DateTime<Utc>>) -> Self {
        Self {
            value: value.into(),
            last_modified,
            tags: BTreeMap::new(),
        }
    }
}
