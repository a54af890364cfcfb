//! Stash transfer types

use serde::Serialize;

use crate::error::NonFatalError;
use crate::types::Service;

/// How a non-empty destination is reconciled with the incoming state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferMode {
    /// Per-name union, incoming items win on collision
    Merge,
    /// Destination scope replaced by the incoming state
    Overwrite,
}

/// Which way staged state moves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferDirection {
    /// push / persist
    AgentToFile,
    /// pop / drain
    FileToAgent,
}

impl std::fmt::Display for TransferDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AgentToFile => f.write_str("agent -> file"),
            Self::FileToAgent => f.write_str("file -> agent"),
        }
    }
}

/// Options of a single transfer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferOptions {
    /// Limit to one service (`None` = all)
    pub service: Option<Service>,
    /// Explicit mode; `None` asks (interactive) or merges (non-interactive)
    pub mode: Option<TransferMode>,
    /// Keep the source after a successful transfer
    pub keep: bool,
}

impl TransferOptions {
    /// Options scoped to one service
    #[must_use]
    pub fn for_service(service: Service) -> Self {
        Self {
            service: Some(service),
            ..Self::default()
        }
    }

    /// Same options with an explicit mode
    #[must_use]
    pub fn with_mode(mut self, mode: TransferMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Same options keeping the source
    #[must_use]
    pub fn keeping_source(mut self) -> Self {
        self.keep = true;
        self
    }
}

/// Result of a successful transfer
#[derive(Debug, Serialize)]
pub struct TransferOutput {
    /// Direction of the transfer
    pub direction: TransferDirection,
    /// Mode actually used (`None` when the destination was empty)
    pub mode: Option<TransferMode>,
    /// Number of entries moved
    pub entry_count: usize,
    /// Number of tag changes moved
    pub tag_count: usize,
    /// Cleanup failure after the destination was written
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<NonFatalError>,
}

impl TransferOutput {
    /// Total number of items moved
    #[must_use]
    pub fn total(&self) -> usize {
        self.entry_count + self.tag_count
    }
}
