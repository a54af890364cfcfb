//! Command lifecycle classification
//!
//! Every staging command belongs to exactly one category, and each category is
//! its own marker type consumed only by its own executor:
//!
//! - `WriteCommand` -> `execute_write`: starts the agent first
//! - `ReadCommand` -> `execute_read`: only probes the agent
//! - `FileCommand` -> `execute_file`: never touches the agent
//!
//! Marker values can only be obtained through the named constants, so the set
//! of commands is closed and a read command cannot reach `execute_write`.

use std::fmt;
use std::future::Future;

use crate::error::CoreResult;
use crate::traits::{Pinger, Starter};

/// Command that mutates staged state and may auto-start the agent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteCommand(&'static str);

impl WriteCommand {
    pub const ADD: Self = Self("add");
    pub const EDIT: Self = Self("edit");
    pub const DELETE: Self = Self("delete");
    pub const TAG: Self = Self("tag");
    pub const UNTAG: Self = Self("untag");
    pub const RESET_WITH_VERSION: Self = Self("reset");
    pub const STASH_POP: Self = Self("stash pop");

    /// Command name
    #[must_use]
    pub const fn name(self) -> &'static str {
        self.0
    }
}

/// Command that reads staged state; an absent agent means nothing is staged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadCommand(&'static str);

impl ReadCommand {
    pub const STATUS: Self = Self("status");
    pub const DIFF: Self = Self("diff");
    pub const APPLY: Self = Self("apply");
    pub const RESET: Self = Self("reset");
    pub const STASH_PUSH: Self = Self("stash push");

    /// Command name
    #[must_use]
    pub const fn name(self) -> &'static str {
        self.0
    }
}

/// Command that works on stash files only
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileCommand(&'static str);

impl FileCommand {
    pub const STASH_SHOW: Self = Self("stash show");
    pub const STASH_DROP: Self = Self("stash drop");

    /// Command name
    #[must_use]
    pub const fn name(self) -> &'static str {
        self.0
    }
}

impl fmt::Display for WriteCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl fmt::Display for ReadCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl fmt::Display for FileCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Result of a read command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome<T> {
    /// No agent is running, so there is nothing staged
    NothingStaged,
    /// The action ran
    Done(T),
}

impl<T> ReadOutcome<T> {
    /// Whether the action ran
    #[must_use]
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done(_))
    }

    /// Result of the action, if it ran
    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Done(value) => Some(value),
            Self::NothingStaged => None,
        }
    }
}

/// Run a write command: start the agent, then run `action`
///
/// If the agent cannot be started, `action` never runs and the start error
/// is returned.
pub async fn execute_write<S, F, Fut, T>(starter: &S, cmd: WriteCommand, action: F) -> CoreResult<T>
where
    S: Starter + ?Sized,
    F: FnOnce() -> Fut,
    Fut: Future<Output = CoreResult<T>>,
{
    log::debug!("{cmd}: ensuring agent is running");
    starter.start().await?;
    action().await
}

/// Run a read command: probe the agent, run `action` only if it answers
///
/// A failed probe is a normal outcome (`NothingStaged`), not an error.
pub async fn execute_read<P, F, Fut, T>(
    pinger: &P,
    cmd: ReadCommand,
    action: F,
) -> CoreResult<ReadOutcome<T>>
where
    P: Pinger + ?Sized,
    F: FnOnce() -> Fut,
    Fut: Future<Output = CoreResult<T>>,
{
    if let Err(e) = pinger.ping().await {
        log::debug!("{cmd}: agent not reachable ({e}), nothing staged");
        return Ok(ReadOutcome::NothingStaged);
    }
    action().await.map(ReadOutcome::Done)
}

/// Run a file command: no agent interaction at all
pub async fn execute_file<F, Fut, T>(cmd: FileCommand, action: F) -> CoreResult<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = CoreResult<T>>,
{
    log::debug!("{cmd}: running without agent");
    action().await
}
