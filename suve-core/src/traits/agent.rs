//! Agent process control abstract Traits
//!
//! The transport that reaches the background agent (socket, pipe, in-process)
//! lives behind these traits. Dropping the returned future cancels the call.

use async_trait::async_trait;

use crate::error::CoreResult;

/// Ensures the agent is running
#[async_trait]
pub trait Starter: Send + Sync {
    /// Start the agent if it is not running yet (idempotent)
    async fn start(&self) -> CoreResult<()>;
}

/// Probes the agent without starting it
#[async_trait]
pub trait Pinger: Send + Sync {
    /// Succeeds only when an agent is already running
    async fn ping(&self) -> CoreResult<()>;
}
