//! Suve Core Library
//!
//! Platform-independent staging engine for remote parameter and secret
//! stores, including:
//! - Dual store: volatile staging agent and encrypted stash files
//! - Stash transfers (push / pop) with merge or overwrite
//! - Command lifecycle executors (write / read / file)
//! - Apply with conflict detection
//!
//! Storage, agent transport, prompting and remote access are abstracted
//! through traits and injected via `ServiceContext`.

pub mod crypto;
pub mod error;
pub mod services;
pub mod traits;
pub mod types;
pub mod utils;

#[cfg(test)]
mod test_utils;

// Re-export common types
pub use error::{CoreError, CoreResult, CryptoError, NonFatalError};
pub use services::ServiceContext;
pub use traits::{
    FileStore, Pinger, Prompter, ServiceStrategy, StagingStore, Starter, StateStore,
};
