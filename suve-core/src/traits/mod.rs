//! Storage layer and collaborator abstraction trait definition

mod agent;
mod in_memory_agent;
mod prompter;
mod store;
mod strategy;

pub use agent::{Pinger, Starter};
pub use in_memory_agent::InMemoryAgent;
pub use prompter::{Choice, NonInteractive, Prompter};
pub use store::{FileStore, StagingStore, StateStore};
pub use strategy::ServiceStrategy;
