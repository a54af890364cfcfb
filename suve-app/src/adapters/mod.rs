//! Filesystem storage adapters

mod composite_file_store;
mod file_store;

pub use composite_file_store::CompositeFileStore;
pub use file_store::FileStateStore;
