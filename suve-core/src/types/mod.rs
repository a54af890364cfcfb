//! 类型定义模块

mod apply;
mod remote;
mod service;
mod state;
mod transfer;

pub use apply::{
    ApplyOptions, ApplyReport, DiffEntry, EntryOutcome, EntryResult, StagedEntry, StagedTag,
    StatusReport, TagOutcome, TagResult,
};
pub use remote::RemoteItem;
pub use service::Service;
pub use state::{
    DeleteOptions, Entry, Operation, ServiceMap, State, TagEntry, DEFAULT_RECOVERY_WINDOW,
    MAX_RECOVERY_WINDOW, MIN_RECOVERY_WINDOW, STATE_VERSION,
};
pub use transfer::{TransferDirection, TransferMode, TransferOptions, TransferOutput};
