//! Process-lifetime storage
//!
//! Nothing here is persisted; state lives for as long as the process does.

pub mod dedup;

pub use dedup::DeduplicationStore;
