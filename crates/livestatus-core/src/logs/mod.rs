//! Monitoring history: log line parsing and the file cache.

pub mod cache;
pub mod entry;

pub use cache::{LogCache, Logfile};
pub use entry::{LogClass, LogEntry, LogEntryKind};
