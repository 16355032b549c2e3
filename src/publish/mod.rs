// src/publish/mod.rs
//! Outbound boundaries: the Slack webhook and the persistent paper log.
//!
//! Everything here is best-effort: a failed post or log append is reported
//! and counted, never rolled back or allowed to abort the rest of a run.

pub mod log;
pub mod slack;

pub use log::{log_deduplicated, InMemoryLog, LogStats, NotionLog, PaperLog};
pub use slack::SlackPoster;
