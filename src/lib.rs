// src/lib.rs
// Public library surface for the digest binaries and integration tests.

pub mod config;
pub mod enrich;
pub mod feed;
pub mod paper;
pub mod pipeline;
pub mod publish;
pub mod query;
pub mod score;
pub mod select;
pub mod source;
pub mod summarize;

// ---- Re-exports for stable public API ----
pub use crate::paper::{Appraisal, Attention, Paper, Source};
pub use crate::pipeline::RunOutcome;
pub use crate::publish::{InMemoryLog, NotionLog, PaperLog, SlackPoster};
pub use crate::score::provider::{GeminiProvider, LlmProvider, MockLlm};
pub use crate::score::ScoringEngine;
pub use crate::select::{DailyPolicy, FrontierPolicy, RankPolicy, Selection};
