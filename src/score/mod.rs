// src/score/mod.rs
//! AI triage scoring: batch papers into one prompt per batch, parse the
//! structured scores back by index, then apply the deterministic
//! post-processing (blacklist filter, whitelist boost).
//!
//! Batch failures are non-fatal and independent: a failed request or an
//! unparseable response leaves that batch at the sentinel and the run
//! continues with the next batch.

pub mod provider;

use serde::Deserialize;
use std::sync::Arc;

use crate::paper::Paper;
use provider::{generate_with_retry, LlmProvider};

pub const TRIAGE_BATCH_SIZE: usize = 10;
pub const TRIAGE_ABSTRACT_MAX_CHARS: usize = 1500;
pub const WHITELIST_RELEVANCE_BOOST: i32 = 2;
pub const MAX_RELEVANCE_SCORE: i32 = 10;

/// Per-run API usage accumulator, returned alongside results. Reset simply
/// by constructing a fresh value at run start; there is no process-wide
/// counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub api_calls: u64,
    pub triage_calls: u64,
    pub summary_calls: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub errors: u64,
}

impl Usage {
    pub fn record_triage(&mut self, usage: provider::TokenUsage) {
        self.api_calls += 1;
        self.triage_calls += 1;
        self.input_tokens += usage.input_tokens;
        self.output_tokens += usage.output_tokens;
    }

    pub fn record_summary(&mut self, usage: provider::TokenUsage) {
        self.api_calls += 1;
        self.summary_calls += 1;
        self.input_tokens += usage.input_tokens;
        self.output_tokens += usage.output_tokens;
    }

    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

const BATCH_TRIAGE_PROMPT: &str = r#"You are an expert assistant for a longevity-focused research team.

Given a batch of research papers (title, abstract, altmetric score), score each paper on THREE dimensions:

1. **Relevance Score (0-10)**: How important is this paper for longevity, healthspan, or clinical decision-making?
   - 9-10: Directly addresses core longevity topics (cardiovascular, metabolism, exercise, sleep, neurodegeneration, cancer)
   - 7-8: Related to aging interventions, biomarkers, or healthspan optimization
   - 5-6: Tangentially relevant or narrow population
   - 0-4: Animal-only, mechanistic, rare diseases, or unrelated fields
   - Papers with no abstract should score 0-2

2. **Evidence Quality Score (0-10)**: How strong and credible is the evidence?
   - 9-10: Large human RCTs, high-quality meta-analyses, Mendelian randomization
   - 7-8: Well-designed observational studies, smaller RCTs, systematic reviews
   - 5-6: Cross-sectional studies, case-control, pilot trials
   - 0-4: Animal studies, in vitro, case reports, opinion pieces

3. **Actionability Score (0-10)**: How clinically actionable is this finding for a practicing physician TODAY?
   - 9-10: Immediate practice change warranted (new treatment, screening, risk factor)
   - 7-8: Reinforces or refines current clinical guidelines
   - 5-6: Useful for patient counseling or future consideration
   - 0-4: Basic science, requires more research, no clinical application yet

Return a JSON array with objects containing:
- "index": the paper's index from the input (0-based)
- "relevance": relevance score (integer 0-10)
- "evidence": evidence quality score (integer 0-10)
- "actionability": actionability score (integer 0-10)
"#;

const FRONTIER_DIMENSION_PROMPT: &str = r#"
4. **Frontier Score (0-10)**: How paradigm-shifting is this work for the future of longevity science?
   - 9-10: Novel mechanism or intervention with credible lifespan/healthspan signal
   - 7-8: Early but rigorous data on an emerging approach
   - 5-6: Incremental progress on a known frontier topic
   - 0-4: Established territory, replication, or unrelated

Each returned object must also contain:
- "frontier": frontier score (integer 0-10)
"#;

/// Build one triage prompt for a batch. Index tags are 0-based positions
/// within this batch; abstracts are truncated to keep token usage bounded.
pub fn build_batch_prompt(batch: &[Paper], include_frontier: bool) -> String {
    let mut prompt = String::from(BATCH_TRIAGE_PROMPT);
    if include_frontier {
        prompt.push_str(FRONTIER_DIMENSION_PROMPT);
    }
    prompt.push_str("\nReturn ONLY the JSON array, no other text.\n\nPapers to score:\n");

    for (i, paper) in batch.iter().enumerate() {
        let truncated: String = paper
            .abstract_text
            .chars()
            .take(TRIAGE_ABSTRACT_MAX_CHARS)
            .collect();
        prompt.push_str(&format!(
            "\n---\nIndex: {i}\nTitle: {}\nAbstract: {truncated}...\nAltmetric Score: {}\n",
            paper.title,
            paper.attention.score()
        ));
    }
    prompt
}

fn sentinel() -> i32 {
    -1
}

#[derive(Debug, Deserialize)]
struct ScoreRow {
    index: i64,
    #[serde(default = "sentinel")]
    relevance: i32,
    #[serde(default = "sentinel")]
    evidence: i32,
    #[serde(default = "sentinel")]
    actionability: i32,
    frontier: Option<i32>,
}

/// Strip an optional fenced code block wrapper from an LLM reply.
pub fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

/// Case-insensitive substring test of any listed author against the display
/// string. Used for both the whitelist flag and the blacklist filter.
pub fn author_in_list(authors: &str, list: &[String]) -> bool {
    if authors.is_empty() || list.is_empty() {
        return false;
    }
    let authors_lower = authors.to_lowercase();
    list.iter()
        .any(|a| !a.is_empty() && authors_lower.contains(&a.to_lowercase()))
}

pub struct ScoringEngine {
    provider: Arc<dyn LlmProvider>,
    batch_size: usize,
    include_frontier: bool,
}

impl ScoringEngine {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            batch_size: TRIAGE_BATCH_SIZE,
            include_frontier: false,
        }
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Frontier variant adds the fourth dimension to prompt and schema.
    pub fn with_frontier(mut self) -> Self {
        self.include_frontier = true;
        self
    }

    /// Score papers in batches. Blacklisted papers are removed up front and
    /// never re-enter the pipeline; everything else gets sentinel scores
    /// replaced batch by batch, then the whitelist boost.
    pub async fn score_papers(
        &self,
        papers: Vec<Paper>,
        whitelist: &[String],
        blacklist: &[String],
        usage: &mut Usage,
    ) -> Vec<Paper> {
        let original = papers.len();
        let mut papers: Vec<Paper> = papers
            .into_iter()
            .filter(|p| !author_in_list(&p.authors, blacklist))
            .collect();
        let dropped = original - papers.len();
        if dropped > 0 {
            tracing::info!(dropped, "filtered papers from blacklisted authors");
        }

        for paper in papers.iter_mut() {
            paper.relevance = -1;
            paper.evidence = -1;
            paper.actionability = -1;
            paper.whitelisted = author_in_list(&paper.authors, whitelist);
        }

        let total_batches = papers.len().div_ceil(self.batch_size);
        for batch_idx in 0..total_batches {
            let start = batch_idx * self.batch_size;
            let end = (start + self.batch_size).min(papers.len());
            let batch = &mut papers[start..end];

            tracing::info!(batch = batch_idx + 1, total_batches, "triage batch");
            let prompt = build_batch_prompt(batch, self.include_frontier);

            match generate_with_retry(self.provider.as_ref(), &prompt).await {
                Ok(reply) => {
                    usage.record_triage(reply.usage);
                    if let Err(e) = apply_scores(batch, &reply.text) {
                        usage.errors += 1;
                        tracing::warn!(error = ?e, batch = batch_idx + 1, "triage parse failed");
                    }
                }
                Err(e) => {
                    usage.errors += 1;
                    tracing::warn!(error = ?e, batch = batch_idx + 1, "triage call failed");
                }
            }
        }

        // Whitelist boost, applied at most once per paper and capped.
        for paper in papers.iter_mut() {
            if paper.whitelisted && paper.relevance >= 0 {
                paper.relevance =
                    (paper.relevance + WHITELIST_RELEVANCE_BOOST).min(MAX_RELEVANCE_SCORE);
            }
        }

        papers
    }
}

/// Parse a triage reply and write scores onto the batch by index.
/// Rows with an out-of-range index are ignored.
fn apply_scores(batch: &mut [Paper], reply_text: &str) -> anyhow::Result<()> {
    let content = strip_code_fence(reply_text);
    let rows: Vec<ScoreRow> = serde_json::from_str(content)?;
    for row in rows {
        let Ok(idx) = usize::try_from(row.index) else {
            continue;
        };
        if idx >= batch.len() {
            continue;
        }
        batch[idx].relevance = row.relevance;
        batch[idx].evidence = row.evidence;
        batch[idx].actionability = row.actionability;
        batch[idx].frontier = row.frontier;
    }
    Ok(())
}
