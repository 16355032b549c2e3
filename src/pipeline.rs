// src/pipeline.rs
//! Run drivers for the three digest variants. Control flow is strictly
//! linear per run: query → fetch → enrich → score → select → publish.
//!
//! Required secrets are resolved up front, so a missing env var fails the
//! run before any network call. After that, only a total failure of the
//! initial search aborts; every later stage degrades per its own policy.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;

use crate::config;
use crate::enrich::AltmetricClient;
use crate::feed::{
    build_news_message, filter_new_items, load_seen_items, save_seen_items, FeedFetcher,
    HOURS_BACK, MAX_ITEMS_PER_POST, NEWS_FEEDS, SEEN_ITEMS_FILE,
};
use crate::paper::Paper;
use crate::publish::slack::{build_digest_message, build_frontier_message};
use crate::publish::{log_deduplicated, NotionLog, PaperLog, SlackPoster};
use crate::query::{build_query, query_summary, validate_query};
use crate::score::provider::{GeminiProvider, LlmProvider};
use crate::score::{ScoringEngine, Usage};
use crate::select::{
    DailyPolicy, FrontierPolicy, RankPolicy, Selection, DAILY_DEDUP_LOOKBACK_DAYS,
    FRONTIER_DEDUP_LOOKBACK_DAYS,
};
use crate::source::pubmed::{PubMedClient, DEFAULT_DAYS_BACK, DEFAULT_MAX_RESULTS};
use crate::source::rxiv::{RxivClient, DEFAULT_MAX_PREPRINTS, ITP_DAYS_BACK};
use crate::summarize::Summarizer;

pub const FRONTIER_DAYS_BACK: i64 = 14;
pub const FRONTIER_MAX_PUBMED_RESULTS: usize = 300;

/// Terminal state of a successful run. "Nothing to publish" is success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Published { count: usize },
    Nothing,
}

/// Standard daily digest: PubMed only, plain combined score, top 5.
pub async fn run_daily() -> Result<RunOutcome> {
    // Fatal configuration errors come first.
    let slack = SlackPoster::from_env()?;
    let llm: Arc<dyn LlmProvider> = Arc::new(GeminiProvider::from_env()?);
    let log = NotionLog::from_env()?;
    let cfg = config::load_default()?;

    let pubmed = PubMedClient::from_env();
    let topics = cfg.active_topics();
    let exclusions = cfg.exclusion_terms();
    tracing::info!(summary = %query_summary(&topics, &exclusions), "configuration loaded");

    let query = build_query(&topics, &exclusions, true);
    for warning in validate_query(&query).warnings {
        tracing::warn!(%warning, "query validation");
    }

    tracing::info!(days = DEFAULT_DAYS_BACK, "searching pubmed");
    let pmids = pubmed
        .search(&query, DEFAULT_DAYS_BACK, DEFAULT_MAX_RESULTS)
        .await
        .context("pubmed search")?;
    tracing::info!(found = pmids.len(), "pubmed search done");

    if pmids.is_empty() {
        slack.post_no_papers(DEFAULT_DAYS_BACK, "daily").await?;
        return Ok(RunOutcome::Nothing);
    }

    let mut papers = pubmed
        .fetch_details(&pmids)
        .await
        .context("pubmed fetch details")?;

    AltmetricClient::new().enrich(&mut papers).await;

    let mut usage = Usage::default();
    let engine = ScoringEngine::new(llm);
    let papers = engine
        .score_papers(papers, &cfg.whitelist(), &cfg.blacklist(), &mut usage)
        .await;

    let posted = log.posted_ids_since(DAILY_DEDUP_LOOKBACK_DAYS).await;
    let policy = DailyPolicy::default();
    let Selection::Ranked(top) = policy.select(papers, &posted) else {
        slack.post_no_papers(DEFAULT_DAYS_BACK, policy.name()).await?;
        return Ok(RunOutcome::Nothing);
    };

    let message = build_digest_message(&top, DEFAULT_DAYS_BACK);
    publish_papers(&slack, &log, &top, message, &usage, policy.name()).await
}

/// Weekly frontier digest: PubMed + preprints, frontier weighting,
/// always-include overrides, per-paper appraisals.
pub async fn run_frontier() -> Result<RunOutcome> {
    let slack = SlackPoster::from_env()?;
    let llm: Arc<dyn LlmProvider> = Arc::new(GeminiProvider::from_env()?);
    let log = NotionLog::from_env()?;
    let cfg = config::load_default()?;

    let pubmed = PubMedClient::from_env();
    let rxiv = RxivClient::new();
    let topics = cfg.active_topics();
    let exclusions = cfg.exclusion_terms();

    let query = build_query(&topics, &exclusions, true);
    for warning in validate_query(&query).warnings {
        tracing::warn!(%warning, "query validation");
    }

    tracing::info!(days = FRONTIER_DAYS_BACK, "searching pubmed");
    let pmids = pubmed
        .search(&query, FRONTIER_DAYS_BACK, FRONTIER_MAX_PUBMED_RESULTS)
        .await
        .context("pubmed search")?;
    let pubmed_papers = if pmids.is_empty() {
        Vec::new()
    } else {
        pubmed
            .fetch_details(&pmids)
            .await
            .context("pubmed fetch details")?
    };
    tracing::info!(count = pubmed_papers.len(), "pubmed papers fetched");

    let preprints = rxiv
        .search_longevity_preprints(FRONTIER_DAYS_BACK, DEFAULT_MAX_PREPRINTS)
        .await;
    tracing::info!(count = preprints.len(), "preprints fetched");

    let itp = rxiv.itp_preprints(ITP_DAYS_BACK).await;
    tracing::info!(count = itp.len(), "itp preprints fetched");

    // Precedence order for first-seen dedup: PubMed, preprints, ITP.
    let mut papers: Vec<_> = pubmed_papers;
    papers.extend(preprints);
    papers.extend(itp);

    if papers.is_empty() {
        slack.post_no_papers(FRONTIER_DAYS_BACK, "frontier").await?;
        return Ok(RunOutcome::Nothing);
    }

    AltmetricClient::new().enrich(&mut papers).await;

    let mut usage = Usage::default();
    let engine = ScoringEngine::new(llm.clone()).with_frontier();
    let papers = engine
        .score_papers(papers, &cfg.whitelist(), &cfg.blacklist(), &mut usage)
        .await;

    let posted = log.posted_ids_since(FRONTIER_DEDUP_LOOKBACK_DAYS).await;
    let policy = FrontierPolicy::default();
    let selection = policy.select(papers, &posted);

    let Selection::Ranked(mut top) = selection else {
        slack.post_no_papers(FRONTIER_DAYS_BACK, "frontier").await?;
        return Ok(RunOutcome::Nothing);
    };

    let summarizer = Summarizer::new(llm);
    summarizer.appraise_all(&mut top, &mut usage).await;
    let overview = summarizer.digest_overview(&top, &mut usage).await;

    let message = build_frontier_message(&top, overview.as_deref(), &usage);
    publish_papers(&slack, &log, &top, message, &usage, policy.name()).await
}

/// Shared tail of the paper digests: deliver the prebuilt message, append to
/// the log, surface failures without rolling anything back. Callers handle
/// the empty-selection case before building their message.
async fn publish_papers(
    slack: &SlackPoster,
    log: &dyn PaperLog,
    top: &[Paper],
    message: serde_json::Value,
    usage: &Usage,
    digest_name: &str,
) -> Result<RunOutcome> {
    tracing::info!(count = top.len(), digest = digest_name, "publishing digest");
    let slack_result = slack.post_payload(&message).await;
    if let Err(e) = &slack_result {
        tracing::error!(error = ?e, "slack digest post failed");
    }

    // Log regardless of the Slack outcome; append is idempotent by pmid.
    let stats = log_deduplicated(log, top).await;
    tracing::info!(
        added = stats.added,
        skipped = stats.skipped,
        failed = stats.failed,
        "paper log updated"
    );

    tracing::info!(
        api_calls = usage.api_calls,
        tokens = usage.total_tokens(),
        errors = usage.errors,
        "api usage"
    );

    slack_result.context("slack digest post")?;
    Ok(RunOutcome::Published { count: top.len() })
}

/// News aggregation digest: RSS/Atom feeds, local seen-state dedup.
pub async fn run_news() -> Result<RunOutcome> {
    let slack = SlackPoster::from_env()?;
    let seen_path = PathBuf::from(SEEN_ITEMS_FILE);
    let seen = load_seen_items(&seen_path);
    tracing::info!(seen = seen.len(), "seen items loaded");

    let items = FeedFetcher::new().fetch_all(NEWS_FEEDS).await;
    if items.is_empty() {
        tracing::info!("no feed items at all");
        return Ok(RunOutcome::Nothing);
    }

    let now = chrono::Utc::now().timestamp();
    let new_items = filter_new_items(items, &seen, now, HOURS_BACK);
    tracing::info!(new = new_items.len(), "new items after filtering");
    if new_items.is_empty() {
        return Ok(RunOutcome::Nothing);
    }

    let to_post: Vec<_> = new_items.into_iter().take(MAX_ITEMS_PER_POST).collect();
    let message = build_news_message(&to_post, now);
    slack.post_payload(&message).await.context("news post")?;

    // Only mark items seen once the post went through.
    let mut all_seen = seen;
    all_seen.extend(to_post.iter().map(|i| i.guid.clone()));
    if let Err(e) = save_seen_items(&seen_path, &all_seen) {
        tracing::warn!(error = ?e, "could not save seen items");
    }

    Ok(RunOutcome::Published {
        count: to_post.len(),
    })
}

// ---- Binary bootstrap helpers ----

/// `--quiet` suppresses progress output (warnings still show).
pub fn quiet_flag() -> bool {
    std::env::args().any(|a| a == "--quiet")
}

pub fn init_tracing(quiet: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let default = if quiet { "warn" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

/// Shared binary tail: report an unhandled failure to Slack (best-effort)
/// and translate the outcome to a process exit code.
pub async fn finish(result: Result<RunOutcome>, context: &str) -> std::process::ExitCode {
    match result {
        Ok(RunOutcome::Published { count }) => {
            tracing::info!(count, "digest completed");
            std::process::ExitCode::SUCCESS
        }
        Ok(RunOutcome::Nothing) => {
            tracing::info!("nothing to publish");
            std::process::ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = ?e, "digest run failed");
            if let Ok(slack) = SlackPoster::from_env() {
                let _ = slack.post_error(&format!("{e:#}"), Some(context)).await;
            }
            std::process::ExitCode::FAILURE
        }
    }
}
