// src/publish/log.rs
//! Persistent paper log (Notion database), behind a trait so the pipeline
//! and tests can run against an in-memory store.
//!
//! The log serves double duty: the "previously posted" lookback that feeds
//! selector dedup, and the idempotent append keyed by pmid that makes
//! re-running a failed job safe.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use crate::paper::Paper;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogStats {
    pub added: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[async_trait]
pub trait PaperLog: Send + Sync {
    /// Pmids of papers logged within the last `days` days. Failures degrade
    /// to an empty set: on error we filter nothing rather than abort.
    async fn posted_ids_since(&self, days: i64) -> HashSet<String>;

    /// True if a paper with this pmid is already logged.
    async fn contains(&self, pmid: &str) -> bool;

    /// Append one paper record.
    async fn append(&self, paper: &Paper) -> Result<()>;
}

/// Idempotent append: skip papers already present, count per-paper failures
/// without aborting the batch.
pub async fn log_deduplicated(log: &dyn PaperLog, papers: &[Paper]) -> LogStats {
    let mut stats = LogStats::default();
    for paper in papers {
        let Some(pmid) = paper.pmid.as_deref().filter(|p| !p.is_empty()) else {
            stats.skipped += 1;
            continue;
        };
        if log.contains(pmid).await {
            stats.skipped += 1;
            continue;
        }
        match log.append(paper).await {
            Ok(()) => stats.added += 1,
            Err(e) => {
                stats.failed += 1;
                tracing::warn!(error = ?e, pmid, "paper log append failed");
            }
        }
    }
    stats
}

// ---- Notion implementation ----

const NOTION_API: &str = "https://api.notion.com/v1";
const NOTION_VERSION: &str = "2022-06-28";
const TEXT_LIMIT: usize = 2000;

pub struct NotionLog {
    http: reqwest::Client,
    api_key: String,
    database_id: String,
}

impl NotionLog {
    /// Both env vars are required when the log is in use; absence is a fatal
    /// configuration error at construction, before any network call.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("NOTION_API_KEY")
            .map_err(|_| anyhow!("NOTION_API_KEY environment variable not set"))?;
        let database_id = std::env::var("NOTION_DATABASE_ID")
            .map_err(|_| anyhow!("NOTION_DATABASE_ID environment variable not set"))?;
        Ok(Self::new(api_key, database_id))
    }

    pub fn new(api_key: String, database_id: String) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("longevity-lit-digest/0.1")
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("reqwest client");
        Self {
            http,
            api_key,
            database_id,
        }
    }

    fn clip(s: &str) -> String {
        s.chars().take(TEXT_LIMIT).collect()
    }

    fn rich_text(s: &str) -> serde_json::Value {
        json!({ "rich_text": [{ "text": { "content": Self::clip(s) } }] })
    }

    fn page_properties(&self, paper: &Paper) -> serde_json::Value {
        let combined = paper.combined_score();
        let mut props = json!({
            "Title": { "title": [{ "text": { "content": Self::clip(&paper.title) } }] },
            "Journal": Self::rich_text(&paper.journal),
            "Authors": Self::rich_text(&paper.authors),
            "PMID": Self::rich_text(paper.pmid.as_deref().unwrap_or_default()),
            "DOI": Self::rich_text(paper.doi.as_deref().unwrap_or_default()),
            "Publication Date": Self::rich_text(&paper.pub_date),
            "Date Added": { "date": { "start": Utc::now().format("%Y-%m-%d").to_string() } },
            "Priority Author": { "checkbox": paper.whitelisted },
        });
        let obj = props.as_object_mut().expect("object literal");
        if !paper.url.is_empty() {
            obj.insert("URL".to_string(), json!({ "url": paper.url }));
        }
        if paper.relevance >= 0 {
            obj.insert("Relevance".to_string(), json!({ "number": paper.relevance }));
        }
        if paper.evidence >= 0 {
            obj.insert("Evidence".to_string(), json!({ "number": paper.evidence }));
        }
        if paper.actionability >= 0 {
            obj.insert(
                "Actionability".to_string(),
                json!({ "number": paper.actionability }),
            );
        }
        if combined > 0 {
            obj.insert("Combined Score".to_string(), json!({ "number": combined }));
        }
        if paper.attention.score() > 0 {
            obj.insert(
                "Altmetric".to_string(),
                json!({ "number": paper.attention.score() }),
            );
        }
        props
    }

    async fn query(&self, filter: serde_json::Value) -> Result<serde_json::Value> {
        let url = format!("{NOTION_API}/databases/{}/query", self.database_id);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("Notion-Version", NOTION_VERSION)
            .json(&json!({ "filter": filter }))
            .send()
            .await
            .context("notion query request")?
            .error_for_status()
            .context("notion query non-2xx")?;
        resp.json().await.context("notion query json")
    }
}

#[async_trait]
impl PaperLog for NotionLog {
    async fn posted_ids_since(&self, days: i64) -> HashSet<String> {
        let cutoff = (Utc::now() - ChronoDuration::days(days))
            .format("%Y-%m-%d")
            .to_string();
        let filter = json!({
            "property": "Date Added",
            "date": { "on_or_after": cutoff }
        });
        let body = match self.query(filter).await {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(error = ?e, "posted-id lookback failed; filtering nothing");
                return HashSet::new();
            }
        };

        let mut pmids = HashSet::new();
        for page in body["results"].as_array().unwrap_or(&Vec::new()) {
            if let Some(content) = page["properties"]["PMID"]["rich_text"][0]["text"]["content"]
                .as_str()
                .filter(|s| !s.is_empty())
            {
                pmids.insert(content.to_string());
            }
        }
        pmids
    }

    async fn contains(&self, pmid: &str) -> bool {
        let filter = json!({
            "property": "PMID",
            "rich_text": { "equals": pmid }
        });
        match self.query(filter).await {
            Ok(body) => body["results"]
                .as_array()
                .map(|r| !r.is_empty())
                .unwrap_or(false),
            // Unknown beats false-positive: treat as absent and let the
            // append path decide.
            Err(_) => false,
        }
    }

    async fn append(&self, paper: &Paper) -> Result<()> {
        let url = format!("{NOTION_API}/pages");
        let body = json!({
            "parent": { "database_id": self.database_id },
            "properties": self.page_properties(paper),
            "children": [
                {
                    "object": "block",
                    "type": "heading_3",
                    "heading_3": { "rich_text": [{ "type": "text", "text": { "content": "Abstract" } }] }
                },
                {
                    "object": "block",
                    "type": "paragraph",
                    "paragraph": {
                        "rich_text": [{
                            "type": "text",
                            "text": { "content": Self::clip(&paper.abstract_text) }
                        }]
                    }
                }
            ]
        });
        self.http
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("Notion-Version", NOTION_VERSION)
            .json(&body)
            .send()
            .await
            .context("notion page create request")?
            .error_for_status()
            .context("notion page create non-2xx")?;
        Ok(())
    }
}

// ---- In-memory implementation for tests and dry runs ----

#[derive(Default)]
pub struct InMemoryLog {
    entries: Mutex<Vec<String>>,
}

impl InMemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pmids(pmids: &[&str]) -> Self {
        Self {
            entries: Mutex::new(pmids.iter().map(|s| s.to_string()).collect()),
        }
    }

    pub fn pmids(&self) -> Vec<String> {
        self.entries.lock().expect("poisoned log").clone()
    }
}

#[async_trait]
impl PaperLog for InMemoryLog {
    async fn posted_ids_since(&self, _days: i64) -> HashSet<String> {
        self.entries
            .lock()
            .expect("poisoned log")
            .iter()
            .cloned()
            .collect()
    }

    async fn contains(&self, pmid: &str) -> bool {
        self.entries
            .lock()
            .expect("poisoned log")
            .iter()
            .any(|p| p == pmid)
    }

    async fn append(&self, paper: &Paper) -> Result<()> {
        let pmid = paper
            .pmid
            .clone()
            .ok_or_else(|| anyhow!("paper has no pmid"))?;
        self.entries.lock().expect("poisoned log").push(pmid);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paper::{Paper, Source};

    fn paper_with_pmid(pmid: &str) -> Paper {
        let mut p = Paper::new(pmid, Source::PubMed);
        p.pmid = Some(pmid.to_string());
        p
    }

    #[tokio::test]
    async fn log_append_is_idempotent_by_pmid() {
        let log = InMemoryLog::with_pmids(&["already"]);
        let papers = vec![
            paper_with_pmid("already"),
            paper_with_pmid("fresh"),
            Paper::new("no pmid", Source::PubMed),
        ];
        let stats = log_deduplicated(&log, &papers).await;
        assert_eq!(
            stats,
            LogStats {
                added: 1,
                skipped: 2,
                failed: 0
            }
        );
        assert_eq!(log.pmids(), vec!["already", "fresh"]);

        // Second run adds nothing.
        let stats = log_deduplicated(&log, &papers).await;
        assert_eq!(stats.added, 0);
        assert_eq!(stats.skipped, 3);
    }

    #[test]
    fn notion_properties_omit_sentinel_scores() {
        let notion = NotionLog::new("key".to_string(), "db".to_string());
        let mut p = paper_with_pmid("1");
        p.relevance = -1;
        p.evidence = -1;
        p.actionability = -1;
        let props = notion.page_properties(&p);
        assert!(props.get("Relevance").is_none());
        assert!(props.get("Combined Score").is_none());

        p.relevance = 8;
        p.evidence = 7;
        p.actionability = 6;
        let props = notion.page_properties(&p);
        assert_eq!(props["Relevance"]["number"], 8);
        assert_eq!(props["Combined Score"]["number"], 21);
    }
}
