// src/publish/slack.rs
//! Slack Block Kit formatting and webhook delivery for the digest.

use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use serde_json::{json, Value};
use std::time::Duration;

use crate::paper::Paper;
use crate::score::Usage;

const SEND_MAX_RETRIES: u8 = 3;
const SEND_INITIAL_BACKOFF: Duration = Duration::from_millis(500);

pub struct SlackPoster {
    webhook_url: String,
    client: reqwest::Client,
}

/// Format an ISO-ish date string as e.g. "Aug 2026"; falls back to a
/// YYYY-MM prefix, then to nothing.
pub fn format_date(date_str: &str) -> String {
    if date_str.is_empty() {
        return String::new();
    }
    let head: String = date_str.chars().take(10).collect();
    for fmt in ["%Y-%m-%d", "%Y/%m/%d"] {
        if let Ok(d) = NaiveDate::parse_from_str(&head, fmt) {
            return d.format("%b %Y").to_string();
        }
    }
    date_str.chars().take(7).collect()
}

/// One Block Kit section per paper: rank + linked title, metadata line,
/// score line, optional appraisal, authors.
pub fn format_paper_block(paper: &Paper, rank: usize, frontier: bool) -> Value {
    let date_display = format_date(&paper.pub_date);

    let mut meta_parts = vec![format!("_{}_", paper.journal)];
    if !date_display.is_empty() {
        meta_parts.push(date_display);
    }
    if let Some(doi) = paper.doi.as_deref().filter(|d| !d.is_empty()) {
        let doi_url = if doi.starts_with("http") {
            doi.to_string()
        } else {
            format!("https://doi.org/{doi}")
        };
        meta_parts.push(format!("<{doi_url}|DOI>"));
    }
    if !paper.url.is_empty() && !paper.source.is_preprint() {
        meta_parts.push(format!("<{}|PubMed>", paper.url));
    }
    if paper.source.is_preprint() {
        meta_parts.push("Preprint".to_string());
    }
    let meta_line = meta_parts.join(" · ");

    let scores_line = if paper.is_scored() {
        let mut parts = vec![
            format!("Rel {}", paper.relevance),
            format!("Evid {}", paper.evidence),
            format!("Action {}", paper.actionability),
        ];
        if let Some(f) = paper.frontier {
            parts.push(format!("Frontier {f}"));
        }
        if paper.attention.score() > 0 {
            parts.push(format!("Altmetric {}", paper.attention.score()));
        }
        parts.join(" · ")
    } else {
        "_Scores unavailable_".to_string()
    };

    let mut summary_lines: Vec<String> = Vec::new();
    if let Some(appraisal) = &paper.summary {
        summary_lines.push(format!(
            "*{}* — {}",
            appraisal.study_type, appraisal.key_finding
        ));
        summary_lines.push(format!("→ {}", appraisal.bottom_line));
        summary_lines.push(format!("\n_Why selected: {}_", appraisal.why_selected));
    }

    let mut authors = paper.authors.clone();
    if authors.chars().count() > 100 {
        authors = format!("{}...", authors.chars().take(97).collect::<String>());
    }

    let badge = if frontier && paper.always_include {
        "🧪 "
    } else if frontier {
        "🔬 "
    } else {
        ""
    };

    let mut text_parts = vec![
        format!("*{rank}. {badge}<{}|{}>*", paper.url, paper.title),
        meta_line,
        scores_line,
    ];
    if !summary_lines.is_empty() {
        text_parts.push(String::new());
        text_parts.push(summary_lines.join("\n"));
    }
    text_parts.push(String::new());
    text_parts.push(format!("― {authors}"));

    json!({
        "type": "section",
        "text": { "type": "mrkdwn", "text": text_parts.join("\n") }
    })
}

/// Complete daily digest payload: header, context line, one section per
/// paper with dividers, footer legend.
pub fn build_digest_message(papers: &[Paper], days: i64) -> Value {
    let mut blocks = vec![
        json!({
            "type": "header",
            "text": { "type": "plain_text", "text": "Literature Digest", "emoji": false }
        }),
        json!({
            "type": "context",
            "elements": [{
                "type": "mrkdwn",
                "text": format!(
                    "Top {} papers from the past {days} days, ranked by relevance, evidence quality, and actionability.",
                    papers.len()
                )
            }]
        }),
        json!({"type": "divider"}),
    ];

    for (i, paper) in papers.iter().enumerate() {
        blocks.push(format_paper_block(paper, i + 1, false));
        if i + 1 < papers.len() {
            blocks.push(json!({"type": "divider"}));
        }
    }

    blocks.push(json!({"type": "divider"}));
    blocks.push(json!({
        "type": "context",
        "elements": [{
            "type": "mrkdwn",
            "text": "Rel = clinical relevance · Evid = study quality · Action = practice applicability"
        }]
    }));

    json!({ "blocks": blocks })
}

/// Frontier digest payload: badge in the header, optional overview text,
/// usage stats in the footer.
pub fn build_frontier_message(
    papers: &[Paper],
    overview: Option<&str>,
    usage: &Usage,
) -> Value {
    let mut blocks = vec![json!({
        "type": "header",
        "text": { "type": "plain_text", "text": "🔬 Frontier Digest", "emoji": true }
    })];

    if let Some(text) = overview {
        blocks.push(json!({
            "type": "section",
            "text": { "type": "mrkdwn", "text": text }
        }));
    }
    blocks.push(json!({
        "type": "context",
        "elements": [{
            "type": "mrkdwn",
            "text": format!(
                "{} bleeding-edge papers and preprints, weighted for paradigm-shifting potential.",
                papers.len()
            )
        }]
    }));
    blocks.push(json!({"type": "divider"}));

    for (i, paper) in papers.iter().enumerate() {
        blocks.push(format_paper_block(paper, i + 1, true));
        if i + 1 < papers.len() {
            blocks.push(json!({"type": "divider"}));
        }
    }

    blocks.push(json!({"type": "divider"}));
    blocks.push(json!({
        "type": "context",
        "elements": [{
            "type": "mrkdwn",
            "text": format!(
                "🧪 = always-include program result · AI calls: {} · ~{} tokens",
                usage.api_calls,
                usage.total_tokens()
            )
        }]
    }));

    json!({ "blocks": blocks })
}

impl SlackPoster {
    /// `SLACK_WEBHOOK_URL` is required; absence is a fatal configuration
    /// error raised before any network call.
    pub fn from_env() -> Result<Self> {
        let webhook_url = std::env::var("SLACK_WEBHOOK_URL")
            .map_err(|_| anyhow!("SLACK_WEBHOOK_URL environment variable not set"))?;
        Ok(Self::new(webhook_url))
    }

    pub fn new(webhook_url: String) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("longevity-lit-digest/0.1")
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("reqwest client");
        Self {
            webhook_url,
            client,
        }
    }

    /// Deliver a payload with bounded retries and doubling backoff.
    async fn send(&self, payload: &Value) -> Result<()> {
        let mut attempt: u8 = 0;
        let mut backoff = SEND_INITIAL_BACKOFF;
        loop {
            attempt += 1;
            let res = self.client.post(&self.webhook_url).json(payload).send().await;
            match res {
                Ok(resp) => {
                    if let Err(e) = resp.error_for_status_ref() {
                        if attempt < SEND_MAX_RETRIES {
                            tokio::time::sleep(backoff).await;
                            backoff *= 2;
                            continue;
                        }
                        return Err(anyhow!("slack webhook HTTP error: {e}"));
                    }
                    return Ok(());
                }
                Err(e) => {
                    if attempt < SEND_MAX_RETRIES {
                        tokio::time::sleep(backoff).await;
                        backoff *= 2;
                        continue;
                    }
                    return Err(anyhow!("slack webhook request failed: {e}"));
                }
            }
        }
    }

    /// "Nothing qualified today" is still announced; the channel never goes
    /// silent.
    pub async fn post_no_papers(&self, days: i64, digest_name: &str) -> Result<()> {
        let payload = json!({
            "blocks": [
                {
                    "type": "header",
                    "text": { "type": "plain_text", "text": "Literature Digest", "emoji": false }
                },
                {
                    "type": "section",
                    "text": {
                        "type": "mrkdwn",
                        "text": format!(
                            "No papers from the past {days} days met the {digest_name} scoring threshold today."
                        )
                    }
                }
            ]
        });
        self.send(&payload).await
    }

    pub async fn post_error(&self, error_message: &str, context: Option<&str>) -> Result<()> {
        let mut blocks = vec![
            json!({
                "type": "header",
                "text": { "type": "plain_text", "text": "Literature Digest — Error", "emoji": false }
            }),
            json!({
                "type": "section",
                "text": {
                    "type": "mrkdwn",
                    "text": format!("The digest run encountered an error:\n```{error_message}```")
                }
            }),
        ];
        if let Some(ctx) = context {
            blocks.push(json!({
                "type": "context",
                "elements": [{ "type": "mrkdwn", "text": ctx }]
            }));
        }
        self.send(&json!({ "blocks": blocks })).await
    }

    /// Generic pre-built payload delivery (used by the news digest).
    pub async fn post_payload(&self, payload: &Value) -> Result<()> {
        self.send(payload).await
    }
}
