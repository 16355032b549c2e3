// src/feed.rs
//! RSS/Atom news aggregation for the longevity community digest.
//!
//! Feeds are fetched sequentially; a failing feed is logged and skipped.
//! Reddit serves Atom, the rest RSS 2.0 — we try RSS first and fall back
//! to Atom on parse failure.

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use quick_xml::de::from_str;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use std::time::Duration;
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::{OffsetDateTime, UtcOffset};

pub const HOURS_BACK: i64 = 24;
pub const MAX_ITEMS_PER_POST: usize = 15;
pub const MAX_ITEMS_PER_SOURCE: usize = 5;
/// Seen-item state is capped to the most recent entries.
pub const SEEN_ITEMS_CAP: usize = 1000;
pub const SEEN_ITEMS_FILE: &str = ".news_seen_items.json";
const SUMMARY_MAX_CHARS: usize = 500;

#[derive(Debug, Clone, Copy)]
pub struct FeedSpec {
    pub name: &'static str,
    pub url: &'static str,
    pub emoji: &'static str,
}

pub const NEWS_FEEDS: &[FeedSpec] = &[
    FeedSpec {
        name: "Lifespan.io",
        url: "https://www.lifespan.io/feed/",
        emoji: "🧬",
    },
    FeedSpec {
        name: "Fight Aging!",
        url: "https://www.fightaging.org/feed/",
        emoji: "⚔️",
    },
    FeedSpec {
        name: "r/longevity",
        url: "https://www.reddit.com/r/longevity/.rss",
        emoji: "📢",
    },
    FeedSpec {
        name: "Buck Institute",
        url: "https://www.buckinstitute.org/feed/",
        emoji: "🔬",
    },
    FeedSpec {
        name: "r/Peptides",
        url: "https://www.reddit.com/r/Peptides/.rss",
        emoji: "💊",
    },
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    pub title: String,
    pub url: String,
    pub source: String,
    /// Unix seconds; None when the feed gave no parseable date.
    pub published: Option<i64>,
    pub summary: String,
    /// SHA-256 of the entry id (or source+link+title), for dedup.
    pub guid: String,
}

// ---- RSS 2.0 shapes ----

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
    guid: Option<String>,
}

// ---- Atom shapes (reddit) ----

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    title: Option<String>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
    updated: Option<String>,
    id: Option<String>,
    content: Option<AtomText>,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomText {
    #[serde(rename = "$text")]
    value: Option<String>,
}

fn parse_rfc2822_to_unix(ts: &str) -> Option<i64> {
    OffsetDateTime::parse(ts, &Rfc2822)
        .ok()
        .map(|dt| dt.to_offset(UtcOffset::UTC).unix_timestamp())
}

fn parse_rfc3339_to_unix(ts: &str) -> Option<i64> {
    OffsetDateTime::parse(ts, &Rfc3339)
        .ok()
        .map(|dt| dt.to_offset(UtcOffset::UTC).unix_timestamp())
}

/// Strip tags/entities and truncate a feed summary.
pub fn clean_summary(raw: &str) -> String {
    let mut out = html_escape::decode_html_entities(raw).to_string();

    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    if out.chars().count() > SUMMARY_MAX_CHARS {
        let cut: String = out.chars().take(SUMMARY_MAX_CHARS - 3).collect();
        out = format!("{cut}...");
    }
    out
}

fn guid_for(entry_id: Option<&str>, source: &str, link: &str, title: &str) -> String {
    let mut hasher = Sha256::new();
    match entry_id.filter(|s| !s.is_empty()) {
        Some(id) => hasher.update(id.as_bytes()),
        None => hasher.update(format!("{source}:{link}:{title}").as_bytes()),
    }
    format!("{:x}", hasher.finalize())
}

/// Parse one feed body, RSS first, Atom as the fallback.
pub fn parse_feed(body: &str, source: &str) -> Result<Vec<FeedItem>> {
    if let Ok(rss) = from_str::<Rss>(body) {
        let items = rss
            .channel
            .items
            .into_iter()
            .filter_map(|it| {
                let title = clean_summary(it.title.as_deref()?);
                let link = it.link.clone().unwrap_or_default();
                if title.is_empty() {
                    return None;
                }
                Some(FeedItem {
                    guid: guid_for(it.guid.as_deref(), source, &link, &title),
                    published: it.pub_date.as_deref().and_then(parse_rfc2822_to_unix),
                    summary: clean_summary(it.description.as_deref().unwrap_or_default()),
                    url: link,
                    source: source.to_string(),
                    title,
                })
            })
            .collect();
        return Ok(items);
    }

    let atom: AtomFeed = from_str(body).context("parsing feed as rss then atom")?;
    let items = atom
        .entries
        .into_iter()
        .filter_map(|entry| {
            let title = clean_summary(entry.title.as_deref()?);
            if title.is_empty() {
                return None;
            }
            let link = entry
                .links
                .first()
                .and_then(|l| l.href.clone())
                .unwrap_or_default();
            Some(FeedItem {
                guid: guid_for(entry.id.as_deref(), source, &link, &title),
                published: entry.updated.as_deref().and_then(parse_rfc3339_to_unix),
                summary: clean_summary(
                    entry
                        .content
                        .as_ref()
                        .and_then(|c| c.value.as_deref())
                        .unwrap_or_default(),
                ),
                url: link,
                source: source.to_string(),
                title,
            })
        })
        .collect();
    Ok(items)
}

/// Drop items older than the window or already seen; order is preserved.
pub fn filter_new_items(
    items: Vec<FeedItem>,
    seen: &HashSet<String>,
    now_unix: i64,
    hours_back: i64,
) -> Vec<FeedItem> {
    let cutoff = now_unix - hours_back * 3600;
    items
        .into_iter()
        .filter(|item| !seen.contains(&item.guid))
        .filter(|item| item.published.map(|p| p >= cutoff).unwrap_or(true))
        .collect()
}

pub struct FeedFetcher {
    http: reqwest::Client,
}

impl Default for FeedFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedFetcher {
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .user_agent("longevity-lit-digest/0.1")
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("reqwest client");
        Self { http }
    }

    pub async fn fetch_all(&self, feeds: &[FeedSpec]) -> Vec<FeedItem> {
        let mut all = Vec::new();
        for feed in feeds {
            match self.fetch_one(feed).await {
                Ok(mut items) => {
                    tracing::info!(feed = feed.name, count = items.len(), "feed fetched");
                    all.append(&mut items);
                }
                Err(e) => {
                    tracing::warn!(error = ?e, feed = feed.name, "feed fetch failed");
                }
            }
        }
        all
    }

    async fn fetch_one(&self, feed: &FeedSpec) -> Result<Vec<FeedItem>> {
        let body = self
            .http
            .get(feed.url)
            .send()
            .await
            .with_context(|| format!("fetching feed {}", feed.name))?
            .error_for_status()
            .with_context(|| format!("feed {} non-2xx", feed.name))?
            .text()
            .await
            .with_context(|| format!("feed {} body", feed.name))?;
        parse_feed(&body, feed.name)
    }
}

// ---- Seen-item state ----

#[derive(Debug, Serialize, Deserialize, Default)]
struct SeenState {
    #[serde(default)]
    guids: Vec<String>,
    #[serde(default)]
    updated: String,
}

/// Missing or corrupt state files read as empty — worst case we repost.
pub fn load_seen_items(path: &Path) -> HashSet<String> {
    let Ok(content) = fs::read_to_string(path) else {
        return HashSet::new();
    };
    serde_json::from_str::<SeenState>(&content)
        .map(|s| s.guids.into_iter().collect())
        .unwrap_or_default()
}

pub fn save_seen_items(path: &Path, guids: &HashSet<String>) -> Result<()> {
    let mut list: Vec<String> = guids.iter().cloned().collect();
    list.sort();
    if list.len() > SEEN_ITEMS_CAP {
        list = list.split_off(list.len() - SEEN_ITEMS_CAP);
    }
    let state = SeenState {
        guids: list,
        updated: chrono::Utc::now().to_rfc3339(),
    };
    let body = serde_json::to_string(&state).context("serializing seen items")?;
    fs::write(path, body).with_context(|| format!("writing {}", path.display()))
}

// ---- Slack formatting ----

fn time_ago(published: Option<i64>, now_unix: i64) -> Option<String> {
    let published = published?;
    let hours = (now_unix - published).max(0) / 3600;
    Some(match hours {
        0 => "just now".to_string(),
        h if h < 24 => format!("{h}h ago"),
        h => format!("{}d ago", h / 24),
    })
}

/// News roundup message: header, one section per source with a bullet list,
/// footer naming the sources.
pub fn build_news_message(items: &[FeedItem], now_unix: i64) -> serde_json::Value {
    let mut blocks = vec![
        json!({
            "type": "header",
            "text": { "type": "plain_text", "text": "📰 Longevity News Roundup", "emoji": true }
        }),
        json!({
            "type": "context",
            "elements": [{
                "type": "mrkdwn",
                "text": format!(
                    "*{} new items* from the longevity community · {}",
                    items.len(),
                    chrono::Utc::now().format("%b %d, %Y")
                )
            }]
        }),
        json!({"type": "divider"}),
    ];

    // Group by source, keeping source order deterministic.
    let mut by_source: BTreeMap<&str, Vec<&FeedItem>> = BTreeMap::new();
    for item in items {
        by_source.entry(item.source.as_str()).or_default().push(item);
    }

    for (source, source_items) in &by_source {
        let emoji = NEWS_FEEDS
            .iter()
            .find(|f| f.name == *source)
            .map(|f| f.emoji)
            .unwrap_or("📄");
        blocks.push(json!({
            "type": "section",
            "text": { "type": "mrkdwn", "text": format!("*{emoji} {source}*") }
        }));

        let mut lines: Vec<String> = Vec::new();
        for item in source_items.iter().take(MAX_ITEMS_PER_SOURCE) {
            let title = if item.title.chars().count() > 100 {
                format!("{}...", item.title.chars().take(100).collect::<String>())
            } else {
                item.title.clone()
            };
            let mut line = format!("• <{}|{}>", item.url, title);
            if let Some(ago) = time_ago(item.published, now_unix) {
                line.push_str(&format!(" _({ago})_"));
            }
            lines.push(line);
        }
        if source_items.len() > MAX_ITEMS_PER_SOURCE {
            lines.push(format!(
                "_...and {} more_",
                source_items.len() - MAX_ITEMS_PER_SOURCE
            ));
        }
        blocks.push(json!({
            "type": "section",
            "text": { "type": "mrkdwn", "text": lines.join("\n") }
        }));
    }

    blocks.push(json!({"type": "divider"}));
    let names: Vec<&str> = NEWS_FEEDS.iter().map(|f| f.name).collect();
    blocks.push(json!({
        "type": "context",
        "elements": [{ "type": "mrkdwn", "text": format!("Sources: {}", names.join(" · ")) }]
    }));

    json!({ "blocks": blocks })
}
