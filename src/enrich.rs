// src/enrich.rs
//! Altmetric attention enrichment.
//!
//! Best-effort only: a paper without a DOI gets `Attention::Unavailable`
//! without any call, and every lookup error degrades to the same value.
//! Nothing here may propagate an error to the caller; downstream ranking
//! never depends on attention data being present.

use serde::Deserialize;
use std::time::Duration;

use crate::paper::{Attention, Paper};

const ALTMETRIC_API: &str = "https://api.altmetric.com/v1/doi";

pub struct AltmetricClient {
    http: reqwest::Client,
}

impl Default for AltmetricClient {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct AltmetricBody {
    #[serde(default)]
    score: f64,
    #[serde(default)]
    cited_by_tweeters_count: i64,
    #[serde(default)]
    cited_by_msm_count: i64,
}

impl AltmetricClient {
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .user_agent("longevity-lit-digest/0.1")
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(10))
            .build()
            .expect("reqwest client");
        Self { http }
    }

    /// Fetch attention data for one DOI; `Unavailable` on any failure.
    pub async fn lookup(&self, doi: &str) -> Attention {
        let url = format!("{ALTMETRIC_API}/{doi}");
        let resp = match self.http.get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!(error = ?e, doi, "altmetric request failed");
                return Attention::Unavailable;
            }
        };
        if !resp.status().is_success() {
            // 404 here just means the paper has no attention record yet.
            return Attention::Unavailable;
        }
        match resp.json::<AltmetricBody>().await {
            Ok(body) => Attention::Fetched {
                score: body.score as i64,
                twitter: body.cited_by_tweeters_count,
                news: body.cited_by_msm_count,
            },
            Err(e) => {
                tracing::debug!(error = ?e, doi, "altmetric body parse failed");
                Attention::Unavailable
            }
        }
    }

    /// Annotate each paper in place, one lookup at a time. Altmetric's free
    /// tier dislikes concurrent bursts.
    pub async fn enrich(&self, papers: &mut [Paper]) {
        let total = papers.len();
        for (i, paper) in papers.iter_mut().enumerate() {
            paper.attention = match paper.doi.as_deref() {
                Some(doi) if !doi.is_empty() => self.lookup(doi).await,
                _ => Attention::Unavailable,
            };
            if (i + 1) % 20 == 0 {
                tracing::info!(done = i + 1, total, "altmetric enrichment progress");
            }
        }
    }
}
