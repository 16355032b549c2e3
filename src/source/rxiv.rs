// src/source/rxiv.rs
//! bioRxiv/medRxiv preprint search.
//!
//! The details API has no query support beyond a date range, so we page
//! through recent preprints and filter locally by term match in title or
//! abstract.

use anyhow::{Context, Result};
use chrono::{Duration as ChronoDuration, Utc};
use serde::Deserialize;
use std::time::Duration;

use crate::paper::{Paper, Source};

const RXIV_API: &str = "https://api.biorxiv.org/details";
const PAGE_SIZE: usize = 100;
/// Politeness delay between result pages.
const PAGE_DELAY_MS: u64 = 500;

pub const DEFAULT_PREPRINT_DAYS_BACK: i64 = 14;
pub const DEFAULT_MAX_PREPRINTS: usize = 50;
pub const ITP_DAYS_BACK: i64 = 30;

/// Curated longevity terms for the broad preprint sweep.
pub const LONGEVITY_TERMS: &[&str] = &[
    // Interventions
    "rapamycin",
    "sirolimus",
    "metformin",
    "senolytics",
    "senolytic",
    "dasatinib",
    "quercetin",
    "fisetin",
    "nmn",
    "nicotinamide riboside",
    "nad+",
    "spermidine",
    "alpha-ketoglutarate",
    // Mechanisms
    "mtor",
    "ampk",
    "sirtuin",
    "autophagy",
    "senescence",
    "senescent cells",
    "telomere",
    "telomerase",
    "mitochondrial",
    "epigenetic clock",
    "biological age",
    "dna methylation",
    "cellular reprogramming",
    // ITP and key studies
    "interventions testing program",
    "itp aging",
    "lifespan extension",
    // Other cutting-edge
    "parabiosis",
    "young blood",
    "plasma dilution",
    "klotho",
    "foxo",
    "yamanaka",
    "partial reprogramming",
    // Longevity general
    "longevity",
    "healthspan",
    "lifespan",
    "aging intervention",
];

/// Terms targeting NIA Interventions Testing Program output specifically.
pub const ITP_TERMS: &[&str] = &[
    "interventions testing program",
    "itp aging",
    "nia itp",
    "mouse lifespan",
    "lifespan extension",
];

#[derive(Debug, Deserialize)]
struct DetailsPage {
    #[serde(default)]
    messages: Vec<PageMessage>,
    #[serde(default)]
    collection: Vec<PreprintRecord>,
}

#[derive(Debug, Deserialize)]
struct PageMessage {
    #[serde(default)]
    count: usize,
}

#[derive(Debug, Deserialize)]
pub struct PreprintRecord {
    #[serde(default)]
    doi: String,
    #[serde(default)]
    title: String,
    #[serde(default, rename = "abstract")]
    abstract_text: String,
    #[serde(default)]
    authors: String,
    #[serde(default)]
    date: String,
}

/// Case-insensitive term match against title or abstract.
pub fn matches_terms(title: &str, abstract_text: &str, terms_lower: &[String]) -> bool {
    let title = title.to_lowercase();
    let abs = abstract_text.to_lowercase();
    terms_lower
        .iter()
        .any(|t| title.contains(t.as_str()) || abs.contains(t.as_str()))
}

fn to_paper(record: PreprintRecord, server: Source) -> Paper {
    let mut paper = Paper::new(
        if record.title.is_empty() {
            "Untitled".to_string()
        } else {
            record.title
        },
        server,
    );
    // Synthetic PMID so preprints participate in pmid-keyed dedup/logging.
    if !record.doi.is_empty() {
        paper.pmid = Some(format!("preprint_{}", record.doi.replace('/', "_")));
        paper.doi = Some(record.doi.clone());
        paper.url = format!("https://doi.org/{}", record.doi);
    }
    paper.abstract_text = record.abstract_text;
    paper.authors = record.authors;
    paper.journal = format!("{} (Preprint)", server.label());
    paper.pub_date = record.date;
    paper
}

pub struct RxivClient {
    http: reqwest::Client,
}

impl Default for RxivClient {
    fn default() -> Self {
        Self::new()
    }
}

impl RxivClient {
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .user_agent("longevity-lit-digest/0.1")
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("reqwest client");
        Self { http }
    }

    /// Page through one server's recent preprints, keeping term matches.
    /// Any page-level error ends pagination with what we have so far.
    pub async fn search(
        &self,
        terms: &[&str],
        days_back: i64,
        server: Source,
        max_results: usize,
    ) -> Vec<Paper> {
        let server_path = match server {
            Source::BioRxiv => "biorxiv",
            Source::MedRxiv => "medrxiv",
            Source::PubMed => return Vec::new(),
        };
        let end = Utc::now();
        let start = end - ChronoDuration::days(days_back);
        let start_str = start.format("%Y-%m-%d").to_string();
        let end_str = end.format("%Y-%m-%d").to_string();
        let terms_lower: Vec<String> = terms.iter().map(|t| t.to_lowercase()).collect();

        let mut out: Vec<Paper> = Vec::new();
        let mut cursor = 0usize;

        while out.len() < max_results {
            let url = format!("{RXIV_API}/{server_path}/{start_str}/{end_str}/{cursor}");
            let page = match self.fetch_page(&url).await {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!(error = ?e, server = server_path, "preprint page fetch failed");
                    break;
                }
            };

            let total = page.messages.first().map(|m| m.count).unwrap_or(0);
            if total == 0 || page.collection.is_empty() {
                break;
            }

            for record in page.collection {
                if matches_terms(&record.title, &record.abstract_text, &terms_lower) {
                    out.push(to_paper(record, server));
                    if out.len() >= max_results {
                        break;
                    }
                }
            }

            cursor += PAGE_SIZE;
            if cursor >= total {
                break;
            }
            tokio::time::sleep(Duration::from_millis(PAGE_DELAY_MS)).await;
        }

        out
    }

    async fn fetch_page(&self, url: &str) -> Result<DetailsPage> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .context("rxiv details request")?
            .error_for_status()
            .context("rxiv details non-2xx")?;
        resp.json::<DetailsPage>().await.context("rxiv details json")
    }

    /// Broad longevity sweep over both servers, merged and sorted by date
    /// descending, capped at `max_results`.
    pub async fn search_longevity_preprints(
        &self,
        days_back: i64,
        max_results: usize,
    ) -> Vec<Paper> {
        let per_server = max_results / 2;
        let mut medrxiv = self
            .search(LONGEVITY_TERMS, days_back, Source::MedRxiv, per_server)
            .await;
        let mut biorxiv = self
            .search(LONGEVITY_TERMS, days_back, Source::BioRxiv, per_server)
            .await;

        medrxiv.append(&mut biorxiv);
        medrxiv.sort_by(|a, b| b.pub_date.cmp(&a.pub_date));
        medrxiv.truncate(max_results);
        medrxiv
    }

    /// Targeted ITP search, longer window; results feed the always-include
    /// path of the frontier selector.
    pub async fn itp_preprints(&self, days_back: i64) -> Vec<Paper> {
        let mut medrxiv = self
            .search(ITP_TERMS, days_back, Source::MedRxiv, 20)
            .await;
        let mut biorxiv = self
            .search(ITP_TERMS, days_back, Source::BioRxiv, 20)
            .await;
        medrxiv.append(&mut biorxiv);
        medrxiv
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn term_matching_is_case_insensitive_and_checks_both_fields() {
        let terms: Vec<String> = vec!["rapamycin".into(), "epigenetic clock".into()];
        assert!(matches_terms("Rapamycin in aged mice", "", &terms));
        assert!(matches_terms("Untitled", "We built an Epigenetic Clock.", &terms));
        assert!(!matches_terms("CRISPR screens", "in yeast", &terms));
    }

    #[test]
    fn preprint_record_converts_to_standard_format() {
        let record = PreprintRecord {
            doi: "10.1101/2026.08.01.123456".to_string(),
            title: "Senolytics in aged rats".to_string(),
            abstract_text: "Abstract.".to_string(),
            authors: "Doe J; Roe R".to_string(),
            date: "2026-08-10".to_string(),
        };
        let p = to_paper(record, Source::MedRxiv);
        assert_eq!(
            p.pmid.as_deref(),
            Some("preprint_10.1101_2026.08.01.123456")
        );
        assert_eq!(p.doi.as_deref(), Some("10.1101/2026.08.01.123456"));
        assert_eq!(p.journal, "medRxiv (Preprint)");
        assert_eq!(p.url, "https://doi.org/10.1101/2026.08.01.123456");
        assert!(p.source.is_preprint());
    }
}
