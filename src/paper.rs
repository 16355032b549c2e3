// src/paper.rs
//! Core record type flowing through the digest pipeline.
//!
//! A `Paper` is created by a fetcher with only content fields populated,
//! mutated in place by the enricher and the scoring engine, and read-only
//! from the selector onward. Score fields use the sentinel `-1` to mean
//! "not yet scored / scoring failed" — distinct from a true zero.

use serde::{Deserialize, Serialize};

/// Where a paper record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Source {
    PubMed,
    BioRxiv,
    MedRxiv,
}

impl Source {
    pub fn label(&self) -> &'static str {
        match self {
            Source::PubMed => "PubMed",
            Source::BioRxiv => "bioRxiv",
            Source::MedRxiv => "medRxiv",
        }
    }

    pub fn is_preprint(&self) -> bool {
        !matches!(self, Source::PubMed)
    }
}

/// Social-attention record (Altmetric). `Unavailable` covers both "no DOI"
/// and "lookup failed", so tests can tell a true zero score apart from a
/// degraded default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Attention {
    Fetched {
        score: i64,
        twitter: i64,
        news: i64,
    },
    #[default]
    Unavailable,
}

impl Attention {
    /// Score used in ranking/prompt context; 0 when unavailable.
    pub fn score(&self) -> i64 {
        match self {
            Attention::Fetched { score, .. } => *score,
            Attention::Unavailable => 0,
        }
    }
}

/// Structured critical appraisal produced by the summarization call.
/// All fields are required in the LLM response; a response missing any of
/// them falls back to a deterministic stub (see `summarize`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appraisal {
    pub study_type: String,
    pub population: String,
    pub intervention_exposure: String,
    pub key_finding: String,
    pub clinical_magnitude: String,
    pub methodological_notes: String,
    pub bottom_line: String,
    pub why_selected: String,
}

/// A single candidate research paper or preprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paper {
    // Identity. Either may be absent; identity comparison only triggers when
    // both sides carry a non-empty value for the same field.
    pub pmid: Option<String>,
    pub doi: Option<String>,

    // Content.
    pub title: String,
    pub abstract_text: String,
    /// Display string of up to five authors plus "et al.".
    pub authors: String,
    pub journal: String,
    /// ISO-ish date string; not guaranteed parseable.
    pub pub_date: String,
    pub url: String,
    pub source: Source,

    // Assigned as the pipeline progresses.
    pub attention: Attention,
    /// 0..=10, or -1 when not yet scored / scoring failed.
    pub relevance: i32,
    pub evidence: i32,
    pub actionability: i32,
    /// Extra dimension used only by the frontier variant.
    pub frontier: Option<i32>,
    pub whitelisted: bool,
    /// "Always include" override for designated program matches.
    pub always_include: bool,
    pub summary: Option<Appraisal>,
}

impl Paper {
    pub fn new(title: impl Into<String>, source: Source) -> Self {
        Self {
            pmid: None,
            doi: None,
            title: title.into(),
            abstract_text: String::new(),
            authors: String::new(),
            journal: String::new(),
            pub_date: String::new(),
            url: String::new(),
            source,
            attention: Attention::Unavailable,
            relevance: -1,
            evidence: -1,
            actionability: -1,
            frontier: None,
            whitelisted: false,
            always_include: false,
            summary: None,
        }
    }

    /// True once all three core dimensions are >= 0.
    pub fn is_scored(&self) -> bool {
        self.relevance >= 0 && self.evidence >= 0 && self.actionability >= 0
    }

    /// Plain combined score: relevance + evidence + actionability.
    /// Exactly 0 when any dimension is still at the sentinel; never negative.
    pub fn combined_score(&self) -> i32 {
        if !self.is_scored() {
            return 0;
        }
        self.relevance + self.evidence + self.actionability
    }

    /// Frontier-weighted score:
    /// relevance + 0.5*evidence + 0.5*actionability + 1.5*frontier,
    /// truncated toward zero. Unscored papers (relevance < 0) rank as 0.
    pub fn frontier_combined_score(&self) -> i32 {
        if self.relevance < 0 {
            return 0;
        }
        let frontier = self.frontier.unwrap_or(0);
        (self.relevance as f64
            + 0.5 * self.evidence as f64
            + 0.5 * self.actionability as f64
            + 1.5 * frontier as f64) as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(rel: i32, evid: i32, action: i32) -> Paper {
        let mut p = Paper::new("t", Source::PubMed);
        p.relevance = rel;
        p.evidence = evid;
        p.actionability = action;
        p
    }

    #[test]
    fn combined_score_sums_dimensions() {
        assert_eq!(scored(6, 5, 4).combined_score(), 15);
    }

    #[test]
    fn combined_score_is_zero_with_any_sentinel() {
        assert_eq!(scored(-1, 9, 9).combined_score(), 0);
        assert_eq!(scored(9, -1, 9).combined_score(), 0);
        assert_eq!(scored(9, 9, -1).combined_score(), 0);
    }

    #[test]
    fn frontier_combined_truncates_toward_zero() {
        let mut p = scored(6, 5, 5);
        p.frontier = Some(8);
        // 6 + 2.5 + 2.5 + 12 = 23.0
        assert_eq!(p.frontier_combined_score(), 23);

        let mut q = scored(5, 5, 4);
        q.frontier = Some(2);
        // 5 + 2.5 + 2.0 + 3.0 = 12.5 -> 12
        assert_eq!(q.frontier_combined_score(), 12);
    }

    #[test]
    fn frontier_combined_is_zero_when_unscored() {
        let mut p = scored(-1, 5, 5);
        p.frontier = Some(10);
        assert_eq!(p.frontier_combined_score(), 0);
    }

    #[test]
    fn attention_defaults_to_zero_score() {
        assert_eq!(Attention::Unavailable.score(), 0);
        assert_eq!(
            Attention::Fetched {
                score: 42,
                twitter: 3,
                news: 1
            }
            .score(),
            42
        );
    }
}
