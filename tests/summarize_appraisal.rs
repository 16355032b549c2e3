// tests/summarize_appraisal.rs
use std::sync::Arc;

use longevity_lit_digest::paper::{Paper, Source};
use longevity_lit_digest::score::provider::MockLlm;
use longevity_lit_digest::score::Usage;
use longevity_lit_digest::summarize::{fallback_appraisal, parse_appraisal, Summarizer};

const FULL_REPLY: &str = r#"{
    "study_type": "Randomized controlled trial, n=1200",
    "population": "Adults 60-75 without prior CVD",
    "intervention_exposure": "Daily supplement for 24 months vs placebo",
    "key_finding": "HR 0.82 (95% CI 0.70-0.96) for the primary endpoint",
    "clinical_magnitude": "Comparable to moderate-intensity statin therapy",
    "methodological_notes": "Industry funded; surrogate secondary endpoints",
    "bottom_line": "Reasonable to discuss with high-risk patients",
    "why_selected": "Rare hard-endpoint RCT in this space"
}"#;

fn long_abstract() -> String {
    "We conducted a randomized trial of a candidate geroprotector. ".repeat(5)
}

#[test]
fn parse_rejects_partial_objects() {
    assert!(parse_appraisal(FULL_REPLY).is_some());
    assert!(parse_appraisal(r#"{"study_type": "RCT"}"#).is_none());
    assert!(parse_appraisal("not json at all").is_none());
}

#[test]
fn fallback_uses_first_sentence_truncated() {
    let appraisal = fallback_appraisal("First finding here. Second sentence ignored.");
    assert_eq!(appraisal.key_finding, "First finding here.");

    let long = "x".repeat(400);
    let appraisal = fallback_appraisal(&long);
    assert!(appraisal.key_finding.ends_with("..."));
    assert!(appraisal.key_finding.chars().count() <= 203);
}

#[tokio::test]
async fn valid_reply_becomes_the_appraisal() {
    let summarizer = Summarizer::new(Arc::new(MockLlm::always(FULL_REPLY)));
    let mut usage = Usage::default();

    let appraisal = summarizer
        .appraise("Trial of a geroprotector", &long_abstract(), &mut usage)
        .await;
    assert_eq!(appraisal.study_type, "Randomized controlled trial, n=1200");
    assert_eq!(usage.summary_calls, 1);
    assert_eq!(usage.errors, 0);
}

#[tokio::test]
async fn malformed_reply_falls_back() {
    let summarizer = Summarizer::new(Arc::new(MockLlm::always("{\"study_type\": \"RCT\"}")));
    let mut usage = Usage::default();

    let appraisal = summarizer
        .appraise("Trial", &long_abstract(), &mut usage)
        .await;
    assert_eq!(appraisal.study_type, "Study");
    assert_eq!(usage.errors, 1);
}

#[tokio::test]
async fn short_abstract_skips_the_call() {
    let summarizer = Summarizer::new(Arc::new(MockLlm::new(vec![])));
    let mut usage = Usage::default();

    let appraisal = summarizer.appraise("Short", "Too short.", &mut usage).await;
    assert_eq!(appraisal.key_finding, "Too short.");
    // An exhausted mock fails; no call means no error recorded.
    assert_eq!(usage.summary_calls, 0);
    assert_eq!(usage.errors, 0);
}

#[tokio::test]
async fn appraise_all_fills_every_selected_paper() {
    let summarizer = Summarizer::new(Arc::new(MockLlm::always(FULL_REPLY)));
    let mut usage = Usage::default();

    let mut papers: Vec<Paper> = (0..3)
        .map(|i| {
            let mut p = Paper::new(format!("Paper {i}"), Source::PubMed);
            p.abstract_text = long_abstract();
            p
        })
        .collect();

    summarizer.appraise_all(&mut papers, &mut usage).await;
    assert!(papers.iter().all(|p| p.summary.is_some()));
    assert_eq!(usage.summary_calls, 3);
}
