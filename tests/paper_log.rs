// tests/paper_log.rs
use longevity_lit_digest::paper::{Paper, Source};
use longevity_lit_digest::publish::{log_deduplicated, InMemoryLog, PaperLog};

fn paper(pmid: Option<&str>) -> Paper {
    let mut p = Paper::new("A paper", Source::PubMed);
    p.pmid = pmid.map(|s| s.to_string());
    p
}

#[tokio::test]
async fn append_is_idempotent_by_pmid() {
    let log = InMemoryLog::with_pmids(&["111"]);
    let papers = vec![paper(Some("111")), paper(Some("222")), paper(Some("222"))];

    let stats = log_deduplicated(&log, &papers).await;
    assert_eq!(stats.added, 1);
    assert_eq!(stats.skipped, 2);
    assert_eq!(stats.failed, 0);
    assert_eq!(log.pmids(), vec!["111".to_string(), "222".to_string()]);
}

#[tokio::test]
async fn papers_without_pmid_are_skipped() {
    let log = InMemoryLog::new();
    let papers = vec![paper(None), paper(Some("333"))];

    let stats = log_deduplicated(&log, &papers).await;
    assert_eq!(stats.added, 1);
    assert_eq!(stats.skipped, 1);
    assert!(log.contains("333").await);
}

#[tokio::test]
async fn posted_ids_feed_the_dedup_window() {
    let log = InMemoryLog::with_pmids(&["a", "b"]);
    let posted = log.posted_ids_since(14).await;
    assert!(posted.contains("a"));
    assert!(posted.contains("b"));
    assert_eq!(posted.len(), 2);
}
