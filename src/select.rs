// src/select.rs
//! Ranking, deduplication, and truncation of scored papers.
//!
//! Two named policies sit behind one trait: the standard daily ranking and
//! the frontier-weighted weekly ranking. The caller picks one explicitly;
//! there is no feature-flag branching inside a shared function.
//!
//! All sorts are `sort_by` (stable), so insertion order is the tie-break
//! for equal scores — reproducible by construction.

use std::collections::HashSet;

use crate::paper::Paper;
use crate::score::author_in_list;

pub const DAILY_MIN_COMBINED_SCORE: i32 = 15;
pub const DAILY_TOP_N: usize = 5;
pub const DAILY_DEDUP_LOOKBACK_DAYS: i64 = 14;

pub const FRONTIER_MIN_COMBINED_SCORE: i32 = 12;
pub const FRONTIER_MIN_FRONTIER_SCORE: i32 = 6;
pub const FRONTIER_TOP_N: usize = 7;
pub const FRONTIER_DEDUP_LOOKBACK_DAYS: i64 = 30;

/// Authors whose papers are always included in the frontier digest.
pub const ITP_AUTHOR_NAMES: &[&str] = &["Miller RA", "Strong R", "Harrison DE", "Nadon NL"];

/// Program-identifier phrases matched against title/abstract.
pub const ITP_PHRASES: &[&str] = &["interventions testing program", "itp", "nia itp"];

/// Outcome of a selection pass. `Empty` means "no qualifying documents" —
/// a distinct terminal state, not an error, and never an empty digest post.
#[derive(Debug, Clone)]
pub enum Selection {
    Ranked(Vec<Paper>),
    Empty,
}

impl Selection {
    fn from_vec(papers: Vec<Paper>) -> Self {
        if papers.is_empty() {
            Selection::Empty
        } else {
            Selection::Ranked(papers)
        }
    }

    pub fn papers(&self) -> &[Paper] {
        match self {
            Selection::Ranked(p) => p,
            Selection::Empty => &[],
        }
    }
}

pub trait RankPolicy {
    /// Rank `papers`, excluding anything whose pmid is in `posted`.
    fn select(&self, papers: Vec<Paper>, posted: &HashSet<String>) -> Selection;
    fn name(&self) -> &'static str;
}

/// Standard daily ranking: combined score threshold, stable descending sort,
/// fixed truncation.
#[derive(Debug, Clone)]
pub struct DailyPolicy {
    pub min_combined: i32,
    pub top_n: usize,
}

impl Default for DailyPolicy {
    fn default() -> Self {
        Self {
            min_combined: DAILY_MIN_COMBINED_SCORE,
            top_n: DAILY_TOP_N,
        }
    }
}

impl RankPolicy for DailyPolicy {
    fn select(&self, papers: Vec<Paper>, posted: &HashSet<String>) -> Selection {
        let mut kept: Vec<Paper> = papers
            .into_iter()
            .filter(|p| !is_posted(p, posted))
            .filter(|p| p.combined_score() >= self.min_combined)
            .collect();
        kept.sort_by(|a, b| b.combined_score().cmp(&a.combined_score()));
        kept.truncate(self.top_n);
        Selection::from_vec(kept)
    }

    fn name(&self) -> &'static str {
        "daily"
    }
}

/// Frontier ranking: identity dedup across sources, always-include override
/// for designated program papers, frontier-weighted score with a second
/// frontier-dimension floor.
#[derive(Debug, Clone)]
pub struct FrontierPolicy {
    pub min_combined: i32,
    pub min_frontier: i32,
    pub top_n: usize,
}

impl Default for FrontierPolicy {
    fn default() -> Self {
        Self {
            min_combined: FRONTIER_MIN_COMBINED_SCORE,
            min_frontier: FRONTIER_MIN_FRONTIER_SCORE,
            top_n: FRONTIER_TOP_N,
        }
    }
}

impl RankPolicy for FrontierPolicy {
    fn select(&self, papers: Vec<Paper>, posted: &HashSet<String>) -> Selection {
        let deduped = dedup_by_identity(papers);

        let mut always: Vec<Paper> = Vec::new();
        let mut others: Vec<Paper> = Vec::new();
        for mut paper in deduped {
            if is_posted(&paper, posted) {
                continue;
            }
            paper.always_include = is_always_include(&paper);
            if paper.always_include {
                always.push(paper);
            } else if paper.frontier_combined_score() >= self.min_combined
                && paper.frontier.unwrap_or(0) >= self.min_frontier
            {
                others.push(paper);
            }
        }

        others.sort_by(|a, b| b.frontier_combined_score().cmp(&a.frontier_combined_score()));

        // Always-include papers are prepended ahead of score-filtered ones,
        // then the whole list is truncated.
        always.extend(others);
        always.truncate(self.top_n);
        Selection::from_vec(always)
    }

    fn name(&self) -> &'static str {
        "frontier"
    }
}

fn is_posted(paper: &Paper, posted: &HashSet<String>) -> bool {
    paper
        .pmid
        .as_deref()
        .map(|id| posted.contains(id))
        .unwrap_or(false)
}

/// True for ITP papers: program phrase in title/abstract, or a designated
/// author in the author string.
pub fn is_always_include(paper: &Paper) -> bool {
    let title = paper.title.to_lowercase();
    let abstract_text = paper.abstract_text.to_lowercase();
    if ITP_PHRASES
        .iter()
        .any(|phrase| title.contains(phrase) || abstract_text.contains(phrase))
    {
        return true;
    }
    let authors: Vec<String> = ITP_AUTHOR_NAMES.iter().map(|s| s.to_string()).collect();
    author_in_list(&paper.authors, &authors)
}

/// Keep the first occurrence per identity across sources; call order defines
/// precedence (PubMed, then preprints, then ITP preprints).
///
/// Identity comparison only triggers when both sides carry a non-empty value
/// for the same field: a paper missing a DOI is never a duplicate of another
/// paper missing a DOI.
pub fn dedup_by_identity(papers: Vec<Paper>) -> Vec<Paper> {
    let mut seen_dois: HashSet<String> = HashSet::new();
    let mut seen_pmids: HashSet<String> = HashSet::new();
    let mut unique = Vec::with_capacity(papers.len());

    for paper in papers {
        let doi = paper.doi.as_deref().filter(|d| !d.is_empty());
        let pmid = paper.pmid.as_deref().filter(|p| !p.is_empty());

        if let Some(d) = doi {
            if seen_dois.contains(d) {
                continue;
            }
        }
        if let Some(p) = pmid {
            if seen_pmids.contains(p) {
                continue;
            }
        }
        if let Some(d) = doi {
            seen_dois.insert(d.to_string());
        }
        if let Some(p) = pmid {
            seen_pmids.insert(p.to_string());
        }
        unique.push(paper);
    }

    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paper::Source;

    fn paper(title: &str, rel: i32, evid: i32, action: i32) -> Paper {
        let mut p = Paper::new(title, Source::PubMed);
        p.relevance = rel;
        p.evidence = evid;
        p.actionability = action;
        p
    }

    #[test]
    fn daily_filters_sorts_and_truncates() {
        let papers = vec![
            paper("low", 3, 3, 3),
            paper("high", 8, 7, 6),
            paper("mid", 6, 5, 4),
            paper("unscored", -1, -1, -1),
        ];
        let sel = DailyPolicy::default().select(papers, &HashSet::new());
        let titles: Vec<&str> = sel.papers().iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["high", "mid"]);
    }

    #[test]
    fn daily_excludes_previously_posted() {
        let mut p = paper("seen", 8, 8, 8);
        p.pmid = Some("123".to_string());
        let posted: HashSet<String> = ["123".to_string()].into_iter().collect();
        let sel = DailyPolicy::default().select(vec![p], &posted);
        assert!(matches!(sel, Selection::Empty));
    }

    #[test]
    fn stable_sort_preserves_insertion_order_on_ties() {
        let papers = vec![paper("first", 6, 5, 4), paper("second", 5, 5, 5)];
        let sel = DailyPolicy::default().select(papers, &HashSet::new());
        let titles: Vec<&str> = sel.papers().iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["first", "second"]);
    }

    #[test]
    fn dedup_keeps_first_seen_by_doi_and_pmid() {
        let mut a = paper("pubmed copy", 0, 0, 0);
        a.doi = Some("10.1/x".to_string());
        a.pmid = Some("1".to_string());
        let mut b = paper("preprint copy", 0, 0, 0);
        b.doi = Some("10.1/x".to_string());
        b.pmid = Some("preprint_10.1_x".to_string());
        let mut c = paper("other", 0, 0, 0);
        c.pmid = Some("2".to_string());

        let unique = dedup_by_identity(vec![a, b, c]);
        let titles: Vec<&str> = unique.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["pubmed copy", "other"]);
    }

    #[test]
    fn papers_without_doi_are_never_doi_duplicates() {
        let a = paper("no ids one", 0, 0, 0);
        let b = paper("no ids two", 0, 0, 0);
        let unique = dedup_by_identity(vec![a, b]);
        assert_eq!(unique.len(), 2);
    }

    #[test]
    fn dedup_is_idempotent() {
        let mut a = paper("a", 0, 0, 0);
        a.doi = Some("10.1/a".to_string());
        let mut b = paper("b", 0, 0, 0);
        b.doi = Some("10.1/a".to_string());
        let once = dedup_by_identity(vec![a, b]);
        let twice = dedup_by_identity(once.clone());
        assert_eq!(
            once.iter().map(|p| &p.title).collect::<Vec<_>>(),
            twice.iter().map(|p| &p.title).collect::<Vec<_>>()
        );
    }

    #[test]
    fn frontier_threshold_and_floor_apply() {
        let mut hot = paper("hot", 6, 5, 5);
        hot.frontier = Some(8); // 6 + 2.5 + 2.5 + 12 = 23
        let mut tame = paper("tame", 6, 5, 5);
        tame.frontier = Some(4); // frontier floor fails
        let unscored = paper("unscored", -1, 9, 9);

        let sel = FrontierPolicy::default().select(vec![tame, hot, unscored], &HashSet::new());
        let titles: Vec<&str> = sel.papers().iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["hot"]);
    }

    #[test]
    fn always_include_bypasses_filters_and_leads_the_list() {
        let mut itp = paper("Latest Interventions Testing Program cohort", 2, 2, 2);
        itp.frontier = Some(0);
        let mut strong = paper("strong scorer", 8, 8, 8);
        strong.frontier = Some(9);

        let sel = FrontierPolicy::default().select(vec![strong, itp], &HashSet::new());
        let papers = sel.papers();
        assert_eq!(papers[0].title, "Latest Interventions Testing Program cohort");
        assert!(papers[0].always_include);
        assert_eq!(papers[1].title, "strong scorer");
    }

    #[test]
    fn itp_author_match_triggers_always_include() {
        let mut p = paper("unrelated title", 0, 0, 0);
        p.authors = "Smith A, Harrison DE, et al.".to_string();
        assert!(is_always_include(&p));
    }
}
