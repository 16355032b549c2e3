// src/query.rs
//! PubMed query construction from selected topics and exclusion terms.

use crate::config::Topic;

/// Base aging/longevity filter ANDed into every standard query.
pub const BASE_AGING_FILTER: &str = "(aging[MeSH] OR \"healthy aging\"[tiab] OR longevity[tiab] OR healthspan[tiab] OR \"biological age\"[tiab] OR lifespan[tiab])";

/// Queries longer than this draw a validation warning; PubMed enforces an
/// undocumented practical limit somewhere above it.
pub const QUERY_CHAR_WARNING_LIMIT: usize = 4000;

/// Build a PubMed query string from selected topics and exclusions.
///
/// Non-empty topic fragments are ORed together, parenthesized, and ANDed
/// with the base aging filter (when requested). One `NOT term[tiab]` clause
/// is appended per exclusion, unconditionally.
///
/// With no usable topics the base filter is returned unchanged (or the empty
/// string if `include_base_filter` is false).
pub fn build_query(topics: &[Topic], exclusions: &[String], include_base_filter: bool) -> String {
    let fragments: Vec<&str> = topics
        .iter()
        .map(|t| t.fragment.as_str())
        .filter(|f| !f.is_empty())
        .collect();

    if fragments.is_empty() {
        return if include_base_filter {
            BASE_AGING_FILTER.to_string()
        } else {
            String::new()
        };
    }

    let topics_query = fragments
        .iter()
        .map(|f| format!("({f})"))
        .collect::<Vec<_>>()
        .join(" OR ");

    let mut query = if include_base_filter {
        format!("{BASE_AGING_FILTER} AND ({topics_query})")
    } else {
        format!("({topics_query})")
    };

    append_exclusions(&mut query, exclusions);
    query
}

/// Build a query requiring papers to match ALL concept groups (AND logic),
/// e.g. "GLP-1 drugs AND muscle/sarcopenia".
///
/// The base filter is omitted by default: intersection queries are already
/// narrow, and ANDing the aging filter in would over-restrict.
pub fn build_intersection_query(
    concept_groups: &[Vec<String>],
    exclusions: &[String],
    include_base_filter: bool,
) -> String {
    let group_queries: Vec<String> = concept_groups
        .iter()
        .filter_map(|group| {
            let inner = group
                .iter()
                .filter(|t| !t.is_empty())
                .cloned()
                .collect::<Vec<_>>()
                .join(" OR ");
            if inner.is_empty() {
                None
            } else {
                Some(format!("({inner})"))
            }
        })
        .collect();

    if group_queries.is_empty() {
        return if include_base_filter {
            BASE_AGING_FILTER.to_string()
        } else {
            String::new()
        };
    }

    let intersection = group_queries.join(" AND ");
    let mut query = if include_base_filter {
        format!("{BASE_AGING_FILTER} AND {intersection}")
    } else {
        intersection
    };

    append_exclusions(&mut query, exclusions);
    query
}

fn append_exclusions(query: &mut String, exclusions: &[String]) {
    for term in exclusions.iter().filter(|t| !t.is_empty()) {
        query.push_str(&format!(" NOT {term}[tiab]"));
    }
}

/// Human-readable summary of the query parameters, for logs and the digest
/// context line.
pub fn query_summary(topics: &[Topic], exclusions: &[String]) -> String {
    let topic_names: Vec<&str> = topics.iter().map(|t| t.name.as_str()).collect();

    let topics_part = if topic_names.is_empty() {
        "Topics: none selected".to_string()
    } else {
        format!("Topics: {}", topic_names.join(", "))
    };
    let exclusions_part = if exclusions.is_empty() {
        "Exclusions: none".to_string()
    } else {
        format!("Exclusions: {}", exclusions.join(", "))
    };

    format!("{topics_part} | {exclusions_part}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryValidation {
    pub valid: bool,
    pub warnings: Vec<String>,
    pub char_count: usize,
}

/// Basic sanity checks before handing a query to the search API.
pub fn validate_query(query: &str) -> QueryValidation {
    let mut warnings = Vec::new();

    let opens = query.matches('(').count();
    let closes = query.matches(')').count();
    if opens != closes {
        warnings.push("Unbalanced parentheses in query".to_string());
    }

    if query.trim().is_empty() {
        warnings.push("Query is empty".to_string());
    }

    let char_count = query.chars().count();
    if char_count > QUERY_CHAR_WARNING_LIMIT {
        warnings.push(format!(
            "Query is very long ({char_count} chars) - may hit PubMed limits"
        ));
    }

    QueryValidation {
        valid: warnings.is_empty(),
        warnings,
        char_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topic(name: &str, fragment: &str) -> Topic {
        Topic {
            name: name.to_string(),
            fragment: fragment.to_string(),
            active: true,
        }
    }

    #[test]
    fn empty_topics_yield_base_filter() {
        assert_eq!(build_query(&[], &[], true), BASE_AGING_FILTER);
        assert_eq!(build_query(&[], &[], false), "");
    }

    #[test]
    fn topics_are_ored_and_anded_with_base_filter() {
        let q = build_query(
            &[topic("CVD", "cardiovascular[tiab]"), topic("Sleep", "sleep[tiab]")],
            &[],
            true,
        );
        assert!(q.starts_with(BASE_AGING_FILTER));
        assert!(q.contains("AND ((cardiovascular[tiab]) OR (sleep[tiab]))"));
    }

    #[test]
    fn exclusions_become_not_clauses() {
        let q = build_query(
            &[topic("CVD", "cardiovascular[tiab]")],
            &["pediatric".to_string(), "neonatal".to_string()],
            true,
        );
        assert!(q.contains("cardiovascular[tiab]"));
        assert!(q.contains(BASE_AGING_FILTER));
        assert!(q.ends_with("NOT pediatric[tiab] NOT neonatal[tiab]"));
    }

    #[test]
    fn intersection_ands_groups_without_base_filter() {
        let groups = vec![
            vec!["\"GLP-1\"[tiab]".to_string(), "semaglutide[tiab]".to_string()],
            vec!["sarcopenia[tiab]".to_string()],
        ];
        let q = build_intersection_query(&groups, &[], false);
        assert_eq!(
            q,
            "(\"GLP-1\"[tiab] OR semaglutide[tiab]) AND (sarcopenia[tiab])"
        );
        assert!(!q.contains("aging[MeSH]"));
    }

    #[test]
    fn validate_flags_unbalanced_and_long_queries() {
        let v = validate_query("(a AND b");
        assert!(!v.valid);
        assert!(v.warnings.iter().any(|w| w.contains("parentheses")));

        let long = "x".repeat(QUERY_CHAR_WARNING_LIMIT + 1);
        let v = validate_query(&long);
        assert!(!v.valid);
        assert_eq!(v.char_count, QUERY_CHAR_WARNING_LIMIT + 1);

        let v = validate_query("(a AND b)");
        assert!(v.valid);
        assert!(v.warnings.is_empty());
    }
}
