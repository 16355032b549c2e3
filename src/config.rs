// src/config.rs
//! Digest configuration: topics, exclusion terms, author allow/deny lists.
//!
//! Resolution order:
//! 1) $DIGEST_CONFIG_PATH (TOML or JSON)
//! 2) config/digest.toml
//! 3) config/digest.json
//! 4) compiled-in defaults
//!
//! Entries carry an `active` flag; inactive rows are dropped at load time.
//! Config is loaded once per run and never mutated.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_CONFIG_PATH: &str = "DIGEST_CONFIG_PATH";

fn default_active() -> bool {
    true
}

/// A named search topic contributing one query fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub name: String,
    #[serde(alias = "query_fragment")]
    pub fragment: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorEntry {
    #[serde(alias = "author_name")]
    pub name: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionEntry {
    pub term: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DigestConfig {
    #[serde(default)]
    pub topics: Vec<Topic>,
    #[serde(default)]
    pub authors_whitelist: Vec<AuthorEntry>,
    #[serde(default)]
    pub authors_blacklist: Vec<AuthorEntry>,
    #[serde(default)]
    pub exclusions: Vec<ExclusionEntry>,
}

impl DigestConfig {
    /// Active topics, in file order.
    pub fn active_topics(&self) -> Vec<Topic> {
        self.topics.iter().filter(|t| t.active).cloned().collect()
    }

    /// Active whitelisted (priority-boost) author names.
    pub fn whitelist(&self) -> Vec<String> {
        active_names(&self.authors_whitelist)
    }

    /// Active blacklisted (filtered-out) author names.
    pub fn blacklist(&self) -> Vec<String> {
        active_names(&self.authors_blacklist)
    }

    /// Active exclusion terms for NOT clauses.
    pub fn exclusion_terms(&self) -> Vec<String> {
        self.exclusions
            .iter()
            .filter(|e| e.active && !e.term.is_empty())
            .map(|e| e.term.clone())
            .collect()
    }
}

fn active_names(entries: &[AuthorEntry]) -> Vec<String> {
    entries
        .iter()
        .filter(|a| a.active && !a.name.is_empty())
        .map(|a| a.name.clone())
        .collect()
}

/// Load configuration from an explicit path. Supports TOML or JSON.
pub fn load_from(path: &Path) -> Result<DigestConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading digest config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_config(&content, &ext)
}

/// Load configuration using the env var and file fallbacks; compiled-in
/// defaults when nothing is present on disk.
pub fn load_default() -> Result<DigestConfig> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_from(&pb);
        }
        return Err(anyhow!("DIGEST_CONFIG_PATH points to non-existent path"));
    }
    let toml_p = PathBuf::from("config/digest.toml");
    if toml_p.exists() {
        return load_from(&toml_p);
    }
    let json_p = PathBuf::from("config/digest.json");
    if json_p.exists() {
        return load_from(&json_p);
    }
    Ok(builtin_defaults())
}

fn parse_config(s: &str, hint_ext: &str) -> Result<DigestConfig> {
    if hint_ext == "toml" {
        return toml::from_str(s).context("parsing digest config toml");
    }
    if hint_ext == "json" {
        return serde_json::from_str(s).context("parsing digest config json");
    }
    // No usable extension hint: try TOML first, then JSON.
    if let Ok(cfg) = toml::from_str(s) {
        return Ok(cfg);
    }
    serde_json::from_str(s).context("parsing digest config (tried toml and json)")
}

/// Fallback topic set covering the core longevity domains.
pub fn builtin_defaults() -> DigestConfig {
    let topic = |name: &str, fragment: &str| Topic {
        name: name.to_string(),
        fragment: fragment.to_string(),
        active: true,
    };
    DigestConfig {
        topics: vec![
            topic("Cardiovascular", "cardiovascular[tiab] OR atherosclerosis[tiab]"),
            topic("Metabolism", "\"metabolic health\"[tiab] OR \"insulin resistance\"[tiab]"),
            topic("Exercise", "exercise[tiab] OR \"physical activity\"[tiab]"),
            topic("Neurodegeneration", "dementia[tiab] OR \"cognitive decline\"[tiab]"),
            topic("Geroscience", "senolytic[tiab] OR rapamycin[tiab] OR \"epigenetic clock\"[tiab]"),
        ],
        authors_whitelist: Vec::new(),
        authors_blacklist: Vec::new(),
        exclusions: vec![ExclusionEntry {
            term: "pediatric".to_string(),
            active: true,
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_round_trip_with_active_flags() {
        let s = r#"
            [[topics]]
            name = "CVD"
            fragment = "cardiovascular[tiab]"

            [[topics]]
            name = "Off"
            fragment = "unused[tiab]"
            active = false

            [[authors_whitelist]]
            name = "Miller RA"

            [[exclusions]]
            term = "pediatric"
        "#;
        let cfg = parse_config(s, "toml").unwrap();
        let topics = cfg.active_topics();
        assert_eq!(topics.len(), 1);
        assert_eq!(topics[0].fragment, "cardiovascular[tiab]");
        assert_eq!(cfg.whitelist(), vec!["Miller RA".to_string()]);
        assert_eq!(cfg.exclusion_terms(), vec!["pediatric".to_string()]);
    }

    #[test]
    fn json_accepts_original_field_names() {
        let s = r#"{
            "topics": [{"name": "CVD", "query_fragment": "cardiovascular[tiab]", "active": true}],
            "authors_blacklist": [{"author_name": "Predatory J", "active": true}]
        }"#;
        let cfg = parse_config(s, "json").unwrap();
        assert_eq!(cfg.active_topics()[0].fragment, "cardiovascular[tiab]");
        assert_eq!(cfg.blacklist(), vec!["Predatory J".to_string()]);
    }

    #[test]
    fn builtin_defaults_are_nonempty() {
        let cfg = builtin_defaults();
        assert!(!cfg.active_topics().is_empty());
    }
}
