// src/summarize.rs
//! Per-paper structured appraisal via the LLM, with a deterministic
//! fallback when the response is missing, malformed, or missing keys.

use std::sync::Arc;

use crate::paper::{Appraisal, Paper};
use crate::score::provider::{generate_with_retry, LlmProvider};
use crate::score::{strip_code_fence, Usage};

pub const SUMMARY_ABSTRACT_MAX_CHARS: usize = 3000;
/// Abstracts shorter than this skip the call entirely.
const MIN_ABSTRACT_CHARS: usize = 50;
const KEY_FINDING_MAX_CHARS: usize = 200;

const SUMMARIZE_PROMPT_HEADER: &str = r#"You are a physician focused on the applied science of longevity. You think mechanistically, obsess over effect sizes, and refuse to accept statistical significance as a proxy for clinical relevance.

Appraise this paper the way you would for a clinical newsletter. Be direct, skeptical, and precise. If a study is garbage, say so. If it's legitimately important, explain why in concrete terms.

Given a paper's title and abstract, provide a structured appraisal with these exact fields:

1. **study_type**: Precise study design. Be specific. Include sample size if it's notably large or small.
2. **population**: Who was actually studied? Flag generalizability issues.
3. **intervention_exposure**: What exactly was tested? Dose, duration, comparator.
4. **key_finding**: One sentence with the actual numbers (HR, OR, absolute risk reduction, mean difference) and the confidence interval. If the abstract doesn't report effect sizes, say so.
5. **clinical_magnitude**: Is this effect size actually meaningful? Compare to known interventions when possible.
6. **methodological_notes**: Short follow-up? Surrogate endpoints? Residual confounding? Industry funding? Call it out. Credit good methodology too.
7. **bottom_line**: What do you actually do with this information? Be prescriptive.
8. **why_selected**: Why did this paper warrant attention? Novel mechanism? Challenges dogma? Practice-changing potential?

Return ONLY valid JSON with these exact keys: study_type, population, intervention_exposure, key_finding, clinical_magnitude, methodological_notes, bottom_line, why_selected.
No markdown, no extra text, just the JSON object.
"#;

fn build_prompt(title: &str, abstract_text: &str) -> String {
    let truncated: String = abstract_text.chars().take(SUMMARY_ABSTRACT_MAX_CHARS).collect();
    format!("{SUMMARIZE_PROMPT_HEADER}\nTitle: {title}\nAbstract: {truncated}\n")
}

/// Deterministic fallback built from the first sentence of the abstract.
pub fn fallback_appraisal(abstract_text: &str) -> Appraisal {
    let mut first_sentence = abstract_text
        .split(". ")
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("No abstract available")
        .to_string();
    if !first_sentence.ends_with('.') {
        first_sentence.push('.');
    }
    let key_finding = if first_sentence.chars().count() > KEY_FINDING_MAX_CHARS {
        let cut: String = first_sentence.chars().take(KEY_FINDING_MAX_CHARS).collect();
        format!("{cut}...")
    } else {
        first_sentence
    };

    Appraisal {
        study_type: "Study".to_string(),
        population: "See abstract for details.".to_string(),
        intervention_exposure: "See abstract for details.".to_string(),
        key_finding,
        clinical_magnitude: "Unable to assess from available information.".to_string(),
        methodological_notes: "Full appraisal requires review of complete paper.".to_string(),
        bottom_line: "Review full text before drawing conclusions.".to_string(),
        why_selected: "Scored highly for relevance, evidence quality, and actionability."
            .to_string(),
    }
}

/// Parse an appraisal reply; `None` when parsing fails or a key is missing.
/// `Appraisal` has only required fields, so serde rejects partial objects.
pub fn parse_appraisal(reply_text: &str) -> Option<Appraisal> {
    serde_json::from_str(strip_code_fence(reply_text)).ok()
}

pub struct Summarizer {
    provider: Arc<dyn LlmProvider>,
}

impl Summarizer {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }

    /// Appraise one paper. Never fails: short abstracts, call failures, and
    /// malformed replies all land on the fallback.
    pub async fn appraise(&self, title: &str, abstract_text: &str, usage: &mut Usage) -> Appraisal {
        if abstract_text.trim().chars().count() < MIN_ABSTRACT_CHARS {
            return fallback_appraisal(abstract_text);
        }

        let prompt = build_prompt(title, abstract_text);
        match generate_with_retry(self.provider.as_ref(), &prompt).await {
            Ok(reply) => {
                usage.record_summary(reply.usage);
                parse_appraisal(&reply.text).unwrap_or_else(|| {
                    usage.errors += 1;
                    fallback_appraisal(abstract_text)
                })
            }
            Err(e) => {
                usage.errors += 1;
                tracing::warn!(error = ?e, title, "summarization call failed");
                fallback_appraisal(abstract_text)
            }
        }
    }

    /// Attach an appraisal to each selected paper in place.
    pub async fn appraise_all(&self, papers: &mut [Paper], usage: &mut Usage) {
        let total = papers.len();
        for (i, paper) in papers.iter_mut().enumerate() {
            tracing::info!(paper = i + 1, total, "summarizing");
            let title = paper.title.clone();
            let abstract_text = paper.abstract_text.clone();
            let appraisal = self.appraise(&title, &abstract_text, usage).await;
            paper.summary = Some(appraisal);
        }
    }

    /// One short conversational intro for the frontier digest. Optional:
    /// failure just omits it.
    pub async fn digest_overview(&self, papers: &[Paper], usage: &mut Usage) -> Option<String> {
        if papers.is_empty() {
            return None;
        }
        let mut prompt = String::from(
            "In 2-3 plain sentences, introduce this week's frontier longevity digest \
             to a clinical audience. Mention the common thread if there is one. \
             No markdown, no emojis.\n\nSelected papers:\n",
        );
        for paper in papers {
            prompt.push_str(&format!("- {}\n", paper.title));
        }
        match generate_with_retry(self.provider.as_ref(), &prompt).await {
            Ok(reply) => {
                usage.record_summary(reply.usage);
                Some(reply.text.trim().to_string())
            }
            Err(e) => {
                usage.errors += 1;
                tracing::warn!(error = ?e, "digest overview call failed");
                None
            }
        }
    }
}
