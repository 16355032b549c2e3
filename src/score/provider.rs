// src/score/provider.rs
//! LLM provider abstraction: one real provider (Gemini) plus a mock for
//! tests. The scoring and summarization engines only see the trait.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
pub const MAX_RETRIES: u8 = 3;
pub const INITIAL_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Token counts reported by the provider for one call; zeros when the
/// provider does not report them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

#[derive(Debug, Clone)]
pub struct LlmReply {
    pub text: String,
    pub usage: TokenUsage,
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<LlmReply>;
    fn name(&self) -> &'static str;
}

/// Retry a provider call up to `MAX_RETRIES` attempts with doubling backoff
/// starting at `INITIAL_RETRY_DELAY`. The last error is returned unchanged.
pub async fn generate_with_retry(provider: &dyn LlmProvider, prompt: &str) -> Result<LlmReply> {
    let mut attempt: u8 = 0;
    let mut delay = INITIAL_RETRY_DELAY;
    loop {
        attempt += 1;
        match provider.generate(prompt).await {
            Ok(reply) => return Ok(reply),
            Err(e) => {
                if attempt >= MAX_RETRIES {
                    return Err(e);
                }
                tracing::warn!(error = ?e, attempt, provider = provider.name(), "llm call failed, retrying");
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
        }
    }
}

// ---- Gemini ----

pub struct GeminiProvider {
    http: reqwest::Client,
    api_key: String,
    model: String,
    temperature: f32,
    max_output_tokens: u32,
}

impl GeminiProvider {
    /// Requires `GEMINI_API_KEY`; absence is a fatal configuration error
    /// raised before any network call.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| anyhow!("GEMINI_API_KEY environment variable not set"))?;
        let model = std::env::var("GEMINI_MODEL").ok();
        Ok(Self::new(api_key, model.as_deref()))
    }

    pub fn new(api_key: String, model_override: Option<&str>) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("longevity-lit-digest/0.1")
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("reqwest client");
        Self {
            http,
            api_key,
            model: model_override.unwrap_or(DEFAULT_GEMINI_MODEL).to_string(),
            temperature: 0.3,
            max_output_tokens: 1000,
        }
    }

    pub fn with_temperature(mut self, t: f32) -> Self {
        self.temperature = t;
        self
    }

    pub fn with_max_output_tokens(mut self, n: u32) -> Self {
        self.max_output_tokens = n;
        self
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct UsageMetadata {
    #[serde(rename = "promptTokenCount", default)]
    prompt_token_count: u64,
    #[serde(rename = "candidatesTokenCount", default)]
    candidates_token_count: u64,
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    async fn generate(&self, prompt: &str) -> Result<LlmReply> {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.model, self.api_key
        );
        let req = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_output_tokens,
            },
        };

        let resp = self
            .http
            .post(&url)
            .json(&req)
            .send()
            .await
            .context("gemini request")?
            .error_for_status()
            .context("gemini non-2xx")?;

        let body: GenerateResponse = resp.json().await.context("gemini response json")?;
        let text = body
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.trim().to_string())
            .unwrap_or_default();
        if text.is_empty() {
            return Err(anyhow!("gemini returned no candidate text"));
        }
        let usage = body
            .usage_metadata
            .map(|m| TokenUsage {
                input_tokens: m.prompt_token_count,
                output_tokens: m.candidates_token_count,
            })
            .unwrap_or_default();
        Ok(LlmReply { text, usage })
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}

// ---- Mock ----

/// Deterministic provider for tests: hands out queued replies in order,
/// `None` entries fail the call. An exhausted queue also fails.
pub struct MockLlm {
    replies: Mutex<VecDeque<Option<String>>>,
}

impl MockLlm {
    pub fn new(replies: Vec<Option<String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
        }
    }

    /// Convenience: a mock that always returns the same text.
    pub fn always(text: &str) -> Self {
        Self::new(vec![Some(text.to_string()); 64])
    }
}

#[async_trait]
impl LlmProvider for MockLlm {
    async fn generate(&self, _prompt: &str) -> Result<LlmReply> {
        let next = self.replies.lock().expect("poisoned mock queue").pop_front();
        match next {
            Some(Some(text)) => Ok(LlmReply {
                text,
                usage: TokenUsage {
                    input_tokens: 10,
                    output_tokens: 10,
                },
            }),
            Some(None) => Err(anyhow!("mock llm failure")),
            None => Err(anyhow!("mock llm queue exhausted")),
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
