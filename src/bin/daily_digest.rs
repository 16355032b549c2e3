//! Daily literature digest.
//!
//! Searches PubMed for recent aging/longevity papers, scores them with an
//! LLM, posts the top picks to Slack and appends them to the Notion log.
//!
//! Usage: `daily-digest [--quiet]`

use longevity_lit_digest::pipeline;

#[tokio::main]
async fn main() -> std::process::ExitCode {
    dotenvy::dotenv().ok();
    pipeline::init_tracing(pipeline::quiet_flag());

    let result = pipeline::run_daily().await;
    pipeline::finish(result, "daily digest").await
}
