//! Community news digest.
//!
//! Aggregates longevity news and forum RSS/Atom feeds, drops items already
//! posted or older than the window, and posts the rest to Slack grouped by
//! source. Seen-item state persists in a local JSON file.
//!
//! Usage: `news-digest [--quiet]`

use longevity_lit_digest::pipeline;

#[tokio::main]
async fn main() -> std::process::ExitCode {
    dotenvy::dotenv().ok();
    pipeline::init_tracing(pipeline::quiet_flag());

    let result = pipeline::run_news().await;
    pipeline::finish(result, "news digest").await
}
