//! Weekly frontier digest.
//!
//! Wider net than the daily run: PubMed plus bioRxiv/medRxiv preprints and
//! ITP papers, scored with an extra frontier dimension and published with
//! per-paper appraisals and an overview paragraph.
//!
//! Usage: `frontier-digest [--quiet]`

use longevity_lit_digest::pipeline;

#[tokio::main]
async fn main() -> std::process::ExitCode {
    dotenvy::dotenv().ok();
    pipeline::init_tracing(pipeline::quiet_flag());

    let result = pipeline::run_frontier().await;
    pipeline::finish(result, "frontier digest").await
}
