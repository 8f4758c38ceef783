//! `get_statistics` (§6).

use std::path::PathBuf;

use clap::Args;
use linkage_store::{InMemoryLinkageStore, LinkageStore};

use crate::error::CliResult;
use crate::fixtures;
use crate::output;

#[derive(Args, Debug)]
pub struct StatisticsArgs {
    #[arg(long)]
    pub store: PathBuf,
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: StatisticsArgs) -> CliResult<()> {
    let store = InMemoryLinkageStore::new();
    for result in fixtures::load_results(&args.store)? {
        store.upsert(result).await.map_err(linkage_core::Error::from)?;
    }
    let stats = store.statistics().await.map_err(linkage_core::Error::from)?;

    output::json_or_table(args.json, &stats_as_json(&stats), || {
        output::kv("by_match_type", "");
        for (k, v) in &stats.by_match_type {
            output::kv(&format!("  {k}"), &v.to_string());
        }
        output::kv("by_confidence", "");
        for (k, v) in &stats.by_confidence {
            output::kv(&format!("  {k}"), &v.to_string());
        }
        output::kv("by_review_status", "");
        for (k, v) in &stats.by_review_status {
            output::kv(&format!("  {k}"), &v.to_string());
        }
    });
    Ok(())
}

fn stats_as_json(stats: &linkage_store::Statistics) -> serde_json::Value {
    serde_json::json!({
        "by_match_type": stats.by_match_type,
        "by_confidence": stats.by_confidence,
        "by_review_status": stats.by_review_status,
    })
}
