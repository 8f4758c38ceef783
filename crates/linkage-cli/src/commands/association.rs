//! `start_enhanced_association` (§6, §4.7).

use std::path::PathBuf;

use clap::Args;
use linkage_aggregate::regenerate_all;
use linkage_core::{AssociationStrategy, Error};
use linkage_match::InMemorySecondaryIndex;
use linkage_store::{AssociationStore, InMemoryAssociationStore, InMemoryLinkageStore, LinkageStore};

use crate::error::CliResult;
use crate::fixtures;
use crate::output;

fn parse_strategy(s: &str) -> Result<AssociationStrategy, Error> {
    match s {
        "building_based" => Ok(AssociationStrategy::BuildingBased),
        "unit_based" => Ok(AssociationStrategy::UnitBased),
        "hybrid" => Ok(AssociationStrategy::Hybrid),
        other => Err(Error::invalid("strategy", format!("unknown association strategy: {other}"))),
    }
}

#[derive(Args, Debug)]
pub struct StartAssociationArgs {
    #[arg(long)]
    pub primary: PathBuf,
    #[arg(long)]
    pub secondary: PathBuf,
    #[arg(long)]
    pub store: PathBuf,
    #[arg(long)]
    pub associations: PathBuf,
    /// `building_based`, `unit_based`, or `hybrid`.
    #[arg(long)]
    pub strategy: String,
    #[arg(long)]
    pub clear_existing: bool,
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: StartAssociationArgs) -> CliResult<()> {
    let primary = fixtures::load_units(&args.primary)?;
    let secondary = fixtures::load_units(&args.secondary)?;
    let strategy = parse_strategy(&args.strategy)?;

    let secondary_index = InMemorySecondaryIndex::build(secondary);
    let linkage_store = InMemoryLinkageStore::new();
    for result in fixtures::load_results(&args.store)? {
        linkage_store.upsert(result).await.map_err(linkage_core::Error::from)?;
    }
    let association_store = InMemoryAssociationStore::new();
    for association in fixtures::load_associations(&args.associations)? {
        association_store.upsert(association).await.map_err(linkage_core::Error::from)?;
    }

    let written = regenerate_all(
        &linkage_store,
        &secondary_index,
        &association_store,
        &primary,
        strategy,
        args.clear_existing,
    )
    .await
    .map_err(|e| Error::AggregationFailed(e.to_string()))?;

    let all = association_store.all().await.map_err(linkage_core::Error::from)?;
    fixtures::save_associations(&args.associations, &all)?;

    output::json_or_table(args.json, &serde_json::json!({"written": written}), || {
        output::success(&format!("regenerated {written} enhanced associations"));
    });
    Ok(())
}
