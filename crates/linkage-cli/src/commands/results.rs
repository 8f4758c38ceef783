//! `list_results` / `get_result` / `set_review_status` (§6).

use std::path::PathBuf;

use clap::Args;
use linkage_core::{Error, MatchType, ReviewStatus};
use linkage_store::{InMemoryLinkageStore, LinkageStore, ResultFilter};

use crate::error::CliResult;
use crate::fixtures;
use crate::output;

fn parse_match_type(s: &str) -> Result<MatchType, Error> {
    match s {
        "exact_credit_code" => Ok(MatchType::ExactCreditCode),
        "exact_name_canonical" => Ok(MatchType::ExactNameCanonical),
        "fuzzy_prefiltered" => Ok(MatchType::FuzzyPrefiltered),
        "fuzzy_global" => Ok(MatchType::FuzzyGlobal),
        "graph_assisted" => Ok(MatchType::GraphAssisted),
        "none" => Ok(MatchType::None),
        other => Err(Error::invalid("match_type", format!("unknown match type: {other}"))),
    }
}

fn parse_review_status(s: &str) -> Result<ReviewStatus, Error> {
    match s {
        "pending" => Ok(ReviewStatus::Pending),
        "approved" => Ok(ReviewStatus::Approved),
        "rejected" => Ok(ReviewStatus::Rejected),
        other => Err(Error::invalid("review_status", format!("unknown review status: {other}"))),
    }
}

async fn load_store(path: &PathBuf) -> CliResult<InMemoryLinkageStore> {
    let store = InMemoryLinkageStore::new();
    for result in fixtures::load_results(path)? {
        store.upsert(result).await.map_err(linkage_core::Error::from)?;
    }
    Ok(store)
}

#[derive(Args, Debug)]
pub struct ListResultsArgs {
    #[arg(long)]
    pub store: PathBuf,
    #[arg(long)]
    pub match_type: Option<String>,
    #[arg(long)]
    pub review_status: Option<String>,
    #[arg(long)]
    pub name_query: Option<String>,
    #[arg(long, default_value_t = 0)]
    pub page: usize,
    #[arg(long, default_value_t = 20)]
    pub page_size: usize,
    #[arg(long)]
    pub json: bool,
}

pub async fn list(args: ListResultsArgs) -> CliResult<()> {
    let store = load_store(&args.store).await?;
    let filter = ResultFilter {
        match_type: args.match_type.as_deref().map(parse_match_type).transpose()?,
        review_status: args.review_status.as_deref().map(parse_review_status).transpose()?,
        name_query: args.name_query.clone(),
    };
    let page = store.iter_pending(filter, args.page, args.page_size).await.map_err(linkage_core::Error::from)?;

    output::json_or_table(args.json, &page.items, || {
        let mut table = output::CliTable::new(vec!["PRIMARY_ID", "MATCHED_ID", "MATCH_TYPE", "SCORE", "REVIEW"]);
        for result in &page.items {
            table.add_row(vec![
                result.primary_id.clone(),
                result.matched_id.clone().unwrap_or_else(|| "-".to_string()),
                result.match_type.as_str().to_string(),
                format!("{:.2}", result.similarity_score),
                result.review_status.as_str().to_string(),
            ]);
        }
        table.render();
        println!("page {} of {} ({} total)", args.page, (page.total.max(1) - 1) / args.page_size.max(1) + 1, page.total);
    });
    Ok(())
}

#[derive(Args, Debug)]
pub struct GetResultArgs {
    #[arg(long)]
    pub store: PathBuf,
    /// Either the `primary_id` or the `match_id`.
    pub id: String,
    #[arg(long)]
    pub json: bool,
}

pub async fn get(args: GetResultArgs) -> CliResult<()> {
    let store = load_store(&args.store).await?;
    let found = store.get(&args.id).await.map_err(linkage_core::Error::from)?;
    let found = match found {
        Some(r) => Some(r),
        None => store.get_by_match_id(&args.id).await.map_err(linkage_core::Error::from)?,
    };
    let result = found.ok_or_else(|| Error::not_found("LinkageResult", args.id.clone()))?;

    output::json_or_table(args.json, &result, || {
        output::kv("match_id", &result.match_id);
        output::kv("primary_id", &result.primary_id);
        output::kv("matched_id", result.matched_id.as_deref().unwrap_or("-"));
        output::kv("match_type", result.match_type.as_str());
        output::kv("similarity_score", &format!("{:.4}", result.similarity_score));
        output::kv("review_status", result.review_status.as_str());
        for line in &result.match_explanation.positive {
            output::kv("+", line);
        }
        for line in &result.match_explanation.negative {
            output::kv("-", line);
        }
    });
    Ok(())
}

#[derive(Args, Debug)]
pub struct SetReviewStatusArgs {
    #[arg(long)]
    pub store: PathBuf,
    #[arg(long)]
    pub match_id: String,
    /// `approved`, `rejected`, or `pending`.
    #[arg(long)]
    pub status: String,
    #[arg(long)]
    pub notes: Option<String>,
    #[arg(long)]
    pub reviewer: String,
    #[arg(long)]
    pub json: bool,
}

pub async fn set_review_status(args: SetReviewStatusArgs) -> CliResult<()> {
    let store = load_store(&args.store).await?;
    let status = parse_review_status(&args.status)?;
    let existing = store
        .get_by_match_id(&args.match_id)
        .await
        .map_err(linkage_core::Error::from)?
        .ok_or_else(|| Error::not_found("LinkageResult", args.match_id.clone()))?;

    let updated = store
        .set_review(&existing.primary_id, status, args.notes.clone(), args.reviewer.clone(), Some(existing.updated_time))
        .await
        .map_err(linkage_core::Error::from)?;

    let all = store
        .iter_pending(ResultFilter::default(), 0, usize::MAX)
        .await
        .map_err(linkage_core::Error::from)?;
    fixtures::save_results(&args.store, &all.items)?;

    output::json_or_table(args.json, &updated, || {
        output::success(&format!("{} set to {}", updated.match_id, updated.review_status.as_str()));
    });
    Ok(())
}
