//! Operator CLI over the record-linkage engine's external-interfaces
//! table (§6): one subcommand per RPC, reading and writing the engine's
//! external collections as JSON files since no document database or
//! transport is in scope (§1 Non-goals).

#![forbid(unsafe_code)]

pub mod commands;
pub mod error;
pub mod fixtures;
pub mod output;

use clap::{Parser, Subcommand};

use commands::association::StartAssociationArgs;
use commands::match_task::{MatchStartArgs, StopTaskArgs, TaskProgressArgs};
use commands::results::{GetResultArgs, ListResultsArgs, SetReviewStatusArgs};
use commands::statistics::StatisticsArgs;
use error::CliError;

#[derive(Parser, Debug)]
#[command(name = "linkage", version, about = "Record-linkage engine operator CLI")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// `start_match_task`: run the Batch Task Engine to completion.
    MatchStart(MatchStartArgs),
    /// `get_task_progress`: read the progress snapshot of a running or
    /// finished task.
    TaskProgress(TaskProgressArgs),
    /// `stop_task`: request cancellation of a running task.
    StopTask(StopTaskArgs),
    /// `list_results`: paginated, filtered read of `linkage_results`.
    ListResults(ListResultsArgs),
    /// `get_result`: read one result by primary id or match id.
    GetResult(GetResultArgs),
    /// `set_review_status`: apply a human review decision.
    SetReviewStatus(SetReviewStatusArgs),
    /// `start_enhanced_association`: regenerate `enhanced_associations`.
    StartAssociation(StartAssociationArgs),
    /// `get_statistics`: counts by match type, confidence, and review status.
    Statistics(StatisticsArgs),
}

/// Parse `argv`, execute, and return the process exit code — never panics
/// on bad input, matching the contract-error surface of §6/§7.
pub async fn run() -> i32 {
    let cli = Cli::parse();
    match execute(cli).await {
        Ok(()) => 0,
        Err(err) => {
            output::error(&err.to_string());
            err.exit_code()
        }
    }
}

async fn execute(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::MatchStart(args) => commands::match_task::run(args).await,
        Commands::TaskProgress(args) => commands::match_task::progress(args),
        Commands::StopTask(args) => commands::match_task::stop(args),
        Commands::ListResults(args) => commands::results::list(args).await,
        Commands::GetResult(args) => commands::results::get(args).await,
        Commands::SetReviewStatus(args) => commands::results::set_review_status(args).await,
        Commands::StartAssociation(args) => commands::association::run(args).await,
        Commands::Statistics(args) => commands::statistics::run(args).await,
    }
}
