mod prices;
mod universe;

use serde::Serialize;

use crate::cli::{Cli, Command};
use crate::error::CliError;

/// Outcome of one command, printed to stdout.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Summary {
    Written(prices::PricesSummary),
    Skipped { reason: String },
    Universe(universe::UniverseSummary),
}

pub async fn run(cli: &Cli) -> Result<Summary, CliError> {
    match &cli.command {
        Command::Prices(args) => prices::run(args, cli.timeout_ms).await,
        Command::Universe(args) => universe::run(args, cli.timeout_ms).await,
    }
}
