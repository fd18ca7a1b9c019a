mod cli_tests;
mod execute;
mod output;

pub use execute::QueryResult;

use std::path::PathBuf;

use clap::Args;

/// Run a query descriptor against the configured database
#[derive(Args, Debug)]
#[command(after_help = "\
Examples:
  dbal query query.json                          # Use .dbal.json or DATABASE_URL
  dbal query --db ./app.sqlite query.json        # Explicit SQLite file
  echo '{\"sql\": \"SELECT 1 AS one\"}' | dbal query --db :memory:")]
pub struct QueryCmd {
    /// Descriptor file (JSON). Reads stdin when omitted or `-`
    pub file: Option<PathBuf>,
}
