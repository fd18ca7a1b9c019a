mod execute;
mod output;

pub use execute::ChangeResult;

use std::path::PathBuf;

use clap::Args;

/// Apply an insert or update descriptor to the configured database
#[derive(Args, Debug)]
#[command(after_help = "\
Examples:
  dbal change update.json                        # Use .dbal.json or DATABASE_URL
  dbal change --db ./app.sqlite insert.json      # Explicit SQLite file
  echo '{\"table\": \"account\", \"changes\": {\"balance\": 0}, \"where\": {\"id\": 7}}' | dbal change")]
pub struct ChangeCmd {
    /// Descriptor file (JSON). Reads stdin when omitted or `-`
    pub file: Option<PathBuf>,
}
