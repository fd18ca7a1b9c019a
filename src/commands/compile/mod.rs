mod cli_tests;
mod execute;
mod output;

pub use execute::CompileResult;

use std::path::PathBuf;

use clap::Args;

use crate::dialect::Dialect;

/// Compile a query descriptor to SQL without touching a database
#[derive(Args, Debug)]
#[command(after_help = "\
Examples:
  dbal compile --dialect postgres query.json      # Compile a descriptor file
  echo '{\"tables\": \"account\"}' | dbal compile -D mysql
  dbal compile -D sqlite --format json query.json")]
pub struct CompileCmd {
    /// Target dialect: mysql, postgres or sqlite
    #[arg(short = 'D', long)]
    pub dialect: Dialect,

    /// Descriptor file (JSON). Reads stdin when omitted or `-`
    pub file: Option<PathBuf>,
}
