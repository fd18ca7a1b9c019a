//! Command definitions and implementations.
//!
//! Each command is defined in its own module with:
//! - The command struct with clap attributes for CLI parsing
//! - An `execute` module producing a serializable result
//! - An `output` module rendering that result as text

mod change;
mod compile;
mod query;

pub use change::ChangeCmd;
pub use compile::CompileCmd;
pub use query::QueryCmd;

use std::error::Error;
use std::fs;
use std::io::Read;
use std::path::Path;

use clap::Subcommand;

use crate::config::{ConfigFile, DatabaseConfig, Db};
use crate::output::{OutputFormat, Outputable};

/// Trait for executing commands with command-specific result types.
pub trait Execute {
    type Output: Outputable;

    /// `db_url` is the global `--db` option, when given.
    fn execute(self, db_url: Option<&str>) -> Result<Self::Output, Box<dyn Error>>;
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compile a query descriptor to SQL without touching a database
    Compile(CompileCmd),

    /// Run a query descriptor against the configured database
    Query(QueryCmd),

    /// Apply an insert or update descriptor to the configured database
    Change(ChangeCmd),

    /// Catch-all for unknown commands
    #[command(external_subcommand)]
    Unknown(Vec<String>),
}

impl Command {
    /// Execute the command and return formatted output
    pub fn run(self, db_url: Option<&str>, format: OutputFormat) -> Result<String, Box<dyn Error>> {
        match self {
            Command::Compile(cmd) => Ok(cmd.execute(db_url)?.format(format)),
            Command::Query(cmd) => Ok(cmd.execute(db_url)?.format(format)),
            Command::Change(cmd) => Ok(cmd.execute(db_url)?.format(format)),
            Command::Unknown(args) => {
                Err(format!("Unknown command: {}", args.first().map(String::as_str).unwrap_or_default()).into())
            }
        }
    }
}

/// Connect to `db_url`, or to the database named by configuration.
pub(crate) fn open_database(db_url: Option<&str>) -> Result<Db, Box<dyn Error>> {
    let db = match db_url {
        Some(url) => DatabaseConfig::from_url(url)?.connect()?,
        None => ConfigFile::resolve()?.connect()?,
    };
    Ok(db)
}

/// Read a JSON descriptor from `file`, or from stdin when absent or `-`.
pub(crate) fn read_descriptor(file: Option<&Path>) -> Result<serde_json::Value, Box<dyn Error>> {
    let content = match file {
        Some(path) if path != Path::new("-") => fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?,
        _ => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    serde_json::from_str(&content).map_err(|e| format!("Invalid JSON descriptor: {}", e).into())
}
