//! CLI argument definitions.
//!
//! This module contains the top-level CLI structure and shared types.
//! Individual command definitions are in the `commands` module.

use clap::Parser;

use crate::commands::Command;
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(author, version, about = "Compile and run structured SQL queries", long_about = None)]
pub struct Args {
    /// Database URL or SQLite path (overrides .dbal.json and DATABASE_URL)
    #[arg(short, long, global = true)]
    pub db: Option<String>,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    pub format: OutputFormat,

    /// Log filter, e.g. `warn`, `debug` or `dbal=trace`
    #[arg(long, default_value = "warn", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn test_global_defaults() {
        let args = Args::try_parse_from(["dbal", "compile", "--dialect", "sqlite"]).unwrap();
        assert_eq!(args.db, None);
        assert_eq!(args.format, OutputFormat::Text);
        assert_eq!(args.log_level, "warn");
    }

    #[rstest]
    fn test_global_options_after_subcommand() {
        let args = Args::try_parse_from([
            "dbal", "query", "--db", ":memory:", "--format", "json", "--log-level", "debug",
        ])
        .unwrap();
        assert_eq!(args.db.as_deref(), Some(":memory:"));
        assert_eq!(args.format, OutputFormat::Json);
        assert_eq!(args.log_level, "debug");
    }

    #[rstest]
    fn test_missing_subcommand_rejected() {
        assert!(Args::try_parse_from(["dbal"]).is_err());
    }
}
