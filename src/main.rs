use clap::Parser;
use tracing_subscriber::EnvFilter;

use dbal::cli::Args;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let output = args.command.run(args.db.as_deref(), args.format)?;
    println!("{}", output);
    Ok(())
}
