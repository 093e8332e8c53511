//! Outliner CLI entry point.

mod cli;

use clap::Parser;
use cli::Cli;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let options = cli.pipeline_options();
    if let Err(e) = outliner::pipeline::run(cli.input.as_deref(), cli.output.as_deref(), &options)
    {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
