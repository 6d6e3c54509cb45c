use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use geoscreen::cli::{Cli, Commands};
use geoscreen::commands::screen;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let default = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match &cli.command {
        Commands::Screen(args) => screen::run(&cli, args).await,
    }
}
