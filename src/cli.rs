use clap::{Args, Parser, Subcommand, ValueEnum, ValueHint};
use std::path::PathBuf;

/// District screening CLI (argument schema only)
#[derive(Parser, Debug)]
#[command(name = "geoscreen", version, about, propagate_version = true)]
pub struct Cli {
    /// Increase output verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one screening scenario and write the result table
    Screen(ScreenArgs),
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, ValueEnum)]
pub enum OutputFormat {
    Csv,
    Json,
}

#[derive(Args, Debug)]
pub struct ScreenArgs {
    /// Portal configuration file (levels, mappings, projections)
    #[arg(value_hint = ValueHint::FilePath)]
    pub config: PathBuf,

    /// Scenario file describing one run (level, stats, layers)
    #[arg(value_hint = ValueHint::FilePath)]
    pub scenario: PathBuf,

    /// Output table file
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub out: PathBuf,

    /// Output encoding
    #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
    pub format: OutputFormat,

    /// Overrides the service registry URL from the configuration
    #[arg(long)]
    pub services: Option<String>,

    /// Drop all cached features and fetch everything again
    #[arg(long)]
    pub refresh: bool,
}
