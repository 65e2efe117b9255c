//! CLI interface for arb-scout
//!
//! Provides subcommands for:
//! - `run`: Start the detection engine
//! - `pairs`: Run one filter cycle and print the accepted pairs
//! - `config`: Show the effective configuration

mod pairs;
mod run;

pub use pairs::PairsArgs;
pub use run::RunArgs;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "arb-scout")]
#[command(about = "Real-time cross-exchange and triangular arbitrage detection")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the detection engine
    Run(RunArgs),
    /// Run one filter cycle and print the accepted pairs
    Pairs(PairsArgs),
    /// Show the effective configuration
    Config,
}
