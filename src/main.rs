use arb_scout::cli::{Cli, Commands};
use arb_scout::config::Config;
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::load(&cli.config).unwrap_or_else(|e| {
        eprintln!("Warning: Could not load config from {}: {}", cli.config, e);
        eprintln!("Using default configuration");
        toml::from_str(include_str!("../config.toml.example")).expect("Invalid default config")
    });

    arb_scout::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Run(args) => {
            tracing::info!("Starting detection engine");
            args.execute(config).await?;
        }
        Commands::Pairs(args) => {
            args.execute(config).await?;
        }
        Commands::Config => {
            println!("Current configuration:");
            for exchange in &config.exchanges {
                println!(
                    "  Exchange: {} (taker {} bps, maker {} bps)",
                    exchange.name, exchange.taker_fee_bps, exchange.maker_fee_bps
                );
            }
            println!(
                "  Filter: quotes={:?}, volume >= {}, spread <= {}%",
                config.filter.quote_currencies,
                config.filter.min_volume_usd,
                config.filter.max_spread_percent
            );
            println!(
                "  Detection: min profit {}%, epsilon {}%",
                config.detection.min_profit_percent, config.detection.profit_epsilon_percent
            );
            println!(
                "  Triangular: every {}s, cycle length <= {}",
                config.triangular.interval_secs, config.triangular.max_cycle_length
            );
        }
    }

    Ok(())
}
