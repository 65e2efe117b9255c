//! Pairs command implementation

use crate::config::Config;
use crate::connector::LiveConnector;
use crate::filter::PairFilter;
use clap::Args;

#[derive(Args, Debug)]
pub struct PairsArgs {
    /// Only show pairs on this exchange
    #[arg(short, long)]
    pub exchange: Option<String>,
}

impl PairsArgs {
    /// Run a single filter cycle and print the accepted set
    pub async fn execute(&self, config: Config) -> anyhow::Result<()> {
        let connector = LiveConnector::new(&config.exchanges, &config.filter.quote_currencies);
        let mut filter = PairFilter::new(config.filter.clone(), config.exchange_ids());
        filter.run_cycle(&connector).await;

        let wanted = self
            .exchange
            .as_deref()
            .map(crate::types::ExchangeId::new);
        let mut shown = 0usize;
        for pair in filter.accepted() {
            if let Some(ref exchange) = wanted {
                if &pair.exchange != exchange {
                    continue;
                }
            }
            println!("{pair}");
            shown += 1;
        }
        println!(
            "{} pair(s) accepted (volume >= {}, spread <= {}%)",
            shown, config.filter.min_volume_usd, config.filter.max_spread_percent
        );
        Ok(())
    }
}
