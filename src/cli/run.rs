//! Run command implementation

use crate::config::Config;
use crate::connector::LiveConnector;
use crate::engine::Engine;
use clap::Args;
use std::sync::Arc;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Log every emitted opportunity to stdout as JSON
    #[arg(long)]
    pub json_opportunities: bool,
}

impl RunArgs {
    pub async fn execute(&self, config: Config) -> anyhow::Result<()> {
        let connector = LiveConnector::new(&config.exchanges, &config.filter.quote_currencies);
        let engine = Arc::new(Engine::new(config, connector));

        if self.json_opportunities {
            let mut opportunities = engine.bus().subscribe();
            tokio::spawn(async move {
                while let Some(opportunity) = opportunities.recv().await {
                    match serde_json::to_string(&opportunity) {
                        Ok(line) => println!("{line}"),
                        Err(e) => tracing::warn!(error = %e, "Opportunity serialization failed"),
                    }
                }
            });
        }

        {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("Interrupt received, shutting down");
                    engine.shutdown();
                }
            });
        }

        engine.run().await
    }
}
