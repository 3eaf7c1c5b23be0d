mod config;

use clap::Parser;
use config::Cli;
use pkgdispatch::{Dispatcher, Publisher, Scheduler, SqlSource, DISPATCH_PERIOD};
use std::sync::Arc;

#[tokio::main]
pub async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = Cli::parse().run().await {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let pool = self.connect_database().await?;
        let queue = self.connect_queue().await?;

        let dispatcher = Arc::new(Dispatcher::new(
            SqlSource::new(pool),
            Publisher::new(queue, self.batch_policy.into()),
        ));

        if self.once {
            let outcome = dispatcher.run_cycle().await;
            println!("{}", serde_json::to_string(&outcome)?);
            return Ok(());
        }

        log::info!(
            "[dispatcher] dispatching every {}h to {}",
            DISPATCH_PERIOD.as_secs() / 3600,
            self.queue_url
        );

        let stats = Scheduler::new(DISPATCH_PERIOD, self.overlap.into())
            .run(dispatcher, async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    log::error!("[dispatcher] failed to listen for shutdown signal: {}", e);
                    std::future::pending::<()>().await;
                }
            })
            .await;

        log::info!(
            "[dispatcher] stopped after {} cycles ({} ticks skipped).",
            stats.cycles_started,
            stats.ticks_skipped
        );

        Ok(())
    }
}
