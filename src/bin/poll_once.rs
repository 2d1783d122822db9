//! Runs exactly one poll cycle from the environment and prints the report.
//! `--dry-run` keeps the watermark in memory and sends nothing.

use std::sync::Arc;

use portal_watch::fetch::Fetcher;
use portal_watch::notify::NotifierMux;
use portal_watch::store::MemoryStore;
use portal_watch::{init_tracing, Config, Poller};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = Config::load()?;
    let dry_run = std::env::args().any(|a| a == "--dry-run");

    let poller = if dry_run {
        Poller::new(
            Fetcher::from_config(&cfg)?,
            Arc::new(MemoryStore::default()),
            NotifierMux::default(),
        )
        .with_seed_on_first_run(cfg.poll.seed_on_first_run)
    } else {
        Poller::from_config(&cfg)?
    };

    let report = poller.run_once().await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
