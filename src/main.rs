//! portal-watch binary entrypoint.
//! Boots the Axum HTTP server and the background poll loop sharing one `Poller`.

use std::sync::Arc;
use std::time::Duration;

use shuttle_axum::ShuttleAxum;

use portal_watch::api::{self, AppState};
use portal_watch::metrics::Metrics;
use portal_watch::scheduler::spawn_poll_scheduler;
use portal_watch::{init_tracing, Config, Poller};

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = Config::load()?;
    let metrics = Metrics::init()?;

    let poller = Arc::new(Poller::from_config(&cfg)?);
    tracing::info!(
        strategies = ?poller.strategies(),
        channels = ?poller.channels(),
        interval_secs = cfg.poll.interval_secs,
        "portal-watch starting"
    );
    spawn_poll_scheduler(poller.clone(), Duration::from_secs(cfg.poll.interval_secs));

    let state = AppState {
        poller,
        summary: Arc::new(cfg.summary()),
    };
    let router = api::create_router(state).merge(metrics.router());

    Ok(router.into())
}
