// src/scheduler.rs
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::poller::Poller;

/// Run `poller` every `interval`, first tick immediately. Cycles never
/// overlap; a failed cycle is logged and the schedule carries on.
pub fn spawn_poll_scheduler(poller: Arc<Poller>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval.max(Duration::from_secs(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match poller.run_once().await {
                Ok(report) => tracing::debug!(
                    target: "poller",
                    notified = report.notified,
                    "scheduled tick"
                ),
                Err(e) => tracing::warn!(target: "poller", error = ?e, "scheduled cycle failed"),
            }
        }
    })
}
