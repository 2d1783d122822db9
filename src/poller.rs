// src/poller.rs
//! One poll cycle: Fetch → ComputeDelta → Notify → AdvanceWatermark.
//!
//! The watermark is the date of the newest record already handled. A record is
//! new iff its date is strictly later. After any non-empty fetch the watermark
//! becomes the newest date seen in that fetch, whether or not it was alerted.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::fetch::{FetchOutcome, Fetcher, StrategyFailure};
use crate::notify::{Alert, NotifierMux};
use crate::scrape::NotificationRecord;
use crate::store::{JsonFileStore, WatermarkStore};

#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleReport {
    /// True iff at least one record was new this cycle.
    pub notified: bool,
    pub fetched: usize,
    pub new_items: usize,
    pub delivered: usize,
    pub failed_deliveries: usize,
    pub strategy: Option<&'static str>,
    pub watermark_before: Option<DateTime<Utc>>,
    pub watermark_after: Option<DateTime<Utc>>,
    /// Watermark was seeded from this snapshot without alerting.
    pub seeded: bool,
    /// Why nothing was fetched, one line per strategy.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fetch_failures: Vec<String>,
    /// Ids of the new records, oldest first.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub new_ids: Vec<String>,
}

/// Records strictly newer than `watermark` (all of them without one), oldest first.
pub fn compute_delta(
    items: &[NotificationRecord],
    watermark: Option<DateTime<Utc>>,
) -> Vec<&NotificationRecord> {
    let mut fresh: Vec<&NotificationRecord> = items
        .iter()
        .filter(|i| watermark.map_or(true, |w| i.date > w))
        .collect();
    fresh.sort_by_key(|i| i.date);
    fresh
}

pub fn newest_date(items: &[NotificationRecord]) -> Option<DateTime<Utc>> {
    items.iter().map(|i| i.date).max()
}

pub struct Poller {
    fetcher: Fetcher,
    store: Arc<dyn WatermarkStore>,
    notifier: NotifierMux,
    seed_on_first_run: bool,
    /// Held for a whole cycle so the scheduled loop and manual triggers never
    /// interleave their watermark read/write.
    cycle: Mutex<()>,
}

impl Poller {
    pub fn new(fetcher: Fetcher, store: Arc<dyn WatermarkStore>, notifier: NotifierMux) -> Self {
        Self {
            fetcher,
            store,
            notifier,
            seed_on_first_run: false,
            cycle: Mutex::new(()),
        }
    }

    pub fn with_seed_on_first_run(mut self, seed: bool) -> Self {
        self.seed_on_first_run = seed;
        self
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        Ok(Self::new(
            Fetcher::from_config(cfg)?,
            Arc::new(JsonFileStore::new(cfg.store.path.clone())),
            NotifierMux::from_config(cfg),
        )
        .with_seed_on_first_run(cfg.poll.seed_on_first_run))
    }

    pub fn strategies(&self) -> Vec<&'static str> {
        self.fetcher.strategy_names()
    }

    pub fn channels(&self) -> Vec<&'static str> {
        self.notifier.channels()
    }

    /// Run one cycle to completion. `Err` only when the watermark store fails;
    /// fetch and transport problems are folded into the report.
    pub async fn run_once(&self) -> Result<CycleReport> {
        let _guard = self.cycle.lock().await;
        crate::metrics::ensure_described();
        counter!("poll_cycles_total").increment(1);

        let out = self.cycle_inner().await;
        if out.is_err() {
            counter!("poll_cycle_errors_total").increment(1);
        }
        gauge!("poll_last_run_ts").set(Utc::now().timestamp() as f64);
        out
    }

    async fn cycle_inner(&self) -> Result<CycleReport> {
        let mut report = CycleReport::default();

        // Fetch
        let (strategy, items) = match self.fetcher.fetch().await {
            FetchOutcome::Items { strategy, items } => (strategy, items),
            FetchOutcome::Unavailable { failures } => {
                tracing::info!(
                    target: "poller",
                    tried = failures.len(),
                    "nothing fetched; watermark untouched"
                );
                report.fetch_failures = failures.iter().map(describe_failure).collect();
                return Ok(report);
            }
        };
        report.strategy = Some(strategy);
        report.fetched = items.len();

        // ComputeDelta
        let watermark = self.store.load().await.context("loading watermark")?;
        report.watermark_before = watermark;

        if watermark.is_none() && self.seed_on_first_run {
            report.seeded = true;
        } else {
            let fresh = compute_delta(&items, watermark);
            report.new_items = fresh.len();
            counter!("notifications_new_total").increment(fresh.len() as u64);

            // Notify
            for item in fresh {
                let alert = Alert::for_record(item);
                for d in self.notifier.notify(&alert).await {
                    if d.ok {
                        report.delivered += 1;
                    } else {
                        report.failed_deliveries += 1;
                    }
                }
                tracing::debug!(target: "poller", id = %item.id, date = %item.date, "alerted");
                report.new_ids.push(item.id.clone());
                report.notified = true;
            }
        }

        // AdvanceWatermark
        if let Some(newest) = newest_date(&items) {
            self.store
                .save(newest)
                .await
                .context("saving watermark")?;
            report.watermark_after = Some(newest);
            gauge!("poll_watermark_ts").set(newest.timestamp() as f64);
        }

        tracing::info!(
            target: "poller",
            strategy,
            fetched = report.fetched,
            new = report.new_items,
            delivered = report.delivered,
            failed = report.failed_deliveries,
            seeded = report.seeded,
            "poll cycle done"
        );
        Ok(report)
    }
}

fn describe_failure(f: &StrategyFailure) -> String {
    format!("{}: {}", f.strategy, f.reason)
}
