// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod api;
pub mod config;
pub mod metrics;
pub mod poller;
pub mod scheduler;
pub mod store;

// Extraction core: dates → rows → pages
pub mod scrape;

// Portal access: render service, form login, anonymous GET
pub mod fetch;

// Outbound alerts (email, messaging API)
pub mod notify;

// ---- Re-exports for stable public API ----
pub use crate::api::create_router;
pub use crate::config::Config;
pub use crate::poller::{CycleReport, Poller};
pub use crate::scrape::NotificationRecord;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber: `RUST_LOG` filter (default
/// `portal_watch=info,warn`), compact output, or JSON with `LOG_FORMAT=json`.
/// A subscriber installed earlier (e.g. by the deploy runtime) is left alone.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("portal_watch=info,warn"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let result = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };
    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
