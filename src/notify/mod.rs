// src/notify/mod.rs
//! Outbound alerts. Each transport implements [`Notifier`]; [`NotifierMux`]
//! fans an alert out and never lets one transport's failure affect another.

pub mod email;
pub mod message;

use anyhow::Result;
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Serialize;

use crate::config::Config;
use crate::scrape::NotificationRecord;

pub use email::EmailNotifier;
pub use message::MessageNotifier;

/// Rendered subject/body for one new notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub subject: String,
    pub body: String,
    pub record_id: String,
    pub date: DateTime<Utc>,
}

impl Alert {
    pub fn for_record(r: &NotificationRecord) -> Self {
        let subject = format!(
            "Nueva notificacion: {}",
            r.title.as_deref().unwrap_or("sin titulo")
        );
        let body = format!(
            "{}\nAplicacion: {}\nLink: {}\nFecha: {}",
            r.text.as_deref().unwrap_or_default(),
            r.application.as_deref().unwrap_or_default(),
            r.application_link.as_deref().unwrap_or_default(),
            r.date.to_rfc3339()
        );
        Self {
            subject,
            body,
            record_id: r.id.clone(),
            date: r.date,
        }
    }
}

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, alert: &Alert) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Per-transport result of one alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Delivery {
    pub channel: &'static str,
    pub ok: bool,
}

#[derive(Default)]
pub struct NotifierMux {
    notifiers: Vec<Box<dyn Notifier>>,
}

impl NotifierMux {
    pub fn new(notifiers: Vec<Box<dyn Notifier>>) -> Self {
        Self { notifiers }
    }

    /// Build every transport the configuration fully describes. A transport
    /// with a destination but broken settings is logged and left out.
    pub fn from_config(cfg: &Config) -> Self {
        let mut notifiers: Vec<Box<dyn Notifier>> = Vec::new();

        match EmailNotifier::from_config(&cfg.email) {
            Ok(Some(n)) => notifiers.push(Box::new(n)),
            Ok(None) => tracing::debug!(target: "notify", "email disabled (no NOTIFY_EMAIL)"),
            Err(e) => tracing::warn!(target: "notify", error = ?e, "email transport unavailable"),
        }
        match MessageNotifier::from_config(&cfg.message) {
            Ok(Some(n)) => notifiers.push(Box::new(n)),
            Ok(None) => tracing::debug!(target: "notify", "messaging disabled (no NOTIFY_MESSAGE_TO)"),
            Err(e) => tracing::warn!(target: "notify", error = ?e, "message transport unavailable"),
        }
        Self { notifiers }
    }

    pub fn channels(&self) -> Vec<&'static str> {
        self.notifiers.iter().map(|n| n.name()).collect()
    }

    pub async fn notify(&self, alert: &Alert) -> Vec<Delivery> {
        let mut out = Vec::with_capacity(self.notifiers.len());
        for n in &self.notifiers {
            let ok = match n.send(alert).await {
                Ok(()) => {
                    counter!("notifications_delivered_total", "channel" => n.name()).increment(1);
                    true
                }
                Err(e) => {
                    tracing::warn!(
                        target: "notify",
                        channel = n.name(),
                        id = %alert.record_id,
                        error = ?e,
                        "delivery failed"
                    );
                    counter!("notifications_failed_total", "channel" => n.name()).increment(1);
                    false
                }
            };
            out.push(Delivery {
                channel: n.name(),
                ok,
            });
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn record() -> NotificationRecord {
        NotificationRecord {
            id: "/apps/42".into(),
            title: None,
            text: Some("Se solicita documentación".into()),
            application: Some("Solicitud 42".into()),
            application_link: Some("/apps/42".into()),
            kind: None,
            date: Utc.with_ymd_and_hms(2024, 1, 3, 10, 15, 0).unwrap(),
            raw_markup: String::new(),
        }
    }

    #[test]
    fn alert_formatting() {
        let a = Alert::for_record(&record());
        assert_eq!(a.subject, "Nueva notificacion: sin titulo");
        assert_eq!(
            a.body,
            "Se solicita documentación\nAplicacion: Solicitud 42\nLink: /apps/42\nFecha: 2024-01-03T10:15:00+00:00"
        );
    }

    struct Flaky {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl Notifier for Flaky {
        async fn send(&self, _alert: &Alert) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(anyhow!("smtp down"))
            } else {
                Ok(())
            }
        }
        fn name(&self) -> &'static str {
            if self.fail {
                "email"
            } else {
                "message"
            }
        }
    }

    #[tokio::test]
    async fn one_failing_transport_does_not_block_the_other() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mux = NotifierMux::new(vec![
            Box::new(Flaky {
                calls: calls.clone(),
                fail: true,
            }),
            Box::new(Flaky {
                calls: calls.clone(),
                fail: false,
            }),
        ]);
        let out = mux.notify(&Alert::for_record(&record())).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(
            out,
            vec![
                Delivery {
                    channel: "email",
                    ok: false
                },
                Delivery {
                    channel: "message",
                    ok: true
                },
            ]
        );
    }
}
