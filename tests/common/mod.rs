// tests/common/mod.rs
// Shared test doubles for the poll pipeline.
#![allow(dead_code)]

use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;

use portal_watch::fetch::render::{RenderBackend, RenderRequest};
use portal_watch::fetch::FetchStrategy;
use portal_watch::notify::{Alert, Notifier};
use portal_watch::store::WatermarkStore;
use portal_watch::NotificationRecord;

pub const NOTIFICATIONS_HTML: &str = include_str!("../fixtures/notifications.html");
pub const LOGIN_HTML: &str = include_str!("../fixtures/login.html");

pub fn day(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap()
}

pub fn rec(id: &str, d: u32) -> NotificationRecord {
    NotificationRecord {
        id: id.to_string(),
        title: Some(format!("Notificación {id}")),
        text: Some("cuerpo".into()),
        application: None,
        application_link: None,
        kind: Some("Aviso".into()),
        date: day(d),
        raw_markup: String::new(),
    }
}

/// Strategy returning a canned result every time.
pub struct StaticStrategy {
    pub name: &'static str,
    pub items: Option<Vec<NotificationRecord>>,
}

impl StaticStrategy {
    pub fn ok(name: &'static str, items: Vec<NotificationRecord>) -> Box<dyn FetchStrategy> {
        Box::new(Self {
            name,
            items: Some(items),
        })
    }

    pub fn failing(name: &'static str) -> Box<dyn FetchStrategy> {
        Box::new(Self { name, items: None })
    }
}

#[async_trait]
impl FetchStrategy for StaticStrategy {
    async fn fetch(&self) -> Result<Vec<NotificationRecord>> {
        self.items
            .clone()
            .ok_or_else(|| anyhow!("{} unreachable", self.name))
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

/// Records every alert it is handed; optionally fails each send.
#[derive(Clone)]
pub struct RecordingNotifier {
    pub name: &'static str,
    pub sent: Arc<Mutex<Vec<Alert>>>,
    pub fail: bool,
}

impl RecordingNotifier {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            sent: Arc::new(Mutex::new(Vec::new())),
            fail: false,
        }
    }

    pub fn failing(name: &'static str) -> Self {
        Self {
            fail: true,
            ..Self::new(name)
        }
    }

    pub fn sent_dates(&self) -> Vec<DateTime<Utc>> {
        self.sent.lock().iter().map(|a| a.date).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, alert: &Alert) -> Result<()> {
        self.sent.lock().push(alert.clone());
        if self.fail {
            Err(anyhow!("{} transport down", self.name))
        } else {
            Ok(())
        }
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

/// Store whose writes always fail.
#[derive(Default)]
pub struct BrokenStore {
    pub current: Option<DateTime<Utc>>,
}

#[async_trait]
impl WatermarkStore for BrokenStore {
    async fn load(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self.current)
    }

    async fn save(&self, _ts: DateTime<Utc>) -> Result<()> {
        Err(anyhow!("disk full"))
    }
}

/// Render backend returning canned markup (or failing) and remembering requests.
#[derive(Default)]
pub struct StubRenderer {
    pub html: Option<String>,
    pub requests: Mutex<Vec<RenderRequest>>,
}

#[async_trait]
impl RenderBackend for StubRenderer {
    async fn render(&self, req: &RenderRequest) -> Result<String> {
        self.requests.lock().push(req.clone());
        self.html
            .clone()
            .ok_or_else(|| anyhow!("render timeout after {}ms", req.timeout_ms))
    }
}
