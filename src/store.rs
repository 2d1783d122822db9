// src/store.rs
//! Watermark persistence: one timestamp under a fixed key.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;

pub const WATERMARK_KEY: &str = "last_seen";

#[async_trait]
pub trait WatermarkStore: Send + Sync {
    /// `None` means no history yet.
    async fn load(&self) -> Result<Option<DateTime<Utc>>>;
    async fn save(&self, ts: DateTime<Utc>) -> Result<()>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreDoc {
    #[serde(default)]
    meta: BTreeMap<String, String>,
}

/// JSON document on disk: `{"meta": {"last_seen": "<rfc3339>"}}`. Other keys
/// in `meta` are preserved across saves.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_doc(&self) -> Result<StoreDoc> {
        match fs::read_to_string(&self.path).await {
            Ok(s) if s.trim().is_empty() => Ok(StoreDoc::default()),
            Ok(s) => serde_json::from_str(&s)
                .with_context(|| format!("parsing store {}", self.path.display())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(StoreDoc::default()),
            Err(e) => Err(e).with_context(|| format!("reading store {}", self.path.display())),
        }
    }
}

#[async_trait]
impl WatermarkStore for JsonFileStore {
    async fn load(&self) -> Result<Option<DateTime<Utc>>> {
        let doc = self.read_doc().await?;
        let Some(raw) = doc.meta.get(WATERMARK_KEY) else {
            return Ok(None);
        };
        // An unreadable value is treated as no history rather than a dead store.
        match DateTime::parse_from_rfc3339(raw) {
            Ok(dt) => Ok(Some(dt.with_timezone(&Utc))),
            Err(e) => {
                tracing::warn!(target: "store", value = %raw, error = %e, "ignoring unreadable watermark");
                Ok(None)
            }
        }
    }

    async fn save(&self, ts: DateTime<Utc>) -> Result<()> {
        let mut doc = self.read_doc().await?;
        doc.meta.insert(WATERMARK_KEY.to_string(), ts.to_rfc3339());

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .await
                .with_context(|| format!("creating {}", dir.display()))?;
        }
        let bytes = serde_json::to_vec_pretty(&doc).context("serializing store")?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, bytes)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("replacing {}", self.path.display()))?;
        Ok(())
    }
}

/// Process-local store for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Option<DateTime<Utc>>>,
}

impl MemoryStore {
    pub fn new(initial: Option<DateTime<Utc>>) -> Self {
        Self {
            inner: Mutex::new(initial),
        }
    }
}

#[async_trait]
impl WatermarkStore for MemoryStore {
    async fn load(&self) -> Result<Option<DateTime<Utc>>> {
        let g = self
            .inner
            .lock()
            .map_err(|_| anyhow!("watermark mutex poisoned"))?;
        Ok(*g)
    }

    async fn save(&self, ts: DateTime<Utc>) -> Result<()> {
        let mut g = self
            .inner
            .lock()
            .map_err(|_| anyhow!("watermark mutex poisoned"))?;
        *g = Some(ts);
        Ok(())
    }
}
