// src/fetch/mod.rs
//! Fetching the notifications page: rendered → logged-in session → anonymous.
//!
//! Every strategy reports `Result`; the fetcher keeps the failures so the poll
//! cycle can tell "portal had nothing" from "portal was unreachable".

pub mod auth;
pub mod render;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use metrics::counter;
use reqwest::Client;

use crate::config::Config;
use crate::scrape::{extract_html, NotificationRecord};
use auth::Authenticator;
use render::{HttpRenderBackend, RenderBackend, RenderRequest};

pub const USER_AGENT: &str = concat!("portal-watch/", env!("CARGO_PKG_VERSION"));

#[async_trait]
pub trait FetchStrategy: Send + Sync {
    /// Records found on the target page, newest first.
    async fn fetch(&self) -> Result<Vec<NotificationRecord>>;
    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Headless render through a [`RenderBackend`], with in-page login when
/// credentials are known.
pub struct RenderedStrategy {
    backend: Arc<dyn RenderBackend>,
    login_url: String,
    target_url: String,
    credentials: Option<Credentials>,
    timeout_ms: u64,
}

impl RenderedStrategy {
    pub fn new(
        backend: Arc<dyn RenderBackend>,
        login_url: String,
        target_url: String,
        credentials: Option<Credentials>,
        timeout_ms: u64,
    ) -> Self {
        Self {
            backend,
            login_url,
            target_url,
            credentials,
            timeout_ms,
        }
    }
}

#[async_trait]
impl FetchStrategy for RenderedStrategy {
    async fn fetch(&self) -> Result<Vec<NotificationRecord>> {
        let req = RenderRequest::new(
            &self.login_url,
            &self.target_url,
            self.credentials.as_ref().map(|c| c.username.as_str()),
            self.credentials.as_ref().map(|c| c.password.as_str()),
            self.timeout_ms,
        );
        let html = self.backend.render(&req).await.context("rendering page")?;
        Ok(extract_html(&html))
    }

    fn name(&self) -> &'static str {
        "rendered"
    }
}

/// Form login with a fresh cookie jar, then GET the target in that session.
pub struct SessionStrategy {
    login_url: String,
    target_url: String,
    credentials: Credentials,
    authenticator: Authenticator,
    timeout: Duration,
}

impl SessionStrategy {
    pub fn new(login_url: String, target_url: String, credentials: Credentials) -> Self {
        Self {
            login_url,
            target_url,
            credentials,
            authenticator: Authenticator::default(),
            timeout: Duration::from_secs(15),
        }
    }
}

#[async_trait]
impl FetchStrategy for SessionStrategy {
    async fn fetch(&self) -> Result<Vec<NotificationRecord>> {
        // One jar per attempt; sessions never outlive the fetch.
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .cookie_store(true)
            .build()
            .context("building session client")?;

        match self
            .authenticator
            .login(
                &client,
                &self.login_url,
                &self.credentials.username,
                &self.credentials.password,
            )
            .await
        {
            Ok(report) => tracing::debug!(
                target: "fetch",
                action = %report.action,
                status = report.status,
                "login submitted"
            ),
            // Best effort: the target may still be readable.
            Err(e) => tracing::warn!(target: "fetch", error = ?e, "login failed"),
        }

        get_and_extract(&client, &self.target_url, self.timeout).await
    }

    fn name(&self) -> &'static str {
        "session"
    }
}

pub struct AnonymousStrategy {
    target_url: String,
    client: Client,
    timeout: Duration,
}

impl AnonymousStrategy {
    pub fn new(target_url: String) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("building anonymous client")?;
        Ok(Self {
            target_url,
            client,
            timeout: Duration::from_secs(10),
        })
    }
}

#[async_trait]
impl FetchStrategy for AnonymousStrategy {
    async fn fetch(&self) -> Result<Vec<NotificationRecord>> {
        get_and_extract(&self.client, &self.target_url, self.timeout).await
    }

    fn name(&self) -> &'static str {
        "anonymous"
    }
}

async fn get_and_extract(
    client: &Client,
    url: &str,
    timeout: Duration,
) -> Result<Vec<NotificationRecord>> {
    let resp = client
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .context("GET notifications page")?;
    let status = resp.status();
    if !status.is_success() {
        bail!("notifications page returned {status}");
    }
    let html = resp.text().await.context("reading notifications page")?;
    Ok(extract_html(&html))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyFailure {
    pub strategy: &'static str,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Items {
        strategy: &'static str,
        items: Vec<NotificationRecord>,
    },
    /// No strategy produced a record; one entry per strategy tried.
    Unavailable { failures: Vec<StrategyFailure> },
}

pub struct Fetcher {
    strategies: Vec<Box<dyn FetchStrategy>>,
}

impl Fetcher {
    pub fn new(strategies: Vec<Box<dyn FetchStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        let credentials = cfg.portal.credentials().map(|(u, p)| Credentials {
            username: u.to_string(),
            password: p.to_string(),
        });

        let mut strategies: Vec<Box<dyn FetchStrategy>> = Vec::new();
        if cfg.render.enabled {
            match &cfg.render.service_url {
                Some(endpoint) => strategies.push(Box::new(RenderedStrategy::new(
                    Arc::new(HttpRenderBackend::new(endpoint.clone())),
                    cfg.portal.login_url.clone(),
                    cfg.portal.url.clone(),
                    credentials.clone(),
                    cfg.render.timeout_ms,
                ))),
                None => tracing::warn!(
                    target: "fetch",
                    "renderer enabled but RENDER_SERVICE_URL missing; skipping rendered fetch"
                ),
            }
        }
        if let Some(c) = credentials {
            strategies.push(Box::new(SessionStrategy::new(
                cfg.portal.login_url.clone(),
                cfg.portal.url.clone(),
                c,
            )));
        }
        strategies.push(Box::new(AnonymousStrategy::new(cfg.portal.url.clone())?));
        Ok(Self::new(strategies))
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// First strategy returning at least one record wins.
    pub async fn fetch(&self) -> FetchOutcome {
        let mut failures = Vec::new();
        for s in &self.strategies {
            match s.fetch().await {
                Ok(items) if !items.is_empty() => {
                    tracing::debug!(
                        target: "fetch",
                        strategy = s.name(),
                        items = items.len(),
                        "fetch succeeded"
                    );
                    return FetchOutcome::Items {
                        strategy: s.name(),
                        items,
                    };
                }
                Ok(_) => failures.push(StrategyFailure {
                    strategy: s.name(),
                    reason: "no notifications found".to_string(),
                }),
                Err(e) => {
                    tracing::warn!(target: "fetch", strategy = s.name(), error = ?e, "strategy failed");
                    counter!("fetch_strategy_failures_total", "strategy" => s.name()).increment(1);
                    failures.push(StrategyFailure {
                        strategy: s.name(),
                        reason: format!("{e:#}"),
                    });
                }
            }
        }
        FetchOutcome::Unavailable { failures }
    }
}
