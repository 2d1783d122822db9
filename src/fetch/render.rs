// src/fetch/render.rs
//! Client side of the headless-rendering service.
//!
//! The browser lives in a sidecar; we hand it a navigation request plus a
//! login fill plan and get back the rendered document once the network is idle.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::auth::USERNAME_CANDIDATES;

pub const DEFAULT_RENDER_TIMEOUT_MS: u64 = 15_000;

/// How the renderer should fill the login form inside the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginPlan {
    /// Tried in order; the first selector present gets the username.
    pub username_selectors: Vec<String>,
    pub password_selector: String,
    pub submit_selector: String,
    /// Key pressed in the password field when no submit button exists.
    pub submit_fallback_key: String,
}

impl Default for LoginPlan {
    fn default() -> Self {
        // Same heuristic as the form-post login: named candidates first,
        // then anything that looks like a text/email box.
        let mut username_selectors: Vec<String> = vec![
            r#"input[name="username"]"#.to_string(),
            r#"input[name="email"]"#.to_string(),
        ];
        username_selectors.extend(
            USERNAME_CANDIDATES
                .iter()
                .filter(|c| **c != "username")
                .map(|c| format!(r#"input[name="{c}"]"#)),
        );
        username_selectors.push(r#"input[type="email"]"#.to_string());
        username_selectors.push(r#"input[type="text"]"#.to_string());

        Self {
            username_selectors,
            password_selector: r#"input[type="password"]"#.to_string(),
            submit_selector: r#"button[type="submit"]"#.to_string(),
            submit_fallback_key: "Enter".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderRequest {
    pub login_url: String,
    pub target_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Budget for each page load and each network-idle wait.
    pub timeout_ms: u64,
    pub wait_until: &'static str,
    /// Present only when both credentials are.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login: Option<LoginPlan>,
}

impl RenderRequest {
    pub fn new(
        login_url: &str,
        target_url: &str,
        username: Option<&str>,
        password: Option<&str>,
        timeout_ms: u64,
    ) -> Self {
        let login = match (username, password) {
            (Some(_), Some(_)) => Some(LoginPlan::default()),
            _ => None,
        };
        Self {
            login_url: login_url.to_string(),
            target_url: target_url.to_string(),
            username: username.map(str::to_string),
            password: password.map(str::to_string),
            timeout_ms,
            wait_until: "networkidle",
            login,
        }
    }
}

#[async_trait]
pub trait RenderBackend: Send + Sync {
    /// Fully rendered markup of `req.target_url`.
    async fn render(&self, req: &RenderRequest) -> Result<String>;
}

#[derive(Deserialize)]
struct RenderResponse {
    html: String,
}

/// Talks to a render service over HTTP: POST the request as JSON, receive
/// either `{"html": "..."}` or the raw document.
pub struct HttpRenderBackend {
    endpoint: String,
    client: Client,
}

impl HttpRenderBackend {
    pub fn new(endpoint: String) -> Self {
        Self {
            endpoint,
            client: Client::new(),
        }
    }
}

#[async_trait]
impl RenderBackend for HttpRenderBackend {
    async fn render(&self, req: &RenderRequest) -> Result<String> {
        // Login navigation + target navigation, each with its own idle wait,
        // plus slack for the service itself.
        let budget = Duration::from_millis(req.timeout_ms.saturating_mul(4) + 5_000);
        let resp = self
            .client
            .post(&self.endpoint)
            .timeout(budget)
            .json(req)
            .send()
            .await
            .context("render service request")?;

        let status = resp.status();
        if !status.is_success() {
            bail!("render service returned {status}");
        }
        let is_json = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/json"));

        if is_json {
            let body: RenderResponse = resp.json().await.context("render service json")?;
            Ok(body.html)
        } else {
            resp.text().await.context("render service body")
        }
    }
}
