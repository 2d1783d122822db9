// src/config/watch.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_CONFIG_PATH: &str = "PORTAL_WATCH_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/portal_watch.toml";

const DEFAULT_PORTAL_URL: &str =
    "https://edi-unoi-mx.stn-neds.com/notificacion/notifications/received";
const DEFAULT_LOGIN_URL: &str = "https://edi-unoi-mx.stn-neds.com/ts/view/access";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PortalConfig {
    pub url: String,
    pub login_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_PORTAL_URL.to_string(),
            login_url: DEFAULT_LOGIN_URL.to_string(),
            username: None,
            password: None,
        }
    }
}

impl PortalConfig {
    /// Both halves, or nothing.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(u), Some(p)) if !u.is_empty() && !p.is_empty() => Some((u, p)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PollConfig {
    pub interval_secs: u64,
    /// First run with no watermark: record the snapshot instead of alerting on it.
    pub seed_on_first_run: bool,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: 20 * 60,
            seed_on_first_run: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RenderConfig {
    pub enabled: bool,
    pub service_url: Option<String>,
    pub timeout_ms: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            service_url: None,
            timeout_ms: crate::fetch::render::DEFAULT_RENDER_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data.json"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmailConfig {
    pub to: Option<String>,
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_user: Option<String>,
    pub smtp_pass: Option<String>,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            to: None,
            smtp_host: None,
            smtp_port: 587,
            smtp_user: None,
            smtp_pass: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MessageConfig {
    pub to: Option<String>,
    pub api_url: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub portal: PortalConfig,
    pub poll: PollConfig,
    pub render: RenderConfig,
    pub store: StoreConfig,
    pub email: EmailConfig,
    pub message: MessageConfig,
}

/// What `GET /` shows: effective settings with every secret reduced to a flag.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigSummary {
    pub portal_url: String,
    pub login_url: String,
    pub credentials_configured: bool,
    pub poll_interval_secs: u64,
    pub seed_on_first_run: bool,
    pub use_browser_renderer: bool,
    pub render_service_configured: bool,
    pub data_store_path: String,
    pub email_enabled: bool,
    pub message_enabled: bool,
}

impl Config {
    /// Defaults ← TOML file (`$PORTAL_WATCH_CONFIG`, else `config/portal_watch.toml`
    /// if present) ← process environment.
    pub fn load() -> Result<Self> {
        let mut cfg = match std::env::var(ENV_CONFIG_PATH) {
            Ok(p) => {
                let pb = PathBuf::from(p);
                if !pb.exists() {
                    return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
                }
                Self::from_file(&pb)?
            }
            Err(_) => {
                let default = PathBuf::from(DEFAULT_CONFIG_PATH);
                if default.exists() {
                    Self::from_file(&default)?
                } else {
                    Self::default()
                }
            }
        };
        cfg.apply_env(|k| std::env::var(k).ok());
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    /// Overlay environment variables; `get` is injectable so tests need not
    /// touch the real environment. Empty values count as unset.
    pub fn apply_env<F>(&mut self, get: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |k: &str| get(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        // Earlier deployments used the portal's own name and the WhatsApp
        // gateway's; the current name wins when both are set.
        let var_or = |k: &str, legacy: &str| var(k).or_else(|| var(legacy));

        if let Some(v) = var_or("PORTAL_URL", "UNIO_URL") {
            self.portal.url = v;
        }
        if let Some(v) = var_or("PORTAL_LOGIN_URL", "UNIO_LOGIN_URL") {
            self.portal.login_url = v;
        }
        if let Some(v) = var_or("PORTAL_USER", "UNIO_USER") {
            self.portal.username = Some(v);
        }
        if let Some(v) = var_or("PORTAL_PASS", "UNIO_PASS") {
            self.portal.password = Some(v);
        }
        if let Some(v) = var("POLL_INTERVAL_SECS").and_then(|v| v.parse().ok()) {
            self.poll.interval_secs = v;
        }
        if let Some(v) = var("SEED_ON_FIRST_RUN") {
            self.poll.seed_on_first_run = parse_flag(&v);
        }
        if let Some(v) = var("USE_BROWSER_RENDERER") {
            self.render.enabled = parse_flag(&v);
        }
        if let Some(v) = var("RENDER_SERVICE_URL") {
            self.render.service_url = Some(v);
        }
        if let Some(v) = var("RENDER_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.render.timeout_ms = v;
        }
        if let Some(v) = var("DATA_STORE_PATH") {
            self.store.path = PathBuf::from(v);
        }
        if let Some(v) = var("NOTIFY_EMAIL") {
            self.email.to = Some(v);
        }
        if let Some(v) = var("SMTP_HOST") {
            self.email.smtp_host = Some(v);
        }
        if let Some(v) = var("SMTP_PORT").and_then(|v| v.parse().ok()) {
            self.email.smtp_port = v;
        }
        if let Some(v) = var("SMTP_USER") {
            self.email.smtp_user = Some(v);
        }
        if let Some(v) = var("SMTP_PASS") {
            self.email.smtp_pass = Some(v);
        }
        if let Some(v) = var_or("NOTIFY_MESSAGE_TO", "NOTIFY_WHATSAPP") {
            self.message.to = Some(v);
        }
        if let Some(v) = var_or("MESSAGE_API_URL", "WHATSAPP_API_URL") {
            self.message.api_url = Some(v);
        }
        if let Some(v) = var_or("MESSAGE_API_KEY", "WHATSAPP_API_KEY") {
            self.message.api_key = Some(v);
        }
    }

    pub fn summary(&self) -> ConfigSummary {
        ConfigSummary {
            portal_url: self.portal.url.clone(),
            login_url: self.portal.login_url.clone(),
            credentials_configured: self.portal.credentials().is_some(),
            poll_interval_secs: self.poll.interval_secs,
            seed_on_first_run: self.poll.seed_on_first_run,
            use_browser_renderer: self.render.enabled,
            render_service_configured: self.render.service_url.is_some(),
            data_store_path: self.store.path.display().to_string(),
            email_enabled: self.email.to.is_some() && self.email.smtp_host.is_some(),
            message_enabled: self.message.to.is_some()
                && self.message.api_url.is_some()
                && self.message.api_key.is_some(),
        }
    }
}

fn parse_flag(v: &str) -> bool {
    matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn env_overrides_defaults() {
        let env = env_of(&[
            ("PORTAL_URL", "https://p.example/n"),
            ("PORTAL_USER", "ana"),
            ("PORTAL_PASS", "s3cret"),
            ("POLL_INTERVAL_SECS", "90"),
            ("USE_BROWSER_RENDERER", "1"),
            ("SMTP_PORT", "2525"),
            ("NOTIFY_EMAIL", "  "),
        ]);
        let mut cfg = Config::default();
        cfg.apply_env(|k| env.get(k).cloned());

        assert_eq!(cfg.portal.url, "https://p.example/n");
        assert_eq!(cfg.portal.credentials(), Some(("ana", "s3cret")));
        assert_eq!(cfg.poll.interval_secs, 90);
        assert!(cfg.render.enabled);
        assert_eq!(cfg.email.smtp_port, 2525);
        assert_eq!(cfg.email.to, None);
        assert_eq!(cfg.portal.login_url, DEFAULT_LOGIN_URL);
    }

    #[test]
    fn legacy_names_are_fallbacks() {
        let env = env_of(&[
            ("UNIO_URL", "https://old.example/n"),
            ("UNIO_LOGIN_URL", "https://old.example/login"),
            ("UNIO_USER", "ana"),
            ("UNIO_PASS", "s3cret"),
            ("NOTIFY_WHATSAPP", "+5215550000"),
            ("WHATSAPP_API_URL", "https://wa.example/send"),
            ("WHATSAPP_API_KEY", "key"),
            ("MESSAGE_API_URL", "https://msg.example/send"),
        ]);
        let mut cfg = Config::default();
        cfg.apply_env(|k| env.get(k).cloned());

        assert_eq!(cfg.portal.url, "https://old.example/n");
        assert_eq!(cfg.portal.login_url, "https://old.example/login");
        assert_eq!(cfg.portal.credentials(), Some(("ana", "s3cret")));
        assert_eq!(cfg.message.to.as_deref(), Some("+5215550000"));
        assert_eq!(cfg.message.api_key.as_deref(), Some("key"));
        // Current name wins over the legacy one.
        assert_eq!(cfg.message.api_url.as_deref(), Some("https://msg.example/send"));
    }

    #[test]
    fn unparsable_numbers_keep_previous_value() {
        let env = env_of(&[("POLL_INTERVAL_SECS", "soon")]);
        let mut cfg = Config::default();
        cfg.apply_env(|k| env.get(k).cloned());
        assert_eq!(cfg.poll.interval_secs, 1200);
    }

    #[test]
    fn summary_hides_secrets() {
        let mut cfg = Config::default();
        cfg.portal.username = Some("ana".into());
        cfg.portal.password = Some("s3cret".into());
        cfg.message.api_key = Some("key".into());
        let s = serde_json::to_string(&cfg.summary()).unwrap();
        assert!(!s.contains("s3cret"));
        assert!(!s.contains("\"key\""));
        assert!(s.contains("\"credentials_configured\":true"));
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg: Config = toml::from_str(
            r#"
[portal]
url = "https://p.example/n"

[poll]
seed_on_first_run = true
"#,
        )
        .unwrap();
        assert_eq!(cfg.portal.url, "https://p.example/n");
        assert_eq!(cfg.portal.login_url, DEFAULT_LOGIN_URL);
        assert!(cfg.poll.seed_on_first_run);
        assert_eq!(cfg.poll.interval_secs, 1200);
        assert_eq!(cfg.store.path, PathBuf::from("data.json"));
    }
}
