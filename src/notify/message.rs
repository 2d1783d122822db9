// src/notify/message.rs
use anyhow::{anyhow, bail, Context, Result};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;

use super::{Alert, Notifier};
use crate::config::MessageConfig;

/// Messaging API (WhatsApp-style gateway): bearer-authenticated JSON POST.
pub struct MessageNotifier {
    api_url: String,
    api_key: String,
    to: String,
    client: Client,
    timeout: Duration,
}

#[derive(Serialize)]
struct MessagePayload<'a> {
    to: &'a str,
    message: &'a str,
}

impl MessageNotifier {
    pub fn new(api_url: String, api_key: String, to: String) -> Self {
        Self {
            api_url,
            api_key,
            to,
            client: Client::new(),
            timeout: Duration::from_secs(10),
        }
    }

    /// `Ok(None)` when no destination is configured.
    pub fn from_config(cfg: &MessageConfig) -> Result<Option<Self>> {
        let Some(to) = cfg.to.clone() else {
            return Ok(None);
        };
        let api_url = cfg
            .api_url
            .clone()
            .ok_or_else(|| anyhow!("MESSAGE_API_URL missing"))?;
        let api_key = cfg
            .api_key
            .clone()
            .ok_or_else(|| anyhow!("MESSAGE_API_KEY missing"))?;
        Ok(Some(Self::new(api_url, api_key, to)))
    }
}

#[async_trait::async_trait]
impl Notifier for MessageNotifier {
    async fn send(&self, alert: &Alert) -> Result<()> {
        let status = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(&MessagePayload {
                to: &self.to,
                message: &alert.body,
            })
            .send()
            .await
            .context("message api post")?
            .status();

        // The gateway answers 200 or 201 on acceptance; anything else is a miss.
        if status != StatusCode::OK && status != StatusCode::CREATED {
            bail!("message api returned {status}");
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "message"
    }
}
