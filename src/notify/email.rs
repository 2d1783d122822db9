// src/notify/email.rs
use anyhow::{anyhow, Context, Result};
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};

use super::{Alert, Notifier};
use crate::config::EmailConfig;

const DEFAULT_FROM: &str = "noreply@example.com";

pub struct EmailNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl EmailNotifier {
    /// `Ok(None)` when no recipient is configured. STARTTLS on the configured
    /// port; credentials only when both user and password are set.
    pub fn from_config(cfg: &EmailConfig) -> Result<Option<Self>> {
        let Some(to_addr) = cfg.to.as_deref() else {
            return Ok(None);
        };
        let host = cfg
            .smtp_host
            .as_deref()
            .ok_or_else(|| anyhow!("SMTP_HOST missing"))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .with_context(|| format!("invalid SMTP_HOST {host:?}"))?
            .port(cfg.smtp_port);
        if let (Some(user), Some(pass)) = (cfg.smtp_user.as_deref(), cfg.smtp_pass.as_deref()) {
            builder = builder.credentials(Credentials::new(user.to_string(), pass.to_string()));
        }

        let from_addr = cfg.smtp_user.as_deref().unwrap_or(DEFAULT_FROM);
        let from: Mailbox = from_addr
            .parse()
            .or_else(|_| DEFAULT_FROM.parse())
            .context("invalid sender address")?;
        let to = to_addr.parse().context("invalid NOTIFY_EMAIL")?;

        Ok(Some(Self {
            mailer: builder.build(),
            from,
            to,
        }))
    }
}

#[async_trait::async_trait]
impl Notifier for EmailNotifier {
    async fn send(&self, alert: &Alert) -> Result<()> {
        let msg = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(alert.subject.clone())
            .header(header::ContentType::TEXT_PLAIN)
            .body(alert.body.clone())
            .context("build email")?;

        self.mailer.send(msg).await.context("send email")?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "email"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_without_recipient() {
        assert!(EmailNotifier::from_config(&EmailConfig::default())
            .unwrap()
            .is_none());
    }

    #[test]
    fn recipient_without_host_is_an_error() {
        let cfg = EmailConfig {
            to: Some("ops@example.com".into()),
            ..Default::default()
        };
        assert!(EmailNotifier::from_config(&cfg).is_err());
    }

    #[tokio::test]
    async fn builds_with_login_as_sender() {
        let cfg = EmailConfig {
            to: Some("ops@example.com".into()),
            smtp_host: Some("smtp.example.com".into()),
            smtp_user: Some("bot@example.com".into()),
            smtp_pass: Some("pw".into()),
            ..Default::default()
        };
        let n = EmailNotifier::from_config(&cfg).unwrap().unwrap();
        assert_eq!(n.from.email.to_string(), "bot@example.com");
        assert_eq!(n.to.email.to_string(), "ops@example.com");
    }
}
