use std::sync::Arc;

use anyhow::Context as _;
use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport as _, Message, Tokio1Executor};

use crate::config::{ConfigProvider, MailConfig};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, notification: Notification) -> anyhow::Result<()>;
}

/// SMTP delivery. The transport is rebuilt from the live config on every send.
pub struct SmtpMailer {
    config: Arc<dyn ConfigProvider>,
}

impl SmtpMailer {
    pub fn new(config: Arc<dyn ConfigProvider>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, notification: Notification) -> anyhow::Result<()> {
        let config = self.config.load().await.context("load config")?;
        let mail = config
            .mail
            .filter(|m| !m.host.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("mailConfig is not set"))?;

        let message = build_message(&mail, &notification)?;
        let transport = build_transport(&mail)?;
        transport.send(message).await.context("smtp send")?;
        tracing::info!(to = %notification.to, "notification mail sent");
        Ok(())
    }
}

fn build_message(mail: &MailConfig, notification: &Notification) -> anyhow::Result<Message> {
    let from: Mailbox = mail
        .auth
        .user
        .parse()
        .with_context(|| format!("invalid sender address: {}", mail.auth.user))?;
    let to: Mailbox = notification
        .to
        .parse()
        .with_context(|| format!("invalid recipient address: {}", notification.to))?;
    Message::builder()
        .from(from)
        .to(to)
        .subject(notification.subject.clone())
        .header(ContentType::TEXT_HTML)
        .body(notification.html.clone())
        .context("build mail message")
}

fn build_transport(mail: &MailConfig) -> anyhow::Result<AsyncSmtpTransport<Tokio1Executor>> {
    let host = mail.host.trim();
    let relay = if mail.secure {
        AsyncSmtpTransport::<Tokio1Executor>::relay(host)
    } else {
        AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
    };
    let mut builder = relay
        .with_context(|| format!("smtp relay: {host}"))?
        .credentials(Credentials::new(
            mail.auth.user.clone(),
            mail.auth.pass.clone(),
        ));
    if let Some(port) = mail.port {
        builder = builder.port(port);
    }
    Ok(builder.build())
}

/// Mail about a new submission, addressed to the site owner.
pub fn submission_notice(
    mail: Option<&MailConfig>,
    settings_email: &str,
    config_email: &str,
) -> Option<Notification> {
    let to = [settings_email, config_email]
        .into_iter()
        .map(str::trim)
        .find(|v| !v.is_empty())?;
    let mail = mail?;
    Some(Notification {
        to: to.to_string(),
        subject: mail.title.clone(),
        html: mail.message.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MailAuth;

    fn mail_config() -> MailConfig {
        MailConfig {
            host: "smtp.example.com".to_string(),
            port: Some(587),
            secure: false,
            auth: MailAuth {
                user: "bot@example.com".to_string(),
                pass: "pw".to_string(),
            },
            title: "New link".to_string(),
            message: "<p>check the queue</p>".to_string(),
        }
    }

    #[test]
    fn notice_prefers_settings_email() {
        let mail = mail_config();
        let notice = submission_notice(Some(&mail), "site@example.com", "ops@example.com")
            .expect("notice");
        assert_eq!(notice.to, "site@example.com");
        assert_eq!(notice.subject, "New link");

        let notice = submission_notice(Some(&mail), " ", "ops@example.com").expect("notice");
        assert_eq!(notice.to, "ops@example.com");
    }

    #[test]
    fn notice_needs_recipient_and_config() {
        assert!(submission_notice(Some(&mail_config()), "", "").is_none());
        assert!(submission_notice(None, "site@example.com", "").is_none());
    }

    #[test]
    fn message_rejects_bad_recipient() {
        let notification = Notification {
            to: "not an address".to_string(),
            subject: "s".to_string(),
            html: "h".to_string(),
        };
        assert!(build_message(&mail_config(), &notification).is_err());
    }

    #[test]
    fn message_builds_for_valid_addresses() -> anyhow::Result<()> {
        let notification = Notification {
            to: "owner@example.com".to_string(),
            subject: "s".to_string(),
            html: "<b>h</b>".to_string(),
        };
        build_message(&mail_config(), &notification)?;
        Ok(())
    }
}
