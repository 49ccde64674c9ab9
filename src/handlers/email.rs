// src/handlers/email.rs
// Email alerts. Transport sits behind `Mailer` so the host application picks SMTP, an API
// provider or a test double.

use super::{DetectionHandler, DetectionRecord, HandlerError, TriggerContext};
use crate::config::{LogLevel, SettingKey, Settings};
use crate::logging;

pub const DEFAULT_FROM_ADDRESS: &str = "noreply@example.com";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub subject: String,
    pub body: String,
    pub from: String,
    pub to: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MailError {
    #[error("mail transport failed: {0}")]
    Transport(String),
}

pub trait Mailer: Send + Sync {
    fn send(&self, message: &EmailMessage) -> Result<(), MailError>;
}

pub struct EmailAlertHandler<M> {
    mailer: M,
}

impl<M: Mailer> EmailAlertHandler<M> {
    pub fn new(mailer: M) -> Self {
        Self { mailer }
    }

    pub fn mailer(&self) -> &M {
        &self.mailer
    }
}

fn or_placeholder<'a>(value: &'a str, placeholder: &'a str) -> &'a str {
    if value.is_empty() {
        placeholder
    } else {
        value
    }
}

pub(crate) fn format_alert_body(record: &DetectionRecord) -> String {
    let mut lines = vec![
        format!("🚨 Honeypot Alert - {}", record.path),
        String::new(),
        "=== Request Details ===".to_string(),
        format!("IP Address: {}", record.ip_address),
        format!("Path: {}", record.path),
        format!("Method: {}", record.method),
        format!("CreatedAt: {}", record.timestamp.to_rfc3339()),
        String::new(),
        "=== Authentication Attempt ===".to_string(),
        format!("Username: {}", or_placeholder(&record.username, "(empty)")),
        format!("Password: {}", or_placeholder(&record.password, "(empty)")),
        String::new(),
        "=== Detection Flags ===".to_string(),
        format!(
            "Honeypot Field Triggered: {}",
            if record.honeypot_triggered { "YES" } else { "No" }
        ),
        format!("Timing Issue: {}", record.timing_issue.as_str()),
    ];
    match record.elapsed_seconds {
        Some(elapsed) => lines.push(format!("Submission Time: {:.2} seconds", elapsed)),
        None => lines.push("Submission Time: N/A".to_string()),
    }
    lines.push(format!("Risk Score: {}/100", record.risk_score));
    lines.extend([
        String::new(),
        "=== Browser & Environment ===".to_string(),
        format!("User Agent: {}", or_placeholder(&record.user_agent, "(empty)")),
        format!("Referer: {}", or_placeholder(&record.referer, "None")),
        format!("Accept-Language: {}", or_placeholder(&record.accept_language, "N/A")),
        format!("Accept-Encoding: {}", or_placeholder(&record.accept_encoding, "N/A")),
    ]);
    lines.join("\n")
}

pub(crate) fn build_alert(
    record: &DetectionRecord,
    settings: &Settings,
    recipients: Vec<String>,
) -> Result<EmailMessage, HandlerError> {
    let prefix = settings.string(SettingKey::EmailSubjectPrefix)?;
    let from = settings
        .email_from()?
        .filter(|addr| !addr.is_empty())
        .unwrap_or_else(|| DEFAULT_FROM_ADDRESS.to_string());
    Ok(EmailMessage {
        subject: format!("{} - {}", prefix, record.path),
        body: format_alert_body(record),
        from,
        to: recipients,
    })
}

impl<M: Mailer> DetectionHandler for EmailAlertHandler<M> {
    fn name(&self) -> &'static str {
        "email"
    }

    fn handle(&self, ctx: &TriggerContext<'_>, settings: &Settings) -> Result<(), HandlerError> {
        let recipients = settings.email_recipients()?;
        if recipients.is_empty() {
            logging::emit(
                settings,
                LogLevel::Warning,
                "No email recipients configured; skipping email alert.",
            )?;
            return Ok(());
        }

        let count = recipients.len();
        let message = build_alert(&ctx.record(), settings, recipients)?;
        match self.mailer.send(&message) {
            Ok(()) => {
                logging::emit(
                    settings,
                    LogLevel::Info,
                    &format!("Sent email alert to {} recipient(s)", count),
                )?;
                Ok(())
            }
            Err(err) => {
                if settings.bool(SettingKey::EmailFailSilently)? {
                    logging::emit(
                        settings,
                        LogLevel::Error,
                        &format!("Error sending email alert: {}", err),
                    )?;
                    Ok(())
                } else {
                    Err(HandlerError::Mail(err))
                }
            }
        }
    }
}
