// src/handlers/mod.rs
// Side effects run after a detection: persistence, console log, email alert.
// The caller owns the ordered handler list; a failing handler never stops the next one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, Settings};
use crate::detection::Detection;
use crate::request::{Credentials, RequestMetadata};
use crate::timing::TimingIssue;

pub mod console;
pub mod email;
pub mod event_log;

pub use console::ConsoleLogHandler;
pub use email::{EmailAlertHandler, EmailMessage, MailError, Mailer};
pub use event_log::EventLogHandler;

#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("store write failed for key {0}")]
    Store(String),
    #[error("could not serialize detection record: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error(transparent)]
    Mail(#[from] MailError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Everything a handler may look at for one trigger.
#[derive(Debug, Clone, Copy)]
pub struct TriggerContext<'a> {
    pub detection: &'a Detection,
    pub metadata: &'a RequestMetadata,
    pub credentials: Option<&'a Credentials>,
}

impl TriggerContext<'_> {
    /// The sanitized record every handler writes or sends.
    pub fn record(&self) -> DetectionRecord {
        DetectionRecord::new(self.detection, self.metadata, self.credentials)
    }
}

/// A detection plus request details, safe to persist or transmit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    pub timestamp: DateTime<Utc>,
    pub ip_address: String,
    pub path: String,
    pub method: String,
    pub username: String,
    pub password: String,
    pub user_agent: String,
    pub referer: String,
    pub accept_language: String,
    pub accept_encoding: String,
    pub honeypot_triggered: bool,
    pub timing_issue: TimingIssue,
    pub elapsed_seconds: Option<f64>,
    pub risk_score: u8,
    pub is_bot: bool,
    #[serde(default)]
    pub signals: Vec<String>,
}

impl DetectionRecord {
    pub fn new(
        detection: &Detection,
        metadata: &RequestMetadata,
        credentials: Option<&Credentials>,
    ) -> Self {
        Self {
            timestamp: metadata.created_at,
            ip_address: metadata.ip_address.clone(),
            path: metadata.path.clone(),
            method: metadata.method.clone(),
            username: credentials.map(Credentials::sanitized_username).unwrap_or_default(),
            password: credentials.map(Credentials::sanitized_password).unwrap_or_default(),
            user_agent: metadata.user_agent.clone(),
            referer: metadata.referer.clone(),
            accept_language: metadata.accept_language.clone(),
            accept_encoding: metadata.accept_encoding.clone(),
            honeypot_triggered: detection.honeypot_triggered(),
            timing_issue: detection.timing_issue(),
            elapsed_seconds: detection.elapsed_seconds(),
            risk_score: detection.risk_score(),
            is_bot: detection.is_bot(),
            signals: detection
                .signals()
                .into_iter()
                .filter(|signal| signal.active)
                .map(|signal| signal.key.to_string())
                .collect(),
        }
    }

    pub fn elapsed_display(&self) -> String {
        match self.elapsed_seconds {
            Some(elapsed) => format!("{:.2}", elapsed),
            None => "N/A".to_string(),
        }
    }
}

pub trait DetectionHandler: Send + Sync {
    fn name(&self) -> &'static str;
    fn handle(&self, ctx: &TriggerContext<'_>, settings: &Settings) -> Result<(), HandlerError>;
}

#[derive(Debug, Default)]
pub struct DispatchReport {
    pub completed: Vec<&'static str>,
    pub failures: Vec<(&'static str, HandlerError)>,
}

impl DispatchReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Runs `handlers` in order, collecting failures instead of stopping.
pub fn dispatch(
    handlers: &[Box<dyn DetectionHandler>],
    ctx: &TriggerContext<'_>,
    settings: &Settings,
) -> DispatchReport {
    let mut report = DispatchReport::default();
    for handler in handlers {
        match handler.handle(ctx, settings) {
            Ok(()) => report.completed.push(handler.name()),
            Err(err) => {
                let message = format!("handler {} failed: {}", handler.name(), err);
                if let Err(config_err) =
                    crate::logging::emit(settings, crate::config::LogLevel::Error, &message)
                {
                    log::warn!(target: crate::logging::LOG_TARGET, "{} ({})", message, config_err);
                }
                report.failures.push((handler.name(), err));
            }
        }
    }
    report
}
