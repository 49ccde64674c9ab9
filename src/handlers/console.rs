// src/handlers/console.rs
// One-line console report per detection, gated by ENABLE_CONSOLE_LOGGING and LOG_LEVEL.

use super::{DetectionHandler, DetectionRecord, HandlerError, TriggerContext};
use crate::config::{LogLevel, Settings};
use crate::logging;

#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleLogHandler;

impl ConsoleLogHandler {
    pub fn new() -> Self {
        Self
    }
}

pub(crate) fn format_console_line(record: &DetectionRecord) -> String {
    format!(
        "Honeypot triggered: IP={}, Path={}, Method={}, CreatedAt={}, Username={}, Password={}, \
         UserAgent={}, Referer={}, AcceptLanguage={}, AcceptEncoding={}, ElapsedTime={}, \
         TimingIssue={}, HoneypotTriggered={}, RiskScore={}, Signals=[{}]",
        record.ip_address,
        record.path,
        record.method,
        record.timestamp.to_rfc3339(),
        record.username,
        record.password,
        record.user_agent,
        record.referer,
        record.accept_language,
        record.accept_encoding,
        record
            .elapsed_seconds
            .map(|elapsed| format!("{:.2}s", elapsed))
            .unwrap_or_else(|| "N/A".to_string()),
        record.timing_issue.as_str(),
        record.honeypot_triggered,
        record.risk_score,
        record.signals.join(","),
    )
}

impl DetectionHandler for ConsoleLogHandler {
    fn name(&self) -> &'static str {
        "console"
    }

    fn handle(&self, ctx: &TriggerContext<'_>, settings: &Settings) -> Result<(), HandlerError> {
        let line = format_console_line(&ctx.record());
        logging::emit(settings, LogLevel::Warning, &line)?;
        Ok(())
    }
}
