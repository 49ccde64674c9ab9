// src/lib.rs
// Honeypot login-form detection: decoy forms, submission evaluation, side-effect dispatch

use std::sync::Arc;

use chrono::{DateTime, Utc};

pub mod config;    // Settings source, validation and cache
pub mod decoy;     // Fake Django / WordPress login personas
pub mod detection; // Detection record and risk score
pub mod handlers;  // Event log, console and email handlers
pub mod logging;   // Settings-aware log emission
pub mod request;   // Request metadata, client IP, credential sanitizing
pub mod signals;   // Scored bot signals
pub mod signing;   // Signed render-time tokens
pub mod store;     // Key-value persistence seam
pub mod timing;    // Render-to-submit timing classification

#[cfg(test)]
mod lib_tests;
#[cfg(test)]
pub(crate) mod test_support;

pub use config::{ConfigError, HoneyGuardConfig, LogLevel, SettingKey, Settings, SettingsSource};
pub use decoy::{DecoyForm, DecoyPersona};
pub use detection::Detection;
pub use handlers::{DetectionHandler, DispatchReport, HandlerError, TriggerContext};
pub use request::{Credentials, RequestMetadata, SubmissionEvent};
pub use signing::{SignatureError, TimestampSigner};
pub use store::{KeyValueStore, MemoryStore};
pub use timing::{TimingIssue, TimingThresholds, TimingVerdict};

use handlers::{ConsoleLogHandler, EmailAlertHandler, EventLogHandler, Mailer};

/// Result of handling one decoy hit.
#[derive(Debug)]
pub struct Outcome {
    pub detection: Detection,
    pub report: DispatchReport,
    /// Generic failure text to show the visitor.
    pub message: String,
}

/// Shared detection context: settings, signer and the ordered handler list.
pub struct HoneyGuard {
    settings: Arc<Settings>,
    signer: TimestampSigner,
    handlers: Vec<Box<dyn DetectionHandler>>,
}

impl HoneyGuard {
    pub fn new(settings: Arc<Settings>, signer: TimestampSigner) -> Self {
        Self {
            settings,
            signer,
            handlers: Vec::new(),
        }
    }

    /// Appends a handler; handlers run in the order they were added.
    pub fn with_handler(mut self, handler: impl DetectionHandler + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Event log, console, then email.
    pub fn with_default_handlers<S, M>(self, store: S, mailer: M) -> Self
    where
        S: KeyValueStore + Send + Sync + 'static,
        M: Mailer + 'static,
    {
        self.with_handler(EventLogHandler::new(store))
            .with_handler(ConsoleLogHandler::new())
            .with_handler(EmailAlertHandler::new(mailer))
    }

    pub fn settings(&self) -> &Arc<Settings> {
        &self.settings
    }

    pub fn handler_names(&self) -> Vec<&'static str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    pub fn render_token(&self) -> String {
        decoy::render_token_at(&self.signer, Utc::now())
    }

    pub fn form(&self, persona: DecoyPersona) -> Result<DecoyForm, ConfigError> {
        persona.form(&self.settings, &self.signer)
    }

    pub fn evaluate(&self, event: &SubmissionEvent) -> Result<Detection, ConfigError> {
        self.evaluate_at(event, Utc::now())
    }

    pub fn evaluate_at(
        &self,
        event: &SubmissionEvent,
        now: DateTime<Utc>,
    ) -> Result<Detection, ConfigError> {
        let verdict = self.timing_verdict(event.render_time_token.as_deref(), now)?;
        Ok(detection::evaluate(
            &event.hidden_field_value,
            verdict.issue,
            verdict.elapsed_seconds,
            event.user_agent_present(),
        ))
    }

    /// Verifies the render token, then classifies the elapsed time.
    ///
    /// A missing, forged or expired token yields `Unknown` with no elapsed time. Only
    /// configuration errors propagate.
    fn timing_verdict(
        &self,
        token: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<TimingVerdict, ConfigError> {
        let thresholds = self.settings.timing_thresholds()?;
        let tz = self.settings.time_zone()?;
        let max_age = self.settings.integer(SettingKey::RenderTokenMaxAge)?;

        let Some(token) = token.filter(|t| !t.trim().is_empty()) else {
            return Ok(TimingVerdict::unknown());
        };
        match self.signer.unsign_at(token, max_age, now.timestamp()) {
            Ok(render_time) => Ok(timing::classify(Some(render_time.as_str()), now, thresholds, tz)),
            Err(err) => {
                log::info!(target: logging::LOG_TARGET, "render token rejected: {}", err);
                Ok(TimingVerdict::unknown())
            }
        }
    }

    /// Runs the handlers against `detection`.
    pub fn dispatch(
        &self,
        detection: &Detection,
        metadata: &RequestMetadata,
        credentials: Option<&Credentials>,
    ) -> DispatchReport {
        let ctx = TriggerContext {
            detection,
            metadata,
            credentials,
        };
        handlers::dispatch(&self.handlers, &ctx, &self.settings)
    }

    pub fn process_submission(
        &self,
        persona: DecoyPersona,
        event: &SubmissionEvent,
        metadata: &RequestMetadata,
        credentials: Option<&Credentials>,
    ) -> Result<Outcome, ConfigError> {
        self.process_submission_at(persona, event, metadata, credentials, Utc::now())
    }

    pub fn process_submission_at(
        &self,
        persona: DecoyPersona,
        event: &SubmissionEvent,
        metadata: &RequestMetadata,
        credentials: Option<&Credentials>,
        now: DateTime<Utc>,
    ) -> Result<Outcome, ConfigError> {
        let detection = self.evaluate_at(event, now)?;
        let message = persona.error_message(&self.settings)?;
        let report = self.dispatch(&detection, metadata, credentials);
        Ok(Outcome {
            detection,
            report,
            message,
        })
    }

    /// Records a plain page view when ENABLE_GET_METHOD_DETECTION is on.
    pub fn process_visit(
        &self,
        persona: DecoyPersona,
        metadata: &RequestMetadata,
    ) -> Result<Option<Outcome>, ConfigError> {
        if !self.settings.bool(SettingKey::EnableGetMethodDetection)? {
            return Ok(None);
        }
        let detection = detection::evaluate(
            "",
            TimingIssue::Unknown,
            None,
            !metadata.user_agent.trim().is_empty(),
        );
        let message = persona.error_message(&self.settings)?;
        let report = self.dispatch(&detection, metadata, None);
        Ok(Some(Outcome {
            detection,
            report,
            message,
        }))
    }
}
