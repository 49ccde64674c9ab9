// src/lib_tests/guard.rs
// End-to-end checks for HoneyGuard evaluation and dispatch

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::json;

use crate::decoy::render_token_at;
use crate::handlers::event_log::list_records;
use crate::test_support::{settings_with, ReadOnlyStore, RecordingMailer};
use crate::*;

fn rendered_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1, 9, 30, 0).unwrap()
}

fn signer() -> TimestampSigner {
    TimestampSigner::new("guard-test-secret")
}

fn guard_with(settings: Settings) -> HoneyGuard {
    HoneyGuard::new(Arc::new(settings), signer())
}

fn submission(hidden: &str, token: Option<String>, ua: Option<&str>) -> SubmissionEvent {
    SubmissionEvent {
        hidden_field_value: hidden.to_string(),
        render_time_token: token,
        user_agent: ua.map(str::to_string),
    }
}

fn token() -> Option<String> {
    Some(render_token_at(&signer(), rendered_at()))
}

#[test]
fn fast_submission_is_a_bot() {
    let guard = guard_with(Settings::default());
    let event = submission("", token(), Some("Mozilla/5.0"));
    let detection = guard
        .evaluate_at(&event, rendered_at() + Duration::milliseconds(500))
        .unwrap();

    assert_eq!(detection.timing_issue(), TimingIssue::TooFast);
    assert_eq!(detection.elapsed_seconds(), Some(0.5));
    assert_eq!(detection.risk_score(), 30);
    assert!(detection.is_bot());
}

#[test]
fn filled_honeypot_without_token_or_agent() {
    let guard = guard_with(Settings::default());
    let detection = guard
        .evaluate_at(&submission("gotcha", None, None), rendered_at())
        .unwrap();

    assert_eq!(detection.timing_issue(), TimingIssue::Unknown);
    assert_eq!(detection.elapsed_seconds(), None);
    assert_eq!(detection.risk_score(), 70);
    assert!(detection.is_bot());
}

#[test]
fn human_paced_submission_is_clean() {
    let guard = guard_with(Settings::default());
    let event = submission("", token(), Some("Mozilla/5.0"));
    let detection = guard
        .evaluate_at(&event, rendered_at() + Duration::seconds(45))
        .unwrap();

    assert_eq!(detection.timing_issue(), TimingIssue::Valid);
    assert_eq!(detection.risk_score(), 0);
    assert!(!detection.is_bot());
}

#[test]
fn slow_submission_is_flagged_but_not_a_bot() {
    let guard = guard_with(Settings::default());
    let event = submission("", token(), Some("Mozilla/5.0"));
    let detection = guard
        .evaluate_at(&event, rendered_at() + Duration::minutes(30))
        .unwrap();

    assert_eq!(detection.timing_issue(), TimingIssue::TooSlow);
    assert_eq!(detection.risk_score(), 0);
    assert!(!detection.is_bot());
}

#[test]
fn forged_or_expired_tokens_are_unknown() {
    let guard = guard_with(Settings::default());

    let foreign = TimestampSigner::new("someone-else");
    let forged = submission("", Some(render_token_at(&foreign, rendered_at())), Some("ua"));
    let detection = guard.evaluate_at(&forged, rendered_at() + Duration::seconds(10)).unwrap();
    assert_eq!(detection.timing_issue(), TimingIssue::Unknown);
    assert_eq!(detection.elapsed_seconds(), None);

    let stale = submission("", token(), Some("ua"));
    let detection = guard
        .evaluate_at(&stale, rendered_at() + Duration::seconds(86_401))
        .unwrap();
    assert_eq!(detection.timing_issue(), TimingIssue::Unknown);

    let blank = submission("", Some("   ".to_string()), Some("ua"));
    let detection = guard.evaluate_at(&blank, rendered_at()).unwrap();
    assert_eq!(detection.timing_issue(), TimingIssue::Unknown);
}

#[test]
fn short_token_lifetime_is_honoured() {
    let guard = guard_with(settings_with(&[(SettingKey::RenderTokenMaxAge, json!(60))]));
    let event = submission("", token(), Some("ua"));
    let detection = guard
        .evaluate_at(&event, rendered_at() + Duration::seconds(61))
        .unwrap();
    assert_eq!(detection.timing_issue(), TimingIssue::Unknown);
}

#[test]
fn invalid_threshold_propagates() {
    let guard = guard_with(settings_with(&[(SettingKey::TimingTooFastThreshold, json!(0.0))]));
    let err = guard
        .evaluate_at(&submission("", token(), Some("ua")), rendered_at())
        .unwrap_err();
    assert!(matches!(err, ConfigError::ImproperlyConfigured(_)));
}

#[test]
fn submission_runs_default_handlers_in_order() {
    let store = Arc::new(MemoryStore::new());
    let mailer = RecordingMailer::default();
    let guard = guard_with(settings_with(&[(
        SettingKey::EmailRecipients,
        json!(["soc@example.org"]),
    )]))
    .with_default_handlers(Arc::clone(&store), mailer.clone());
    assert_eq!(guard.handler_names(), vec!["event_log", "console", "email"]);

    let metadata = RequestMetadata::new("203.0.113.50", "POST", "/wp-login.php");
    let creds = Credentials::new("admin", "password1");
    let outcome = guard
        .process_submission_at(
            DecoyPersona::WordPress,
            &submission("x", token(), Some("curl/8.0")),
            &metadata,
            Some(&creds),
            rendered_at() + Duration::seconds(1),
        )
        .unwrap();

    assert!(outcome.report.is_clean());
    assert_eq!(outcome.report.completed, vec!["event_log", "console", "email"]);
    assert_eq!(outcome.detection.risk_score(), 80);
    assert!(outcome.message.contains("<strong>Error:</strong>"));

    let records = list_records(&*store);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].password, "***9 chars***");
    assert_eq!(records[0].path, "/wp-login.php");

    let sent = mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, vec!["soc@example.org".to_string()]);
    assert!(!sent[0].body.contains("password1"));
}

#[test]
fn failing_store_does_not_block_email() {
    let mailer = RecordingMailer::default();
    let guard = guard_with(settings_with(&[(
        SettingKey::EmailRecipients,
        json!(["soc@example.org"]),
    )]))
    .with_default_handlers(ReadOnlyStore, mailer.clone());

    let metadata = RequestMetadata::new("203.0.113.50", "POST", "/admin/");
    let outcome = guard
        .process_submission_at(
            DecoyPersona::DjangoAdmin,
            &submission("", None, Some("ua")),
            &metadata,
            None,
            rendered_at(),
        )
        .unwrap();

    assert_eq!(outcome.report.failures.len(), 1);
    assert_eq!(outcome.report.failures[0].0, "event_log");
    assert!(matches!(outcome.report.failures[0].1, HandlerError::Store(_)));
    assert_eq!(outcome.report.completed, vec!["console", "email"]);
    assert_eq!(mailer.sent().len(), 1);
    assert!(outcome.message.starts_with("Please enter a correct username"));
}

#[test]
fn broken_logging_settings_surface_as_handler_failures() {
    let store = Arc::new(MemoryStore::new());
    let guard = guard_with(settings_with(&[
        (SettingKey::LogLevel, json!("LOUD")),
        (SettingKey::EnableConsoleLogging, json!("maybe")),
    ]))
    .with_default_handlers(Arc::clone(&store), RecordingMailer::default());

    let metadata = RequestMetadata::new("203.0.113.50", "POST", "/admin/");
    let outcome = guard
        .process_submission_at(
            DecoyPersona::DjangoAdmin,
            &submission("x", None, Some("ua")),
            &metadata,
            None,
            rendered_at(),
        )
        .unwrap();

    assert!(!outcome.report.is_clean());
    assert_eq!(outcome.report.completed, vec!["event_log"]);
    let failed: Vec<&str> = outcome.report.failures.iter().map(|(name, _)| *name).collect();
    assert_eq!(failed, vec!["console", "email"]);
    assert!(outcome
        .report
        .failures
        .iter()
        .all(|(_, err)| matches!(err, HandlerError::Config(_))));
    assert_eq!(list_records(&*store).len(), 1);
}

#[test]
fn visits_are_ignored_unless_enabled() {
    let store = Arc::new(MemoryStore::new());
    let metadata = RequestMetadata::new("203.0.113.50", "GET", "/admin/").with_user_agent("ua");

    let quiet = guard_with(Settings::default())
        .with_handler(handlers::EventLogHandler::new(Arc::clone(&store)));
    assert!(quiet
        .process_visit(DecoyPersona::DjangoAdmin, &metadata)
        .unwrap()
        .is_none());
    assert!(store.is_empty());

    let watching = guard_with(settings_with(&[(
        SettingKey::EnableGetMethodDetection,
        json!(true),
    )]))
    .with_handler(handlers::EventLogHandler::new(Arc::clone(&store)));
    let outcome = watching
        .process_visit(DecoyPersona::DjangoAdmin, &metadata)
        .unwrap()
        .expect("visit detection enabled");
    assert!(!outcome.detection.honeypot_triggered());
    assert_eq!(outcome.detection.timing_issue(), TimingIssue::Unknown);
    assert_eq!(outcome.detection.risk_score(), 0);
    assert_eq!(store.len(), 1);
}

#[test]
fn render_token_round_trips_through_evaluate() {
    let guard = guard_with(Settings::default());
    let event = submission("", Some(guard.render_token()), Some("ua"));
    let detection = guard.evaluate(&event).unwrap();
    // Evaluated immediately after rendering.
    assert_eq!(detection.timing_issue(), TimingIssue::TooFast);
}
