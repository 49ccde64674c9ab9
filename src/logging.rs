// src/logging.rs
// Settings-aware logging for detection reports.

use crate::config::{ConfigError, LogLevel, SettingKey, Settings};

pub const LOG_TARGET: &str = "honeyguard";

/// Whether a message at `level` passes ENABLE_CONSOLE_LOGGING and LOG_LEVEL.
pub fn should_log(settings: &Settings, level: LogLevel) -> Result<bool, ConfigError> {
    if !settings.bool(SettingKey::EnableConsoleLogging)? {
        return Ok(false);
    }
    Ok(level >= settings.log_level()?)
}

/// Emits `message` through `log` when the settings allow it. Returns whether it was emitted.
pub fn emit(settings: &Settings, level: LogLevel, message: &str) -> Result<bool, ConfigError> {
    if !should_log(settings, level)? {
        return Ok(false);
    }
    log::log!(target: LOG_TARGET, level.to_log_level(), "{}", message);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::settings_with;
    use serde_json::json;

    fn settings(console: serde_json::Value, level: &str) -> Settings {
        settings_with(&[
            (SettingKey::EnableConsoleLogging, console),
            (SettingKey::LogLevel, json!(level)),
        ])
    }

    #[test]
    fn level_gate_is_inclusive() {
        let s = settings(json!(true), "WARNING");
        assert!(!should_log(&s, LogLevel::Info).unwrap());
        assert!(should_log(&s, LogLevel::Warning).unwrap());
        assert!(should_log(&s, LogLevel::Critical).unwrap());
    }

    #[test]
    fn disabled_console_logging_silences_everything() {
        let s = settings(json!(false), "DEBUG");
        assert!(!emit(&s, LogLevel::Critical, "nothing").unwrap());
    }

    #[test]
    fn bad_level_is_reported() {
        let s = settings(json!(true), "LOUD");
        let err = should_log(&s, LogLevel::Warning).unwrap_err();
        assert!(matches!(err, ConfigError::ImproperlyConfigured(msg) if msg.contains("LOG_LEVEL")));
    }

    #[test]
    fn bad_console_flag_is_reported() {
        let s = settings(json!("maybe"), "WARNING");
        let err = emit(&s, LogLevel::Error, "x").unwrap_err();
        assert!(
            matches!(err, ConfigError::ImproperlyConfigured(msg) if msg.contains("ENABLE_CONSOLE_LOGGING"))
        );
    }
}
