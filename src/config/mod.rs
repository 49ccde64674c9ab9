// src/config/mod.rs
// Settings for HoneyGuard.
// Raw values come from a SettingsSource layered over config/defaults.env; each key is
// validated on first access and cached until the next invalidation.

use std::collections::HashMap;
use std::env;
use std::sync::{Mutex, MutexGuard};

use chrono::FixedOffset;
use once_cell::sync::Lazy;
use serde_json::{Map, Value};

mod rules;

pub use rules::{validate_setting, LogLevel, Rule, SettingKey, SettingValue, Validated};

use crate::timing::TimingThresholds;

const DEFAULTS_ENV_TEXT: &str = include_str!("../../config/defaults.env");

/// Name of the aggregate (dictionary-style) setting.
pub const AGGREGATE_SETTING: &str = "HONEYGUARD";
/// Prefix of individually named settings, e.g. `HONEYGUARD_LOG_LEVEL`.
pub const INDIVIDUAL_PREFIX: &str = "HONEYGUARD_";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0}")]
    ImproperlyConfigured(String),
    #[error("unknown HoneyGuard setting '{0}'")]
    UnknownSetting(String),
}

static DEFAULTS: Lazy<Result<HashMap<SettingKey, Value>, String>> =
    Lazy::new(|| parse_defaults_env_map(DEFAULTS_ENV_TEXT).and_then(defaults_by_key));

fn parse_defaults_env_map(input: &str) -> Result<HashMap<String, String>, String> {
    let mut map = HashMap::new();
    for (index, raw_line) in input.lines().enumerate() {
        let line_no = index + 1;
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (key, raw_value) = line
            .split_once('=')
            .ok_or_else(|| format!("Invalid defaults line {}: missing '='", line_no))?;

        let key = key.trim();
        if key.is_empty() {
            return Err(format!("Invalid defaults line {}: empty key", line_no));
        }
        if !key
            .chars()
            .all(|ch| ch.is_ascii_uppercase() || ch.is_ascii_digit() || ch == '_')
        {
            return Err(format!("Invalid defaults key '{}' on line {}", key, line_no));
        }

        let mut value = raw_value.trim().to_string();
        if let Some((head, _)) = value.split_once(" #") {
            value = head.trim().to_string();
        }
        if value.len() >= 2 {
            let first = value.as_bytes()[0] as char;
            let last = value.as_bytes()[value.len() - 1] as char;
            if (first == '"' && last == '"') || (first == '\'' && last == '\'') {
                value = value[1..value.len() - 1].to_string();
            }
        }

        map.insert(key.to_string(), value);
    }
    Ok(map)
}

fn defaults_by_key(raw: HashMap<String, String>) -> Result<HashMap<SettingKey, Value>, String> {
    let mut defaults = HashMap::new();
    for key in SettingKey::all() {
        let value = raw
            .get(key.name())
            .ok_or_else(|| format!("Missing required defaults key {}", key.name()))?;
        defaults.insert(key, parse_raw_value(value));
    }
    Ok(defaults)
}

/// Interprets a textual setting: JSON literal when it parses, plain string otherwise.
pub fn parse_raw_value(raw: &str) -> Value {
    serde_json::from_str::<Value>(raw.trim()).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn default_value(key: SettingKey) -> Result<Value, ConfigError> {
    match &*DEFAULTS {
        Ok(map) => map.get(&key).cloned().ok_or_else(|| {
            ConfigError::ImproperlyConfigured(format!("no built-in default for {}", key))
        }),
        Err(msg) => Err(ConfigError::ImproperlyConfigured(format!(
            "invalid config/defaults.env: {}",
            msg
        ))),
    }
}

/// Where raw (unvalidated) values come from.
///
/// Precedence: the aggregate `HONEYGUARD` map, then `HONEYGUARD_<KEY>` entries, then the
/// built-in default.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsSource {
    aggregate: Option<Map<String, Value>>,
    individual: HashMap<SettingKey, Value>,
}

impl SettingsSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_aggregate(mut self, map: Map<String, Value>) -> Self {
        self.aggregate = Some(map);
        self
    }

    pub fn with_individual(mut self, key: SettingKey, value: Value) -> Self {
        self.individual.insert(key, value);
        self
    }

    /// Reads `HONEYGUARD` (a JSON object) and `HONEYGUARD_<KEY>` variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut source = Self::new();
        if let Ok(raw) = env::var(AGGREGATE_SETTING) {
            if !raw.trim().is_empty() {
                match serde_json::from_str::<Value>(&raw) {
                    Ok(Value::Object(map)) => source.aggregate = Some(map),
                    _ => {
                        return Err(ConfigError::ImproperlyConfigured(format!(
                            "{} must be a JSON object",
                            AGGREGATE_SETTING
                        )))
                    }
                }
            }
        }
        for key in SettingKey::all() {
            if let Ok(raw) = env::var(format!("{}{}", INDIVIDUAL_PREFIX, key.name())) {
                source.individual.insert(key, parse_raw_value(&raw));
            }
        }
        Ok(source)
    }

    pub fn raw(&self, key: SettingKey) -> Result<Value, ConfigError> {
        if let Some(value) = self.aggregate.as_ref().and_then(|map| map.get(key.name())) {
            return Ok(value.clone());
        }
        if let Some(value) = self.individual.get(&key) {
            return Ok(value.clone());
        }
        default_value(key)
    }
}

#[derive(Debug, Default)]
struct SettingsState {
    source: SettingsSource,
    cache: HashMap<SettingKey, SettingValue>,
    validations: u64,
}

/// Process-wide, lazily validated settings.
///
/// Shared as `Arc<Settings>`; the source and the validated-value cache sit behind one lock
/// so an invalidation can never interleave with a half-populated read.
#[derive(Debug, Default)]
pub struct Settings {
    state: Mutex<SettingsState>,
}

impl Settings {
    pub fn new(source: SettingsSource) -> Self {
        Self {
            state: Mutex::new(SettingsState {
                source,
                ..SettingsState::default()
            }),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        SettingsSource::from_env().map(Self::new)
    }

    fn lock(&self) -> MutexGuard<'_, SettingsState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns the validated value for `key`, validating it on first access.
    pub fn get(&self, key: SettingKey) -> Result<SettingValue, ConfigError> {
        let (value, warnings) = {
            let mut state = self.lock();
            if let Some(cached) = state.cache.get(&key) {
                return Ok(cached.clone());
            }
            let raw = state.source.raw(key)?;
            let Validated { value, warnings } = validate_setting(key, &raw)?;
            state.validations += 1;
            state.cache.insert(key, value.clone());
            (value, warnings)
        };
        for warning in warnings {
            log::warn!(target: "honeyguard", "{}", warning);
        }
        Ok(value)
    }

    pub fn get_named(&self, name: &str) -> Result<SettingValue, ConfigError> {
        self.get(name.parse::<SettingKey>()?)
    }

    /// Drops every cached value; the next access re-validates.
    pub fn invalidate(&self) {
        self.lock().cache.clear();
    }

    /// Same as [`Settings::invalidate`]; safe to call repeatedly.
    pub fn reset(&self) {
        self.invalidate();
    }

    /// Swaps the whole source (e.g. after a configuration reload).
    pub fn replace_source(&self, source: SettingsSource) {
        let mut state = self.lock();
        state.source = source;
        state.cache.clear();
    }

    /// Change signal from the configuration owner.
    ///
    /// `HONEYGUARD` replaces (or with `None`, clears) the aggregate map; `HONEYGUARD_<KEY>`
    /// sets or clears one individual value. Other names are ignored. Returns whether the
    /// change touched HoneyGuard settings.
    pub fn change_setting(&self, name: &str, value: Option<Value>) -> bool {
        if name == AGGREGATE_SETTING {
            let mut state = self.lock();
            state.source.aggregate = match value {
                Some(Value::Object(map)) => Some(map),
                Some(other) => {
                    log::warn!(
                        target: "honeyguard",
                        "{} changed to a non-object value ({}); ignoring it",
                        AGGREGATE_SETTING,
                        other
                    );
                    None
                }
                None => None,
            };
            state.cache.clear();
            return true;
        }

        let Some(key) = name
            .strip_prefix(INDIVIDUAL_PREFIX)
            .and_then(|rest| rest.parse::<SettingKey>().ok())
        else {
            return false;
        };
        let mut state = self.lock();
        match value {
            Some(value) => {
                state.source.individual.insert(key, value);
            }
            None => {
                state.source.individual.remove(&key);
            }
        }
        state.cache.clear();
        true
    }

    /// Number of validations performed since construction.
    pub fn validation_count(&self) -> u64 {
        self.lock().validations
    }

    fn typed<T>(
        &self,
        key: SettingKey,
        extract: impl FnOnce(&SettingValue) -> Option<T>,
    ) -> Result<T, ConfigError> {
        let value = self.get(key)?;
        extract(&value).ok_or_else(|| {
            ConfigError::ImproperlyConfigured(format!(
                "HONEYGUARD['{}'] validated to an unexpected type: {:?}",
                key, value
            ))
        })
    }

    pub fn bool(&self, key: SettingKey) -> Result<bool, ConfigError> {
        self.typed(key, SettingValue::as_bool)
    }

    pub fn integer(&self, key: SettingKey) -> Result<u64, ConfigError> {
        self.typed(key, SettingValue::as_u64)
    }

    pub fn number(&self, key: SettingKey) -> Result<f64, ConfigError> {
        self.typed(key, SettingValue::as_f64)
    }

    pub fn string(&self, key: SettingKey) -> Result<String, ConfigError> {
        self.typed(key, |value| match value {
            SettingValue::Str(s) => Some(s.clone()),
            _ => None,
        })
    }

    pub fn email_recipients(&self) -> Result<Vec<String>, ConfigError> {
        self.typed(SettingKey::EmailRecipients, |value| {
            value.as_list().map(<[String]>::to_vec)
        })
    }

    pub fn email_from(&self) -> Result<Option<String>, ConfigError> {
        self.typed(SettingKey::EmailFrom, |value| match value {
            SettingValue::OptionalStr(v) => Some(v.clone()),
            _ => None,
        })
    }

    pub fn log_level(&self) -> Result<LogLevel, ConfigError> {
        self.typed(SettingKey::LogLevel, |value| match value {
            SettingValue::Level(level) => Some(*level),
            _ => None,
        })
    }

    pub fn time_zone(&self) -> Result<FixedOffset, ConfigError> {
        self.typed(SettingKey::TimeZone, |value| match value {
            SettingValue::Offset(offset) => Some(*offset),
            _ => None,
        })
    }

    pub fn timing_thresholds(&self) -> Result<TimingThresholds, ConfigError> {
        Ok(TimingThresholds {
            too_fast: self.number(SettingKey::TimingTooFastThreshold)?,
            too_slow: self.number(SettingKey::TimingTooSlowThreshold)?,
        })
    }

    /// Validates every key and returns them as one typed record.
    pub fn snapshot(&self) -> Result<HoneyGuardConfig, ConfigError> {
        let config = HoneyGuardConfig {
            email_recipients: self.email_recipients()?,
            email_subject_prefix: self.string(SettingKey::EmailSubjectPrefix)?,
            email_from: self.email_from()?,
            email_fail_silently: self.bool(SettingKey::EmailFailSilently)?,
            timing: self.timing_thresholds()?,
            enable_console_logging: self.bool(SettingKey::EnableConsoleLogging)?,
            log_level: self.log_level()?,
            enable_get_method_detection: self.bool(SettingKey::EnableGetMethodDetection)?,
            max_username_length: self.integer(SettingKey::MaxUsernameLength)?,
            max_password_length: self.integer(SettingKey::MaxPasswordLength)?,
            wordpress_username_max_length: self.integer(SettingKey::WordpressUsernameMaxLength)?,
            wordpress_password_max_length: self.integer(SettingKey::WordpressPasswordMaxLength)?,
            django_error_message: self.string(SettingKey::DjangoErrorMessage)?,
            wordpress_error_message: self.string(SettingKey::WordpressErrorMessage)?,
            render_token_max_age: self.integer(SettingKey::RenderTokenMaxAge)?,
            time_zone: self.time_zone()?,
        };
        if config.timing.too_fast >= config.timing.too_slow {
            log::warn!(
                target: "honeyguard",
                "TIMING_TOO_FAST_THRESHOLD ({}) is not below TIMING_TOO_SLOW_THRESHOLD ({}); every submission will be classified too fast",
                config.timing.too_fast,
                config.timing.too_slow
            );
        }
        Ok(config)
    }
}

/// Statically typed view over every validated setting.
#[derive(Debug, Clone, PartialEq)]
pub struct HoneyGuardConfig {
    pub email_recipients: Vec<String>,
    pub email_subject_prefix: String,
    pub email_from: Option<String>,
    pub email_fail_silently: bool,
    pub timing: TimingThresholds,
    pub enable_console_logging: bool,
    pub log_level: LogLevel,
    pub enable_get_method_detection: bool,
    pub max_username_length: u64,
    pub max_password_length: u64,
    pub wordpress_username_max_length: u64,
    pub wordpress_password_max_length: u64,
    pub django_error_message: String,
    pub wordpress_error_message: String,
    pub render_token_max_age: u64,
    pub time_zone: FixedOffset,
}
