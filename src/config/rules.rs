// src/config/rules.rs
// Per-key validation table and the single routine that applies it.

use std::fmt;
use std::str::FromStr;

use chrono::FixedOffset;
use serde::Serialize;
use serde_json::Value;

use super::ConfigError;

const TIMING_TOO_FAST_MIN: f64 = 0.1;
const TIMING_TOO_SLOW_MIN: f64 = 1.0;
const INTEGER_MIN: u64 = 1;

/// Every tunable the crate reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SettingKey {
    EmailRecipients,
    EmailSubjectPrefix,
    EmailFrom,
    EmailFailSilently,
    TimingTooFastThreshold,
    TimingTooSlowThreshold,
    EnableConsoleLogging,
    LogLevel,
    EnableGetMethodDetection,
    MaxUsernameLength,
    MaxPasswordLength,
    WordpressUsernameMaxLength,
    WordpressPasswordMaxLength,
    DjangoErrorMessage,
    WordpressErrorMessage,
    RenderTokenMaxAge,
    TimeZone,
}

/// Shape and constraint for one setting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rule {
    EmailList,
    Number { min: f64 },
    LogLevel,
    Bool,
    Integer { min: u64 },
    Str,
    OptionalStr,
    TimeZone,
}

pub struct SettingSpec {
    pub key: SettingKey,
    pub name: &'static str,
    pub rule: Rule,
}

pub static SETTING_TABLE: &[SettingSpec] = &[
    SettingSpec { key: SettingKey::EmailRecipients, name: "EMAIL_RECIPIENTS", rule: Rule::EmailList },
    SettingSpec { key: SettingKey::EmailSubjectPrefix, name: "EMAIL_SUBJECT_PREFIX", rule: Rule::Str },
    SettingSpec { key: SettingKey::EmailFrom, name: "EMAIL_FROM", rule: Rule::OptionalStr },
    SettingSpec { key: SettingKey::EmailFailSilently, name: "EMAIL_FAIL_SILENTLY", rule: Rule::Bool },
    SettingSpec {
        key: SettingKey::TimingTooFastThreshold,
        name: "TIMING_TOO_FAST_THRESHOLD",
        rule: Rule::Number { min: TIMING_TOO_FAST_MIN },
    },
    SettingSpec {
        key: SettingKey::TimingTooSlowThreshold,
        name: "TIMING_TOO_SLOW_THRESHOLD",
        rule: Rule::Number { min: TIMING_TOO_SLOW_MIN },
    },
    SettingSpec { key: SettingKey::EnableConsoleLogging, name: "ENABLE_CONSOLE_LOGGING", rule: Rule::Bool },
    SettingSpec { key: SettingKey::LogLevel, name: "LOG_LEVEL", rule: Rule::LogLevel },
    SettingSpec {
        key: SettingKey::EnableGetMethodDetection,
        name: "ENABLE_GET_METHOD_DETECTION",
        rule: Rule::Bool,
    },
    SettingSpec {
        key: SettingKey::MaxUsernameLength,
        name: "MAX_USERNAME_LENGTH",
        rule: Rule::Integer { min: INTEGER_MIN },
    },
    SettingSpec {
        key: SettingKey::MaxPasswordLength,
        name: "MAX_PASSWORD_LENGTH",
        rule: Rule::Integer { min: INTEGER_MIN },
    },
    SettingSpec {
        key: SettingKey::WordpressUsernameMaxLength,
        name: "WORDPRESS_USERNAME_MAX_LENGTH",
        rule: Rule::Integer { min: INTEGER_MIN },
    },
    SettingSpec {
        key: SettingKey::WordpressPasswordMaxLength,
        name: "WORDPRESS_PASSWORD_MAX_LENGTH",
        rule: Rule::Integer { min: INTEGER_MIN },
    },
    SettingSpec { key: SettingKey::DjangoErrorMessage, name: "DJANGO_ERROR_MESSAGE", rule: Rule::Str },
    SettingSpec { key: SettingKey::WordpressErrorMessage, name: "WORDPRESS_ERROR_MESSAGE", rule: Rule::Str },
    SettingSpec {
        key: SettingKey::RenderTokenMaxAge,
        name: "RENDER_TOKEN_MAX_AGE",
        rule: Rule::Integer { min: INTEGER_MIN },
    },
    SettingSpec { key: SettingKey::TimeZone, name: "TIME_ZONE", rule: Rule::TimeZone },
];

impl SettingKey {
    pub fn all() -> impl Iterator<Item = SettingKey> {
        SETTING_TABLE.iter().map(|spec| spec.key)
    }

    // SETTING_TABLE is declared in variant order.
    fn spec(self) -> &'static SettingSpec {
        &SETTING_TABLE[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.spec().name
    }

    pub fn rule(self) -> Rule {
        self.spec().rule
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SettingKey {
    type Err = ConfigError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        SETTING_TABLE
            .iter()
            .find(|spec| spec.name == name)
            .map(|spec| spec.key)
            .ok_or_else(|| ConfigError::UnknownSetting(name.to_string()))
    }
}

/// Recognised log levels, ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    pub const ALL: [LogLevel; 5] = [
        LogLevel::Debug,
        LogLevel::Info,
        LogLevel::Warning,
        LogLevel::Error,
        LogLevel::Critical,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let upper = value.trim().to_ascii_uppercase();
        Self::ALL.into_iter().find(|level| level.as_str() == upper)
    }

    /// `log` has no critical level; it folds into error.
    pub fn to_log_level(self) -> log::Level {
        match self {
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Info => log::Level::Info,
            LogLevel::Warning => log::Level::Warn,
            LogLevel::Error | LogLevel::Critical => log::Level::Error,
        }
    }
}

/// A value that passed its rule.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingValue {
    StringList(Vec<String>),
    Number(f64),
    Level(LogLevel),
    Bool(bool),
    Integer(u64),
    Str(String),
    OptionalStr(Option<String>),
    Offset(FixedOffset),
}

impl SettingValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SettingValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SettingValue::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            SettingValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SettingValue::Str(v) => Some(v.as_str()),
            SettingValue::Level(level) => Some(level.as_str()),
            SettingValue::OptionalStr(v) => v.as_deref(),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            SettingValue::StringList(v) => Some(v.as_slice()),
            _ => None,
        }
    }
}

/// Validation result plus the non-fatal complaints raised on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Validated {
    pub value: SettingValue,
    pub warnings: Vec<String>,
}

impl Validated {
    fn clean(value: SettingValue) -> Self {
        Self { value, warnings: Vec::new() }
    }
}

fn improper(key: SettingKey, detail: String) -> ConfigError {
    ConfigError::ImproperlyConfigured(format!("HONEYGUARD['{}'] {}", key.name(), detail))
}

fn describe(raw: &Value) -> String {
    match raw {
        Value::String(s) => format!("'{}'", s),
        other => other.to_string(),
    }
}

/// Validates `raw` against the rule declared for `key`.
pub fn validate_setting(key: SettingKey, raw: &Value) -> Result<Validated, ConfigError> {
    match key.rule() {
        Rule::EmailList => validate_email_list(key, raw),
        Rule::Number { min } => validate_number(key, raw, min),
        Rule::LogLevel => validate_log_level(key, raw),
        Rule::Bool => validate_bool(key, raw),
        Rule::Integer { min } => validate_integer(key, raw, min),
        Rule::Str => Ok(validate_string(key, raw)),
        Rule::OptionalStr => validate_optional_string(key, raw),
        Rule::TimeZone => validate_time_zone(key, raw),
    }
}

pub(crate) fn looks_like_email(value: &str) -> bool {
    let Some((local, domain)) = value.trim().split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain
            .split_once('.')
            .map(|(head, tail)| !head.is_empty() && !tail.is_empty())
            .unwrap_or(false)
}

fn validate_email_list(key: SettingKey, raw: &Value) -> Result<Validated, ConfigError> {
    let Value::Array(items) = raw else {
        return Err(improper(
            key,
            format!("must be a list or array, got {}", describe(raw)),
        ));
    };
    let mut list = Vec::with_capacity(items.len());
    let mut warnings = Vec::new();
    for item in items {
        let Value::String(address) = item else {
            return Err(improper(
                key,
                format!("must contain only strings, got {}", describe(item)),
            ));
        };
        if !looks_like_email(address) {
            warnings.push(format!(
                "HONEYGUARD['{}'] contains potentially invalid email: {}",
                key.name(),
                address
            ));
        }
        list.push(address.clone());
    }
    Ok(Validated { value: SettingValue::StringList(list), warnings })
}

fn validate_number(key: SettingKey, raw: &Value, min: f64) -> Result<Validated, ConfigError> {
    let number = raw
        .as_f64()
        .ok_or_else(|| improper(key, format!("must be a number, got {}", describe(raw))))?;
    if number < min {
        return Err(improper(key, format!("must be >= {:.1}, got {}", min, number)));
    }
    Ok(Validated::clean(SettingValue::Number(number)))
}

fn validate_log_level(key: SettingKey, raw: &Value) -> Result<Validated, ConfigError> {
    let Value::String(level) = raw else {
        return Err(improper(key, format!("must be a string, got {}", describe(raw))));
    };
    LogLevel::parse(level)
        .map(|level| Validated::clean(SettingValue::Level(level)))
        .ok_or_else(|| {
            let names: Vec<&str> = LogLevel::ALL.iter().map(|l| l.as_str()).collect();
            improper(
                key,
                format!("must be one of {}, got '{}'", names.join(", "), level),
            )
        })
}

fn validate_bool(key: SettingKey, raw: &Value) -> Result<Validated, ConfigError> {
    let coerced = match raw {
        Value::Bool(v) => return Ok(Validated::clean(SettingValue::Bool(*v))),
        Value::String(s) if s.trim().eq_ignore_ascii_case("true") => Some(true),
        Value::String(s) if s.trim().eq_ignore_ascii_case("false") => Some(false),
        Value::Number(n) => match n.as_f64() {
            Some(v) if v == 1.0 => Some(true),
            Some(v) if v == 0.0 => Some(false),
            _ => None,
        },
        _ => None,
    };
    match coerced {
        Some(value) => Ok(Validated {
            value: SettingValue::Bool(value),
            warnings: vec![format!(
                "HONEYGUARD['{}'] should be a boolean, got {}; using {}",
                key.name(),
                describe(raw),
                value
            )],
        }),
        None => Err(improper(key, format!("must be a boolean, got {}", describe(raw)))),
    }
}

fn validate_integer(key: SettingKey, raw: &Value, min: u64) -> Result<Validated, ConfigError> {
    // i128 spans all of u64 plus the negatives.
    let integer = match raw {
        Value::Number(n) => n
            .as_u64()
            .map(i128::from)
            .or_else(|| n.as_i64().map(i128::from))
            .or_else(|| {
                n.as_f64()
                    .filter(|v| v.fract() == 0.0 && v.abs() < u64::MAX as f64)
                    .map(|v| v as i128)
            }),
        _ => None,
    }
    .ok_or_else(|| improper(key, format!("must be an integer, got {}", describe(raw))))?;
    let value = u64::try_from(integer)
        .ok()
        .filter(|v| *v >= min)
        .ok_or_else(|| improper(key, format!("must be >= {}, got {}", min, integer)))?;
    Ok(Validated::clean(SettingValue::Integer(value)))
}

fn validate_string(key: SettingKey, raw: &Value) -> Validated {
    match raw {
        Value::String(s) => Validated::clean(SettingValue::Str(s.clone())),
        other => {
            let text = other.to_string();
            Validated {
                warnings: vec![format!(
                    "HONEYGUARD['{}'] should be a string, got {}; converting to '{}'",
                    key.name(),
                    other,
                    text
                )],
                value: SettingValue::Str(text),
            }
        }
    }
}

fn validate_optional_string(key: SettingKey, raw: &Value) -> Result<Validated, ConfigError> {
    match raw {
        Value::Null => Ok(Validated::clean(SettingValue::OptionalStr(None))),
        Value::String(s) => Ok(Validated::clean(SettingValue::OptionalStr(Some(s.clone())))),
        other => Err(improper(
            key,
            format!("must be a string or null, got {}", describe(other)),
        )),
    }
}

pub(crate) fn parse_fixed_offset(value: &str) -> Option<FixedOffset> {
    let trimmed = value.trim();
    if trimmed.eq_ignore_ascii_case("utc") || trimmed == "Z" {
        return FixedOffset::east_opt(0);
    }
    let (sign, rest) = match trimmed.as_bytes().first()? {
        b'+' => (1, &trimmed[1..]),
        b'-' => (-1, &trimmed[1..]),
        _ => return None,
    };
    let (hours, minutes) = match rest.split_once(':') {
        Some((h, m)) => (h, m),
        None if rest.len() == 4 => rest.split_at(2),
        None => return None,
    };
    if hours.len() != 2 || minutes.len() != 2 {
        return None;
    }
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

fn validate_time_zone(key: SettingKey, raw: &Value) -> Result<Validated, ConfigError> {
    raw.as_str()
        .and_then(parse_fixed_offset)
        .map(|offset| Validated::clean(SettingValue::Offset(offset)))
        .ok_or_else(|| {
            improper(
                key,
                format!(
                    "must be 'UTC' or a fixed offset such as '+02:00', got {}",
                    describe(raw)
                ),
            )
        })
}
