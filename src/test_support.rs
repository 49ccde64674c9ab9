use once_cell::sync::Lazy;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::{SettingKey, Settings, SettingsSource};
use crate::handlers::{EmailMessage, MailError, Mailer};
use crate::store::KeyValueStore;

static ENV_MUTEX: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

pub(crate) fn lock_env() -> MutexGuard<'static, ()> {
    ENV_MUTEX
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub(crate) fn settings_with(pairs: &[(SettingKey, serde_json::Value)]) -> Settings {
    let source = pairs
        .iter()
        .fold(SettingsSource::new(), |source, (key, value)| {
            source.with_individual(*key, value.clone())
        });
    Settings::new(source)
}

/// Keeps every message it is asked to send. Clones share the outbox.
#[derive(Clone, Default)]
pub(crate) struct RecordingMailer {
    sent: Arc<Mutex<Vec<EmailMessage>>>,
}

impl RecordingMailer {
    pub(crate) fn sent(&self) -> Vec<EmailMessage> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl Mailer for RecordingMailer {
    fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(message.clone());
        Ok(())
    }
}

pub(crate) struct FailingMailer;

impl Mailer for FailingMailer {
    fn send(&self, _message: &EmailMessage) -> Result<(), MailError> {
        Err(MailError::Transport("connection refused".to_string()))
    }
}

/// Store whose writes always fail.
pub(crate) struct ReadOnlyStore;

impl KeyValueStore for ReadOnlyStore {
    fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, ()> {
        Ok(None)
    }

    fn set(&self, _key: &str, _value: &[u8]) -> Result<(), ()> {
        Err(())
    }

    fn delete(&self, _key: &str) -> Result<(), ()> {
        Err(())
    }
}
