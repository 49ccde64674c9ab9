// src/handlers/event_log.rs
// Persists each detection as an immutable key-value record.

use rand::random;

use super::{DetectionHandler, DetectionRecord, HandlerError, TriggerContext};
use crate::config::Settings;
use crate::store::KeyValueStore;

/// Key layout: honeyguard:eventlog:v1:<hour>:<ts>-<nonce>
const EVENTLOG_PREFIX: &str = "honeyguard:eventlog:v1";

pub struct EventLogHandler<S> {
    store: S,
}

impl<S: KeyValueStore> EventLogHandler<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S: KeyValueStore + Send + Sync> DetectionHandler for EventLogHandler<S> {
    fn name(&self) -> &'static str {
        "event_log"
    }

    fn handle(&self, ctx: &TriggerContext<'_>, _settings: &Settings) -> Result<(), HandlerError> {
        let record = ctx.record();
        log_record(&self.store, &record).map(|_| ())
    }
}

fn make_event_key(ts: u64) -> String {
    format!(
        "{}:{}:{}-{:016x}",
        EVENTLOG_PREFIX,
        ts / 3600,
        ts,
        random::<u64>()
    )
}

fn parse_event_hour(key: &str) -> Option<u64> {
    let rest = key.strip_prefix(EVENTLOG_PREFIX)?.strip_prefix(':')?;
    let (hour, _) = rest.split_once(':')?;
    hour.parse::<u64>().ok()
}

/// Writes `record` under a fresh key, which is returned.
pub fn log_record<S: KeyValueStore + ?Sized>(
    store: &S,
    record: &DetectionRecord,
) -> Result<String, HandlerError> {
    // Each event gets its own key; no read-modify-write.
    let ts = record.timestamp.timestamp().max(0) as u64;
    let key = make_event_key(ts);
    let payload = serde_json::to_vec(record)?;
    store
        .set(&key, &payload)
        .map_err(|_| HandlerError::Store(key.clone()))?;
    Ok(key)
}

/// All stored records, newest first. Unreadable entries are skipped.
pub fn list_records<S: KeyValueStore + ?Sized>(store: &S) -> Vec<DetectionRecord> {
    let keys = store.get_keys().unwrap_or_default();
    let mut records: Vec<DetectionRecord> = keys
        .iter()
        .filter(|key| parse_event_hour(key).is_some())
        .filter_map(|key| store.get(key).ok().flatten())
        .filter_map(|bytes| serde_json::from_slice::<DetectionRecord>(&bytes).ok())
        .collect();
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    records
}

/// Deletes records older than `retention_hours` relative to `now_ts`. Returns how many went.
pub fn cleanup_expired<S: KeyValueStore + ?Sized>(
    store: &S,
    retention_hours: u64,
    now_ts: u64,
) -> usize {
    let cutoff_hour = (now_ts / 3600).saturating_sub(retention_hours);
    let mut removed = 0;
    if let Ok(keys) = store.get_keys() {
        for key in keys {
            let Some(event_hour) = parse_event_hour(&key) else {
                continue;
            };
            if event_hour < cutoff_hour {
                match store.delete(&key) {
                    Ok(()) => removed += 1,
                    Err(()) => log::warn!(
                        target: "honeyguard",
                        "failed deleting expired event {}",
                        key
                    ),
                }
            }
        }
    }
    removed
}
