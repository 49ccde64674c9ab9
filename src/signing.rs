// src/signing.rs
// Tamper-evident, expiring render-time tokens.
// Token layout: base64(payload json) "." base64(hmac-sha256(salt || payload json)).

use std::env;
use std::fmt;

use base64::{engine::general_purpose, Engine as _};
use chrono::Utc;
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

/// Environment variable holding the process signing secret.
pub const SIGNING_SECRET_ENV: &str = "HONEYGUARD_SIGNING_SECRET";

const SIGNING_SALT: &[u8] = b"honeyguard.render-time";
const GENERATED_SECRET_BYTES: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("render token signature does not match")]
    BadSignature,
    #[error("render token expired ({age}s old, max {max_age}s)")]
    Expired { age: u64, max_age: u64 },
}

#[derive(Debug, Serialize, Deserialize)]
struct SignedPayload {
    value: String,
    signed_at: i64,
}

#[derive(Clone)]
pub struct TimestampSigner {
    secret: Vec<u8>,
}

impl fmt::Debug for TimestampSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimestampSigner").finish_non_exhaustive()
    }
}

impl TimestampSigner {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Uses `HONEYGUARD_SIGNING_SECRET`, or a random secret that lives as long as the process.
    pub fn from_env() -> Self {
        match env::var(SIGNING_SECRET_ENV) {
            Ok(secret) if !secret.trim().is_empty() => Self::new(secret),
            _ => {
                log::warn!(
                    target: "honeyguard",
                    "{} is not set; using a per-process random signing secret",
                    SIGNING_SECRET_ENV
                );
                let mut secret = vec![0u8; GENERATED_SECRET_BYTES];
                rand::thread_rng().fill_bytes(&mut secret);
                Self::new(secret)
            }
        }
    }

    fn mac(&self) -> Hmac<Sha256> {
        let mut mac = Hmac::<Sha256>::new_from_slice(&self.secret)
            .expect("hmac accepts keys of any length");
        mac.update(SIGNING_SALT);
        mac
    }

    fn sign_payload(&self, payload: &str) -> Vec<u8> {
        let mut mac = self.mac();
        mac.update(payload.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }

    fn verify_signature(&self, payload: &str, sig: &[u8]) -> bool {
        let mut mac = self.mac();
        mac.update(payload.as_bytes());
        mac.verify_slice(sig).is_ok()
    }

    pub fn sign(&self, value: &str) -> String {
        self.sign_at(value, Utc::now().timestamp())
    }

    /// Signs `value` as if the clock read `signed_at` (unix seconds).
    pub fn sign_at(&self, value: &str, signed_at: i64) -> String {
        let payload = SignedPayload {
            value: value.to_string(),
            signed_at,
        };
        // A struct of a String and an i64 always serializes.
        let payload_json = serde_json::to_string(&payload).unwrap_or_default();
        let sig = self.sign_payload(&payload_json);
        format!(
            "{}.{}",
            general_purpose::STANDARD.encode(payload_json.as_bytes()),
            general_purpose::STANDARD.encode(sig)
        )
    }

    pub fn unsign(&self, token: &str, max_age_seconds: u64) -> Result<String, SignatureError> {
        self.unsign_at(token, max_age_seconds, Utc::now().timestamp())
    }

    /// Verifies `token` against the clock value `now` (unix seconds).
    pub fn unsign_at(
        &self,
        token: &str,
        max_age_seconds: u64,
        now: i64,
    ) -> Result<String, SignatureError> {
        let (payload_b64, sig_b64) = token
            .trim()
            .split_once('.')
            .ok_or(SignatureError::BadSignature)?;
        let payload_bytes = general_purpose::STANDARD
            .decode(payload_b64.as_bytes())
            .map_err(|_| SignatureError::BadSignature)?;
        let sig = general_purpose::STANDARD
            .decode(sig_b64.as_bytes())
            .map_err(|_| SignatureError::BadSignature)?;
        let payload_json =
            String::from_utf8(payload_bytes).map_err(|_| SignatureError::BadSignature)?;
        if !self.verify_signature(&payload_json, &sig) {
            return Err(SignatureError::BadSignature);
        }
        let payload = serde_json::from_str::<SignedPayload>(&payload_json)
            .map_err(|_| SignatureError::BadSignature)?;

        let age = now.saturating_sub(payload.signed_at).max(0) as u64;
        if age > max_age_seconds {
            return Err(SignatureError::Expired {
                age,
                max_age: max_age_seconds,
            });
        }
        Ok(payload.value)
    }
}
