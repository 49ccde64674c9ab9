// src/decoy.rs
// Fake login pages: what a renderer needs to draw them and what they answer with.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::{ConfigError, SettingKey, Settings};
use crate::signing::TimestampSigner;

pub const HONEYPOT_FIELD_NAME: &str = "hp";
pub const RENDER_TOKEN_FIELD_NAME: &str = "form_render_time";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecoyPersona {
    DjangoAdmin,
    WordPress,
}

impl DecoyPersona {
    pub fn as_str(self) -> &'static str {
        match self {
            DecoyPersona::DjangoAdmin => "django_admin",
            DecoyPersona::WordPress => "wordpress",
        }
    }

    fn length_keys(self) -> (SettingKey, SettingKey) {
        match self {
            DecoyPersona::DjangoAdmin => {
                (SettingKey::MaxUsernameLength, SettingKey::MaxPasswordLength)
            }
            DecoyPersona::WordPress => (
                SettingKey::WordpressUsernameMaxLength,
                SettingKey::WordpressPasswordMaxLength,
            ),
        }
    }

    /// Generic failure shown for every submission, whatever was typed.
    pub fn error_message(self, settings: &Settings) -> Result<String, ConfigError> {
        let key = match self {
            DecoyPersona::DjangoAdmin => SettingKey::DjangoErrorMessage,
            DecoyPersona::WordPress => SettingKey::WordpressErrorMessage,
        };
        settings.string(key)
    }

    pub fn form(self, settings: &Settings, signer: &TimestampSigner) -> Result<DecoyForm, ConfigError> {
        self.form_at(settings, signer, Utc::now())
    }

    /// Form data with the render token stamped at `rendered_at`.
    pub fn form_at(
        self,
        settings: &Settings,
        signer: &TimestampSigner,
        rendered_at: DateTime<Utc>,
    ) -> Result<DecoyForm, ConfigError> {
        let (username_key, password_key) = self.length_keys();
        Ok(DecoyForm {
            persona: self,
            render_token: render_token_at(signer, rendered_at),
            username_max_length: settings.integer(username_key)?,
            password_max_length: settings.integer(password_key)?,
            honeypot_field: HONEYPOT_FIELD_NAME,
            render_token_field: RENDER_TOKEN_FIELD_NAME,
        })
    }
}

/// Signed render-time token embedded in a decoy form.
pub fn render_token_at(signer: &TimestampSigner, rendered_at: DateTime<Utc>) -> String {
    signer.sign_at(&rendered_at.to_rfc3339(), rendered_at.timestamp())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecoyForm {
    pub persona: DecoyPersona,
    pub render_token: String,
    pub username_max_length: u64,
    pub password_max_length: u64,
    pub honeypot_field: &'static str,
    pub render_token_field: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SettingsSource;
    use chrono::TimeZone;
    use serde_json::json;

    fn signer() -> TimestampSigner {
        TimestampSigner::new(b"decoy-test-secret".to_vec())
    }

    #[test]
    fn personas_use_their_own_length_limits() {
        let settings = Settings::default();
        let django = DecoyPersona::DjangoAdmin.form(&settings, &signer()).unwrap();
        assert_eq!(django.username_max_length, 150);
        assert_eq!(django.password_max_length, 128);

        let wp = DecoyPersona::WordPress.form(&settings, &signer()).unwrap();
        assert_eq!(wp.username_max_length, 60);
        assert_eq!(wp.password_max_length, 255);
        assert_eq!(wp.honeypot_field, "hp");
        assert_eq!(wp.render_token_field, "form_render_time");
    }

    #[test]
    fn render_token_carries_the_render_time() {
        let rendered_at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let form = DecoyPersona::DjangoAdmin
            .form_at(&Settings::default(), &signer(), rendered_at)
            .unwrap();
        let value = signer()
            .unsign_at(&form.render_token, 60, rendered_at.timestamp() + 5)
            .unwrap();
        assert_eq!(value, rendered_at.to_rfc3339());
    }

    #[test]
    fn error_messages_follow_settings() {
        let settings = Settings::default();
        assert!(DecoyPersona::DjangoAdmin
            .error_message(&settings)
            .unwrap()
            .starts_with("Please enter a correct username and password."));
        assert!(DecoyPersona::WordPress
            .error_message(&settings)
            .unwrap()
            .contains("The password you entered for the username"));

        let custom = Settings::new(
            SettingsSource::new().with_individual(SettingKey::WordpressErrorMessage, json!("Nope.")),
        );
        assert_eq!(DecoyPersona::WordPress.error_message(&custom).unwrap(), "Nope.");
    }

    #[test]
    fn invalid_length_setting_propagates() {
        let settings = Settings::new(
            SettingsSource::new().with_individual(SettingKey::MaxUsernameLength, json!(0)),
        );
        assert!(DecoyPersona::DjangoAdmin.form(&settings, &signer()).is_err());
    }
}
