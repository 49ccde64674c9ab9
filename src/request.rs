// src/request.rs
// Request metadata captured for every decoy hit, and the sanitizing applied before it
// leaves the process.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Used when the only address available does not parse.
pub const FALLBACK_IP: &str = "0.0.0.0";
pub const UNKNOWN_IP: &str = "unknown";

/// Inbound event handed over by the request layer after form parsing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionEvent {
    pub hidden_field_value: String,
    pub render_time_token: Option<String>,
    pub user_agent: Option<String>,
}

impl SubmissionEvent {
    pub fn user_agent_present(&self) -> bool {
        self.user_agent
            .as_deref()
            .map(|ua| !ua.trim().is_empty())
            .unwrap_or(false)
    }
}

/// Credentials typed into a decoy form. Never logged or stored as-is.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &sanitize_credential(Some(self.username.as_str())))
            .field("password", &sanitize_credential(Some(self.password.as_str())))
            .finish()
    }
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn sanitized_username(&self) -> String {
        sanitize_credential(Some(self.username.as_str()))
    }

    pub fn sanitized_password(&self) -> String {
        sanitize_credential(Some(self.password.as_str()))
    }
}

/// Replaces a credential with a `***N chars***` placeholder; empty stays empty.
pub fn sanitize_credential(value: Option<&str>) -> String {
    match value {
        Some(v) if !v.is_empty() => format!("***{} chars***", v.chars().count()),
        _ => String::new(),
    }
}

fn parse_ip_addr(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<IpAddr>().ok().map(|addr| addr.to_string())
}

/// Best available client IP.
///
/// The first `X-Forwarded-For` entry is trusted as-is, which a client can spoof unless
/// the surrounding proxy overwrites the header.
pub fn client_ip(forwarded_for: Option<&str>, remote_addr: Option<&str>) -> String {
    let candidate = forwarded_for
        .and_then(|header| header.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty() && *ip != UNKNOWN_IP)
        .or_else(|| remote_addr.map(str::trim).filter(|ip| !ip.is_empty()));

    let Some(candidate) = candidate else {
        return UNKNOWN_IP.to_string();
    };
    match parse_ip_addr(candidate) {
        Some(ip) => ip,
        None => {
            log::warn!(target: "honeyguard", "Invalid IP address: {:?}", candidate);
            FALLBACK_IP.to_string()
        }
    }
}

/// Request details recorded alongside a detection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMetadata {
    pub ip_address: String,
    pub path: String,
    pub method: String,
    pub user_agent: String,
    pub referer: String,
    pub accept_language: String,
    pub accept_encoding: String,
    pub created_at: DateTime<Utc>,
}

impl RequestMetadata {
    pub fn new(ip_address: impl Into<String>, method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            ip_address: ip_address.into(),
            path: path.into(),
            method: method.into().to_ascii_uppercase(),
            user_agent: String::new(),
            referer: String::new(),
            accept_language: String::new(),
            accept_encoding: String::new(),
            created_at: Utc::now(),
        }
    }

    /// Builds metadata from lower-cased header names as most servers expose them.
    pub fn from_headers<'a>(
        method: &str,
        path: &str,
        remote_addr: Option<&str>,
        headers: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Self {
        let mut forwarded_for = None;
        let mut meta = Self::new(String::new(), method, path);
        for (name, value) in headers {
            match name.to_ascii_lowercase().as_str() {
                "x-forwarded-for" => forwarded_for = Some(value),
                "user-agent" => meta.user_agent = value.to_string(),
                "referer" => meta.referer = value.to_string(),
                "accept-language" => meta.accept_language = value.to_string(),
                "accept-encoding" => meta.accept_encoding = value.to_string(),
                _ => {}
            }
        }
        meta.ip_address = client_ip(forwarded_for, remote_addr);
        meta
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = referer.into();
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_counts_characters() {
        assert_eq!(sanitize_credential(Some("secret123")), "***9 chars***");
        assert_eq!(sanitize_credential(Some("a".repeat(100).as_str())), "***100 chars***");
        assert_eq!(sanitize_credential(Some("pässwörd")), "***8 chars***");
        assert_eq!(sanitize_credential(Some("")), "");
        assert_eq!(sanitize_credential(None), "");
    }

    #[test]
    fn credentials_debug_never_shows_clear_text() {
        let creds = Credentials::new("admin", "hunter2");
        let shown = format!("{:?}", creds);
        assert!(!shown.contains("hunter2"));
        assert!(!shown.contains("admin"));
        assert!(shown.contains("***7 chars***"));
    }

    #[test]
    fn forwarded_for_first_entry_wins() {
        assert_eq!(
            client_ip(Some("203.0.113.1, 10.0.0.1"), Some("192.168.1.1")),
            "203.0.113.1"
        );
    }

    #[test]
    fn remote_addr_is_the_fallback() {
        assert_eq!(client_ip(None, Some("192.168.1.1")), "192.168.1.1");
        assert_eq!(client_ip(Some("  "), Some("192.168.1.1")), "192.168.1.1");
        assert_eq!(client_ip(Some("unknown"), Some("::1")), "::1");
    }

    #[test]
    fn invalid_address_falls_back_to_zero() {
        assert_eq!(client_ip(None, Some("not-an-ip")), FALLBACK_IP);
        assert_eq!(client_ip(Some("evil, 1.2.3.4"), None), FALLBACK_IP);
    }

    #[test]
    fn nothing_at_all_is_unknown() {
        assert_eq!(client_ip(None, None), UNKNOWN_IP);
    }

    #[test]
    fn metadata_from_headers() {
        let meta = RequestMetadata::from_headers(
            "post",
            "/admin/",
            Some("192.168.1.1"),
            [
                ("User-Agent", "Mozilla/5.0"),
                ("Referer", "http://example.com"),
                ("Accept-Language", "en-US"),
                ("Accept-Encoding", "gzip"),
            ],
        );
        assert_eq!(meta.ip_address, "192.168.1.1");
        assert_eq!(meta.method, "POST");
        assert_eq!(meta.path, "/admin/");
        assert_eq!(meta.user_agent, "Mozilla/5.0");
        assert_eq!(meta.referer, "http://example.com");
        assert_eq!(meta.accept_language, "en-US");
        assert_eq!(meta.accept_encoding, "gzip");

        let bare = RequestMetadata::from_headers("GET", "/test", Some("192.168.1.1"), []);
        assert_eq!(bare.user_agent, "");
        assert_eq!(bare.referer, "");
    }

    #[test]
    fn builder_sets_referer_and_user_agent() {
        let meta = RequestMetadata::new("203.0.113.9", "POST", "/wp-login.php")
            .with_referer("https://search.example/?q=wp-admin")
            .with_user_agent("curl/8.4.0");
        assert_eq!(meta.referer, "https://search.example/?q=wp-admin");
        assert_eq!(meta.user_agent, "curl/8.4.0");
        assert_eq!(meta.accept_language, "");
    }

    #[test]
    fn user_agent_presence_ignores_blank_values() {
        let mut event = SubmissionEvent::default();
        assert!(!event.user_agent_present());
        event.user_agent = Some("  ".to_string());
        assert!(!event.user_agent_present());
        event.user_agent = Some("curl/8.0".to_string());
        assert!(event.user_agent_present());
    }
}
