//! CSRF (Cross-Site Request Forgery) Protection
//!
//! Mutating requests must pass two checks:
//!
//! 1. A form token bound to the caller's session id, signed with the server
//!    secret and limited in age.
//! 2. When the browser sends an `Origin` header, it must name this host.

use base64::Engine;
use rand::Rng;
use sha2::{Digest, Sha256};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::security::timing::{constant_time_eq, constant_time_eq_bytes};

/// Result of CSRF validation
#[derive(Debug, Clone, PartialEq)]
pub enum CSRFValidationResult {
    /// Request is valid and should be allowed
    Valid,
    /// Request has invalid origin
    InvalidOrigin(String),
    /// Request has invalid CSRF token
    InvalidToken(String),
    /// Request carries no token
    MissingToken,
}

impl CSRFValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, CSRFValidationResult::Valid)
    }

    /// Human-readable rejection reason
    pub fn reason(&self) -> String {
        match self {
            CSRFValidationResult::Valid => "valid".to_string(),
            CSRFValidationResult::InvalidOrigin(msg) => msg.clone(),
            CSRFValidationResult::InvalidToken(msg) => msg.clone(),
            CSRFValidationResult::MissingToken => "Missing anti-forgery token".to_string(),
        }
    }
}

/// CSRF token issuer and validator
pub struct CSRFProtection {
    /// Development mode flag (allows localhost origins)
    development_mode: bool,
    /// CSRF token secret for validation
    token_secret: String,
    /// Token validity duration in seconds
    token_validity_seconds: u64,
}

impl CSRFProtection {
    /// Create a new CSRF protection instance
    pub fn new(token_secret: String, token_validity: Duration, development_mode: bool) -> Self {
        Self {
            development_mode,
            token_secret,
            token_validity_seconds: token_validity.as_secs(),
        }
    }

    fn now() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }

    fn sign(&self, payload: &str) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(self.token_secret.as_bytes());
        hasher.update(payload.as_bytes());
        hasher.finalize().to_vec()
    }

    /// Generate a CSRF token for a specific session
    pub fn generate_csrf_token(&self, session_id: &str) -> String {
        self.generate_at(session_id, Self::now())
    }

    fn generate_at(&self, session_id: &str, timestamp: u64) -> String {
        let nonce: u64 = rand::thread_rng().gen();

        // Create token payload: session_id|timestamp|nonce
        let payload = format!("{}|{}|{}", session_id, timestamp, nonce);
        let signature = self.sign(&payload);

        // Encode as base64: payload.signature
        format!(
            "{}.{}",
            base64::engine::general_purpose::URL_SAFE.encode(payload.as_bytes()),
            base64::engine::general_purpose::URL_SAFE.encode(signature)
        )
    }

    /// Validate a CSRF token against the session it was issued for
    pub fn validate_csrf_token(&self, token: &str, session_id: &str) -> CSRFValidationResult {
        if token.is_empty() {
            return CSRFValidationResult::MissingToken;
        }

        let (encoded_payload, encoded_signature) = match token.split_once('.') {
            Some(parts) => parts,
            None => return CSRFValidationResult::InvalidToken("Malformed token".to_string()),
        };

        let payload = match base64::engine::general_purpose::URL_SAFE
            .decode(encoded_payload)
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
        {
            Some(payload) => payload,
            None => {
                return CSRFValidationResult::InvalidToken("Invalid payload encoding".to_string())
            }
        };

        // Parse payload: session_id|timestamp|nonce
        let payload_parts: Vec<&str> = payload.split('|').collect();
        if payload_parts.len() != 3 {
            return CSRFValidationResult::InvalidToken("Invalid payload structure".to_string());
        }

        if !constant_time_eq(payload_parts[0], session_id) {
            return CSRFValidationResult::InvalidToken("Session ID mismatch".to_string());
        }

        let timestamp: u64 = match payload_parts[1].parse() {
            Ok(ts) => ts,
            Err(_) => return CSRFValidationResult::InvalidToken("Invalid timestamp".to_string()),
        };
        if Self::now() > timestamp.saturating_add(self.token_validity_seconds) {
            return CSRFValidationResult::InvalidToken("Token expired".to_string());
        }

        let provided_signature = match base64::engine::general_purpose::URL_SAFE.decode(encoded_signature) {
            Ok(bytes) => bytes,
            Err(_) => {
                return CSRFValidationResult::InvalidToken("Invalid signature encoding".to_string())
            }
        };
        if !constant_time_eq_bytes(&provided_signature, &self.sign(&payload)) {
            return CSRFValidationResult::InvalidToken("Invalid signature".to_string());
        }

        CSRFValidationResult::Valid
    }

    /// Check that a present `Origin` header names the host that was addressed
    pub fn validate_origin(&self, origin: Option<&str>, host: Option<&str>) -> CSRFValidationResult {
        let origin = match origin {
            // Non-browser clients and some same-origin form posts omit it
            None => return CSRFValidationResult::Valid,
            Some(origin) => origin,
        };

        let parsed = match url::Url::parse(origin) {
            Ok(url) => url,
            Err(_) => {
                return CSRFValidationResult::InvalidOrigin(format!("Unparseable origin '{}'", origin))
            }
        };

        let origin_authority = match (parsed.host_str(), parsed.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => {
                return CSRFValidationResult::InvalidOrigin(format!("Origin '{}' has no host", origin))
            }
        };

        if host.map_or(false, |host| host.eq_ignore_ascii_case(&origin_authority)) {
            return CSRFValidationResult::Valid;
        }

        if self.development_mode && self.is_localhost_origin(origin) {
            log::debug!("Development mode: allowing localhost origin: {}", origin);
            return CSRFValidationResult::Valid;
        }

        CSRFValidationResult::InvalidOrigin(format!("Origin '{}' not allowed", origin))
    }

    /// Check if origin is localhost (for development mode)
    fn is_localhost_origin(&self, origin: &str) -> bool {
        origin.starts_with("http://localhost")
            || origin.starts_with("https://localhost")
            || origin.starts_with("http://127.0.0.1")
            || origin.starts_with("https://127.0.0.1")
            || origin.starts_with("http://[::1]")
            || origin.starts_with("https://[::1]")
    }
}
