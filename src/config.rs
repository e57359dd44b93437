//! Server configuration module
//! Handles dynamic configuration parameters for the tracker server

use crate::constants::{
    DEFAULT_CSRF_TOKEN_TTL_SECS, DEFAULT_HOST, DEFAULT_PORT, DEFAULT_SESSION_TTL_SECS,
};
use crate::error::{Result, TrackerError};
use std::env;
use std::time::Duration;

/// Credentials for the administrator provisioned at start-up
#[derive(Clone)]
pub struct BootstrapAdmin {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for BootstrapAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapAdmin")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Server configuration parameters
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Secret used to sign anti-forgery tokens
    pub csrf_secret: String,
    /// Idle lifetime of a server-side session
    pub session_ttl: Duration,
    /// Validity window of an anti-forgery token
    pub csrf_token_ttl: Duration,
    /// Development mode (enables localhost origins, allows non-Secure cookies)
    pub development_mode: bool,
    /// TLS configuration
    pub tls_cert_path: Option<String>,
    pub tls_key_path: Option<String>,
    /// Enable TLS
    pub enable_tls: bool,
    /// Administrator account created at start-up when missing
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        panic!("ServerConfig::default() is not allowed for security reasons. Use ServerConfig::from_env() instead.");
    }
}

impl ServerConfig {
    /// Create a test configuration - DANGEROUS: Only for testing!
    #[doc(hidden)]
    pub fn for_testing() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            csrf_secret: "test-csrf-secret-only-for-unit-tests-never-use-in-production".to_string(),
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
            csrf_token_ttl: Duration::from_secs(DEFAULT_CSRF_TOKEN_TTL_SECS),
            development_mode: true,
            tls_cert_path: None,
            tls_key_path: None,
            enable_tls: false,
            bootstrap_admin: None,
        }
    }

    /// Whether session cookies must carry the Secure attribute
    pub fn secure_cookies(&self) -> bool {
        self.enable_tls || !self.development_mode
    }

    /// Validate that a secret meets security requirements
    fn validate_secret(secret: &str, secret_type: &str) -> Result<()> {
        if secret.len() < 32 {
            return Err(TrackerError::ConfigError(format!(
                "{} secret must be at least 32 characters long",
                secret_type
            )));
        }

        // Check for insecure default or example values
        let insecure_patterns = [
            "your-secret-key",
            "change-this",
            "test-secret",
            "default",
            "secret",
            "password",
            "12345",
        ];

        for pattern in &insecure_patterns {
            if secret.contains(pattern) {
                return Err(TrackerError::ConfigError(format!(
                    "{} secret contains insecure pattern '{}'. Please use a secure random secret generated with: openssl rand -base64 32",
                    secret_type, pattern
                )));
            }
        }

        // Ensure some complexity
        if secret.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(TrackerError::ConfigError(format!(
                "{} secret should contain mixed characters (letters, numbers, symbols) for security",
                secret_type
            )));
        }

        Ok(())
    }

    fn env_flag(name: &str) -> bool {
        env::var(name)
            .map(|v| v.to_lowercase() == "true" || v == "1")
            .unwrap_or(false)
    }

    fn env_secs(name: &str, default: u64) -> Duration {
        let secs = env::var(name)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(default);
        Duration::from_secs(secs)
    }

    /// Load configuration from environment variables if available
    pub fn from_env() -> Result<Self> {
        let host = env::var("TRACKER_HOST").unwrap_or(DEFAULT_HOST.to_string());
        let port = env::var("TRACKER_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let csrf_secret = env::var("TRACKER_CSRF_SECRET")
            .or_else(|_| env::var("CSRF_SECRET"))
            .map_err(|_| {
                TrackerError::ConfigError(
                    "CSRF_SECRET environment variable is required for security. \
                     Generate one with: openssl rand -base64 32"
                        .to_string(),
                )
            })?;

        let session_ttl = Self::env_secs("TRACKER_SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS);
        let csrf_token_ttl =
            Self::env_secs("TRACKER_CSRF_TOKEN_TTL_SECS", DEFAULT_CSRF_TOKEN_TTL_SECS);

        // SECURITY: Default to false (production mode)
        let development_mode = Self::env_flag("TRACKER_DEVELOPMENT_MODE");

        // TLS configuration
        let enable_tls = Self::env_flag("TRACKER_ENABLE_TLS");
        let tls_cert_path = env::var("TRACKER_TLS_CERT_PATH").ok();
        let tls_key_path = env::var("TRACKER_TLS_KEY_PATH").ok();

        if enable_tls {
            match (&tls_cert_path, &tls_key_path) {
                (Some(cert_path), Some(key_path)) => {
                    if !std::path::Path::new(cert_path).exists() {
                        return Err(TrackerError::ConfigError(format!(
                            "TLS certificate file does not exist: {}",
                            cert_path
                        )));
                    }
                    if !std::path::Path::new(key_path).exists() {
                        return Err(TrackerError::ConfigError(format!(
                            "TLS private key file does not exist: {}",
                            key_path
                        )));
                    }
                }
                _ => {
                    return Err(TrackerError::ConfigError(
                        "TLS is enabled but TRACKER_TLS_CERT_PATH or TRACKER_TLS_KEY_PATH is not set"
                            .to_string(),
                    ))
                }
            }
        }

        let bootstrap_admin = match (
            env::var("TRACKER_ADMIN_USERNAME").ok(),
            env::var("TRACKER_ADMIN_PASSWORD").ok(),
        ) {
            (Some(username), Some(password)) => Some(BootstrapAdmin { username, password }),
            (None, None) => None,
            _ => {
                return Err(TrackerError::ConfigError(
                    "TRACKER_ADMIN_USERNAME and TRACKER_ADMIN_PASSWORD must be set together"
                        .to_string(),
                ))
            }
        };

        Self::validate_secret(&csrf_secret, "CSRF")?;

        Ok(Self {
            host,
            port,
            csrf_secret,
            session_ttl,
            csrf_token_ttl,
            development_mode,
            tls_cert_path,
            tls_key_path,
            enable_tls,
            bootstrap_admin,
        })
    }
}
