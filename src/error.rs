use std::error::Error;
use std::fmt;
use std::sync::PoisonError;

use crate::core::validation::FieldErrors;

#[derive(Debug, Clone, PartialEq)]
pub enum TrackerError {
    // Session errors
    /// No authenticated session; carries the originally requested target
    Unauthorized { next: Option<String> },
    SessionError(String),

    // Authorization errors
    Forbidden(String),
    CsrfRejected(String),

    // Credential errors
    InvalidCredentials,
    PasswordHashError(String),

    // Data errors
    Conflict { field: &'static str, message: String },
    NotFound(String),
    StorageError(String),

    // Request errors
    Validation(FieldErrors),
    BadRequest(String),

    // Configuration errors
    ConfigError(String),
}

impl TrackerError {
    pub fn conflict(field: &'static str, message: impl Into<String>) -> Self {
        Self::Conflict {
            field,
            message: message.into(),
        }
    }

    /// HTTP status code equivalent of this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Unauthorized { .. } => 401,
            Self::Forbidden(_) | Self::CsrfRejected(_) => 403,
            Self::NotFound(_) => 404,
            Self::Conflict { .. } => 409,
            Self::Validation(_) | Self::InvalidCredentials => 422,
            Self::BadRequest(_) => 400,
            Self::SessionError(_)
            | Self::PasswordHashError(_)
            | Self::StorageError(_)
            | Self::ConfigError(_) => 500,
        }
    }
}

impl fmt::Display for TrackerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthorized { next } => match next {
                Some(target) => write!(f, "Authentication required to access {}", target),
                None => write!(f, "Authentication required"),
            },
            Self::SessionError(msg) => write!(f, "Session error: {}", msg),
            Self::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            Self::CsrfRejected(msg) => write!(f, "Request rejected: {}", msg),
            Self::InvalidCredentials => write!(f, "Invalid username or password"),
            Self::PasswordHashError(msg) => write!(f, "Password hashing error: {}", msg),
            Self::Conflict { field, message } => write!(f, "Conflict on {}: {}", field, message),
            Self::NotFound(msg) => write!(f, "Not found: {}", msg),
            Self::StorageError(msg) => write!(f, "Storage error: {}", msg),
            Self::Validation(errors) => write!(f, "Validation error: {}", errors),
            Self::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            Self::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl Error for TrackerError {}

// Converting from PoisonError to facilitate poisoned mutex handling
impl<T> From<PoisonError<T>> for TrackerError {
    fn from(err: PoisonError<T>) -> Self {
        TrackerError::SessionError(format!("Mutex poisoned: {}", err))
    }
}

// Generic result type for the tracker
pub type Result<T> = std::result::Result<T, TrackerError>;
