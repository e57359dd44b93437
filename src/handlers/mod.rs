//! Request handlers for the tracker's HTTP endpoints

pub mod auth;
pub mod context;
pub mod projects;
pub mod responses;
pub mod tickets;

pub use context::{RequestContext, RequestMeta};

use crate::core::validation::FieldErrors;
use crate::error::{Result, TrackerError};

/// Errors that re-render the submitted form with field messages.
///
/// Anything else is passed through to the generic error mapping.
pub(crate) fn form_errors(err: TrackerError) -> Result<FieldErrors> {
    match err {
        TrackerError::Validation(errors) => Ok(errors),
        TrackerError::Conflict { field, message } => Ok(FieldErrors::single(field, message)),
        other => Err(other),
    }
}
