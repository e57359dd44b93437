//! Ticket Tracker - a multi-tenant issue tracker served over HTTP
//!
//! Administrators create projects and assign users to them; members file and
//! update tickets within their projects. Every operation takes the calling
//! user explicitly and is checked by [`auth::policy`] before anything is
//! mutated.

pub mod auth;
pub mod config;
pub mod constants;
pub mod core;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod security;
pub mod security_logger;
pub mod storage;
pub mod views;

// Re-export main components
pub use config::ServerConfig;
pub use error::{Result, TrackerError};
pub use routes::{routes, AppState, SharedState};
