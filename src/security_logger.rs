//! Security-focused logging module to track security events

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Types of security events to track
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecurityEvent {
    // Authentication events
    AuthenticationFailed { username: String, reason: String },
    AuthenticationSuccess { user_id: String },
    LoggedOut { user_id: String },

    // Authorization events
    PermissionDenied { user_id: String, action: String, resource: Option<String> },
    UnauthorizedAccess { resource: String },

    // Request forgery
    CSRFAttempt { user_id: Option<String>, reason: String },

    // Account and project administration
    AccountCreated { user_id: String, role: String, created_by: Option<String> },
    ProjectDeleted { project_id: String, deleted_by: String, tickets_removed: usize },
    MembershipChanged { project_id: String, user_id: String, change: String, changed_by: String },
}

impl SecurityEvent {
    /// Key used for counters and alert thresholds
    pub fn key(&self) -> &'static str {
        match self {
            SecurityEvent::AuthenticationFailed { .. } => "auth_failed",
            SecurityEvent::AuthenticationSuccess { .. } => "auth_success",
            SecurityEvent::LoggedOut { .. } => "logout",
            SecurityEvent::PermissionDenied { .. } => "permission_denied",
            SecurityEvent::UnauthorizedAccess { .. } => "unauthorized_access",
            SecurityEvent::CSRFAttempt { .. } => "csrf_attempt",
            SecurityEvent::AccountCreated { .. } => "account_created",
            SecurityEvent::ProjectDeleted { .. } => "project_deleted",
            SecurityEvent::MembershipChanged { .. } => "membership_changed",
        }
    }
}

/// Security event with timestamp
#[derive(Debug, Clone)]
struct TimestampedEvent {
    event: SecurityEvent,
    timestamp: Instant,
}

/// Security logger for tracking and alerting on security events
pub struct SecurityLogger {
    events: Arc<RwLock<Vec<TimestampedEvent>>>,
    event_counts: Arc<RwLock<HashMap<&'static str, usize>>>,
    max_events: usize,
    alert_thresholds: HashMap<&'static str, usize>,
}

impl Default for SecurityLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl SecurityLogger {
    /// Create a new security logger
    pub fn new() -> Self {
        let mut alert_thresholds = HashMap::new();
        alert_thresholds.insert("auth_failed", 5);
        alert_thresholds.insert("permission_denied", 20);
        alert_thresholds.insert("csrf_attempt", 1);

        Self {
            events: Arc::new(RwLock::new(Vec::new())),
            event_counts: Arc::new(RwLock::new(HashMap::new())),
            max_events: 10000,
            alert_thresholds,
        }
    }

    /// Log a security event
    pub async fn log_event(&self, event: SecurityEvent) {
        let event_key = event.key();

        {
            let mut events = self.events.write().await;
            events.push(TimestampedEvent {
                event: event.clone(),
                timestamp: Instant::now(),
            });

            // Limit memory usage
            if events.len() > self.max_events {
                let events_to_remove = events.len() - self.max_events;
                events.drain(0..events_to_remove);
            }
        }

        // Update counters and check for alerts
        {
            let mut counts = self.event_counts.write().await;
            let count = counts.entry(event_key).or_insert(0);
            *count += 1;

            if let Some(&threshold) = self.alert_thresholds.get(event_key) {
                if *count % threshold == 0 {
                    log::error!("SECURITY ALERT: {} events of type '{}' detected", count, event_key);
                    log::error!("Sample event: {:?}", event);
                }
            }
        }

        match event {
            SecurityEvent::AuthenticationFailed { username, reason } => {
                log::warn!("SECURITY: Authentication failed - Username: {}, Reason: {}", username, reason);
            }
            SecurityEvent::AuthenticationSuccess { user_id } => {
                log::info!("SECURITY: Authentication success - User: {}", user_id);
            }
            SecurityEvent::LoggedOut { user_id } => {
                log::info!("SECURITY: Logged out - User: {}", user_id);
            }
            SecurityEvent::PermissionDenied { user_id, action, resource } => {
                log::warn!("SECURITY: Permission denied - User: {}, Action: {}, Resource: {:?}", user_id, action, resource);
            }
            SecurityEvent::UnauthorizedAccess { resource } => {
                log::info!("SECURITY: Unauthenticated access redirected to login - Resource: {}", resource);
            }
            SecurityEvent::CSRFAttempt { user_id, reason } => {
                log::error!("SECURITY: CSRF attempt rejected - User: {:?}, Reason: {}", user_id, reason);
            }
            SecurityEvent::AccountCreated { user_id, role, created_by } => {
                log::info!("SECURITY: Account created - User: {}, Role: {}, Created by: {:?}", user_id, role, created_by);
            }
            SecurityEvent::ProjectDeleted { project_id, deleted_by, tickets_removed } => {
                log::warn!("SECURITY: Project deleted - Project: {}, By: {}, Tickets removed: {}", project_id, deleted_by, tickets_removed);
            }
            SecurityEvent::MembershipChanged { project_id, user_id, change, changed_by } => {
                log::info!("SECURITY: Membership {} - Project: {}, User: {}, By: {}", change, project_id, user_id, changed_by);
            }
        }
    }

    /// Get recent security events
    pub async fn get_recent_events(&self, duration: Duration) -> Vec<SecurityEvent> {
        let events = self.events.read().await;
        let now = Instant::now();

        events
            .iter()
            .filter(|event| now.duration_since(event.timestamp) <= duration)
            .map(|event| event.event.clone())
            .collect()
    }

    /// Get event statistics
    pub async fn get_event_stats(&self) -> HashMap<&'static str, usize> {
        self.event_counts.read().await.clone()
    }

    /// Clean up old events
    pub async fn cleanup_old_events(&self, max_age: Duration) {
        let mut events = self.events.write().await;
        let now = Instant::now();

        events.retain(|event| now.duration_since(event.timestamp) <= max_age);
    }

    /// Start periodic cleanup task
    pub fn start_cleanup_task(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(300)); // Every 5 minutes
            loop {
                interval.tick().await;
                self.cleanup_old_events(Duration::from_secs(3600 * 24)).await; // Keep 24 hours
            }
        });
    }
}

/// Global security logger instance - thread-safe singleton
static SECURITY_LOGGER: OnceLock<Arc<SecurityLogger>> = OnceLock::new();

/// Initialize the global security logger
pub fn init_security_logger() {
    SECURITY_LOGGER.get_or_init(|| {
        let logger = Arc::new(SecurityLogger::new());
        logger.clone().start_cleanup_task();
        logger
    });
}

/// Get the global security logger
pub fn get_security_logger() -> Option<Arc<SecurityLogger>> {
    SECURITY_LOGGER.get().cloned()
}

/// Log a security event using the global logger
pub async fn log_security_event(event: SecurityEvent) {
    if let Some(logger) = get_security_logger() {
        logger.log_event(event).await;
    }
}
