//! Server-side session management
//!
//! A session is an opaque random id (sent to the browser in a cookie) mapped
//! to a [`SessionState`] and a queue of flash notices. Identities are always
//! re-resolved through the user store, so a session pointing at a user that
//! no longer exists behaves as anonymous.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use crate::auth::user::{User, UserId};
use crate::constants::SESSION_CLEANUP_INTERVAL_SECS;
use crate::error::{Result, TrackerError};
use crate::storage::traits::UserStorage;

/// Authentication state of one session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Anonymous,
    Authenticated(UserId),
}

impl SessionState {
    /// Re-login replaces the identity
    pub fn login(self, user_id: UserId) -> Self {
        SessionState::Authenticated(user_id)
    }

    pub fn logout(self) -> Self {
        SessionState::Anonymous
    }

    pub fn user_id(&self) -> Option<UserId> {
        match self {
            SessionState::Anonymous => None,
            SessionState::Authenticated(id) => Some(*id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashCategory {
    Success,
    Info,
    Danger,
}

impl FlashCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlashCategory::Success => "success",
            FlashCategory::Info => "info",
            FlashCategory::Danger => "danger",
        }
    }
}

/// One-shot user-visible notice
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flash {
    pub category: FlashCategory,
    pub message: String,
}

#[derive(Debug)]
struct Session {
    state: SessionState,
    flashes: Vec<Flash>,
    last_seen: Instant,
}

impl Session {
    fn new() -> Self {
        Self {
            state: SessionState::Anonymous,
            flashes: Vec::new(),
            last_seen: Instant::now(),
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.last_seen.elapsed() > ttl
    }
}

pub const LOGIN_REQUIRED_NOTICE: &str = "Please log in to access this page.";

/// Manages all live sessions
pub struct SessionManager {
    sessions: RwLock<HashMap<String, Session>>,
    ttl: Duration,
}

impl SessionManager {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    fn generate_id() -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }

    /// Create a fresh anonymous session and return its id
    pub fn create_session(&self) -> Result<String> {
        let id = Self::generate_id();
        self.sessions.write()?.insert(id.clone(), Session::new());
        Ok(id)
    }

    /// Resume the session named by a cookie, or start a new one.
    ///
    /// Returns the id in use and whether it was newly created.
    pub fn resume(&self, cookie: Option<&str>) -> Result<(String, bool)> {
        if let Some(id) = cookie {
            let mut sessions = self.sessions.write()?;
            let expired = match sessions.get_mut(id) {
                Some(session) if !session.is_expired(self.ttl) => {
                    session.last_seen = Instant::now();
                    return Ok((id.to_string(), false));
                }
                Some(_) => true,
                None => false,
            };
            if expired {
                log::debug!("Session expired, starting a new one");
                sessions.remove(id);
            }
        }

        Ok((self.create_session()?, true))
    }

    pub fn state(&self, session_id: &str) -> Result<SessionState> {
        self.sessions
            .read()?
            .get(session_id)
            .map(|session| session.state)
            .ok_or_else(|| TrackerError::SessionError("Session not found".to_string()))
    }

    /// Authenticate the session as `user`.
    ///
    /// The session id is rotated; pending flashes move to the new id, which is
    /// returned and must replace the client's cookie.
    pub fn login(&self, session_id: &str, user: &User) -> Result<String> {
        let mut sessions = self.sessions.write()?;
        let mut session = sessions.remove(session_id).unwrap_or_else(Session::new);
        session.state = session.state.login(user.id);
        session.last_seen = Instant::now();

        let new_id = Self::generate_id();
        sessions.insert(new_id.clone(), session);
        log::debug!("Session rotated on login for user {}", user.id);

        Ok(new_id)
    }

    pub fn logout(&self, session_id: &str) -> Result<()> {
        if let Some(session) = self.sessions.write()?.get_mut(session_id) {
            session.state = session.state.logout();
        }
        Ok(())
    }

    /// Resolve the session to its user, if any
    pub async fn current_identity(
        &self,
        session_id: &str,
        users: &dyn UserStorage,
    ) -> Result<Option<User>> {
        let user_id = match self.state(session_id)?.user_id() {
            Some(id) => id,
            None => return Ok(None),
        };

        match users.get_user(user_id).await? {
            Some(user) => Ok(Some(user)),
            None => {
                log::warn!("Session refers to missing user {}, treating as anonymous", user_id);
                self.logout(session_id)?;
                Ok(None)
            }
        }
    }

    /// Resolve the session to its user or fail with `Unauthorized`.
    ///
    /// On failure a login notice is queued and the error carries `target`, if
    /// any, so the login page can send the caller back afterwards.
    pub async fn require_authenticated(
        &self,
        session_id: &str,
        users: &dyn UserStorage,
        target: Option<&str>,
    ) -> Result<User> {
        match self.current_identity(session_id, users).await? {
            Some(user) => Ok(user),
            None => {
                self.flash(session_id, FlashCategory::Info, LOGIN_REQUIRED_NOTICE)?;
                Err(TrackerError::Unauthorized {
                    next: target.map(str::to_string),
                })
            }
        }
    }

    /// Queue a notice for the next rendered page
    pub fn flash(
        &self,
        session_id: &str,
        category: FlashCategory,
        message: impl Into<String>,
    ) -> Result<()> {
        match self.sessions.write()?.get_mut(session_id) {
            Some(session) => {
                session.flashes.push(Flash {
                    category,
                    message: message.into(),
                });
                Ok(())
            }
            None => Err(TrackerError::SessionError("Session not found".to_string())),
        }
    }

    /// Drain queued notices
    pub fn take_flashes(&self, session_id: &str) -> Result<Vec<Flash>> {
        Ok(self
            .sessions
            .write()?
            .get_mut(session_id)
            .map(|session| std::mem::take(&mut session.flashes))
            .unwrap_or_default())
    }

    /// Drop sessions idle for longer than the ttl
    pub fn purge_expired(&self) -> Result<usize> {
        let mut sessions = self.sessions.write()?;
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired(self.ttl));
        Ok(before - sessions.len())
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    /// Start periodic cleanup task
    pub fn start_cleanup_task(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_secs(SESSION_CLEANUP_INTERVAL_SECS));
            loop {
                interval.tick().await;
                match self.purge_expired() {
                    Ok(0) => {}
                    Ok(purged) => log::debug!("Purged {} expired sessions", purged),
                    Err(e) => log::error!("Session cleanup failed: {}", e),
                }
            }
        });
    }
}

// Thread-safe session manager wrapper
pub type Sessions = Arc<SessionManager>;

// Create a new thread-safe session manager
pub fn create_session_manager(ttl: Duration) -> Sessions {
    Arc::new(SessionManager::new(ttl))
}
