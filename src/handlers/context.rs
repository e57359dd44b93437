//! Per-request context: session, identity and anti-forgery checks
//!
//! Handlers never reach for ambient state. Everything a request knows about
//! its caller lives in a [`RequestContext`] that is passed down explicitly.

use warp::http::header::{HeaderValue, SET_COOKIE};
use warp::http::Method;
use warp::reply::Response;

use crate::auth::User;
use crate::constants::SESSION_COOKIE_NAME;
use crate::core::session::FlashCategory;
use crate::error::{Result, TrackerError};
use crate::handlers::responses;
use crate::routes::AppState;
use crate::security::add_security_headers;
use crate::security_logger::{log_security_event, SecurityEvent};
use crate::views::Page;

/// Raw request facts extracted by the route filters
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    pub session_cookie: Option<String>,
    pub origin: Option<String>,
    pub host: Option<String>,
    pub method: Method,
    pub path: String,
}

pub struct RequestContext {
    session_id: String,
    /// Whether the client's cookie must be (re)issued
    issue_cookie: bool,
    user: Option<User>,
    meta: RequestMeta,
}

impl RequestContext {
    /// Resume or start the session and resolve the caller
    pub async fn resolve(state: &AppState, meta: RequestMeta) -> Result<Self> {
        let (session_id, created) = state.sessions.resume(meta.session_cookie.as_deref())?;
        let user = state
            .sessions
            .current_identity(&session_id, state.tracker.storage().user_storage())
            .await?;

        Ok(Self {
            session_id,
            issue_cookie: created,
            user,
            meta,
        })
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// The authenticated caller, or `Unauthorized` carrying the page to resume
    pub async fn require_user(&self, state: &AppState) -> Result<User> {
        if let Some(user) = &self.user {
            return Ok(user.clone());
        }

        log_security_event(SecurityEvent::UnauthorizedAccess {
            resource: self.meta.path.clone(),
        })
        .await;
        state
            .sessions
            .require_authenticated(
                &self.session_id,
                state.tracker.storage().user_storage(),
                resume_target(&self.meta.method, &self.meta.path).as_deref(),
            )
            .await
    }

    /// Reject forged submissions: foreign `Origin` or a bad form token
    pub async fn verify_csrf(&self, state: &AppState, token: &str) -> Result<()> {
        let origin_check = state
            .csrf
            .validate_origin(self.meta.origin.as_deref(), self.meta.host.as_deref());
        let verdict = if origin_check.is_valid() {
            state.csrf.validate_csrf_token(token, &self.session_id)
        } else {
            origin_check
        };

        if verdict.is_valid() {
            return Ok(());
        }

        let reason = verdict.reason();
        log_security_event(SecurityEvent::CSRFAttempt {
            user_id: self.user.as_ref().map(|user| user.id.to_string()),
            reason: format!("{} on {}", reason, self.meta.path),
        })
        .await;
        Err(TrackerError::CsrfRejected(reason))
    }

    pub fn flash(&self, state: &AppState, category: FlashCategory, message: impl Into<String>) -> Result<()> {
        state.sessions.flash(&self.session_id, category, message)
    }

    /// Authenticate this session; the id rotates and the cookie is reissued
    pub fn login(&mut self, state: &AppState, user: User) -> Result<()> {
        self.session_id = state.sessions.login(&self.session_id, &user)?;
        self.issue_cookie = true;
        self.user = Some(user);
        Ok(())
    }

    pub async fn logout(&mut self, state: &AppState) -> Result<()> {
        state.sessions.logout(&self.session_id)?;
        if let Some(user) = self.user.take() {
            log_security_event(SecurityEvent::LoggedOut {
                user_id: user.id.to_string(),
            })
            .await;
        }
        Ok(())
    }

    /// Page data for rendering: drains queued flashes and mints a form token
    pub fn page<'a>(&'a self, state: &AppState, title: &'a str) -> Result<Page<'a>> {
        Ok(Page {
            title,
            user: self.user.as_ref(),
            flashes: state.sessions.take_flashes(&self.session_id)?,
            csrf_token: state.csrf.generate_csrf_token(&self.session_id),
        })
    }

    fn session_cookie(&self, state: &AppState) -> String {
        let mut cookie = format!(
            "{}={}; HttpOnly; SameSite=Lax; Path=/",
            SESSION_COOKIE_NAME, self.session_id
        );
        if state.config.secure_cookies() {
            cookie.push_str("; Secure");
        }
        cookie
    }

    /// Final response: errors mapped, cookie attached, security headers set
    pub fn finish(self, state: &AppState, result: Result<Response>) -> Response {
        let mut response = match result {
            Ok(response) => response,
            Err(err) => responses::error_response(&err),
        };

        if self.issue_cookie {
            match HeaderValue::from_str(&self.session_cookie(state)) {
                Ok(value) => {
                    response.headers_mut().append(SET_COOKIE, value);
                }
                Err(e) => log::error!("Failed to encode session cookie: {}", e),
            }
        }

        add_security_headers(response)
    }
}

/// Page to return to after logging in.
///
/// A form submission resumes at the page that hosts the form; POST-only
/// actions map to their parent page.
fn resume_target(method: &Method, path: &str) -> Option<String> {
    if method == Method::GET {
        return Some(path.to_string());
    }

    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
    match segments.as_slice() {
        ["project", id, "delete"] | ["project", id, "remove_user", _] => Some(format!("/project/{}", id)),
        ["ticket", id, "delete"] => Some(format!("/ticket/{}", id)),
        ["project", _]
        | ["project", _, "ticket", "new"]
        | ["ticket", _, "update"]
        | ["admin", "create_user"] => Some(path.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_requests_resume_at_their_own_path() {
        assert_eq!(
            resume_target(&Method::GET, "/ticket/1/delete").as_deref(),
            Some("/ticket/1/delete")
        );
        assert_eq!(resume_target(&Method::GET, "/home").as_deref(), Some("/home"));
    }

    #[test]
    fn test_post_only_actions_resume_at_their_parent_page() {
        let post = Method::POST;
        assert_eq!(resume_target(&post, "/ticket/1/delete").as_deref(), Some("/ticket/1"));
        assert_eq!(resume_target(&post, "/project/2/delete").as_deref(), Some("/project/2"));
        assert_eq!(
            resume_target(&post, "/project/2/remove_user/5").as_deref(),
            Some("/project/2")
        );
    }

    #[test]
    fn test_form_posts_resume_at_the_form() {
        let post = Method::POST;
        assert_eq!(resume_target(&post, "/project/2").as_deref(), Some("/project/2"));
        assert_eq!(resume_target(&post, "/project/new").as_deref(), Some("/project/new"));
        assert_eq!(
            resume_target(&post, "/project/2/ticket/new").as_deref(),
            Some("/project/2/ticket/new")
        );
        assert_eq!(resume_target(&post, "/ticket/1/update").as_deref(), Some("/ticket/1/update"));
        assert_eq!(resume_target(&post, "/admin/create_user").as_deref(), Some("/admin/create_user"));
        assert_eq!(resume_target(&post, "/unknown/form"), None);
    }
}
