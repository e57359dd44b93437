//! Response builders and the error → HTTP mapping

use warp::http::header::{HeaderValue, LOCATION};
use warp::http::StatusCode;
use warp::hyper::Body;
use warp::reply::Response;
use warp::Reply;

use crate::constants::{HOME_PATH, LOGIN_PATH};
use crate::error::TrackerError;
use crate::views;

const LOCAL_ORIGIN: &str = "http://local.invalid/";

/// 303 See Other to a local path
pub fn redirect(location: &str) -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::SEE_OTHER;
    let value = HeaderValue::from_str(location).unwrap_or_else(|_| {
        log::warn!("Refusing to redirect to unencodable location {:?}", location);
        HeaderValue::from_static(HOME_PATH)
    });
    response.headers_mut().insert(LOCATION, value);
    response
}

pub fn html(body: String) -> Response {
    warp::reply::html(body).into_response()
}

pub fn html_with_status(body: String, status: StatusCode) -> Response {
    warp::reply::with_status(warp::reply::html(body), status).into_response()
}

/// `next` is only honoured for local absolute paths
pub fn safe_next(next: Option<&str>) -> Option<&str> {
    next.filter(|target| is_local_path(target))
}

/// Rejects anything a browser could reinterpret as another host: control
/// characters, whitespace and backslashes are never accepted, and the path
/// must resolve to the same origin.
fn is_local_path(target: &str) -> bool {
    if !target.starts_with('/') || target.starts_with("//") {
        return false;
    }
    if target
        .chars()
        .any(|c| c == '\\' || c.is_control() || c.is_whitespace())
    {
        return false;
    }

    let base = match url::Url::parse(LOCAL_ORIGIN) {
        Ok(base) => base,
        Err(_) => return false,
    };
    match base.join(target) {
        Ok(resolved) => resolved.origin() == base.origin(),
        Err(_) => false,
    }
}

/// Login URL that sends the caller back to `next` afterwards
pub fn login_redirect(next: Option<&str>) -> Response {
    match safe_next(next) {
        Some(target) => redirect(&format!(
            "{}?next={}",
            LOGIN_PATH,
            url::form_urlencoded::byte_serialize(target.as_bytes()).collect::<String>()
        )),
        None => redirect(LOGIN_PATH),
    }
}

pub fn error_page(status: StatusCode, message: &str) -> Response {
    let title = status.canonical_reason().unwrap_or("Error");
    html_with_status(views::error_page(status.as_u16(), title, message), status)
}

/// Turn a failed operation into a response.
///
/// Internal failures are logged and rendered as a generic 500; their detail
/// never reaches the client.
pub fn error_response(err: &TrackerError) -> Response {
    match err {
        TrackerError::Unauthorized { next } => login_redirect(next.as_deref()),
        TrackerError::Forbidden(_) => error_page(
            StatusCode::FORBIDDEN,
            "You do not have permission to perform this action.",
        ),
        TrackerError::CsrfRejected(_) => error_page(
            StatusCode::FORBIDDEN,
            "The form submission could not be verified. Please reload the page and try again.",
        ),
        TrackerError::NotFound(_) => error_page(StatusCode::NOT_FOUND, "The requested page does not exist."),
        TrackerError::BadRequest(msg) => error_page(StatusCode::BAD_REQUEST, msg),
        TrackerError::Validation(_) | TrackerError::Conflict { .. } | TrackerError::InvalidCredentials => {
            log::debug!("Form error reached the generic error path: {}", err);
            error_page(StatusCode::BAD_REQUEST, "The submitted form was invalid.")
        }
        TrackerError::SessionError(_)
        | TrackerError::PasswordHashError(_)
        | TrackerError::StorageError(_)
        | TrackerError::ConfigError(_) => {
            log::error!("Request failed: {}", err);
            error_page(StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong on our side.")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(response: &Response) -> &str {
        response.headers()[LOCATION].to_str().unwrap()
    }

    #[test]
    fn test_safe_next() {
        assert_eq!(safe_next(Some("/project/1")), Some("/project/1"));
        assert_eq!(safe_next(Some("//evil.example")), None);
        assert_eq!(safe_next(Some("https://evil.example")), None);
        assert_eq!(safe_next(Some("/\\evil.example")), None);
        assert_eq!(safe_next(None), None);
    }

    #[test]
    fn test_safe_next_rejects_control_and_whitespace() {
        assert_eq!(safe_next(Some("/\t/evil.example")), None);
        assert_eq!(safe_next(Some("/\n/evil.example")), None);
        assert_eq!(safe_next(Some("/\r\n/evil.example")), None);
        assert_eq!(safe_next(Some("/ /evil.example")), None);
        assert_eq!(safe_next(Some("/\u{0}/evil.example")), None);
        // Percent-escapes stay escaped in a Location path
        assert_eq!(safe_next(Some("/%09/evil.example")), Some("/%09/evil.example"));
        assert_eq!(safe_next(Some("/ticket/3?tab=1")), Some("/ticket/3?tab=1"));
    }

    #[test]
    fn test_login_redirect_drops_tab_smuggled_target() {
        let response = login_redirect(Some("/\t/evil.example"));
        assert_eq!(location(&response), "/login");
    }

    #[test]
    fn test_unauthorized_redirects_to_login_with_next() {
        let response = error_response(&TrackerError::Unauthorized {
            next: Some("/project/1".to_string()),
        });
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/login?next=%2Fproject%2F1");

        let response = login_redirect(Some("http://evil.example/"));
        assert_eq!(location(&response), "/login");
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            error_response(&TrackerError::Forbidden("no".into())).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            error_response(&TrackerError::CsrfRejected("bad".into())).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            error_response(&TrackerError::NotFound("ticket".into())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            error_response(&TrackerError::StorageError("disk".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
