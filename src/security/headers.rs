//! Security headers for HTTP responses
//!
//! Every page the tracker renders passes through [`add_security_headers`].

use warp::http::HeaderValue;
use warp::reply::Response;

/// Content Security Policy for server-rendered pages (no scripts, forms post back to us only)
const PAGE_CSP: &str = "default-src 'self'; script-src 'none'; style-src 'self'; img-src 'self' data:; object-src 'none'; frame-ancestors 'none'; form-action 'self'; base-uri 'self';";

const PERMISSIONS_POLICY: &str =
    "geolocation=(), microphone=(), camera=(), payment=(), usb=(), magnetometer=(), gyroscope=(), accelerometer=()";

/// Add security headers to a response
pub fn add_security_headers(mut response: Response) -> Response {
    let headers = response.headers_mut();

    // Prevent clickjacking
    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));

    // Prevent MIME type sniffing
    headers.insert("X-Content-Type-Options", HeaderValue::from_static("nosniff"));

    headers.insert("Referrer-Policy", HeaderValue::from_static("strict-origin-when-cross-origin"));
    headers.insert("Content-Security-Policy", HeaderValue::from_static(PAGE_CSP));
    headers.insert("Permissions-Policy", HeaderValue::from_static(PERMISSIONS_POLICY));

    // Pages depend on the session; never let intermediaries cache them
    headers.insert("Cache-Control", HeaderValue::from_static("no-store"));

    headers.remove("Server");

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use warp::Reply;

    #[test]
    fn test_page_csp_directives() {
        assert!(!PAGE_CSP.contains("unsafe-inline"));
        assert!(PAGE_CSP.contains("form-action 'self'"));
        assert!(PAGE_CSP.contains("frame-ancestors 'none'"));
        assert!(PAGE_CSP.contains("object-src 'none'"));
    }

    #[test]
    fn test_headers_are_added() {
        let response = add_security_headers(warp::reply::html("<p>hi</p>").into_response());
        let headers = response.headers();
        assert_eq!(headers["X-Frame-Options"], "DENY");
        assert_eq!(headers["X-Content-Type-Options"], "nosniff");
        assert_eq!(headers["Cache-Control"], "no-store");
        assert_eq!(headers["Content-Security-Policy"], PAGE_CSP);
    }
}
