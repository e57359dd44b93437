//! Security utilities and middleware

pub mod csrf;
pub mod headers;
pub mod timing;
pub mod xss;

pub use csrf::{CSRFProtection, CSRFValidationResult};
pub use headers::add_security_headers;
pub use timing::{constant_time_eq, constant_time_eq_bytes, AuthTimer};
pub use xss::encode_html;
