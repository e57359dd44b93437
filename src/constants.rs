// Fundamental configuration constants
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5000;

// Session configuration constants
pub const SESSION_COOKIE_NAME: &str = "tracker_session";
pub const DEFAULT_SESSION_TTL_SECS: u64 = 86_400;
pub const SESSION_CLEANUP_INTERVAL_SECS: u64 = 300;

// Anti-forgery configuration constants
pub const CSRF_FIELD_NAME: &str = "csrf_token";
pub const DEFAULT_CSRF_TOKEN_TTL_SECS: u64 = 3_600;

// Minimum wall-clock time for a login attempt
pub const LOGIN_MIN_DURATION_MS: u64 = 100;

// Field limits
pub const USERNAME_MIN_LEN: usize = 2;
pub const USERNAME_MAX_LEN: usize = 20;
pub const PASSWORD_MIN_LEN: usize = 6;
pub const PROJECT_NAME_MAX_LEN: usize = 100;
pub const TICKET_SUBJECT_MAX_LEN: usize = 100;

// Landing pages
pub const HOME_PATH: &str = "/home";
pub const LOGIN_PATH: &str = "/login";

// Largest accepted form body
pub const MAX_FORM_BYTES: u64 = 16 * 1024;
