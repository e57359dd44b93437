//! Timing attack protection utilities
//!
//! Login and token checks must not leak, through response time, which step
//! rejected the request.

use std::time::{Duration, Instant};

/// Constant-time string comparison to prevent timing attacks
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    constant_time_eq_bytes(a.as_bytes(), b.as_bytes())
}

/// Constant-time byte array comparison
///
/// Only the length is allowed to short-circuit.
pub fn constant_time_eq_bytes(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.iter()
        .zip(b.iter())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

/// Pads an operation up to a minimum wall-clock duration
pub struct AuthTimer {
    start: Instant,
    min_duration: Duration,
}

impl AuthTimer {
    /// Start timing now
    pub fn new(min_duration: Duration) -> Self {
        Self {
            start: Instant::now(),
            min_duration,
        }
    }

    /// Wait until minimum duration has elapsed
    pub async fn wait(self) {
        let elapsed = self.start.elapsed();
        if elapsed < self.min_duration {
            tokio::time::sleep(self.min_duration - elapsed).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("hello", "hello"));
        assert!(!constant_time_eq("hello", "world"));
        assert!(!constant_time_eq("hello", "hell"));
        assert!(!constant_time_eq("", "a"));
        assert!(constant_time_eq("", ""));
    }

    #[tokio::test]
    async fn test_auth_timer_pads_fast_operations() {
        let start = Instant::now();
        AuthTimer::new(Duration::from_millis(10)).wait().await;
        assert!(start.elapsed() >= Duration::from_millis(10));
    }
}
