//! Authentication and authorization module

pub mod password;
pub mod policy;
pub mod user;

// Re-export main components
pub use password::PasswordHasher;
pub use policy::{Action, Decision};
pub use user::{User, UserId, UserRole};
