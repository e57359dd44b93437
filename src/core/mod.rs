//! Core functionality: data model, validation, sessions and the service

pub mod project;
pub mod session;
pub mod ticket;
pub mod tracker;
pub mod validation;

// Re-export main components for convenience
pub use project::{MembershipChange, NewProject, Project, ProjectDetail, ProjectId};
pub use session::{create_session_manager, FlashCategory, SessionManager, SessionState, Sessions};
pub use ticket::{Ticket, TicketChanges, TicketDetail, TicketId, TicketStatus};
pub use tracker::{SharedTracker, TrackerService};
pub use validation::FieldErrors;
