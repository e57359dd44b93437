use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::auth::user::{User, UserId};
use crate::core::project::{Project, ProjectId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(pub u64);

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ticket workflow state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TicketStatus {
    #[default]
    Open,
    #[serde(rename = "In Progress")]
    InProgress,
    Closed,
}

impl TicketStatus {
    pub const ALL: [TicketStatus; 3] = [
        TicketStatus::Open,
        TicketStatus::InProgress,
        TicketStatus::Closed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "Open",
            TicketStatus::InProgress => "In Progress",
            TicketStatus::Closed => "Closed",
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TicketStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown status '{}'", s))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub subject: String,
    pub description: String,
    pub status: TicketStatus,
    pub created_at: DateTime<Utc>,
    /// Creating user; never changes
    pub author_id: UserId,
    /// Owning project; never changes
    pub project_id: ProjectId,
}

/// Data needed to insert a ticket
#[derive(Debug, Clone)]
pub struct NewTicket {
    pub subject: String,
    pub description: String,
    pub status: TicketStatus,
    pub author_id: UserId,
    pub project_id: ProjectId,
}

/// Mutable ticket fields
#[derive(Debug, Clone, Default)]
pub struct TicketChanges {
    pub subject: String,
    pub description: String,
    pub status: TicketStatus,
}

/// A ticket joined with its author and project
#[derive(Debug, Clone)]
pub struct TicketDetail {
    pub ticket: Ticket,
    pub author: User,
    pub project: Project,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parsing() {
        assert_eq!("Open".parse::<TicketStatus>().unwrap(), TicketStatus::Open);
        assert_eq!(
            "In Progress".parse::<TicketStatus>().unwrap(),
            TicketStatus::InProgress
        );
        assert_eq!("Closed".parse::<TicketStatus>().unwrap(), TicketStatus::Closed);
        assert!("Reopened".parse::<TicketStatus>().is_err());
        assert!("open".parse::<TicketStatus>().is_err());
    }

    #[test]
    fn test_default_status_is_open() {
        assert_eq!(TicketStatus::default(), TicketStatus::Open);
    }

    #[test]
    fn test_status_serializes_with_display_names() {
        let json = serde_json::to_string(&TicketStatus::InProgress).unwrap();
        assert_eq!(json, "\"In Progress\"");
    }
}
