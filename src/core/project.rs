use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::auth::user::User;
use crate::core::ticket::Ticket;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(pub u64);

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named container of tickets with an admin-managed member list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Data needed to insert a project
#[derive(Debug, Clone)]
pub struct NewProject {
    pub name: String,
    pub description: Option<String>,
}

/// A project joined with its tickets and members
#[derive(Debug, Clone)]
pub struct ProjectDetail {
    pub project: Project,
    pub tickets: Vec<Ticket>,
    pub members: Vec<User>,
}

impl ProjectDetail {
    pub fn has_member(&self, user: &User) -> bool {
        self.members.iter().any(|member| member.id == user.id)
    }
}

/// Outcome of an idempotent membership change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipChange {
    Assigned,
    AlreadyAssigned,
    Removed,
    NotAssigned,
}
