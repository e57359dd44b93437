//! Abstract storage interfaces for pluggable backends
//!
//! This module defines the relational persistence contract the tracker runs
//! on: users (the credential store), projects with their membership join
//! relation, and tickets. Every method is one transaction; uniqueness
//! violations surface as `TrackerError::Conflict`.

use async_trait::async_trait;

use crate::auth::user::{NewUser, User, UserId};
use crate::core::project::{NewProject, Project, ProjectId};
use crate::core::ticket::{NewTicket, Ticket, TicketChanges, TicketId};
use crate::error::Result;

/// User data storage interface
#[async_trait]
pub trait UserStorage: Send + Sync {
    /// Insert a user; `Conflict` on a taken username
    async fn create_user(&self, user: NewUser) -> Result<User>;

    /// Get user by ID
    async fn get_user(&self, user_id: UserId) -> Result<Option<User>>;

    /// Get user by username
    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>>;
}

/// Project and membership storage interface
#[async_trait]
pub trait ProjectStorage: Send + Sync {
    /// Insert a project; `Conflict` on a taken name
    async fn create_project(&self, project: NewProject) -> Result<Project>;

    /// Get project by ID
    async fn get_project(&self, project_id: ProjectId) -> Result<Option<Project>>;

    /// List all projects, oldest first
    async fn list_projects(&self) -> Result<Vec<Project>>;

    /// Delete a project together with its tickets and memberships.
    /// Returns the number of tickets removed.
    async fn delete_project(&self, project_id: ProjectId) -> Result<usize>;

    /// Add a membership pair; `false` if it already existed
    async fn add_member(&self, project_id: ProjectId, user_id: UserId) -> Result<bool>;

    /// Remove a membership pair; `false` if it did not exist
    async fn remove_member(&self, project_id: ProjectId, user_id: UserId) -> Result<bool>;

    /// Check a membership pair
    async fn is_member(&self, project_id: ProjectId, user_id: UserId) -> Result<bool>;

    /// Members of a project, by username
    async fn list_members(&self, project_id: ProjectId) -> Result<Vec<User>>;
}

/// Ticket storage interface
#[async_trait]
pub trait TicketStorage: Send + Sync {
    /// Insert a ticket; `NotFound` if its project or author does not exist
    async fn create_ticket(&self, ticket: NewTicket) -> Result<Ticket>;

    /// Get ticket by ID
    async fn get_ticket(&self, ticket_id: TicketId) -> Result<Option<Ticket>>;

    /// Overwrite the mutable fields of a ticket
    async fn update_ticket(&self, ticket_id: TicketId, changes: TicketChanges) -> Result<Ticket>;

    /// Delete a ticket
    async fn delete_ticket(&self, ticket_id: TicketId) -> Result<()>;

    /// Tickets of a project, oldest first
    async fn list_project_tickets(&self, project_id: ProjectId) -> Result<Vec<Ticket>>;
}

/// Combined storage provider interface
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Get user storage backend
    fn user_storage(&self) -> &dyn UserStorage;

    /// Get project storage backend
    fn project_storage(&self) -> &dyn ProjectStorage;

    /// Get ticket storage backend
    fn ticket_storage(&self) -> &dyn TicketStorage;

    /// Health check for the storage backend
    async fn health_check(&self) -> Result<bool>;
}

