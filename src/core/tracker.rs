//! Ticket and project service
//!
//! Every operation takes the calling user explicitly, loads the facts the
//! policy needs through storage, asks the policy, and only then mutates. Each
//! mutation is a single storage call, which the backend runs as one
//! transaction.

use std::sync::Arc;
use std::time::Duration;

use crate::auth::password::PasswordHasher;
use crate::auth::policy::{self, Action, Decision};
use crate::auth::user::{NewUser, User, UserId, UserRole};
use crate::constants::LOGIN_MIN_DURATION_MS;
use crate::core::project::{MembershipChange, NewProject, Project, ProjectDetail, ProjectId};
use crate::core::ticket::{NewTicket, Ticket, TicketChanges, TicketDetail, TicketId};
use crate::core::validation;
use crate::error::{Result, TrackerError};
use crate::security::AuthTimer;
use crate::security_logger::{log_security_event, SecurityEvent};
use crate::storage::traits::StorageProvider;

pub struct TrackerService {
    storage: Arc<dyn StorageProvider>,
    hasher: PasswordHasher,
    login_min_duration: Duration,
}

// Shared service handle
pub type SharedTracker = Arc<TrackerService>;

impl TrackerService {
    pub fn new(storage: Arc<dyn StorageProvider>) -> Self {
        Self {
            storage,
            hasher: PasswordHasher::new(),
            login_min_duration: Duration::from_millis(LOGIN_MIN_DURATION_MS),
        }
    }

    /// Override the minimum duration of a login attempt
    pub fn with_login_min_duration(mut self, duration: Duration) -> Self {
        self.login_min_duration = duration;
        self
    }

    pub fn storage(&self) -> &dyn StorageProvider {
        self.storage.as_ref()
    }

    async fn check(&self, caller: &User, action: Action, resource: Option<String>) -> Result<()> {
        let decision = policy::authorize(Some(caller), action);
        if let Decision::Deny(reason) = &decision {
            log::debug!("Denied {} for user {}: {}", action, caller.id, reason);
            log_security_event(SecurityEvent::PermissionDenied {
                user_id: caller.id.to_string(),
                action: action.to_string(),
                resource,
            })
            .await;
        }
        decision.into_result()
    }

    async fn require_project(&self, project_id: ProjectId) -> Result<Project> {
        self.storage
            .project_storage()
            .get_project(project_id)
            .await?
            .ok_or_else(|| TrackerError::NotFound(format!("Project {} not found", project_id)))
    }

    async fn require_ticket(&self, ticket_id: TicketId) -> Result<Ticket> {
        self.storage
            .ticket_storage()
            .get_ticket(ticket_id)
            .await?
            .ok_or_else(|| TrackerError::NotFound(format!("Ticket {} not found", ticket_id)))
    }

    async fn require_user(&self, user_id: UserId) -> Result<User> {
        self.storage
            .user_storage()
            .get_user(user_id)
            .await?
            .ok_or_else(|| TrackerError::NotFound(format!("User {} not found", user_id)))
    }

    async fn insert_user(&self, username: &str, password: &str, role: UserRole) -> Result<User> {
        validation::check_username(username)?;
        validation::check_password(password)?;

        let password_hash = self.hasher.hash(password)?;
        self.storage
            .user_storage()
            .create_user(NewUser {
                username: username.to_string(),
                password_hash,
                role,
            })
            .await
    }

    // ---- accounts -------------------------------------------------------

    /// Self-service registration; always creates a regular account
    pub async fn register(&self, username: &str, password: &str) -> Result<User> {
        let user = self.insert_user(username, password, UserRole::Regular).await?;
        log::info!("Registered user {} ({})", user.username, user.id);
        log_security_event(SecurityEvent::AccountCreated {
            user_id: user.id.to_string(),
            role: user.role.to_string(),
            created_by: None,
        })
        .await;
        Ok(user)
    }

    /// Create an account with any role; admin only
    pub async fn admin_create_user(
        &self,
        caller: &User,
        username: &str,
        password: &str,
        role: UserRole,
    ) -> Result<User> {
        self.check(caller, Action::CreateUser, None).await?;

        let user = self.insert_user(username, password, role).await?;
        log::info!("User {} created {} account {}", caller.id, user.role, user.username);
        log_security_event(SecurityEvent::AccountCreated {
            user_id: user.id.to_string(),
            role: user.role.to_string(),
            created_by: Some(caller.id.to_string()),
        })
        .await;
        Ok(user)
    }

    /// Provision the start-up administrator if that username is free.
    ///
    /// Fails with `Conflict` when the name belongs to a regular user.
    pub async fn ensure_admin(&self, username: &str, password: &str) -> Result<User> {
        if let Some(existing) = self
            .storage
            .user_storage()
            .get_user_by_username(username)
            .await?
        {
            if !existing.is_admin() {
                return Err(TrackerError::conflict(
                    "username",
                    format!("'{}' already exists as a regular user", username),
                ));
            }
            return Ok(existing);
        }

        let user = self.insert_user(username, password, UserRole::Admin).await?;
        log::info!("Provisioned administrator {}", user.username);
        Ok(user)
    }

    /// Check credentials.
    ///
    /// Fails with `InvalidCredentials` for both unknown usernames and wrong
    /// passwords; both paths do one argon2 computation and take at least the
    /// configured minimum time.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<User> {
        let timer = AuthTimer::new(self.login_min_duration);
        let found = self
            .storage
            .user_storage()
            .get_user_by_username(username)
            .await?;

        let result = match found {
            Some(user) if self.hasher.verify(&user.password_hash, password) => Ok(user),
            Some(_) => Err("wrong password"),
            None => {
                // Same amount of work as a verification
                let _ = self.hasher.hash(password);
                Err("unknown username")
            }
        };
        timer.wait().await;

        match result {
            Ok(user) => {
                log_security_event(SecurityEvent::AuthenticationSuccess {
                    user_id: user.id.to_string(),
                })
                .await;
                Ok(user)
            }
            Err(reason) => {
                log_security_event(SecurityEvent::AuthenticationFailed {
                    username: username.to_string(),
                    reason: reason.to_string(),
                })
                .await;
                Err(TrackerError::InvalidCredentials)
            }
        }
    }

    // ---- projects -------------------------------------------------------

    pub async fn list_projects(&self, caller: &User) -> Result<Vec<Project>> {
        self.check(caller, Action::ViewProject, None).await?;
        self.storage.project_storage().list_projects().await
    }

    pub async fn create_project(&self, caller: &User, project: NewProject) -> Result<Project> {
        self.check(caller, Action::CreateProject, None).await?;
        validation::check_project_name(&project.name)?;

        let project = self.storage.project_storage().create_project(project).await?;
        log::info!("User {} created project {} ({})", caller.id, project.name, project.id);
        Ok(project)
    }

    /// Delete a project and, with it, all of its tickets
    pub async fn delete_project(&self, caller: &User, project_id: ProjectId) -> Result<usize> {
        self.require_project(project_id).await?;
        self.check(caller, Action::DeleteProject, Some(format!("project:{}", project_id)))
            .await?;

        let removed = self.storage.project_storage().delete_project(project_id).await?;
        log_security_event(SecurityEvent::ProjectDeleted {
            project_id: project_id.to_string(),
            deleted_by: caller.id.to_string(),
            tickets_removed: removed,
        })
        .await;
        Ok(removed)
    }

    /// A project with its tickets and members
    pub async fn project_detail(&self, caller: &User, project_id: ProjectId) -> Result<ProjectDetail> {
        let project = self.require_project(project_id).await?;
        self.check(caller, Action::ViewProject, Some(format!("project:{}", project_id)))
            .await?;

        let tickets = self
            .storage
            .ticket_storage()
            .list_project_tickets(project_id)
            .await?;
        let members = self.storage.project_storage().list_members(project_id).await?;

        Ok(ProjectDetail {
            project,
            tickets,
            members,
        })
    }

    /// Make `username` a member; assigning an existing member is a no-op
    pub async fn assign_member(
        &self,
        caller: &User,
        project_id: ProjectId,
        username: &str,
    ) -> Result<(User, MembershipChange)> {
        self.require_project(project_id).await?;
        self.check(caller, Action::ManageMembership, Some(format!("project:{}", project_id)))
            .await?;

        let user = self
            .storage
            .user_storage()
            .get_user_by_username(username)
            .await?
            .ok_or_else(|| TrackerError::NotFound(format!("User {} does not exist.", username)))?;

        let change = if self
            .storage
            .project_storage()
            .add_member(project_id, user.id)
            .await?
        {
            log_security_event(SecurityEvent::MembershipChanged {
                project_id: project_id.to_string(),
                user_id: user.id.to_string(),
                change: "assigned".to_string(),
                changed_by: caller.id.to_string(),
            })
            .await;
            MembershipChange::Assigned
        } else {
            MembershipChange::AlreadyAssigned
        };

        Ok((user, change))
    }

    /// Remove a member; removing a non-member is a no-op
    pub async fn remove_member(
        &self,
        caller: &User,
        project_id: ProjectId,
        user_id: UserId,
    ) -> Result<(User, MembershipChange)> {
        self.require_project(project_id).await?;
        self.check(caller, Action::ManageMembership, Some(format!("project:{}", project_id)))
            .await?;
        let user = self.require_user(user_id).await?;

        let change = if self
            .storage
            .project_storage()
            .remove_member(project_id, user_id)
            .await?
        {
            log_security_event(SecurityEvent::MembershipChanged {
                project_id: project_id.to_string(),
                user_id: user_id.to_string(),
                change: "removed".to_string(),
                changed_by: caller.id.to_string(),
            })
            .await;
            MembershipChange::Removed
        } else {
            MembershipChange::NotAssigned
        };

        Ok((user, change))
    }

    // ---- tickets --------------------------------------------------------

    async fn is_member(&self, project_id: ProjectId, user: &User) -> Result<bool> {
        self.storage
            .project_storage()
            .is_member(project_id, user.id)
            .await
    }

    /// Fail unless `caller` may file tickets in the project
    pub async fn authorize_ticket_creation(&self, caller: &User, project_id: ProjectId) -> Result<Project> {
        let project = self.require_project(project_id).await?;
        let is_member = self.is_member(project_id, caller).await?;
        self.check(
            caller,
            Action::CreateTicket { is_member },
            Some(format!("project:{}", project_id)),
        )
        .await?;
        Ok(project)
    }

    /// File a ticket authored by `caller`
    pub async fn create_ticket(
        &self,
        caller: &User,
        project_id: ProjectId,
        fields: TicketChanges,
    ) -> Result<Ticket> {
        self.authorize_ticket_creation(caller, project_id).await?;
        validation::check_ticket(&fields)?;

        let ticket = self
            .storage
            .ticket_storage()
            .create_ticket(NewTicket {
                subject: fields.subject,
                description: fields.description,
                status: fields.status,
                author_id: caller.id,
                project_id,
            })
            .await?;
        log::info!("User {} filed ticket {} in project {}", caller.id, ticket.id, project_id);
        Ok(ticket)
    }

    pub async fn get_ticket(&self, caller: &User, ticket_id: TicketId) -> Result<Ticket> {
        let ticket = self.require_ticket(ticket_id).await?;
        self.check(caller, Action::ViewTicket, Some(format!("ticket:{}", ticket_id)))
            .await?;
        Ok(ticket)
    }

    /// A ticket with its author and project
    pub async fn ticket_detail(&self, caller: &User, ticket_id: TicketId) -> Result<TicketDetail> {
        let ticket = self.get_ticket(caller, ticket_id).await?;
        let author = self.require_user(ticket.author_id).await?;
        let project = self.require_project(ticket.project_id).await?;

        Ok(TicketDetail {
            ticket,
            author,
            project,
        })
    }

    /// Fail unless `caller` may edit the ticket; returns its current state
    pub async fn authorize_ticket_update(&self, caller: &User, ticket_id: TicketId) -> Result<Ticket> {
        let ticket = self.require_ticket(ticket_id).await?;
        let is_member = self.is_member(ticket.project_id, caller).await?;
        self.check(
            caller,
            Action::UpdateTicket { is_member },
            Some(format!("ticket:{}", ticket_id)),
        )
        .await?;
        Ok(ticket)
    }

    /// Change subject, description and status; author and project stay
    pub async fn update_ticket(
        &self,
        caller: &User,
        ticket_id: TicketId,
        changes: TicketChanges,
    ) -> Result<Ticket> {
        self.authorize_ticket_update(caller, ticket_id).await?;
        validation::check_ticket(&changes)?;

        let ticket = self
            .storage
            .ticket_storage()
            .update_ticket(ticket_id, changes)
            .await?;
        log::info!("User {} updated ticket {}", caller.id, ticket_id);
        Ok(ticket)
    }

    /// Delete a ticket; returns the removed row
    pub async fn delete_ticket(&self, caller: &User, ticket_id: TicketId) -> Result<Ticket> {
        let ticket = self.require_ticket(ticket_id).await?;
        self.check(
            caller,
            Action::DeleteTicket {
                author_id: ticket.author_id,
            },
            Some(format!("ticket:{}", ticket_id)),
        )
        .await?;

        self.storage.ticket_storage().delete_ticket(ticket_id).await?;
        log::info!("User {} deleted ticket {}", caller.id, ticket_id);
        Ok(ticket)
    }
}
