//! Authorization policy
//!
//! Pure decision functions: every check takes the caller and the membership or
//! ownership facts already loaded from storage, and never touches storage
//! itself. Callers turn a [`Decision::Deny`] into [`TrackerError::Forbidden`]
//! with [`Decision::into_result`].

use std::fmt;

use crate::auth::user::{User, UserId};
use crate::error::{Result, TrackerError};

/// An action a caller wants to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Self-service registration of a regular account
    Register,
    /// Account creation with an arbitrary role
    CreateUser,
    CreateProject,
    DeleteProject,
    ManageMembership,
    CreateTicket { is_member: bool },
    UpdateTicket { is_member: bool },
    DeleteTicket { author_id: UserId },
    ViewProject,
    ViewTicket,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Register => "register",
            Action::CreateUser => "create_user",
            Action::CreateProject => "create_project",
            Action::DeleteProject => "delete_project",
            Action::ManageMembership => "manage_membership",
            Action::CreateTicket { .. } => "create_ticket",
            Action::UpdateTicket { .. } => "update_ticket",
            Action::DeleteTicket { .. } => "delete_ticket",
            Action::ViewProject => "view_project",
            Action::ViewTicket => "view_ticket",
        };
        f.write_str(name)
    }
}

/// Outcome of a policy check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(String),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    /// Convert into a `Forbidden` error on denial
    pub fn into_result(self) -> Result<()> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => Err(TrackerError::Forbidden(reason)),
        }
    }

    fn allow_if(condition: bool, reason: &str) -> Self {
        if condition {
            Decision::Allow
        } else {
            Decision::Deny(reason.to_string())
        }
    }
}

/// Decide whether `caller` may perform `action`.
///
/// `None` is the anonymous caller. Only registration is open to it; everything
/// else is denied here and should have been stopped earlier as `Unauthorized`.
pub fn authorize(caller: Option<&User>, action: Action) -> Decision {
    let user = match caller {
        Some(user) => user,
        None if action == Action::Register => return Decision::Allow,
        None => return Decision::Deny("authentication required".to_string()),
    };

    match action {
        Action::Register => Decision::Deny("already logged in".to_string()),
        Action::CreateUser => {
            Decision::allow_if(user.is_admin(), "only administrators can create accounts")
        }
        Action::CreateProject => {
            Decision::allow_if(user.is_admin(), "only administrators can create projects")
        }
        Action::DeleteProject => {
            Decision::allow_if(user.is_admin(), "only administrators can delete projects")
        }
        Action::ManageMembership => Decision::allow_if(
            user.is_admin(),
            "only administrators can manage project membership",
        ),
        Action::CreateTicket { is_member } => Decision::allow_if(
            user.is_admin() || is_member,
            "only project members can create tickets",
        ),
        Action::UpdateTicket { is_member } => Decision::allow_if(
            user.is_admin() || is_member,
            "only project members can update tickets",
        ),
        Action::DeleteTicket { author_id } => Decision::allow_if(
            user.is_admin() || user.id == author_id,
            "only the author or an administrator can delete a ticket",
        ),
        Action::ViewProject | Action::ViewTicket => Decision::Allow,
    }
}

pub fn can_register(caller: Option<&User>) -> Decision {
    authorize(caller, Action::Register)
}

pub fn can_create_user(caller: &User) -> Decision {
    authorize(Some(caller), Action::CreateUser)
}

pub fn can_create_project(caller: &User) -> Decision {
    authorize(Some(caller), Action::CreateProject)
}

pub fn can_delete_project(caller: &User) -> Decision {
    authorize(Some(caller), Action::DeleteProject)
}

pub fn can_manage_membership(caller: &User) -> Decision {
    authorize(Some(caller), Action::ManageMembership)
}

pub fn can_create_ticket(caller: &User, is_member: bool) -> Decision {
    authorize(Some(caller), Action::CreateTicket { is_member })
}

pub fn can_update_ticket(caller: &User, is_member: bool) -> Decision {
    authorize(Some(caller), Action::UpdateTicket { is_member })
}

pub fn can_delete_ticket(caller: &User, author_id: UserId) -> Decision {
    authorize(Some(caller), Action::DeleteTicket { author_id })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::user::UserRole;

    fn user(id: u64, role: UserRole) -> User {
        User {
            id: UserId(id),
            username: format!("user{}", id),
            password_hash: String::new(),
            role,
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_admin_only_actions() {
        let admin = user(1, UserRole::Admin);
        let regular = user(2, UserRole::Regular);

        for action in [
            Action::CreateUser,
            Action::CreateProject,
            Action::DeleteProject,
            Action::ManageMembership,
        ] {
            assert!(authorize(Some(&admin), action).is_allowed(), "{}", action);
            assert!(!authorize(Some(&regular), action).is_allowed(), "{}", action);
        }
    }

    #[test]
    fn test_registration_is_for_anonymous_callers() {
        assert!(can_register(None).is_allowed());
        assert!(!can_register(Some(&user(1, UserRole::Regular))).is_allowed());
    }

    #[test]
    fn test_anonymous_caller_is_denied_everything_else() {
        assert!(!authorize(None, Action::ViewProject).is_allowed());
        assert!(!authorize(None, Action::CreateTicket { is_member: true }).is_allowed());
    }

    #[test]
    fn test_ticket_mutation_requires_membership_or_admin() {
        let admin = user(1, UserRole::Admin);
        let regular = user(2, UserRole::Regular);

        assert!(can_create_ticket(&admin, false).is_allowed());
        assert!(can_create_ticket(&regular, true).is_allowed());
        assert!(!can_create_ticket(&regular, false).is_allowed());
        assert!(can_update_ticket(&regular, true).is_allowed());
        assert!(!can_update_ticket(&regular, false).is_allowed());
    }

    #[test]
    fn test_ticket_deletion_requires_authorship_or_admin() {
        let admin = user(1, UserRole::Admin);
        let author = user(2, UserRole::Regular);
        let other = user(3, UserRole::Regular);

        assert!(can_delete_ticket(&author, author.id).is_allowed());
        assert!(can_delete_ticket(&admin, author.id).is_allowed());
        assert!(!can_delete_ticket(&other, author.id).is_allowed());
    }

    #[test]
    fn test_viewing_needs_only_authentication() {
        let regular = user(2, UserRole::Regular);
        assert!(authorize(Some(&regular), Action::ViewProject).is_allowed());
        assert!(authorize(Some(&regular), Action::ViewTicket).is_allowed());
    }

    #[test]
    fn test_deny_maps_to_forbidden() {
        let regular = user(2, UserRole::Regular);
        let err = can_create_project(&regular).into_result().unwrap_err();
        assert!(matches!(err, TrackerError::Forbidden(_)));
    }
}
