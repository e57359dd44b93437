//! Input validation for submitted forms
//!
//! Each form validates into either a typed value ready for the service layer
//! or a [`FieldErrors`] map that the view layer renders next to the inputs.
//! Validation never touches storage; uniqueness is enforced by the store.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::auth::user::UserRole;
use crate::constants::{
    PASSWORD_MIN_LEN, PROJECT_NAME_MAX_LEN, TICKET_SUBJECT_MAX_LEN, USERNAME_MAX_LEN,
    USERNAME_MIN_LEN,
};
use crate::core::project::NewProject;
use crate::core::ticket::{TicketChanges, TicketStatus};
use crate::error::{Result, TrackerError};

const REQUIRED: &str = "This field is required.";

/// Field name -> messages
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }

    fn into_result<T>(self, value: T) -> std::result::Result<T, FieldErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(field, messages)| format!("{}: {}", field, messages.join(" ")))
            .collect();
        f.write_str(&parts.join("; "))
    }
}

impl From<FieldErrors> for TrackerError {
    fn from(errors: FieldErrors) -> Self {
        TrackerError::Validation(errors)
    }
}

fn check_length(errors: &mut FieldErrors, field: &str, value: &str, min: usize, max: usize) {
    let len = value.chars().count();
    if len == 0 {
        errors.add(field, REQUIRED);
    } else if len < min || len > max {
        errors.add(
            field,
            format!("Field must be between {} and {} characters long.", min, max),
        );
    }
}

fn check_required(errors: &mut FieldErrors, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.add(field, REQUIRED);
    }
}

fn username_errors(errors: &mut FieldErrors, username: &str) {
    check_length(errors, "username", username, USERNAME_MIN_LEN, USERNAME_MAX_LEN);
}

fn password_errors(errors: &mut FieldErrors, password: &str) {
    if password.is_empty() {
        errors.add("password", REQUIRED);
    } else if password.chars().count() < PASSWORD_MIN_LEN {
        errors.add(
            "password",
            format!("Field must be at least {} characters long.", PASSWORD_MIN_LEN),
        );
    }
}

/// Check a username against the length rules
pub fn check_username(username: &str) -> Result<()> {
    let mut errors = FieldErrors::new();
    username_errors(&mut errors, username);
    errors.into_result(()).map_err(TrackerError::from)
}

/// Check a password against the length rules
pub fn check_password(password: &str) -> Result<()> {
    let mut errors = FieldErrors::new();
    password_errors(&mut errors, password);
    errors.into_result(()).map_err(TrackerError::from)
}

/// Check a project name against the length rules
pub fn check_project_name(name: &str) -> Result<()> {
    let mut errors = FieldErrors::new();
    check_length(&mut errors, "name", name, 1, PROJECT_NAME_MAX_LEN);
    errors.into_result(()).map_err(TrackerError::from)
}

/// Check ticket fields against the length rules
pub fn check_ticket(changes: &TicketChanges) -> Result<()> {
    let mut errors = FieldErrors::new();
    check_length(&mut errors, "subject", &changes.subject, 1, TICKET_SUBJECT_MAX_LEN);
    check_required(&mut errors, "description", &changes.description);
    errors.into_result(()).map_err(TrackerError::from)
}

/// A validated account request
#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub password: String,
    pub role: UserRole,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RegistrationForm {
    pub username: String,
    pub password: String,
    pub confirm_password: String,
    /// Checkbox; only honoured on the admin account-creation page
    pub is_admin: Option<String>,
    pub csrf_token: String,
}

impl RegistrationForm {
    /// Validate for self-service registration; the role is always regular
    pub fn validate(&self) -> std::result::Result<Registration, FieldErrors> {
        self.validate_with_role(UserRole::Regular)
    }

    /// Validate for admin account creation, honouring the admin checkbox
    pub fn validate_for_admin(&self) -> std::result::Result<Registration, FieldErrors> {
        let role = if self.is_admin.is_some() {
            UserRole::Admin
        } else {
            UserRole::Regular
        };
        self.validate_with_role(role)
    }

    fn validate_with_role(&self, role: UserRole) -> std::result::Result<Registration, FieldErrors> {
        let mut errors = FieldErrors::new();
        let username = self.username.trim();

        username_errors(&mut errors, username);
        password_errors(&mut errors, &self.password);
        if self.confirm_password.is_empty() {
            errors.add("confirm_password", REQUIRED);
        } else if self.confirm_password != self.password {
            errors.add("confirm_password", "Field must be equal to password.");
        }

        errors.into_result(Registration {
            username: username.to_string(),
            password: self.password.clone(),
            role,
        })
    }
}

/// Validated login input
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    pub csrf_token: String,
}

impl LoginForm {
    pub fn validate(&self) -> std::result::Result<Credentials, FieldErrors> {
        let mut errors = FieldErrors::new();
        let username = self.username.trim();

        username_errors(&mut errors, username);
        if self.password.is_empty() {
            errors.add("password", REQUIRED);
        }

        errors.into_result(Credentials {
            username: username.to_string(),
            password: self.password.clone(),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProjectForm {
    pub name: String,
    pub description: String,
    pub csrf_token: String,
}

impl ProjectForm {
    pub fn validate(&self) -> std::result::Result<NewProject, FieldErrors> {
        let mut errors = FieldErrors::new();
        let name = self.name.trim();
        check_length(&mut errors, "name", name, 1, PROJECT_NAME_MAX_LEN);

        let description = self.description.trim();
        errors.into_result(NewProject {
            name: name.to_string(),
            description: (!description.is_empty()).then(|| description.to_string()),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AssignUserForm {
    pub username: String,
    pub csrf_token: String,
}

impl AssignUserForm {
    /// Returns the trimmed username to assign
    pub fn validate(&self) -> std::result::Result<String, FieldErrors> {
        let mut errors = FieldErrors::new();
        let username = self.username.trim();
        check_required(&mut errors, "username", username);
        errors.into_result(username.to_string())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TicketForm {
    pub subject: String,
    pub description: String,
    pub status: String,
    pub csrf_token: String,
}

impl TicketForm {
    /// Pre-populate from existing values
    pub fn from_changes(changes: &TicketChanges) -> Self {
        Self {
            subject: changes.subject.clone(),
            description: changes.description.clone(),
            status: changes.status.as_str().to_string(),
            csrf_token: String::new(),
        }
    }

    pub fn validate(&self) -> std::result::Result<TicketChanges, FieldErrors> {
        let mut errors = FieldErrors::new();
        let subject = self.subject.trim();
        check_length(&mut errors, "subject", subject, 1, TICKET_SUBJECT_MAX_LEN);
        check_required(&mut errors, "description", &self.description);

        let status = if self.status.is_empty() {
            TicketStatus::default()
        } else {
            match self.status.parse::<TicketStatus>() {
                Ok(status) => status,
                Err(_) => {
                    errors.add("status", "Not a valid choice.");
                    TicketStatus::default()
                }
            }
        };

        errors.into_result(TicketChanges {
            subject: subject.to_string(),
            description: self.description.clone(),
            status,
        })
    }
}

/// Body of the button-only forms (delete, remove member, logout)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CsrfForm {
    pub csrf_token: String,
}
