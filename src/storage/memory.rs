//! In-memory storage implementation for development and testing
//!
//! All tables live behind a single `RwLock`. Each trait method takes the lock
//! once, so every operation (including the cascade on project deletion) is
//! atomic and serialized against concurrent writers, and the unique indexes
//! decide which of two racing inserts wins.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::traits::*;
use crate::auth::user::{NewUser, User, UserId};
use crate::core::project::{NewProject, Project, ProjectId};
use crate::core::ticket::{NewTicket, Ticket, TicketChanges, TicketId};
use crate::error::{Result, TrackerError};

#[derive(Default)]
struct Tables {
    users: BTreeMap<UserId, User>,
    usernames: HashMap<String, UserId>,
    projects: BTreeMap<ProjectId, Project>,
    project_names: HashMap<String, ProjectId>,
    /// Join relation (project_id, user_id)
    memberships: BTreeSet<(ProjectId, UserId)>,
    tickets: BTreeMap<TicketId, Ticket>,
    next_user_id: u64,
    next_project_id: u64,
    next_ticket_id: u64,
}

impl Tables {
    fn next_id(counter: &mut u64) -> u64 {
        *counter += 1;
        *counter
    }
}

/// In-memory storage provider
#[derive(Clone, Default)]
pub struct MemoryStorageProvider {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStorageProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStorage for MemoryStorageProvider {
    async fn create_user(&self, user: NewUser) -> Result<User> {
        let mut tables = self.tables.write().await;

        if tables.usernames.contains_key(&user.username) {
            return Err(TrackerError::conflict(
                "username",
                "That username is taken. Please choose a different one.",
            ));
        }

        let id = UserId(Tables::next_id(&mut tables.next_user_id));
        let stored = User {
            id,
            username: user.username,
            password_hash: user.password_hash,
            role: user.role,
            created_at: Utc::now(),
        };
        tables.usernames.insert(stored.username.clone(), id);
        tables.users.insert(id, stored.clone());

        Ok(stored)
    }

    async fn get_user(&self, user_id: UserId) -> Result<Option<User>> {
        Ok(self.tables.read().await.users.get(&user_id).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .usernames
            .get(username)
            .and_then(|id| tables.users.get(id))
            .cloned())
    }
}

#[async_trait]
impl ProjectStorage for MemoryStorageProvider {
    async fn create_project(&self, project: NewProject) -> Result<Project> {
        let mut tables = self.tables.write().await;

        if tables.project_names.contains_key(&project.name) {
            return Err(TrackerError::conflict(
                "name",
                "A project with that name already exists.",
            ));
        }

        let id = ProjectId(Tables::next_id(&mut tables.next_project_id));
        let stored = Project {
            id,
            name: project.name,
            description: project.description,
            created_at: Utc::now(),
        };
        tables.project_names.insert(stored.name.clone(), id);
        tables.projects.insert(id, stored.clone());

        Ok(stored)
    }

    async fn get_project(&self, project_id: ProjectId) -> Result<Option<Project>> {
        Ok(self.tables.read().await.projects.get(&project_id).cloned())
    }

    async fn list_projects(&self) -> Result<Vec<Project>> {
        Ok(self.tables.read().await.projects.values().cloned().collect())
    }

    async fn delete_project(&self, project_id: ProjectId) -> Result<usize> {
        let mut tables = self.tables.write().await;

        let project = tables
            .projects
            .remove(&project_id)
            .ok_or_else(|| TrackerError::NotFound(format!("Project {} not found", project_id)))?;
        tables.project_names.remove(&project.name);
        tables.memberships.retain(|(pid, _)| *pid != project_id);

        let before = tables.tickets.len();
        tables.tickets.retain(|_, ticket| ticket.project_id != project_id);

        Ok(before - tables.tickets.len())
    }

    async fn add_member(&self, project_id: ProjectId, user_id: UserId) -> Result<bool> {
        let mut tables = self.tables.write().await;

        if !tables.projects.contains_key(&project_id) {
            return Err(TrackerError::NotFound(format!("Project {} not found", project_id)));
        }
        if !tables.users.contains_key(&user_id) {
            return Err(TrackerError::NotFound(format!("User {} not found", user_id)));
        }

        Ok(tables.memberships.insert((project_id, user_id)))
    }

    async fn remove_member(&self, project_id: ProjectId, user_id: UserId) -> Result<bool> {
        Ok(self
            .tables
            .write()
            .await
            .memberships
            .remove(&(project_id, user_id)))
    }

    async fn is_member(&self, project_id: ProjectId, user_id: UserId) -> Result<bool> {
        Ok(self
            .tables
            .read()
            .await
            .memberships
            .contains(&(project_id, user_id)))
    }

    async fn list_members(&self, project_id: ProjectId) -> Result<Vec<User>> {
        let tables = self.tables.read().await;
        let mut members: Vec<User> = tables
            .memberships
            .range((project_id, UserId(0))..=(project_id, UserId(u64::MAX)))
            .filter_map(|(_, user_id)| tables.users.get(user_id))
            .cloned()
            .collect();
        members.sort_by(|a, b| a.username.cmp(&b.username));

        Ok(members)
    }
}

#[async_trait]
impl TicketStorage for MemoryStorageProvider {
    async fn create_ticket(&self, ticket: NewTicket) -> Result<Ticket> {
        let mut tables = self.tables.write().await;

        // Foreign keys
        if !tables.projects.contains_key(&ticket.project_id) {
            return Err(TrackerError::NotFound(format!(
                "Project {} not found",
                ticket.project_id
            )));
        }
        if !tables.users.contains_key(&ticket.author_id) {
            return Err(TrackerError::NotFound(format!("User {} not found", ticket.author_id)));
        }

        let id = TicketId(Tables::next_id(&mut tables.next_ticket_id));
        let stored = Ticket {
            id,
            subject: ticket.subject,
            description: ticket.description,
            status: ticket.status,
            created_at: Utc::now(),
            author_id: ticket.author_id,
            project_id: ticket.project_id,
        };
        tables.tickets.insert(id, stored.clone());

        Ok(stored)
    }

    async fn get_ticket(&self, ticket_id: TicketId) -> Result<Option<Ticket>> {
        Ok(self.tables.read().await.tickets.get(&ticket_id).cloned())
    }

    async fn update_ticket(&self, ticket_id: TicketId, changes: TicketChanges) -> Result<Ticket> {
        let mut tables = self.tables.write().await;

        if let Some(ticket) = tables.tickets.get_mut(&ticket_id) {
            ticket.subject = changes.subject;
            ticket.description = changes.description;
            ticket.status = changes.status;
            Ok(ticket.clone())
        } else {
            Err(TrackerError::NotFound(format!("Ticket {} not found", ticket_id)))
        }
    }

    async fn delete_ticket(&self, ticket_id: TicketId) -> Result<()> {
        match self.tables.write().await.tickets.remove(&ticket_id) {
            Some(_) => Ok(()),
            None => Err(TrackerError::NotFound(format!("Ticket {} not found", ticket_id))),
        }
    }

    async fn list_project_tickets(&self, project_id: ProjectId) -> Result<Vec<Ticket>> {
        Ok(self
            .tables
            .read()
            .await
            .tickets
            .values()
            .filter(|ticket| ticket.project_id == project_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl StorageProvider for MemoryStorageProvider {
    fn user_storage(&self) -> &dyn UserStorage {
        self
    }

    fn project_storage(&self) -> &dyn ProjectStorage {
        self
    }

    fn ticket_storage(&self) -> &dyn TicketStorage {
        self
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::user::UserRole;
    use crate::core::ticket::TicketStatus;

    fn new_user(name: &str) -> NewUser {
        NewUser {
            username: name.to_string(),
            password_hash: "hash".to_string(),
            role: UserRole::Regular,
        }
    }

    fn new_project(name: &str) -> NewProject {
        NewProject {
            name: name.to_string(),
            description: None,
        }
    }

    fn new_ticket(project_id: ProjectId, author_id: UserId) -> NewTicket {
        NewTicket {
            subject: "Crash on save".to_string(),
            description: "Stack trace attached".to_string(),
            status: TicketStatus::Open,
            author_id,
            project_id,
        }
    }

    #[tokio::test]
    async fn test_unique_username() {
        let storage = MemoryStorageProvider::new();
        let alice = storage.create_user(new_user("alice")).await.unwrap();
        assert_eq!(alice.id, UserId(1));

        let err = storage.create_user(new_user("alice")).await.unwrap_err();
        assert!(matches!(err, TrackerError::Conflict { field: "username", .. }));

        let found = storage.get_user_by_username("alice").await.unwrap().unwrap();
        assert_eq!(found.id, alice.id);
        assert!(storage.get_user_by_username("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unique_project_name() {
        let storage = MemoryStorageProvider::new();
        storage.create_project(new_project("Apollo")).await.unwrap();
        let err = storage.create_project(new_project("Apollo")).await.unwrap_err();
        assert!(matches!(err, TrackerError::Conflict { field: "name", .. }));
    }

    #[tokio::test]
    async fn test_membership_pairs_are_unique() {
        let storage = MemoryStorageProvider::new();
        let user = storage.create_user(new_user("bob")).await.unwrap();
        let project = storage.create_project(new_project("Apollo")).await.unwrap();

        assert!(storage.add_member(project.id, user.id).await.unwrap());
        assert!(!storage.add_member(project.id, user.id).await.unwrap());
        assert_eq!(storage.list_members(project.id).await.unwrap().len(), 1);

        assert!(storage.remove_member(project.id, user.id).await.unwrap());
        assert!(!storage.remove_member(project.id, user.id).await.unwrap());
        assert!(!storage.is_member(project.id, user.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_ticket_foreign_keys() {
        let storage = MemoryStorageProvider::new();
        let user = storage.create_user(new_user("bob")).await.unwrap();

        let err = storage
            .create_ticket(new_ticket(ProjectId(99), user.id))
            .await
            .unwrap_err();
        assert!(matches!(err, TrackerError::NotFound(_)));

        let project = storage.create_project(new_project("Apollo")).await.unwrap();
        let err = storage
            .create_ticket(new_ticket(project.id, UserId(99)))
            .await
            .unwrap_err();
        assert!(matches!(err, TrackerError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_project_cascades() {
        let storage = MemoryStorageProvider::new();
        let user = storage.create_user(new_user("bob")).await.unwrap();
        let doomed = storage.create_project(new_project("Doomed")).await.unwrap();
        let kept = storage.create_project(new_project("Kept")).await.unwrap();

        storage.add_member(doomed.id, user.id).await.unwrap();
        storage.create_ticket(new_ticket(doomed.id, user.id)).await.unwrap();
        storage.create_ticket(new_ticket(doomed.id, user.id)).await.unwrap();
        let survivor = storage.create_ticket(new_ticket(kept.id, user.id)).await.unwrap();

        assert_eq!(storage.delete_project(doomed.id).await.unwrap(), 2);
        assert!(storage.get_project(doomed.id).await.unwrap().is_none());
        assert!(storage.list_project_tickets(doomed.id).await.unwrap().is_empty());
        assert!(!storage.is_member(doomed.id, user.id).await.unwrap());
        assert!(storage.get_ticket(survivor.id).await.unwrap().is_some());

        // The name is free again
        storage.create_project(new_project("Doomed")).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_keeps_author_and_project() {
        let storage = MemoryStorageProvider::new();
        let user = storage.create_user(new_user("bob")).await.unwrap();
        let project = storage.create_project(new_project("Apollo")).await.unwrap();
        let ticket = storage.create_ticket(new_ticket(project.id, user.id)).await.unwrap();

        let updated = storage
            .update_ticket(
                ticket.id,
                TicketChanges {
                    subject: "Crash on load".to_string(),
                    description: "Different trace".to_string(),
                    status: TicketStatus::Closed,
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.status, TicketStatus::Closed);
        assert_eq!(updated.author_id, user.id);
        assert_eq!(updated.project_id, project.id);
        assert_eq!(updated.created_at, ticket.created_at);
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_registration_has_one_winner() {
        let storage = MemoryStorageProvider::new();
        let mut handles = Vec::new();
        for _ in 0..8 {
            let storage = storage.clone();
            handles.push(tokio::spawn(async move {
                storage.create_user(new_user("racer")).await
            }));
        }

        let mut winners = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => winners += 1,
                Err(err) => assert!(matches!(err, TrackerError::Conflict { .. })),
            }
        }
        assert_eq!(winners, 1);
    }
}
