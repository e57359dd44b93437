//! Storage mechanisms for persisting users, projects, memberships and tickets

pub mod memory;
pub mod traits;

pub use memory::MemoryStorageProvider;
pub use traits::{ProjectStorage, StorageProvider, TicketStorage, UserStorage};
