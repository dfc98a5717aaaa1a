// Storage layer for the Mailplate control-plane
// Decision: In-memory only; the relational engine is out of scope
//
// Storage functions return anyhow::Result; services lift failures into
// DomainError::Internal.

pub mod memory;
pub mod models;
pub mod password;

pub use memory::InMemoryDatabase;
pub use models::*;

/// Database handle used by services
pub type Database = InMemoryDatabase;
