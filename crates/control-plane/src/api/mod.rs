// HTTP API routes
//
// Each submodule handles one resource type with its own state.

pub mod categories;
pub mod common;
pub mod projects;
pub mod templates;
pub mod users;
pub mod validation;
pub mod webhooks;

// Re-export common types
pub use common::{ApiError, ErrorResponse, ListResponse};
