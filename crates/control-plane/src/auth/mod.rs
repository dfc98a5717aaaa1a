// Authentication module
// Decision: Stateless JWT bearer tokens; roles carried in the token

pub mod config;
pub mod jwt;
pub mod middleware;
pub mod routes;

pub use config::AuthConfig;
pub use middleware::{AuthError, AuthState, AuthUser, FromRef, Role, SuperAdmin};
pub use routes::{bootstrap_superadmin, routes};
