// Authentication extractors
// Decision: Bearer tokens in the Authorization header for the REST API
// Decision: The admin stream passes its token as a query parameter (EventSource cannot set headers)

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use utoipa::ToSchema;

use super::{config::AuthConfig, jwt::JwtService};
use crate::storage::Database;

/// Authentication error
#[derive(Debug, Clone, Serialize)]
pub struct AuthError {
    pub error: String,
    #[serde(skip)]
    pub status: StatusCode,
}

impl AuthError {
    pub fn unauthorized(message: &str) -> Self {
        Self {
            error: message.to_string(),
            status: StatusCode::UNAUTHORIZED,
        }
    }

    pub fn forbidden(message: &str) -> Self {
        Self {
            error: message.to_string(),
            status: StatusCode::FORBIDDEN,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

/// User role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    /// Full access, receives the live admin stream
    SuperAdmin,
    /// May browse all users
    Admin,
    #[default]
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "SUPERADMIN",
            Role::Admin => "ADMIN",
            Role::User => "USER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "SUPERADMIN" => Ok(Role::SuperAdmin),
            "ADMIN" => Ok(Role::Admin),
            "USER" => Ok(Role::User),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

/// Authenticated user context extracted from request
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// User ID
    pub id: i64,
    /// User email
    pub email: String,
    /// User name
    pub name: String,
    /// User role
    pub role: Role,
}

impl AuthUser {
    pub fn is_superadmin(&self) -> bool {
        self.role == Role::SuperAdmin
    }

    /// SUPERADMIN or ADMIN
    pub fn is_admin(&self) -> bool {
        matches!(self.role, Role::SuperAdmin | Role::Admin)
    }

    /// Whether this user may act on something owned by `owner_id`
    pub fn can_manage(&self, owner_id: i64) -> bool {
        self.id == owner_id || self.is_superadmin()
    }
}

/// Auth state shared across routes
#[derive(Clone)]
pub struct AuthState {
    pub config: AuthConfig,
    pub jwt_service: Arc<JwtService>,
    pub db: Arc<Database>,
}

impl AuthState {
    pub fn new(config: AuthConfig, db: Arc<Database>) -> Self {
        let jwt_service = Arc::new(JwtService::new(config.jwt.clone()));
        Self {
            config,
            jwt_service,
            db,
        }
    }

    /// Verify an access token and build the user context
    pub fn authenticate(&self, token: &str) -> Result<AuthUser, AuthError> {
        let claims = self.jwt_service.validate_access_token(token).map_err(|e| {
            tracing::debug!("JWT validation failed: {}", e);
            AuthError::unauthorized("Invalid or expired token")
        })?;

        let id = claims
            .sub
            .parse::<i64>()
            .map_err(|_| AuthError::unauthorized("Invalid user ID in token"))?;
        let role = claims
            .role
            .parse::<Role>()
            .map_err(|_| AuthError::unauthorized("Invalid role in token"))?;

        Ok(AuthUser {
            id,
            email: claims.email,
            name: claims.name,
            role,
        })
    }
}

/// Extractor for authenticated user
/// This is required - returns 401 if not authenticated
#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    AuthState: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth_state = AuthState::from_ref(state);
        extract_auth_user(parts, &auth_state)
    }
}

/// Helper trait for extracting AuthState from application state
pub trait FromRef<T> {
    fn from_ref(input: &T) -> Self;
}

impl FromRef<AuthState> for AuthState {
    fn from_ref(input: &AuthState) -> Self {
        input.clone()
    }
}

/// Extract authenticated user from the Authorization header
fn extract_auth_user(parts: &Parts, auth_state: &AuthState) -> Result<AuthUser, AuthError> {
    let auth_header = parts
        .headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| AuthError::unauthorized("Authentication required"))?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| AuthError::unauthorized("Invalid authorization header"))?;

    let token = auth_str
        .strip_prefix("Bearer ")
        .ok_or_else(|| AuthError::unauthorized("Authentication required"))?;

    auth_state.authenticate(token.trim())
}

/// Require SUPERADMIN role extractor
#[derive(Debug, Clone)]
pub struct SuperAdmin(pub AuthUser);

#[axum::async_trait]
impl<S> FromRequestParts<S> for SuperAdmin
where
    S: Send + Sync,
    AuthState: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;

        if !user.is_superadmin() {
            return Err(AuthError::forbidden("SUPERADMIN access required"));
        }

        Ok(SuperAdmin(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::config::JwtConfig;
    use axum::http::Request;

    fn user(role: Role) -> AuthUser {
        AuthUser {
            id: 7,
            email: "test@example.com".to_string(),
            name: "Test".to_string(),
            role,
        }
    }

    fn test_state() -> AuthState {
        AuthState::new(
            AuthConfig {
                jwt: JwtConfig {
                    secret: "middleware-test-secret".to_string(),
                    ..Default::default()
                },
                superadmin: None,
            },
            Arc::new(Database::new()),
        )
    }

    fn parts_with(header_value: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = header_value {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_role_parsing_and_serde() {
        assert_eq!("superadmin".parse::<Role>().unwrap(), Role::SuperAdmin);
        assert_eq!("ADMIN".parse::<Role>().unwrap(), Role::Admin);
        assert!("root".parse::<Role>().is_err());
        assert_eq!(
            serde_json::to_string(&Role::SuperAdmin).unwrap(),
            r#""SUPERADMIN""#
        );
    }

    #[test]
    fn test_can_manage() {
        assert!(user(Role::User).can_manage(7));
        assert!(!user(Role::User).can_manage(8));
        assert!(!user(Role::Admin).can_manage(8));
        assert!(user(Role::SuperAdmin).can_manage(8));
    }

    #[test]
    fn test_auth_error() {
        let error = AuthError::unauthorized("Test error");
        assert_eq!(error.status, StatusCode::UNAUTHORIZED);
        assert_eq!(error.error, "Test error");

        let forbidden = AuthError::forbidden("Forbidden");
        assert_eq!(forbidden.status, StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_extract_bearer_token() {
        let state = test_state();
        let token = state
            .jwt_service
            .generate_access_token(3, "a@example.com", "A", "ADMIN")
            .unwrap();

        let parts = parts_with(Some(&format!("Bearer {}", token)));
        let user = extract_auth_user(&parts, &state).unwrap();
        assert_eq!(user.id, 3);
        assert_eq!(user.role, Role::Admin);
    }

    #[test]
    fn test_extract_rejections() {
        let state = test_state();

        let err = extract_auth_user(&parts_with(None), &state).unwrap_err();
        assert_eq!(err.error, "Authentication required");

        let err = extract_auth_user(&parts_with(Some("Basic abc")), &state).unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);

        let err = extract_auth_user(&parts_with(Some("Bearer garbage")), &state).unwrap_err();
        assert_eq!(err.error, "Invalid or expired token");
    }
}
