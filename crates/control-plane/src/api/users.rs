// Users API routes
// Decision: SUPERADMIN manages accounts; ADMIN may browse; everyone may read themselves

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use super::common::{ApiError, ErrorResponse, ListResponse};
use super::validation::validate_name;
use crate::auth::middleware::{AuthState, AuthUser, FromRef, Role};
use crate::services::UserService;
use crate::storage::UserRow;

/// App state for users routes
#[derive(Clone)]
pub struct UsersState {
    pub service: Arc<UserService>,
    pub auth: AuthState,
}

impl FromRef<UsersState> for AuthState {
    fn from_ref(input: &UsersState) -> Self {
        input.auth.clone()
    }
}

/// User account. Also the payload of `user.*` events.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        let role = row.role.parse().unwrap_or_else(|e| {
            tracing::warn!(
                user_id = row.id,
                error = %e,
                "Stored role is invalid, treating as USER"
            );
            Role::User
        });
        Self {
            id: row.id,
            email: row.email,
            name: row.name,
            role,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Request to create a user
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateUserRequest {
    #[schema(example = "jane@example.com")]
    pub email: String,
    pub name: String,
    /// At least 8 characters
    pub password: String,
    /// Defaults to USER
    #[serde(default)]
    pub role: Option<Role>,
}

/// Partial update; absent fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
}

/// Query parameters for listing users
#[derive(Debug, Deserialize, ToSchema)]
pub struct ListUsersQuery {
    /// Search query to filter by name or email
    #[serde(default)]
    pub search: Option<String>,
}

/// Create users routes
pub fn routes(state: UsersState) -> Router {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/:id",
            get(get_user).patch(update_user).delete(delete_user),
        )
        .with_state(state)
}

/// POST /users - Create a user (SUPERADMIN)
#[utoipa::path(
    post,
    path = "/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 403, description = "SUPERADMIN access required", body = ErrorResponse),
        (status = 409, description = "Email already in use", body = ErrorResponse)
    ),
    tag = "users"
)]
pub async fn create_user(
    State(state): State<UsersState>,
    auth: AuthUser,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    validate_name(Some(&req.name))?;
    validate_name(Some(&req.email))?;
    let user = state.service.create(&auth, req).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /users - List users (ADMIN or SUPERADMIN)
#[utoipa::path(
    get,
    path = "/users",
    params(
        ("search" = Option<String>, Query, description = "Search by name or email")
    ),
    responses(
        (status = 200, description = "List of users", body = ListResponse<User>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "ADMIN access required", body = ErrorResponse)
    ),
    tag = "users"
)]
pub async fn list_users(
    State(state): State<UsersState>,
    auth: AuthUser,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<ListResponse<User>>, ApiError> {
    let users = state.service.list(&auth, query.search.as_deref()).await?;
    Ok(Json(ListResponse::new(users)))
}

/// GET /users/{id} - Get a user
#[utoipa::path(
    get,
    path = "/users/{id}",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "User found", body = User),
        (status = 403, description = "Not allowed to view this user", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    tag = "users"
)]
pub async fn get_user(
    State(state): State<UsersState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<User>, ApiError> {
    Ok(Json(state.service.get(&auth, id).await?))
}

/// PATCH /users/{id} - Update a user (SUPERADMIN)
#[utoipa::path(
    patch,
    path = "/users/{id}",
    params(("id" = i64, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated", body = User),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 409, description = "Email already in use", body = ErrorResponse)
    ),
    tag = "users"
)]
pub async fn update_user(
    State(state): State<UsersState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<User>, ApiError> {
    validate_name(req.name.as_deref())?;
    validate_name(req.email.as_deref())?;
    Ok(Json(state.service.update(&auth, id, req).await?))
}

/// DELETE /users/{id} - Delete a user (SUPERADMIN)
#[utoipa::path(
    delete,
    path = "/users/{id}",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    tag = "users"
)]
pub async fn delete_user(
    State(state): State<UsersState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.service.delete(&auth, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
