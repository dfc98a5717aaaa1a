// Authentication HTTP routes
// Decision: Email/password login returns a bearer token; no cookies, no refresh tokens

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{
    config::AdminConfig,
    middleware::{AuthError, AuthState, AuthUser, Role},
};
use crate::storage::{
    models::CreateUserRow,
    password::{hash_password, verify_password},
};

/// Login request
#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Token response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// User info response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserInfoResponse {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub role: Role,
}

/// Create auth routes
pub fn routes(state: AuthState) -> Router {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/me", get(me))
        .with_state(state)
}

/// POST /auth/login - Exchange email and password for an access token
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Access token issued", body = TokenResponse),
        (status = 401, description = "Invalid email or password")
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AuthState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, AuthError> {
    let user = state
        .db
        .get_user_by_email(req.email.trim())
        .await
        .map_err(|e| {
            tracing::error!("Database error during login: {}", e);
            AuthError::unauthorized("Login failed")
        })?
        .ok_or_else(|| AuthError::unauthorized("Invalid email or password"))?;

    let valid = verify_password(&req.password, &user.password_hash).map_err(|e| {
        tracing::error!("Password verification error: {}", e);
        AuthError::unauthorized("Login failed")
    })?;

    if !valid {
        return Err(AuthError::unauthorized("Invalid email or password"));
    }

    let access_token = state
        .jwt_service
        .generate_access_token(user.id, &user.email, &user.name, &user.role)
        .map_err(|e| {
            tracing::error!("Token generation error: {}", e);
            AuthError::unauthorized("Login failed")
        })?;

    tracing::info!(user_id = user.id, "User logged in");

    Ok(Json(TokenResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: state.jwt_service.access_token_lifetime_secs(),
    }))
}

/// GET /auth/me - Current user from the token
#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "Current user", body = UserInfoResponse),
        (status = 401, description = "Unauthorized")
    ),
    tag = "auth"
)]
pub async fn me(user: AuthUser) -> Json<UserInfoResponse> {
    Json(UserInfoResponse {
        id: user.id,
        email: user.email,
        name: user.name,
        role: user.role,
    })
}

/// Create the configured superadmin account if it does not exist yet
pub async fn bootstrap_superadmin(state: &AuthState) -> anyhow::Result<()> {
    let Some(admin) = &state.config.superadmin else {
        tracing::info!("AUTH_SUPERADMIN_EMAIL not set, skipping superadmin bootstrap");
        return Ok(());
    };

    get_or_create_superadmin(state, admin).await.map(|id| {
        tracing::info!(user_id = id, email = %admin.email, "Superadmin account ready");
    })
}

async fn get_or_create_superadmin(state: &AuthState, admin: &AdminConfig) -> anyhow::Result<i64> {
    if let Some(existing) = state.db.get_user_by_email(&admin.email).await? {
        return Ok(existing.id);
    }

    let password_hash = hash_password(&admin.password)?;
    let user = state
        .db
        .create_user(CreateUserRow {
            email: admin.email.clone(),
            name: "Superadmin".to_string(),
            role: Role::SuperAdmin.to_string(),
            password_hash,
        })
        .await?;
    Ok(user.id)
}
