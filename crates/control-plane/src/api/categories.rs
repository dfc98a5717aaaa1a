// Categories API routes

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
use super::validation::{validate_description, validate_name};
use crate::auth::middleware::{AuthState, AuthUser, FromRef};
use crate::services::CategoryService;
use crate::storage::CategoryRow;

#[derive(Clone)]
pub struct CategoriesState {
    pub service: Arc<CategoryService>,
    pub auth: AuthState,
}

impl FromRef<CategoriesState> for AuthState {
    fn from_ref(input: &CategoriesState) -> Self {
        input.auth.clone()
    }
}

/// Template category. Also the payload of `category.*` events.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Category {
    pub id: i64,
    pub project_id: i64,
    #[schema(example = "Invoices")]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: row.id,
            project_id: row.project_id,
            name: row.name,
            description: row.description,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateCategoryRequest {
    pub project_id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateCategoryRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ListCategoriesQuery {
    #[serde(default)]
    pub project_id: Option<i64>,
}

pub fn routes(state: CategoriesState) -> Router {
    Router::new()
        .route("/categories", get(list_categories).post(create_category))
        .route(
            "/categories/:id",
            get(get_category)
                .patch(update_category)
                .delete(delete_category),
        )
        .with_state(state)
}

#[utoipa::path(
    post,
    path = "/categories",
    request_body = CreateCategoryRequest,
    responses(
        (status = 201, description = "Category created", body = Category),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 403, description = "No access to the project", body = ErrorResponse),
        (status = 404, description = "Project not found", body = ErrorResponse)
    ),
    tag = "categories"
)]
pub async fn create_category(
    State(state): State<CategoriesState>,
    auth: AuthUser,
    Json(req): Json<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<Category>), ApiError> {
    validate_name(Some(&req.name))?;
    validate_description(req.description.as_deref())?;
    let category = state.service.create(&auth, req).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

#[utoipa::path(
    get,
    path = "/categories",
    params(("project_id" = Option<i64>, Query, description = "Only this project")),
    responses(
        (status = 200, description = "List of categories", body = ListResponse<Category>)
    ),
    tag = "categories"
)]
pub async fn list_categories(
    State(state): State<CategoriesState>,
    auth: AuthUser,
    Query(query): Query<ListCategoriesQuery>,
) -> Result<Json<ListResponse<Category>>, ApiError> {
    Ok(Json(state.service.list(&auth, query.project_id).await?.into()))
}

#[utoipa::path(
    get,
    path = "/categories/{id}",
    params(("id" = i64, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Category found", body = Category),
        (status = 404, description = "Category not found", body = ErrorResponse)
    ),
    tag = "categories"
)]
pub async fn get_category(
    State(state): State<CategoriesState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<Category>, ApiError> {
    Ok(Json(state.service.get(&auth, id).await?))
}

#[utoipa::path(
    patch,
    path = "/categories/{id}",
    params(("id" = i64, Path, description = "Category ID")),
    request_body = UpdateCategoryRequest,
    responses(
        (status = 200, description = "Category updated", body = Category),
        (status = 404, description = "Category not found", body = ErrorResponse)
    ),
    tag = "categories"
)]
pub async fn update_category(
    State(state): State<CategoriesState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateCategoryRequest>,
) -> Result<Json<Category>, ApiError> {
    validate_name(req.name.as_deref())?;
    validate_description(req.description.as_deref())?;
    Ok(Json(state.service.update(&auth, id, req).await?))
}

#[utoipa::path(
    delete,
    path = "/categories/{id}",
    params(("id" = i64, Path, description = "Category ID")),
    responses(
        (status = 204, description = "Category deleted"),
        (status = 404, description = "Category not found", body = ErrorResponse)
    ),
    tag = "categories"
)]
pub async fn delete_category(
    State(state): State<CategoriesState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.service.delete(&auth, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
