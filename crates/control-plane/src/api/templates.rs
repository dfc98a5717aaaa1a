// Email templates API routes
// Decision: Bodies are stored verbatim; rendering happens elsewhere

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
use super::validation::validate_template_input;
use crate::auth::middleware::{AuthState, AuthUser, FromRef};
use crate::services::TemplateService;
use crate::storage::TemplateRow;

#[derive(Clone)]
pub struct TemplatesState {
    pub service: Arc<TemplateService>,
    pub auth: AuthState,
}

impl FromRef<TemplatesState> for AuthState {
    fn from_ref(input: &TemplatesState) -> Self {
        input.auth.clone()
    }
}

/// Email template. Also the payload of `template.*` events.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Template {
    pub id: i64,
    pub project_id: i64,
    pub category_id: Option<i64>,
    pub name: String,
    pub subject: String,
    pub html_body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_body: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<TemplateRow> for Template {
    fn from(row: TemplateRow) -> Self {
        Self {
            id: row.id,
            project_id: row.project_id,
            category_id: row.category_id,
            name: row.name,
            subject: row.subject,
            html_body: row.html_body,
            text_body: row.text_body,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateTemplateRequest {
    pub project_id: i64,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[schema(example = "Welcome")]
    pub name: String,
    #[schema(example = "Welcome to {{company}}")]
    pub subject: String,
    pub html_body: String,
    #[serde(default)]
    pub text_body: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateTemplateRequest {
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub html_body: Option<String>,
    #[serde(default)]
    pub text_body: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ListTemplatesQuery {
    #[serde(default)]
    pub project_id: Option<i64>,
    #[serde(default)]
    pub category_id: Option<i64>,
}

pub fn routes(state: TemplatesState) -> Router {
    Router::new()
        .route("/templates", get(list_templates).post(create_template))
        .route(
            "/templates/:id",
            get(get_template)
                .patch(update_template)
                .delete(delete_template),
        )
        .with_state(state)
}

#[utoipa::path(
    post,
    path = "/templates",
    request_body = CreateTemplateRequest,
    responses(
        (status = 201, description = "Template created", body = Template),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 403, description = "No access to the project", body = ErrorResponse)
    ),
    tag = "templates"
)]
pub async fn create_template(
    State(state): State<TemplatesState>,
    auth: AuthUser,
    Json(req): Json<CreateTemplateRequest>,
) -> Result<(StatusCode, Json<Template>), ApiError> {
    validate_template_input(
        Some(&req.name),
        Some(&req.subject),
        Some(&req.html_body),
        req.text_body.as_deref(),
    )?;
    let template = state.service.create(&auth, req).await?;
    Ok((StatusCode::CREATED, Json(template)))
}

#[utoipa::path(
    get,
    path = "/templates",
    params(
        ("project_id" = Option<i64>, Query, description = "Only this project"),
        ("category_id" = Option<i64>, Query, description = "Only this category")
    ),
    responses(
        (status = 200, description = "List of templates", body = ListResponse<Template>)
    ),
    tag = "templates"
)]
pub async fn list_templates(
    State(state): State<TemplatesState>,
    auth: AuthUser,
    Query(query): Query<ListTemplatesQuery>,
) -> Result<Json<ListResponse<Template>>, ApiError> {
    let templates = state
        .service
        .list(&auth, query.project_id, query.category_id)
        .await?;
    Ok(Json(templates.into()))
}

#[utoipa::path(
    get,
    path = "/templates/{id}",
    params(("id" = i64, Path, description = "Template ID")),
    responses(
        (status = 200, description = "Template found", body = Template),
        (status = 404, description = "Template not found", body = ErrorResponse)
    ),
    tag = "templates"
)]
pub async fn get_template(
    State(state): State<TemplatesState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<Template>, ApiError> {
    Ok(Json(state.service.get(&auth, id).await?))
}

#[utoipa::path(
    patch,
    path = "/templates/{id}",
    params(("id" = i64, Path, description = "Template ID")),
    request_body = UpdateTemplateRequest,
    responses(
        (status = 200, description = "Template updated", body = Template),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 404, description = "Template not found", body = ErrorResponse)
    ),
    tag = "templates"
)]
pub async fn update_template(
    State(state): State<TemplatesState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateTemplateRequest>,
) -> Result<Json<Template>, ApiError> {
    validate_template_input(
        req.name.as_deref(),
        req.subject.as_deref(),
        req.html_body.as_deref(),
        req.text_body.as_deref(),
    )?;
    Ok(Json(state.service.update(&auth, id, req).await?))
}

#[utoipa::path(
    delete,
    path = "/templates/{id}",
    params(("id" = i64, Path, description = "Template ID")),
    responses(
        (status = 204, description = "Template deleted"),
        (status = 404, description = "Template not found", body = ErrorResponse)
    ),
    tag = "templates"
)]
pub async fn delete_template(
    State(state): State<TemplatesState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.service.delete(&auth, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
