// Projects API routes (projects and their members)

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use super::common::{ApiError, ErrorResponse, ListResponse};
use super::validation::{validate_description, validate_name};
use crate::auth::middleware::{AuthState, AuthUser, FromRef};
use crate::services::ProjectService;
use crate::storage::{ProjectMemberRow, ProjectRow};

#[derive(Clone)]
pub struct ProjectsState {
    pub service: Arc<ProjectService>,
    pub auth: AuthState,
}

impl FromRef<ProjectsState> for AuthState {
    fn from_ref(input: &ProjectsState) -> Self {
        input.auth.clone()
    }
}

/// Project. Also the payload of `project.created|updated|deleted`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Project {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub owner_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ProjectRow> for Project {
    fn from(row: ProjectRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            owner_id: row.owner_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Project membership. Payload of `project.member_added|member_removed`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProjectMember {
    pub project_id: i64,
    pub user_id: i64,
    pub added_at: DateTime<Utc>,
}

impl From<ProjectMemberRow> for ProjectMember {
    fn from(row: ProjectMemberRow) -> Self {
        Self {
            project_id: row.project_id,
            user_id: row.user_id,
            added_at: row.added_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateProjectRequest {
    #[schema(example = "Transactional emails")]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateProjectRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AddMemberRequest {
    pub user_id: i64,
}

pub fn routes(state: ProjectsState) -> Router {
    Router::new()
        .route("/projects", get(list_projects).post(create_project))
        .route(
            "/projects/:id",
            get(get_project).patch(update_project).delete(delete_project),
        )
        .route("/projects/:id/members", get(list_members).post(add_member))
        .route("/projects/:id/members/:user_id", delete(remove_member))
        .with_state(state)
}

/// POST /projects - Create a project owned by the caller
#[utoipa::path(
    post,
    path = "/projects",
    request_body = CreateProjectRequest,
    responses(
        (status = 201, description = "Project created", body = Project),
        (status = 400, description = "Invalid input", body = ErrorResponse)
    ),
    tag = "projects"
)]
pub async fn create_project(
    State(state): State<ProjectsState>,
    auth: AuthUser,
    Json(req): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<Project>), ApiError> {
    validate_name(Some(&req.name))?;
    validate_description(req.description.as_deref())?;
    let project = state.service.create(&auth, req).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

/// GET /projects - Projects visible to the caller
#[utoipa::path(
    get,
    path = "/projects",
    responses(
        (status = 200, description = "List of projects", body = ListResponse<Project>)
    ),
    tag = "projects"
)]
pub async fn list_projects(
    State(state): State<ProjectsState>,
    auth: AuthUser,
) -> Result<Json<ListResponse<Project>>, ApiError> {
    Ok(Json(state.service.list(&auth).await?.into()))
}

#[utoipa::path(
    get,
    path = "/projects/{id}",
    params(("id" = i64, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Project found", body = Project),
        (status = 403, description = "No access", body = ErrorResponse),
        (status = 404, description = "Project not found", body = ErrorResponse)
    ),
    tag = "projects"
)]
pub async fn get_project(
    State(state): State<ProjectsState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<Project>, ApiError> {
    Ok(Json(state.service.get(&auth, id).await?))
}

#[utoipa::path(
    patch,
    path = "/projects/{id}",
    params(("id" = i64, Path, description = "Project ID")),
    request_body = UpdateProjectRequest,
    responses(
        (status = 200, description = "Project updated", body = Project),
        (status = 403, description = "Only the owner can update", body = ErrorResponse),
        (status = 404, description = "Project not found", body = ErrorResponse)
    ),
    tag = "projects"
)]
pub async fn update_project(
    State(state): State<ProjectsState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateProjectRequest>,
) -> Result<Json<Project>, ApiError> {
    validate_name(req.name.as_deref())?;
    validate_description(req.description.as_deref())?;
    Ok(Json(state.service.update(&auth, id, req).await?))
}

/// DELETE /projects/{id} - Delete a project with its categories and templates
#[utoipa::path(
    delete,
    path = "/projects/{id}",
    params(("id" = i64, Path, description = "Project ID")),
    responses(
        (status = 204, description = "Project deleted"),
        (status = 404, description = "Project not found", body = ErrorResponse)
    ),
    tag = "projects"
)]
pub async fn delete_project(
    State(state): State<ProjectsState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.service.delete(&auth, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/projects/{id}/members",
    params(("id" = i64, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Project members", body = ListResponse<ProjectMember>)
    ),
    tag = "projects"
)]
pub async fn list_members(
    State(state): State<ProjectsState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<ListResponse<ProjectMember>>, ApiError> {
    Ok(Json(state.service.list_members(&auth, id).await?.into()))
}

#[utoipa::path(
    post,
    path = "/projects/{id}/members",
    params(("id" = i64, Path, description = "Project ID")),
    request_body = AddMemberRequest,
    responses(
        (status = 201, description = "Member added", body = ProjectMember),
        (status = 404, description = "Project or user not found", body = ErrorResponse),
        (status = 409, description = "Already a member", body = ErrorResponse)
    ),
    tag = "projects"
)]
pub async fn add_member(
    State(state): State<ProjectsState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<AddMemberRequest>,
) -> Result<(StatusCode, Json<ProjectMember>), ApiError> {
    let member = state.service.add_member(&auth, id, req).await?;
    Ok((StatusCode::CREATED, Json(member)))
}

#[utoipa::path(
    delete,
    path = "/projects/{id}/members/{user_id}",
    params(
        ("id" = i64, Path, description = "Project ID"),
        ("user_id" = i64, Path, description = "User ID")
    ),
    responses(
        (status = 204, description = "Member removed"),
        (status = 404, description = "Not a member", body = ErrorResponse)
    ),
    tag = "projects"
)]
pub async fn remove_member(
    State(state): State<ProjectsState>,
    auth: AuthUser,
    Path((id, user_id)): Path<(i64, i64)>,
) -> Result<StatusCode, ApiError> {
    state.service.remove_member(&auth, id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_serialization_omits_empty_description() {
        let now = Utc::now();
        let project = Project::from(ProjectRow {
            id: 1,
            name: "P".to_string(),
            description: None,
            owner_id: 2,
            created_at: now,
            updated_at: now,
        });
        let json = serde_json::to_value(&project).unwrap();
        assert!(json.get("description").is_none());
        assert_eq!(json["owner_id"], 2);
    }
}
