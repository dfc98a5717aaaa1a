// Project service
// Decision: Any authenticated user may create a project and becomes its owner
// Decision: Owner or SUPERADMIN manages a project; members may read it and work inside it

use mailplate_core::{DomainError, Event, EventEmitter, EventName, Result};
use std::sync::Arc;

use crate::api::projects::{
    AddMemberRequest, CreateProjectRequest, Project, ProjectMember, UpdateProjectRequest,
};
use crate::auth::AuthUser;
use crate::storage::{
    models::{CreateProjectRow, UpdateProject},
    Database, ProjectRow,
};

/// Load a project the actor may work in (owner, member or SUPERADMIN)
pub(crate) async fn authorize_project(
    db: &Database,
    actor: &AuthUser,
    project_id: i64,
) -> Result<ProjectRow> {
    let project = db
        .get_project(project_id)
        .await?
        .ok_or_else(|| DomainError::not_found("Project", project_id))?;

    if actor.can_manage(project.owner_id) || db.is_project_member(project_id, actor.id).await? {
        Ok(project)
    } else {
        Err(DomainError::forbidden("No access to this project"))
    }
}

/// Load a project the actor may manage (owner or SUPERADMIN)
async fn authorize_owner(db: &Database, actor: &AuthUser, project_id: i64) -> Result<ProjectRow> {
    let project = db
        .get_project(project_id)
        .await?
        .ok_or_else(|| DomainError::not_found("Project", project_id))?;

    if actor.can_manage(project.owner_id) {
        Ok(project)
    } else {
        Err(DomainError::forbidden("Only the project owner can do this"))
    }
}

pub struct ProjectService {
    db: Arc<Database>,
    events: Arc<dyn EventEmitter>,
}

impl ProjectService {
    pub fn new(db: Arc<Database>, events: Arc<dyn EventEmitter>) -> Self {
        Self { db, events }
    }

    pub async fn create(&self, actor: &AuthUser, req: CreateProjectRequest) -> Result<Project> {
        let name = req.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("Project name must not be empty"));
        }

        let row = self
            .db
            .create_project(CreateProjectRow {
                name: name.to_string(),
                description: req.description,
                owner_id: actor.id,
            })
            .await?;

        let project = Project::from(row);
        tracing::info!(project_id = project.id, owner_id = actor.id, "Project created");
        self.events
            .emit(Event::snapshot(EventName::ProjectCreated, &project))
            .await;
        Ok(project)
    }

    /// All projects for SUPERADMIN, otherwise owned and member projects
    pub async fn list(&self, actor: &AuthUser) -> Result<Vec<Project>> {
        let rows = if actor.is_superadmin() {
            self.db.list_projects().await?
        } else {
            self.db.list_projects_for_user(actor.id).await?
        };
        Ok(rows.into_iter().map(Project::from).collect())
    }

    pub async fn get(&self, actor: &AuthUser, id: i64) -> Result<Project> {
        authorize_project(&self.db, actor, id)
            .await
            .map(Project::from)
    }

    pub async fn update(
        &self,
        actor: &AuthUser,
        id: i64,
        req: UpdateProjectRequest,
    ) -> Result<Project> {
        authorize_owner(&self.db, actor, id).await?;

        let name = match req.name {
            Some(name) if name.trim().is_empty() => {
                return Err(DomainError::validation("Project name must not be empty"))
            }
            Some(name) => Some(name.trim().to_string()),
            None => None,
        };

        let row = self
            .db
            .update_project(
                id,
                UpdateProject {
                    name,
                    description: req.description,
                },
            )
            .await?
            .ok_or_else(|| DomainError::not_found("Project", id))?;

        let project = Project::from(row);
        tracing::info!(project_id = id, "Project updated");
        self.events
            .emit(Event::snapshot(EventName::ProjectUpdated, &project))
            .await;
        Ok(project)
    }

    /// Delete a project. Its categories, templates and memberships go with it
    /// but only `project.deleted` is emitted.
    pub async fn delete(&self, actor: &AuthUser, id: i64) -> Result<Project> {
        authorize_owner(&self.db, actor, id).await?;

        let row = self
            .db
            .delete_project(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Project", id))?;

        let project = Project::from(row);
        tracing::info!(project_id = id, "Project deleted");
        self.events
            .emit(Event::snapshot(EventName::ProjectDeleted, &project))
            .await;
        Ok(project)
    }

    pub async fn add_member(
        &self,
        actor: &AuthUser,
        project_id: i64,
        req: AddMemberRequest,
    ) -> Result<ProjectMember> {
        let project = authorize_owner(&self.db, actor, project_id).await?;

        if self.db.get_user(req.user_id).await?.is_none() {
            return Err(DomainError::not_found("User", req.user_id));
        }
        if project.owner_id == req.user_id {
            return Err(DomainError::validation("The project owner is already a member"));
        }

        let row = self
            .db
            .add_project_member(project_id, req.user_id)
            .await?
            .ok_or_else(|| DomainError::conflict("User is already a member of this project"))?;

        let member = ProjectMember::from(row);
        tracing::info!(project_id, user_id = req.user_id, "Project member added");
        self.events
            .emit(Event::snapshot(EventName::ProjectMemberAdded, &member))
            .await;
        Ok(member)
    }

    pub async fn remove_member(
        &self,
        actor: &AuthUser,
        project_id: i64,
        user_id: i64,
    ) -> Result<ProjectMember> {
        authorize_owner(&self.db, actor, project_id).await?;

        let row = self
            .db
            .remove_project_member(project_id, user_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Project member", user_id))?;

        let member = ProjectMember::from(row);
        tracing::info!(project_id, user_id, "Project member removed");
        self.events
            .emit(Event::snapshot(EventName::ProjectMemberRemoved, &member))
            .await;
        Ok(member)
    }

    pub async fn list_members(
        &self,
        actor: &AuthUser,
        project_id: i64,
    ) -> Result<Vec<ProjectMember>> {
        authorize_project(&self.db, actor, project_id).await?;
        Ok(self
            .db
            .list_project_members(project_id)
            .await?
            .into_iter()
            .map(ProjectMember::from)
            .collect())
    }
}
