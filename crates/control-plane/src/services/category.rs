// Category service
// Categories group templates inside one project; project access governs everything here.

use mailplate_core::{DomainError, Event, EventEmitter, EventName, Result};
use std::sync::Arc;

use super::project::authorize_project;
use crate::api::categories::{Category, CreateCategoryRequest, UpdateCategoryRequest};
use crate::auth::AuthUser;
use crate::storage::{
    models::{CreateCategoryRow, UpdateCategory},
    CategoryRow, Database,
};

pub struct CategoryService {
    db: Arc<Database>,
    events: Arc<dyn EventEmitter>,
}

impl CategoryService {
    pub fn new(db: Arc<Database>, events: Arc<dyn EventEmitter>) -> Self {
        Self { db, events }
    }

    async fn load(&self, actor: &AuthUser, id: i64) -> Result<CategoryRow> {
        let row = self
            .db
            .get_category(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Category", id))?;
        authorize_project(&self.db, actor, row.project_id).await?;
        Ok(row)
    }

    pub async fn create(&self, actor: &AuthUser, req: CreateCategoryRequest) -> Result<Category> {
        authorize_project(&self.db, actor, req.project_id).await?;
        let name = non_empty_name(&req.name)?;

        let row = self
            .db
            .create_category(CreateCategoryRow {
                project_id: req.project_id,
                name,
                description: req.description,
            })
            .await?;

        let category = Category::from(row);
        tracing::info!(
            category_id = category.id,
            project_id = category.project_id,
            "Category created"
        );
        self.events
            .emit(Event::snapshot(EventName::CategoryCreated, &category))
            .await;
        Ok(category)
    }

    /// Categories of one project, or of every project the actor can see
    pub async fn list(&self, actor: &AuthUser, project_id: Option<i64>) -> Result<Vec<Category>> {
        let rows = match project_id {
            Some(project_id) => {
                authorize_project(&self.db, actor, project_id).await?;
                self.db.list_categories(Some(project_id)).await?
            }
            None if actor.is_superadmin() => self.db.list_categories(None).await?,
            None => {
                let visible: Vec<i64> = self
                    .db
                    .list_projects_for_user(actor.id)
                    .await?
                    .into_iter()
                    .map(|p| p.id)
                    .collect();
                self.db
                    .list_categories(None)
                    .await?
                    .into_iter()
                    .filter(|c| visible.contains(&c.project_id))
                    .collect()
            }
        };
        Ok(rows.into_iter().map(Category::from).collect())
    }

    pub async fn get(&self, actor: &AuthUser, id: i64) -> Result<Category> {
        self.load(actor, id).await.map(Category::from)
    }

    pub async fn update(
        &self,
        actor: &AuthUser,
        id: i64,
        req: UpdateCategoryRequest,
    ) -> Result<Category> {
        self.load(actor, id).await?;
        let name = req.name.as_deref().map(non_empty_name).transpose()?;

        let row = self
            .db
            .update_category(
                id,
                UpdateCategory {
                    name,
                    description: req.description,
                },
            )
            .await?
            .ok_or_else(|| DomainError::not_found("Category", id))?;

        let category = Category::from(row);
        tracing::info!(category_id = id, "Category updated");
        self.events
            .emit(Event::snapshot(EventName::CategoryUpdated, &category))
            .await;
        Ok(category)
    }

    /// Delete a category; its templates stay in the project, uncategorized
    pub async fn delete(&self, actor: &AuthUser, id: i64) -> Result<Category> {
        self.load(actor, id).await?;

        let row = self
            .db
            .delete_category(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Category", id))?;

        let category = Category::from(row);
        tracing::info!(category_id = id, "Category deleted");
        self.events
            .emit(Event::snapshot(EventName::CategoryDeleted, &category))
            .await;
        Ok(category)
    }
}

fn non_empty_name(raw: &str) -> Result<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(DomainError::validation("Category name must not be empty"));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::storage::models::CreateProjectRow;
    use mailplate_core::CollectingEventEmitter;
    use serde_json::json;

    fn actor(id: i64, role: Role) -> AuthUser {
        AuthUser {
            id,
            email: format!("u{}@example.com", id),
            name: format!("User {}", id),
            role,
        }
    }

    async fn setup() -> (CategoryService, Arc<CollectingEventEmitter>, Arc<Database>, i64) {
        let db = Arc::new(Database::new());
        let project = db
            .create_project(CreateProjectRow {
                name: "P".to_string(),
                description: None,
                owner_id: 1,
            })
            .await
            .unwrap();
        let events = Arc::new(CollectingEventEmitter::new());
        let service = CategoryService::new(db.clone(), events.clone());
        (service, events, db, project.id)
    }

    fn invoices(project_id: i64) -> CreateCategoryRequest {
        CreateCategoryRequest {
            project_id,
            name: "Invoices".to_string(),
            description: None,
        }
    }

    #[tokio::test]
    async fn test_create_emits_category_created() {
        let (service, events, _, project_id) = setup().await;
        let owner = actor(1, Role::User);

        let category = service.create(&owner, invoices(project_id)).await.unwrap();

        let emitted = events.events().await;
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].event, EventName::CategoryCreated);
        assert_eq!(emitted[0].data["id"], json!(category.id));
        assert_eq!(emitted[0].data["name"], "Invoices");
        assert_eq!(emitted[0].data["project_id"], json!(project_id));
    }

    #[tokio::test]
    async fn test_stranger_is_forbidden() {
        let (service, events, _, project_id) = setup().await;
        let stranger = actor(2, Role::User);

        let err = service.create(&stranger, invoices(project_id)).await.unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
        assert!(events.events().await.is_empty());

        assert!(service.list(&stranger, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_project() {
        let (service, _, _, _) = setup().await;
        let err = service
            .create(&actor(1, Role::SuperAdmin), invoices(404))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { entity: "Project", id: 404 }));
    }

    #[tokio::test]
    async fn test_member_can_work_in_project() {
        let (service, _, db, project_id) = setup().await;
        db.add_project_member(project_id, 5).await.unwrap();

        let member = actor(5, Role::User);
        let category = service.create(&member, invoices(project_id)).await.unwrap();
        assert_eq!(service.list(&member, None).await.unwrap().len(), 1);
        assert_eq!(
            service.list(&member, Some(project_id)).await.unwrap()[0].id,
            category.id
        );
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let (service, events, _, project_id) = setup().await;
        let owner = actor(1, Role::User);
        let category = service.create(&owner, invoices(project_id)).await.unwrap();

        let updated = service
            .update(
                &owner,
                category.id,
                UpdateCategoryRequest {
                    name: Some("Receipts".to_string()),
                    description: Some("Paid".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Receipts");
        assert_eq!(updated.description.as_deref(), Some("Paid"));

        service.delete(&owner, category.id).await.unwrap();
        assert!(service.get(&owner, category.id).await.is_err());

        assert_eq!(
            events.names().await,
            vec![
                EventName::CategoryCreated,
                EventName::CategoryUpdated,
                EventName::CategoryDeleted
            ]
        );
    }
}
