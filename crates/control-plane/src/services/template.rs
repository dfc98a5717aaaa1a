// Template service
// Decision: A template's category must belong to the template's project

use mailplate_core::{DomainError, Event, EventEmitter, EventName, Result};
use std::sync::Arc;

use super::project::authorize_project;
use crate::api::templates::{CreateTemplateRequest, Template, UpdateTemplateRequest};
use crate::auth::AuthUser;
use crate::storage::{
    models::{CreateTemplateRow, UpdateTemplate},
    Database, TemplateRow,
};

pub struct TemplateService {
    db: Arc<Database>,
    events: Arc<dyn EventEmitter>,
}

impl TemplateService {
    pub fn new(db: Arc<Database>, events: Arc<dyn EventEmitter>) -> Self {
        Self { db, events }
    }

    async fn load(&self, actor: &AuthUser, id: i64) -> Result<TemplateRow> {
        let row = self
            .db
            .get_template(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Template", id))?;
        authorize_project(&self.db, actor, row.project_id).await?;
        Ok(row)
    }

    async fn check_category(&self, project_id: i64, category_id: i64) -> Result<()> {
        let category = self
            .db
            .get_category(category_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Category", category_id))?;
        if category.project_id != project_id {
            return Err(DomainError::validation(
                "Category does not belong to the template's project",
            ));
        }
        Ok(())
    }

    pub async fn create(&self, actor: &AuthUser, req: CreateTemplateRequest) -> Result<Template> {
        authorize_project(&self.db, actor, req.project_id).await?;
        if let Some(category_id) = req.category_id {
            self.check_category(req.project_id, category_id).await?;
        }
        let name = required("name", &req.name)?;
        let subject = required("subject", &req.subject)?;

        let row = self
            .db
            .create_template(CreateTemplateRow {
                project_id: req.project_id,
                category_id: req.category_id,
                name,
                subject,
                html_body: req.html_body,
                text_body: req.text_body,
            })
            .await?;

        let template = Template::from(row);
        tracing::info!(
            template_id = template.id,
            project_id = template.project_id,
            "Template created"
        );
        self.events
            .emit(Event::snapshot(EventName::TemplateCreated, &template))
            .await;
        Ok(template)
    }

    pub async fn list(
        &self,
        actor: &AuthUser,
        project_id: Option<i64>,
        category_id: Option<i64>,
    ) -> Result<Vec<Template>> {
        let rows = match project_id {
            Some(project_id) => {
                authorize_project(&self.db, actor, project_id).await?;
                self.db.list_templates(Some(project_id), category_id).await?
            }
            None if actor.is_superadmin() => self.db.list_templates(None, category_id).await?,
            None => {
                let visible: Vec<i64> = self
                    .db
                    .list_projects_for_user(actor.id)
                    .await?
                    .into_iter()
                    .map(|p| p.id)
                    .collect();
                self.db
                    .list_templates(None, category_id)
                    .await?
                    .into_iter()
                    .filter(|t| visible.contains(&t.project_id))
                    .collect()
            }
        };
        Ok(rows.into_iter().map(Template::from).collect())
    }

    pub async fn get(&self, actor: &AuthUser, id: i64) -> Result<Template> {
        self.load(actor, id).await.map(Template::from)
    }

    pub async fn update(
        &self,
        actor: &AuthUser,
        id: i64,
        req: UpdateTemplateRequest,
    ) -> Result<Template> {
        let existing = self.load(actor, id).await?;
        if let Some(category_id) = req.category_id {
            self.check_category(existing.project_id, category_id).await?;
        }
        let name = req.name.as_deref().map(|n| required("name", n)).transpose()?;
        let subject = req
            .subject
            .as_deref()
            .map(|s| required("subject", s))
            .transpose()?;

        let row = self
            .db
            .update_template(
                id,
                UpdateTemplate {
                    category_id: req.category_id,
                    name,
                    subject,
                    html_body: req.html_body,
                    text_body: req.text_body,
                },
            )
            .await?
            .ok_or_else(|| DomainError::not_found("Template", id))?;

        let template = Template::from(row);
        tracing::info!(template_id = id, "Template updated");
        self.events
            .emit(Event::snapshot(EventName::TemplateUpdated, &template))
            .await;
        Ok(template)
    }

    pub async fn delete(&self, actor: &AuthUser, id: i64) -> Result<Template> {
        self.load(actor, id).await?;

        let row = self
            .db
            .delete_template(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Template", id))?;

        let template = Template::from(row);
        tracing::info!(template_id = id, "Template deleted");
        self.events
            .emit(Event::snapshot(EventName::TemplateDeleted, &template))
            .await;
        Ok(template)
    }
}

fn required(field: &str, raw: &str) -> Result<String> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(DomainError::validation(format!(
            "Template {} must not be empty",
            field
        )));
    }
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::storage::models::{CreateCategoryRow, CreateProjectRow};
    use mailplate_core::CollectingEventEmitter;

    fn owner() -> AuthUser {
        AuthUser {
            id: 1,
            email: "owner@example.com".to_string(),
            name: "Owner".to_string(),
            role: Role::User,
        }
    }

    struct Fixture {
        db: Arc<Database>,
        events: Arc<CollectingEventEmitter>,
        service: TemplateService,
        project_id: i64,
    }

    async fn fixture() -> Fixture {
        let db = Arc::new(Database::new());
        let project_id = db
            .create_project(CreateProjectRow {
                name: "P".to_string(),
                description: None,
                owner_id: 1,
            })
            .await
            .unwrap()
            .id;
        let events = Arc::new(CollectingEventEmitter::new());
        let service = TemplateService::new(db.clone(), events.clone());
        Fixture {
            db,
            events,
            service,
            project_id,
        }
    }

    async fn category(db: &Database, project_id: i64) -> i64 {
        db.create_category(CreateCategoryRow {
            project_id,
            name: "C".to_string(),
            description: None,
        })
        .await
        .unwrap()
        .id
    }

    fn welcome(project_id: i64, category_id: Option<i64>) -> CreateTemplateRequest {
        CreateTemplateRequest {
            project_id,
            category_id,
            name: "Welcome".to_string(),
            subject: "Hello {{name}}".to_string(),
            html_body: "<p>Hi</p>".to_string(),
            text_body: None,
        }
    }

    #[tokio::test]
    async fn test_create_emits_template_created() {
        let f = fixture().await;
        let category_id = category(&f.db, f.project_id).await;

        let template = f
            .service
            .create(&owner(), welcome(f.project_id, Some(category_id)))
            .await
            .unwrap();
        assert_eq!(template.category_id, Some(category_id));

        let emitted = f.events.events().await;
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].event, EventName::TemplateCreated);
        assert_eq!(emitted[0].data["subject"], "Hello {{name}}");
    }

    #[tokio::test]
    async fn test_category_from_other_project_rejected() {
        let f = fixture().await;
        let other_project = f
            .db
            .create_project(CreateProjectRow {
                name: "Other".to_string(),
                description: None,
                owner_id: 1,
            })
            .await
            .unwrap()
            .id;
        let foreign = category(&f.db, other_project).await;

        let err = f
            .service
            .create(&owner(), welcome(f.project_id, Some(foreign)))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert!(f.events.events().await.is_empty());
    }

    #[tokio::test]
    async fn test_blank_subject_rejected() {
        let f = fixture().await;
        let mut req = welcome(f.project_id, None);
        req.subject = " ".to_string();
        assert!(matches!(
            f.service.create(&owner(), req).await.unwrap_err(),
            DomainError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn test_list_filters() {
        let f = fixture().await;
        let category_id = category(&f.db, f.project_id).await;
        f.service
            .create(&owner(), welcome(f.project_id, Some(category_id)))
            .await
            .unwrap();
        f.service
            .create(&owner(), welcome(f.project_id, None))
            .await
            .unwrap();

        assert_eq!(f.service.list(&owner(), None, None).await.unwrap().len(), 2);
        assert_eq!(
            f.service
                .list(&owner(), Some(f.project_id), Some(category_id))
                .await
                .unwrap()
                .len(),
            1
        );

        let stranger = AuthUser {
            id: 9,
            ..owner()
        };
        assert!(f.service.list(&stranger, None, None).await.unwrap().is_empty());
        assert!(f
            .service
            .list(&stranger, Some(f.project_id), None)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_update_then_delete() {
        let f = fixture().await;
        let template = f
            .service
            .create(&owner(), welcome(f.project_id, None))
            .await
            .unwrap();

        let updated = f
            .service
            .update(
                &owner(),
                template.id,
                UpdateTemplateRequest {
                    html_body: Some("<p>Bye</p>".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.html_body, "<p>Bye</p>");
        assert_eq!(updated.name, "Welcome");

        let deleted = f.service.delete(&owner(), template.id).await.unwrap();
        assert_eq!(deleted.html_body, "<p>Bye</p>");

        assert_eq!(
            f.events.names().await,
            vec![
                EventName::TemplateCreated,
                EventName::TemplateUpdated,
                EventName::TemplateDeleted
            ]
        );
    }
}
