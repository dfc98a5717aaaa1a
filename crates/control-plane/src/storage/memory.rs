// In-memory storage implementation
// Decision: Use parking_lot for thread-safe access
// Decision: Integer ids from per-table atomic counters, starting at 1
// Decision: Deleting a project cascades to its categories, templates and memberships
//
// All data is stored in BTreeMaps keyed by id and lost on restart.

use anyhow::Result;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};

use super::models::*;

/// Monotonic id generator for one table
#[derive(Debug)]
struct IdSequence(AtomicI64);

impl Default for IdSequence {
    fn default() -> Self {
        Self(AtomicI64::new(1))
    }
}

impl IdSequence {
    fn next(&self) -> i64 {
        self.0.fetch_add(1, Ordering::SeqCst)
    }
}

/// In-memory database
#[derive(Default)]
pub struct InMemoryDatabase {
    users: RwLock<BTreeMap<i64, UserRow>>,
    projects: RwLock<BTreeMap<i64, ProjectRow>>,
    // (project_id, user_id)
    project_members: RwLock<BTreeMap<(i64, i64), ProjectMemberRow>>,
    categories: RwLock<BTreeMap<i64, CategoryRow>>,
    templates: RwLock<BTreeMap<i64, TemplateRow>>,
    user_ids: IdSequence,
    project_ids: IdSequence,
    category_ids: IdSequence,
    template_ids: IdSequence,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    // ============================================
    // Users
    // ============================================

    pub async fn create_user(&self, input: CreateUserRow) -> Result<UserRow> {
        let mut users = self.users.write();
        if users.values().any(|u| u.email.eq_ignore_ascii_case(&input.email)) {
            anyhow::bail!("User with email {} already exists", input.email);
        }

        let now = Self::now();
        let id = self.user_ids.next();
        let row = UserRow {
            id,
            email: input.email,
            name: input.name,
            role: input.role,
            password_hash: input.password_hash,
            created_at: now,
            updated_at: now,
        };
        users.insert(id, row.clone());
        Ok(row)
    }

    pub async fn get_user(&self, id: i64) -> Result<Option<UserRow>> {
        Ok(self.users.read().get(&id).cloned())
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        Ok(self
            .users
            .read()
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    pub async fn list_users(&self) -> Result<Vec<UserRow>> {
        Ok(self.users.read().values().cloned().collect())
    }

    pub async fn update_user(&self, id: i64, input: UpdateUser) -> Result<Option<UserRow>> {
        let mut users = self.users.write();
        if let Some(email) = &input.email {
            if users
                .values()
                .any(|u| u.id != id && u.email.eq_ignore_ascii_case(email))
            {
                anyhow::bail!("User with email {} already exists", email);
            }
        }

        if let Some(user) = users.get_mut(&id) {
            if let Some(email) = input.email {
                user.email = email;
            }
            if let Some(name) = input.name {
                user.name = name;
            }
            if let Some(role) = input.role {
                user.role = role;
            }
            if let Some(password_hash) = input.password_hash {
                user.password_hash = password_hash;
            }
            user.updated_at = Self::now();
            return Ok(Some(user.clone()));
        }
        Ok(None)
    }

    /// Remove a user and their project memberships. Returns the removed row.
    pub async fn delete_user(&self, id: i64) -> Result<Option<UserRow>> {
        let removed = self.users.write().remove(&id);
        if removed.is_some() {
            self.project_members
                .write()
                .retain(|(_, user_id), _| *user_id != id);
        }
        Ok(removed)
    }

    // ============================================
    // Projects
    // ============================================

    pub async fn create_project(&self, input: CreateProjectRow) -> Result<ProjectRow> {
        let now = Self::now();
        let id = self.project_ids.next();
        let row = ProjectRow {
            id,
            name: input.name,
            description: input.description,
            owner_id: input.owner_id,
            created_at: now,
            updated_at: now,
        };
        self.projects.write().insert(id, row.clone());
        Ok(row)
    }

    pub async fn get_project(&self, id: i64) -> Result<Option<ProjectRow>> {
        Ok(self.projects.read().get(&id).cloned())
    }

    pub async fn list_projects(&self) -> Result<Vec<ProjectRow>> {
        Ok(self.projects.read().values().cloned().collect())
    }

    /// Projects the user owns or is a member of
    pub async fn list_projects_for_user(&self, user_id: i64) -> Result<Vec<ProjectRow>> {
        let members = self.project_members.read();
        Ok(self
            .projects
            .read()
            .values()
            .filter(|p| p.owner_id == user_id || members.contains_key(&(p.id, user_id)))
            .cloned()
            .collect())
    }

    pub async fn update_project(
        &self,
        id: i64,
        input: UpdateProject,
    ) -> Result<Option<ProjectRow>> {
        let mut projects = self.projects.write();
        if let Some(project) = projects.get_mut(&id) {
            if let Some(name) = input.name {
                project.name = name;
            }
            if let Some(description) = input.description {
                project.description = Some(description);
            }
            project.updated_at = Self::now();
            return Ok(Some(project.clone()));
        }
        Ok(None)
    }

    /// Remove a project together with its categories, templates and memberships
    pub async fn delete_project(&self, id: i64) -> Result<Option<ProjectRow>> {
        let removed = self.projects.write().remove(&id);
        if removed.is_some() {
            self.templates.write().retain(|_, t| t.project_id != id);
            self.categories.write().retain(|_, c| c.project_id != id);
            self.project_members
                .write()
                .retain(|(project_id, _), _| *project_id != id);
        }
        Ok(removed)
    }

    // ============================================
    // Project members
    // ============================================

    /// Returns None if the user is already a member
    pub async fn add_project_member(
        &self,
        project_id: i64,
        user_id: i64,
    ) -> Result<Option<ProjectMemberRow>> {
        let mut members = self.project_members.write();
        if members.contains_key(&(project_id, user_id)) {
            return Ok(None);
        }
        let row = ProjectMemberRow {
            project_id,
            user_id,
            added_at: Self::now(),
        };
        members.insert((project_id, user_id), row.clone());
        Ok(Some(row))
    }

    pub async fn remove_project_member(
        &self,
        project_id: i64,
        user_id: i64,
    ) -> Result<Option<ProjectMemberRow>> {
        Ok(self.project_members.write().remove(&(project_id, user_id)))
    }

    pub async fn list_project_members(&self, project_id: i64) -> Result<Vec<ProjectMemberRow>> {
        Ok(self
            .project_members
            .read()
            .range((project_id, i64::MIN)..=(project_id, i64::MAX))
            .map(|(_, row)| row.clone())
            .collect())
    }

    pub async fn is_project_member(&self, project_id: i64, user_id: i64) -> Result<bool> {
        Ok(self
            .project_members
            .read()
            .contains_key(&(project_id, user_id)))
    }

    // ============================================
    // Categories
    // ============================================

    pub async fn create_category(&self, input: CreateCategoryRow) -> Result<CategoryRow> {
        let now = Self::now();
        let id = self.category_ids.next();
        let row = CategoryRow {
            id,
            project_id: input.project_id,
            name: input.name,
            description: input.description,
            created_at: now,
            updated_at: now,
        };
        self.categories.write().insert(id, row.clone());
        Ok(row)
    }

    pub async fn get_category(&self, id: i64) -> Result<Option<CategoryRow>> {
        Ok(self.categories.read().get(&id).cloned())
    }

    pub async fn list_categories(&self, project_id: Option<i64>) -> Result<Vec<CategoryRow>> {
        Ok(self
            .categories
            .read()
            .values()
            .filter(|c| project_id.map_or(true, |p| c.project_id == p))
            .cloned()
            .collect())
    }

    pub async fn update_category(
        &self,
        id: i64,
        input: UpdateCategory,
    ) -> Result<Option<CategoryRow>> {
        let mut categories = self.categories.write();
        if let Some(category) = categories.get_mut(&id) {
            if let Some(name) = input.name {
                category.name = name;
            }
            if let Some(description) = input.description {
                category.description = Some(description);
            }
            category.updated_at = Self::now();
            return Ok(Some(category.clone()));
        }
        Ok(None)
    }

    /// Remove a category; templates that referenced it become uncategorized
    pub async fn delete_category(&self, id: i64) -> Result<Option<CategoryRow>> {
        let removed = self.categories.write().remove(&id);
        if removed.is_some() {
            for template in self.templates.write().values_mut() {
                if template.category_id == Some(id) {
                    template.category_id = None;
                }
            }
        }
        Ok(removed)
    }

    // ============================================
    // Templates
    // ============================================

    pub async fn create_template(&self, input: CreateTemplateRow) -> Result<TemplateRow> {
        let now = Self::now();
        let id = self.template_ids.next();
        let row = TemplateRow {
            id,
            project_id: input.project_id,
            category_id: input.category_id,
            name: input.name,
            subject: input.subject,
            html_body: input.html_body,
            text_body: input.text_body,
            created_at: now,
            updated_at: now,
        };
        self.templates.write().insert(id, row.clone());
        Ok(row)
    }

    pub async fn get_template(&self, id: i64) -> Result<Option<TemplateRow>> {
        Ok(self.templates.read().get(&id).cloned())
    }

    pub async fn list_templates(
        &self,
        project_id: Option<i64>,
        category_id: Option<i64>,
    ) -> Result<Vec<TemplateRow>> {
        Ok(self
            .templates
            .read()
            .values()
            .filter(|t| project_id.map_or(true, |p| t.project_id == p))
            .filter(|t| category_id.map_or(true, |c| t.category_id == Some(c)))
            .cloned()
            .collect())
    }

    pub async fn update_template(
        &self,
        id: i64,
        input: UpdateTemplate,
    ) -> Result<Option<TemplateRow>> {
        let mut templates = self.templates.write();
        if let Some(template) = templates.get_mut(&id) {
            if let Some(category_id) = input.category_id {
                template.category_id = Some(category_id);
            }
            if let Some(name) = input.name {
                template.name = name;
            }
            if let Some(subject) = input.subject {
                template.subject = subject;
            }
            if let Some(html_body) = input.html_body {
                template.html_body = html_body;
            }
            if let Some(text_body) = input.text_body {
                template.text_body = Some(text_body);
            }
            template.updated_at = Self::now();
            return Ok(Some(template.clone()));
        }
        Ok(None)
    }

    pub async fn delete_template(&self, id: i64) -> Result<Option<TemplateRow>> {
        Ok(self.templates.write().remove(&id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(email: &str) -> CreateUserRow {
        CreateUserRow {
            email: email.to_string(),
            name: "Test".to_string(),
            role: "USER".to_string(),
            password_hash: "hash".to_string(),
        }
    }

    async fn seed_project(db: &InMemoryDatabase, owner_id: i64) -> ProjectRow {
        db.create_project(CreateProjectRow {
            name: "Newsletter".to_string(),
            description: None,
            owner_id,
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_user_ids_and_duplicate_email() {
        let db = InMemoryDatabase::new();
        let a = db.create_user(user("a@example.com")).await.unwrap();
        let b = db.create_user(user("b@example.com")).await.unwrap();
        assert_eq!((a.id, b.id), (1, 2));

        assert!(db.create_user(user("A@example.com")).await.is_err());
        assert_eq!(db.list_users().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_user_rejects_taken_email() {
        let db = InMemoryDatabase::new();
        db.create_user(user("a@example.com")).await.unwrap();
        let b = db.create_user(user("b@example.com")).await.unwrap();

        let result = db
            .update_user(
                b.id,
                UpdateUser {
                    email: Some("a@example.com".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert!(result.is_err());
        assert_eq!(
            db.get_user(b.id).await.unwrap().unwrap().email,
            "b@example.com"
        );
    }

    #[tokio::test]
    async fn test_project_membership_listing() {
        let db = InMemoryDatabase::new();
        let owned = seed_project(&db, 1).await;
        let shared = seed_project(&db, 2).await;
        seed_project(&db, 3).await;

        assert!(db.add_project_member(shared.id, 1).await.unwrap().is_some());
        assert!(db.add_project_member(shared.id, 1).await.unwrap().is_none());

        let visible: Vec<i64> = db
            .list_projects_for_user(1)
            .await
            .unwrap()
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(visible, vec![owned.id, shared.id]);
        assert_eq!(db.list_project_members(shared.id).await.unwrap().len(), 1);
        assert!(db.list_project_members(owned.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_project_cascades() {
        let db = InMemoryDatabase::new();
        let project = seed_project(&db, 1).await;
        let other = seed_project(&db, 1).await;
        db.add_project_member(project.id, 2).await.unwrap();

        let category = db
            .create_category(CreateCategoryRow {
                project_id: project.id,
                name: "Invoices".to_string(),
                description: None,
            })
            .await
            .unwrap();
        db.create_template(CreateTemplateRow {
            project_id: project.id,
            category_id: Some(category.id),
            name: "Welcome".to_string(),
            subject: "Hi".to_string(),
            html_body: "<p>Hi</p>".to_string(),
            text_body: None,
        })
        .await
        .unwrap();
        db.create_category(CreateCategoryRow {
            project_id: other.id,
            name: "Keep".to_string(),
            description: None,
        })
        .await
        .unwrap();

        let removed = db.delete_project(project.id).await.unwrap();
        assert_eq!(removed.unwrap().id, project.id);
        assert!(db.list_templates(None, None).await.unwrap().is_empty());
        assert_eq!(db.list_categories(None).await.unwrap().len(), 1);
        assert!(!db.is_project_member(project.id, 2).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_category_uncategorizes_templates() {
        let db = InMemoryDatabase::new();
        let project = seed_project(&db, 1).await;
        let category = db
            .create_category(CreateCategoryRow {
                project_id: project.id,
                name: "Invoices".to_string(),
                description: None,
            })
            .await
            .unwrap();
        let template = db
            .create_template(CreateTemplateRow {
                project_id: project.id,
                category_id: Some(category.id),
                name: "Invoice".to_string(),
                subject: "Your invoice".to_string(),
                html_body: "<p>Total</p>".to_string(),
                text_body: Some("Total".to_string()),
            })
            .await
            .unwrap();

        db.delete_category(category.id).await.unwrap();
        let template = db.get_template(template.id).await.unwrap().unwrap();
        assert_eq!(template.category_id, None);
    }

    #[tokio::test]
    async fn test_template_filters() {
        let db = InMemoryDatabase::new();
        let p1 = seed_project(&db, 1).await;
        let p2 = seed_project(&db, 1).await;
        for (project_id, category_id) in [(p1.id, Some(10)), (p1.id, None), (p2.id, Some(10))] {
            db.create_template(CreateTemplateRow {
                project_id,
                category_id,
                name: "t".to_string(),
                subject: "s".to_string(),
                html_body: "b".to_string(),
                text_body: None,
            })
            .await
            .unwrap();
        }

        assert_eq!(db.list_templates(Some(p1.id), None).await.unwrap().len(), 2);
        assert_eq!(db.list_templates(Some(p1.id), Some(10)).await.unwrap().len(), 1);
        assert_eq!(db.list_templates(None, Some(10)).await.unwrap().len(), 2);
    }
}
