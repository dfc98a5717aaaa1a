// User service
// Decision: Only SUPERADMIN creates, updates or deletes users; ADMIN may browse
// Decision: Email uniqueness is case-insensitive

use mailplate_core::{DomainError, Event, EventEmitter, EventName, Result};
use std::sync::Arc;

use crate::api::users::{CreateUserRequest, UpdateUserRequest, User};
use crate::auth::{AuthUser, Role};
use crate::storage::{
    models::{CreateUserRow, UpdateUser},
    password::{hash_password, validate_password_strength},
    Database,
};

pub struct UserService {
    db: Arc<Database>,
    events: Arc<dyn EventEmitter>,
}

impl UserService {
    pub fn new(db: Arc<Database>, events: Arc<dyn EventEmitter>) -> Self {
        Self { db, events }
    }

    pub async fn create(&self, actor: &AuthUser, req: CreateUserRequest) -> Result<User> {
        require_superadmin(actor)?;

        let email = normalize_email(&req.email)?;
        let name = required_name(&req.name)?;
        validate_password_strength(&req.password).map_err(DomainError::validation)?;

        if self.db.get_user_by_email(&email).await?.is_some() {
            return Err(DomainError::conflict(format!(
                "User with email {} already exists",
                email
            )));
        }

        let row = self
            .db
            .create_user(CreateUserRow {
                email,
                name,
                role: req.role.unwrap_or_default().to_string(),
                password_hash: hash_password(&req.password)?,
            })
            .await?;

        let user = User::from(row);
        tracing::info!(user_id = user.id, role = %user.role, "User created");
        self.events
            .emit(Event::snapshot(EventName::UserCreated, &user))
            .await;
        Ok(user)
    }

    /// List users, optionally filtered by a case-insensitive name/email search
    pub async fn list(&self, actor: &AuthUser, search: Option<&str>) -> Result<Vec<User>> {
        if !actor.is_admin() {
            return Err(DomainError::forbidden("ADMIN access required"));
        }

        let needle = search
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());

        Ok(self
            .db
            .list_users()
            .await?
            .into_iter()
            .filter(|row| match &needle {
                Some(needle) => {
                    row.email.to_lowercase().contains(needle)
                        || row.name.to_lowercase().contains(needle)
                }
                None => true,
            })
            .map(User::from)
            .collect())
    }

    /// Users may read themselves; ADMIN and SUPERADMIN may read anyone
    pub async fn get(&self, actor: &AuthUser, id: i64) -> Result<User> {
        if actor.id != id && !actor.is_admin() {
            return Err(DomainError::forbidden("Cannot view another user"));
        }

        self.db
            .get_user(id)
            .await?
            .map(User::from)
            .ok_or_else(|| DomainError::not_found("User", id))
    }

    pub async fn update(&self, actor: &AuthUser, id: i64, req: UpdateUserRequest) -> Result<User> {
        require_superadmin(actor)?;

        let email = req.email.as_deref().map(normalize_email).transpose()?;
        if let Some(email) = &email {
            if let Some(existing) = self.db.get_user_by_email(email).await? {
                if existing.id != id {
                    return Err(DomainError::conflict(format!(
                        "User with email {} already exists",
                        email
                    )));
                }
            }
        }

        let name = req.name.as_deref().map(required_name).transpose()?;
        let password_hash = match req.password.as_deref() {
            Some(password) => {
                validate_password_strength(password).map_err(DomainError::validation)?;
                Some(hash_password(password)?)
            }
            None => None,
        };

        let row = self
            .db
            .update_user(
                id,
                UpdateUser {
                    email,
                    name,
                    role: req.role.map(|r| r.to_string()),
                    password_hash,
                },
            )
            .await?
            .ok_or_else(|| DomainError::not_found("User", id))?;

        let user = User::from(row);
        tracing::info!(user_id = user.id, "User updated");
        self.events
            .emit(Event::snapshot(EventName::UserUpdated, &user))
            .await;
        Ok(user)
    }

    pub async fn delete(&self, actor: &AuthUser, id: i64) -> Result<User> {
        require_superadmin(actor)?;
        if actor.id == id {
            return Err(DomainError::validation("Cannot delete your own account"));
        }

        let row = self
            .db
            .delete_user(id)
            .await?
            .ok_or_else(|| DomainError::not_found("User", id))?;

        let user = User::from(row);
        tracing::info!(user_id = user.id, "User deleted");
        self.events
            .emit(Event::snapshot(EventName::UserDeleted, &user))
            .await;
        Ok(user)
    }
}

fn require_superadmin(actor: &AuthUser) -> Result<()> {
    if actor.role != Role::SuperAdmin {
        return Err(DomainError::forbidden("SUPERADMIN access required"));
    }
    Ok(())
}

fn normalize_email(raw: &str) -> Result<String> {
    let email = raw.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(DomainError::validation(format!("Invalid email: {}", raw))),
    }
}

fn required_name(raw: &str) -> Result<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(DomainError::validation("Name must not be empty"));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mailplate_core::CollectingEventEmitter;

    fn actor(id: i64, role: Role) -> AuthUser {
        AuthUser {
            id,
            email: format!("u{}@example.com", id),
            name: format!("User {}", id),
            role,
        }
    }

    fn service() -> (UserService, Arc<CollectingEventEmitter>) {
        let events = Arc::new(CollectingEventEmitter::new());
        let service = UserService::new(Arc::new(Database::new()), events.clone());
        (service, events)
    }

    fn create_req(email: &str) -> CreateUserRequest {
        CreateUserRequest {
            email: email.to_string(),
            name: "Alice".to_string(),
            password: "correct-horse".to_string(),
            role: None,
        }
    }

    #[tokio::test]
    async fn test_create_emits_snapshot_without_password() {
        let (service, events) = service();
        let root = actor(100, Role::SuperAdmin);

        let user = service.create(&root, create_req("Alice@Example.com")).await.unwrap();
        assert_eq!(user.email, "alice@example.com");
        assert_eq!(user.role, Role::User);

        let emitted = events.events().await;
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].event, EventName::UserCreated);
        assert_eq!(emitted[0].data["email"], "alice@example.com");
        assert!(emitted[0].data.get("password_hash").is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_is_conflict_and_emits_nothing() {
        let (service, events) = service();
        let root = actor(100, Role::SuperAdmin);

        service.create(&root, create_req("a@example.com")).await.unwrap();
        events.clear().await;

        let err = service
            .create(&root, create_req("A@EXAMPLE.COM"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        assert!(events.events().await.is_empty());
    }

    #[tokio::test]
    async fn test_non_superadmin_cannot_create() {
        let (service, events) = service();
        let err = service
            .create(&actor(1, Role::Admin), create_req("a@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
        assert!(events.events().await.is_empty());
    }

    #[tokio::test]
    async fn test_input_validation() {
        let (service, _) = service();
        let root = actor(100, Role::SuperAdmin);

        let err = service.create(&root, create_req("nope")).await.unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let mut req = create_req("b@example.com");
        req.password = "short".to_string();
        let err = service.create(&root, req).await.unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn test_get_self_or_admin() {
        let (service, _) = service();
        let root = actor(100, Role::SuperAdmin);
        let created = service.create(&root, create_req("a@example.com")).await.unwrap();

        let me = actor(created.id, Role::User);
        assert_eq!(service.get(&me, created.id).await.unwrap().id, created.id);

        let other = actor(created.id + 50, Role::User);
        assert!(matches!(
            service.get(&other, created.id).await.unwrap_err(),
            DomainError::Forbidden(_)
        ));

        assert!(matches!(
            service.get(&root, 999).await.unwrap_err(),
            DomainError::NotFound { entity: "User", id: 999 }
        ));
    }

    #[tokio::test]
    async fn test_update_and_delete_emit_events() {
        let (service, events) = service();
        let root = actor(100, Role::SuperAdmin);
        let created = service.create(&root, create_req("a@example.com")).await.unwrap();

        let updated = service
            .update(
                &root,
                created.id,
                UpdateUserRequest {
                    name: Some("Alicia".to_string()),
                    role: Some(Role::Admin),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Alicia");
        assert_eq!(updated.role, Role::Admin);

        let deleted = service.delete(&root, created.id).await.unwrap();
        assert_eq!(deleted.name, "Alicia");

        assert_eq!(
            events.names().await,
            vec![
                EventName::UserCreated,
                EventName::UserUpdated,
                EventName::UserDeleted
            ]
        );
        let last = events.events().await.pop().unwrap();
        assert_eq!(last.data["id"], created.id);
    }

    #[tokio::test]
    async fn test_failed_delete_emits_nothing() {
        let (service, events) = service();
        let root = actor(100, Role::SuperAdmin);

        assert!(service.delete(&root, 42).await.is_err());
        assert!(service.delete(&root, root.id).await.is_err());
        assert!(events.events().await.is_empty());
    }

    #[tokio::test]
    async fn test_list_search() {
        let (service, _) = service();
        let root = actor(100, Role::SuperAdmin);
        service.create(&root, create_req("alice@example.com")).await.unwrap();
        let mut bob = create_req("bob@example.com");
        bob.name = "Bob".to_string();
        service.create(&root, bob).await.unwrap();

        assert_eq!(service.list(&root, None).await.unwrap().len(), 2);
        let found = service.list(&root, Some("BOB")).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Bob");

        assert!(service.list(&actor(1, Role::User), None).await.is_err());
    }
}
