// Database row models
// Decision: Rows mirror the relational schema (integer ids, explicit timestamps)
// Decision: Update structs use Option fields; None means "leave unchanged"

use chrono::{DateTime, Utc};

// ============================================
// Users
// ============================================

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: i64,
    pub email: String,
    pub name: String,
    /// SUPERADMIN | ADMIN | USER
    pub role: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateUserRow {
    pub email: String,
    pub name: String,
    pub role: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateUser {
    pub email: Option<String>,
    pub name: Option<String>,
    pub role: Option<String>,
    pub password_hash: Option<String>,
}

// ============================================
// Projects
// ============================================

#[derive(Debug, Clone)]
pub struct ProjectRow {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub owner_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateProjectRow {
    pub name: String,
    pub description: Option<String>,
    pub owner_id: i64,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateProject {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ProjectMemberRow {
    pub project_id: i64,
    pub user_id: i64,
    pub added_at: DateTime<Utc>,
}

// ============================================
// Categories
// ============================================

#[derive(Debug, Clone)]
pub struct CategoryRow {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateCategoryRow {
    pub project_id: i64,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateCategory {
    pub name: Option<String>,
    pub description: Option<String>,
}

// ============================================
// Templates
// ============================================

#[derive(Debug, Clone)]
pub struct TemplateRow {
    pub id: i64,
    pub project_id: i64,
    pub category_id: Option<i64>,
    pub name: String,
    pub subject: String,
    pub html_body: String,
    pub text_body: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateTemplateRow {
    pub project_id: i64,
    pub category_id: Option<i64>,
    pub name: String,
    pub subject: String,
    pub html_body: String,
    pub text_body: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateTemplate {
    pub category_id: Option<i64>,
    pub name: Option<String>,
    pub subject: Option<String>,
    pub html_body: Option<String>,
    pub text_body: Option<String>,
}
