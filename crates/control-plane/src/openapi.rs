// OpenAPI specification generation
//
// Used by the API server (Swagger UI) and by the export-openapi binary
// (static spec generation).

use crate::api;
use crate::api::{ErrorResponse, ListResponse};
use crate::auth;
use mailplate_core::{Event, EventName};
use utoipa::OpenApi;

/// OpenAPI documentation for the Mailplate API
#[derive(OpenApi)]
#[openapi(
    paths(
        auth::routes::login,
        auth::routes::me,
        api::users::create_user,
        api::users::list_users,
        api::users::get_user,
        api::users::update_user,
        api::users::delete_user,
        api::projects::create_project,
        api::projects::list_projects,
        api::projects::get_project,
        api::projects::update_project,
        api::projects::delete_project,
        api::projects::list_members,
        api::projects::add_member,
        api::projects::remove_member,
        api::categories::create_category,
        api::categories::list_categories,
        api::categories::get_category,
        api::categories::update_category,
        api::categories::delete_category,
        api::templates::create_template,
        api::templates::list_templates,
        api::templates::get_template,
        api::templates::update_template,
        api::templates::delete_template,
        api::webhooks::create_webhook,
        api::webhooks::list_webhooks,
        api::webhooks::list_all_webhooks,
        api::webhooks::list_event_names,
        api::webhooks::get_webhook,
        api::webhooks::update_webhook,
        api::webhooks::delete_webhook,
        api::webhooks::event_stream,
    ),
    components(
        schemas(
            ErrorResponse,
            Event, EventName,
            auth::Role,
            auth::routes::LoginRequest, auth::routes::TokenResponse, auth::routes::UserInfoResponse,
            api::users::User, api::users::CreateUserRequest, api::users::UpdateUserRequest,
            api::users::ListUsersQuery,
            ListResponse<api::users::User>,
            api::projects::Project, api::projects::ProjectMember,
            api::projects::CreateProjectRequest, api::projects::UpdateProjectRequest,
            api::projects::AddMemberRequest,
            ListResponse<api::projects::Project>,
            ListResponse<api::projects::ProjectMember>,
            api::categories::Category,
            api::categories::CreateCategoryRequest, api::categories::UpdateCategoryRequest,
            ListResponse<api::categories::Category>,
            api::templates::Template,
            api::templates::CreateTemplateRequest, api::templates::UpdateTemplateRequest,
            ListResponse<api::templates::Template>,
            api::webhooks::Webhook, api::webhooks::EventNameInfo,
            api::webhooks::CreateWebhookRequest, api::webhooks::UpdateWebhookRequest,
            ListResponse<api::webhooks::Webhook>,
            ListResponse<api::webhooks::EventNameInfo>,
        )
    ),
    tags(
        (name = "auth", description = "Login and current user"),
        (name = "users", description = "User management endpoints"),
        (name = "projects", description = "Projects and project membership"),
        (name = "categories", description = "Template categories"),
        (name = "templates", description = "Email templates"),
        (name = "webhooks", description = "Webhook subscriptions and the live admin event stream (SSE)")
    ),
    info(
        title = "Mailplate API",
        version = "0.1.0",
        description = "Email template management with webhook notifications",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    )
)]
pub struct ApiDoc;

impl ApiDoc {
    /// Pretty-printed JSON document
    pub fn to_json() -> String {
        ApiDoc::openapi()
            .to_pretty_json()
            .unwrap_or_else(|e| {
                format!(r#"{{"error": "failed to serialize OpenAPI spec: {}"}}"#, e)
            })
    }
}
