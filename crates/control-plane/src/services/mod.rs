// Services layer for business logic
// Services own access rules and validation, call storage directly, and emit
// one domain event after each successful write.

pub mod category;
pub mod project;
pub mod template;
pub mod user;
pub mod webhook;

pub use category::CategoryService;
pub use project::ProjectService;
pub use template::TemplateService;
pub use user::UserService;
pub use webhook::WebhookService;
