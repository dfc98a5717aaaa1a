// Mailplate Control Plane Library
// Decision: Shared library for binaries (API server, OpenAPI export) and integration tests
// Decision: Every shared component is built once in AppContext and injected; no globals

use anyhow::{Context, Result};
use axum::http::{header, HeaderValue, Method};
use axum::{extract::State, routing::get, Json, Router};
use mailplate_core::{EventEmitter, InMemorySubscriptionStore, SubscriptionStore, WebhookTransport};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

// API routes and types (shared for OpenAPI generation)
pub mod api;

// Authentication module
pub mod auth;

// Environment configuration
pub mod config;

// Services layer
pub mod services;

// Storage layer
pub mod storage;

// Notification pipeline
pub mod webhooks;

// OpenAPI spec generation
pub mod openapi;

use auth::{AuthConfig, AuthState};
use config::ServerConfig;
use openapi::ApiDoc;
use services::{CategoryService, ProjectService, TemplateService, UserService, WebhookService};
use storage::Database;
use webhooks::{Dispatcher, EventBus, HttpTransport, StreamManager};

/// Shared components of a running server
#[derive(Clone)]
pub struct AppContext {
    pub config: ServerConfig,
    pub db: Arc<Database>,
    pub auth: AuthState,
    pub subscriptions: Arc<dyn SubscriptionStore>,
    pub streams: Arc<StreamManager>,
    pub bus: Arc<EventBus>,
}

impl AppContext {
    /// Wire the pipeline with the reqwest transport.
    /// Must be called inside a tokio runtime when delivery mode is background.
    pub fn new(config: ServerConfig, auth_config: AuthConfig) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(config.webhook_timeout)?);
        Ok(Self::with_transport(config, auth_config, transport))
    }

    /// Wire the pipeline with a caller-supplied transport
    pub fn with_transport(
        config: ServerConfig,
        auth_config: AuthConfig,
        transport: Arc<dyn WebhookTransport>,
    ) -> Self {
        let db = Arc::new(Database::new());
        let auth = AuthState::new(auth_config, db.clone());
        let subscriptions: Arc<dyn SubscriptionStore> = Arc::new(InMemorySubscriptionStore::new());
        let streams = Arc::new(StreamManager::new(config.stream_buffer_size));
        let dispatcher = Arc::new(Dispatcher::new(
            streams.clone(),
            subscriptions.clone(),
            transport,
        ));
        let bus = Arc::new(EventBus::new(
            dispatcher,
            config.delivery_mode,
            config.webhook_queue_capacity,
        ));

        Self {
            config,
            db,
            auth,
            subscriptions,
            streams,
            bus,
        }
    }

    fn events(&self) -> Arc<dyn EventEmitter> {
        self.bus.clone()
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    admin_streams: usize,
}

async fn health(State(streams): State<Arc<StreamManager>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        admin_streams: streams.len(),
    })
}

/// Build the full HTTP app: API routes (optionally prefixed), health, Swagger UI, CORS, tracing
pub fn build_router(ctx: &AppContext) -> Router {
    let users_state = api::users::UsersState {
        service: Arc::new(UserService::new(ctx.db.clone(), ctx.events())),
        auth: ctx.auth.clone(),
    };
    let projects_state = api::projects::ProjectsState {
        service: Arc::new(ProjectService::new(ctx.db.clone(), ctx.events())),
        auth: ctx.auth.clone(),
    };
    let categories_state = api::categories::CategoriesState {
        service: Arc::new(CategoryService::new(ctx.db.clone(), ctx.events())),
        auth: ctx.auth.clone(),
    };
    let templates_state = api::templates::TemplatesState {
        service: Arc::new(TemplateService::new(ctx.db.clone(), ctx.events())),
        auth: ctx.auth.clone(),
    };
    let webhooks_state = api::webhooks::WebhooksState {
        service: Arc::new(WebhookService::new(ctx.subscriptions.clone())),
        streams: ctx.streams.clone(),
        auth: ctx.auth.clone(),
        heartbeat: ctx.config.stream_heartbeat,
    };

    let api_routes = Router::new()
        .merge(api::users::routes(users_state))
        .merge(api::projects::routes(projects_state))
        .merge(api::categories::routes(categories_state))
        .merge(api::templates::routes(templates_state))
        .merge(api::webhooks::routes(webhooks_state))
        .merge(auth::routes(ctx.auth.clone()));

    if !ctx.config.api_prefix.is_empty() {
        tracing::info!(prefix = %ctx.config.api_prefix, "API prefix configured");
    }

    // Health is never prefixed
    let app = Router::new()
        .route("/health", get(health).with_state(ctx.streams.clone()))
        .merge(build_router_with_prefix(api_routes, &ctx.config.api_prefix))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()));

    let app = match cors_layer(&ctx.config.cors_allowed_origins) {
        Some(cors) => app.layer(cors),
        None => app,
    };

    app.layer(TraceLayer::new_for_http())
}

/// Serve the app until `shutdown` resolves, then drain the event bus.
///
/// Open admin streams never end on their own, so they are closed as soon as
/// the signal fires; otherwise graceful shutdown would wait on them forever.
pub async fn serve<F>(ctx: &AppContext, listener: TcpListener, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(ctx);
    let streams = ctx.streams.clone();

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            streams.close_all();
        })
        .await
        .context("Server error")?;

    // Deliver whatever is still queued before returning
    ctx.bus.shutdown().await;
    Ok(())
}

/// CORS for the configured origins; None means same-origin only
fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if origins.is_empty() {
        tracing::info!("CORS not configured (same-origin requests only)");
        return None;
    }
    tracing::info!(origins = ?origins, "CORS origins configured");

    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([
                header::CONTENT_TYPE,
                header::AUTHORIZATION,
                header::ACCEPT,
                header::ORIGIN,
                header::CACHE_CONTROL,
            ])
            .allow_credentials(true),
    )
}

/// Nest API routes under a prefix when one is configured
pub fn build_router_with_prefix<S: Clone + Send + Sync + 'static>(
    api_routes: Router<S>,
    api_prefix: &str,
) -> Router<S> {
    if api_prefix.is_empty() {
        api_routes
    } else {
        Router::new().nest(api_prefix, api_routes)
    }
}
