// Webhook subscription routes and the live admin event stream
// Decision: The stream authenticates once, at connect time, from a query token
// Decision: Stream rejections are all 401 with a short reason

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{
        sse::{Event as SseEvent, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use mailplate_core::{EventName, Subscription};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use utoipa::{IntoParams, ToSchema};

use super::common::{ApiError, ErrorResponse, ListResponse};
use super::validation::validate_webhook_input;
use crate::auth::middleware::{AuthError, AuthState, AuthUser, FromRef, SuperAdmin};
use crate::services::WebhookService;
use crate::webhooks::StreamManager;

#[derive(Clone)]
pub struct WebhooksState {
    pub service: Arc<WebhookService>,
    pub streams: Arc<StreamManager>,
    pub auth: AuthState,
    pub heartbeat: Duration,
}

impl FromRef<WebhooksState> for AuthState {
    fn from_ref(input: &WebhooksState) -> Self {
        input.auth.clone()
    }
}

/// Webhook subscription as returned by the API. The secret is never echoed.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Webhook {
    pub id: i64,
    #[schema(example = "https://example.com/hooks/mailplate")]
    pub url: String,
    pub subscribed_events: Vec<EventName>,
    pub has_secret: bool,
    pub active: bool,
    pub owner_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Subscription> for Webhook {
    fn from(sub: Subscription) -> Self {
        Self {
            id: sub.id,
            has_secret: sub.has_secret(),
            url: sub.url,
            subscribed_events: sub.subscribed_events,
            active: sub.active,
            owner_id: sub.owner_id,
            created_at: sub.created_at,
            updated_at: sub.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateWebhookRequest {
    #[schema(example = "https://example.com/hooks/mailplate")]
    pub url: String,
    /// Event names, e.g. `["category.created"]`
    pub events: Vec<String>,
    /// Optional HMAC-SHA256 signing key
    #[serde(default)]
    pub secret: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateWebhookRequest {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub events: Option<Vec<String>>,
    #[serde(default)]
    pub active: Option<bool>,
}

/// One entry of the event catalog
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EventNameInfo {
    pub name: EventName,
    pub category: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct StreamQuery {
    /// Access token (EventSource cannot send an Authorization header)
    pub token: Option<String>,
}

pub fn routes(state: WebhooksState) -> Router {
    Router::new()
        .route("/webhooks", get(list_webhooks).post(create_webhook))
        .route("/webhooks/all", get(list_all_webhooks))
        .route("/webhooks/event-names", get(list_event_names))
        .route("/webhooks/events/stream", get(event_stream))
        .route(
            "/webhooks/:id",
            get(get_webhook).patch(update_webhook).delete(delete_webhook),
        )
        .with_state(state)
}

/// POST /webhooks - Register a subscription owned by the caller
#[utoipa::path(
    post,
    path = "/webhooks",
    request_body = CreateWebhookRequest,
    responses(
        (status = 201, description = "Webhook registered", body = Webhook),
        (status = 400, description = "Invalid URL or event list", body = ErrorResponse),
        (status = 401, description = "Unauthorized")
    ),
    tag = "webhooks"
)]
pub async fn create_webhook(
    State(state): State<WebhooksState>,
    auth: AuthUser,
    Json(req): Json<CreateWebhookRequest>,
) -> Result<(StatusCode, Json<Webhook>), ApiError> {
    validate_webhook_input(Some(&req.url), req.secret.as_deref())?;
    let subscription = state.service.register(&auth, req).await?;
    Ok((StatusCode::CREATED, Json(subscription.into())))
}

/// GET /webhooks - Subscriptions owned by the caller
#[utoipa::path(
    get,
    path = "/webhooks",
    responses(
        (status = 200, description = "Caller's webhooks", body = ListResponse<Webhook>)
    ),
    tag = "webhooks"
)]
pub async fn list_webhooks(
    State(state): State<WebhooksState>,
    auth: AuthUser,
) -> Result<Json<ListResponse<Webhook>>, ApiError> {
    let subscriptions = state.service.list_mine(&auth).await?;
    Ok(Json(ListResponse::new(
        subscriptions.into_iter().map(Webhook::from).collect(),
    )))
}

/// GET /webhooks/all - Every subscription (SUPERADMIN)
#[utoipa::path(
    get,
    path = "/webhooks/all",
    responses(
        (status = 200, description = "All webhooks", body = ListResponse<Webhook>),
        (status = 403, description = "SUPERADMIN access required", body = ErrorResponse)
    ),
    tag = "webhooks"
)]
pub async fn list_all_webhooks(
    State(state): State<WebhooksState>,
    SuperAdmin(auth): SuperAdmin,
) -> Result<Json<ListResponse<Webhook>>, ApiError> {
    let subscriptions = state.service.list_all(&auth).await?;
    Ok(Json(ListResponse::new(
        subscriptions.into_iter().map(Webhook::from).collect(),
    )))
}

/// GET /webhooks/event-names - The event catalog
#[utoipa::path(
    get,
    path = "/webhooks/event-names",
    responses(
        (status = 200, description = "Subscribable event names", body = ListResponse<EventNameInfo>)
    ),
    tag = "webhooks"
)]
pub async fn list_event_names(_auth: AuthUser) -> Json<ListResponse<EventNameInfo>> {
    let names = EventName::ALL
        .iter()
        .map(|name| EventNameInfo {
            name: *name,
            category: name.category().to_string(),
        })
        .collect();
    Json(ListResponse::new(names))
}

#[utoipa::path(
    get,
    path = "/webhooks/{id}",
    params(("id" = i64, Path, description = "Webhook ID")),
    responses(
        (status = 200, description = "Webhook found", body = Webhook),
        (status = 403, description = "Not the owner", body = ErrorResponse),
        (status = 404, description = "Webhook not found", body = ErrorResponse)
    ),
    tag = "webhooks"
)]
pub async fn get_webhook(
    State(state): State<WebhooksState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<Webhook>, ApiError> {
    Ok(Json(state.service.get(&auth, id).await?.into()))
}

/// PATCH /webhooks/{id} - Change URL, events or the active flag
#[utoipa::path(
    patch,
    path = "/webhooks/{id}",
    params(("id" = i64, Path, description = "Webhook ID")),
    request_body = UpdateWebhookRequest,
    responses(
        (status = 200, description = "Webhook updated", body = Webhook),
        (status = 400, description = "Invalid URL or event list", body = ErrorResponse),
        (status = 403, description = "Not the owner", body = ErrorResponse),
        (status = 404, description = "Webhook not found", body = ErrorResponse)
    ),
    tag = "webhooks"
)]
pub async fn update_webhook(
    State(state): State<WebhooksState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateWebhookRequest>,
) -> Result<Json<Webhook>, ApiError> {
    validate_webhook_input(req.url.as_deref(), None)?;
    Ok(Json(state.service.update(&auth, id, req).await?.into()))
}

#[utoipa::path(
    delete,
    path = "/webhooks/{id}",
    params(("id" = i64, Path, description = "Webhook ID")),
    responses(
        (status = 204, description = "Webhook deleted"),
        (status = 403, description = "Not the owner", body = ErrorResponse),
        (status = 404, description = "Webhook not found", body = ErrorResponse)
    ),
    tag = "webhooks"
)]
pub async fn delete_webhook(
    State(state): State<WebhooksState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.service.delete(&auth, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /webhooks/events/stream - Live feed of every dispatched event (SUPERADMIN)
///
/// Server-sent events: a `: connected` comment, then one `data:` frame per
/// event envelope, with `: heartbeat` comments in between.
#[utoipa::path(
    get,
    path = "/webhooks/events/stream",
    params(StreamQuery),
    responses(
        (status = 200, description = "Event stream", content_type = "text/event-stream"),
        (status = 401, description = "Token required, invalid, or not SUPERADMIN")
    ),
    tag = "webhooks"
)]
pub async fn event_stream(
    State(state): State<WebhooksState>,
    Query(query): Query<StreamQuery>,
) -> Result<Response, AuthError> {
    let token = query
        .token
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| AuthError::unauthorized("Token required"))?;

    let user = state
        .auth
        .authenticate(token.trim())
        .map_err(|_| AuthError::unauthorized("Invalid token"))?;

    if !user.is_superadmin() {
        tracing::warn!(user_id = user.id, "Non-SUPERADMIN tried to open the admin stream");
        return Err(AuthError::unauthorized("SUPERADMIN only"));
    }

    let (guard, receiver) = state.streams.connect(user.id);

    let connected =
        stream::once(async { Ok::<_, Infallible>(SseEvent::default().comment("connected")) });

    // The guard rides along with the receiver; dropping the body deregisters
    let frames = stream::unfold((receiver, guard), |(mut receiver, guard)| async move {
        let frame = receiver.recv().await?;
        Some((
            Ok::<_, Infallible>(SseEvent::default().data(&*frame)),
            (receiver, guard),
        ))
    });

    let sse = Sse::new(connected.chain(frames)).keep_alive(
        KeepAlive::new()
            .interval(state.heartbeat)
            .text("heartbeat"),
    );

    Ok((
        [
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
        ],
        sse,
    )
        .into_response())
}
