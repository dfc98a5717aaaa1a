// Core traits for pluggable backends
//
// These traits keep the notification pipeline independent of where
// subscriptions live and how bytes reach a subscriber.

use async_trait::async_trait;

use crate::error::{DeliveryError, Result};
use crate::events::{Event, EventName};
use crate::webhook::{NewSubscription, Subscription, SubscriptionPatch};

// ============================================================================
// EventEmitter - Publish point for CRUD services
// ============================================================================

/// Trait for publishing domain events after a successful mutation
///
/// Emission is infallible from the caller's point of view: delivery problems
/// are handled and logged downstream and never fail the mutation.
#[async_trait]
pub trait EventEmitter: Send + Sync {
    async fn emit(&self, event: Event);
}

// ============================================================================
// SubscriptionStore - Webhook registry
// ============================================================================

/// Store of webhook subscriptions
///
/// Access control is the caller's job; the store only validates input.
/// Validation failures perform no write.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Validate and persist a new subscription
    async fn register(&self, input: NewSubscription) -> Result<Subscription>;

    /// Fetch by id, `NotFound` if unknown
    async fn get(&self, id: i64) -> Result<Subscription>;

    async fn list_for_owner(&self, owner_id: i64) -> Result<Vec<Subscription>>;

    async fn list_all(&self) -> Result<Vec<Subscription>>;

    /// Active subscriptions whose event set contains `event`.
    ///
    /// Evaluated fresh on every call so updates take effect on the next dispatch.
    async fn list_active_subscribers_for(&self, event: EventName) -> Result<Vec<Subscription>>;

    async fn update(&self, id: i64, patch: SubscriptionPatch) -> Result<Subscription>;

    async fn remove(&self, id: i64) -> Result<()>;
}

// ============================================================================
// WebhookTransport - Outbound HTTP
// ============================================================================

/// One outbound POST, fully prepared
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryRequest {
    pub url: String,
    /// Header name/value pairs, `Content-Type` included
    pub headers: Vec<(String, String)>,
    /// Exact bytes that were signed
    pub body: Vec<u8>,
}

impl DeliveryRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Trait for performing a single delivery attempt
///
/// Returns the response status on 2xx, otherwise a [`DeliveryError`].
#[async_trait]
pub trait WebhookTransport: Send + Sync {
    async fn send(&self, request: DeliveryRequest) -> std::result::Result<u16, DeliveryError>;
}
