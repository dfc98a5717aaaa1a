// In-memory implementations
//
// InMemorySubscriptionStore is the registry used by the control-plane;
// CollectingEventEmitter records emitted events for tests.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{DomainError, Result};
use crate::events::{Event, EventName};
use crate::traits::{EventEmitter, SubscriptionStore};
use crate::webhook::{NewSubscription, Subscription, SubscriptionPatch};

const ENTITY: &str = "Subscription";

// ============================================================================
// InMemorySubscriptionStore
// ============================================================================

/// In-memory webhook registry
///
/// Keyed by id in a BTreeMap so every listing comes back ordered by id.
/// Reads proceed concurrently; writes are exclusive.
#[derive(Debug)]
pub struct InMemorySubscriptionStore {
    subscriptions: RwLock<BTreeMap<i64, Subscription>>,
    next_id: AtomicI64,
}

impl Default for InMemorySubscriptionStore {
    fn default() -> Self {
        Self {
            subscriptions: RwLock::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

impl InMemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored subscriptions
    pub async fn len(&self) -> usize {
        self.subscriptions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.subscriptions.read().await.is_empty()
    }
}

#[async_trait]
impl SubscriptionStore for InMemorySubscriptionStore {
    async fn register(&self, input: NewSubscription) -> Result<Subscription> {
        let input = input.validate()?;
        let now = Utc::now();
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        let subscription = Subscription {
            id,
            url: input.url,
            subscribed_events: input.events,
            secret: input.secret,
            active: true,
            owner_id: input.owner_id,
            created_at: now,
            updated_at: now,
        };

        self.subscriptions
            .write()
            .await
            .insert(id, subscription.clone());

        tracing::debug!(
            subscription_id = id,
            owner_id = subscription.owner_id,
            "Registered webhook subscription"
        );
        Ok(subscription)
    }

    async fn get(&self, id: i64) -> Result<Subscription> {
        self.subscriptions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(ENTITY, id))
    }

    async fn list_for_owner(&self, owner_id: i64) -> Result<Vec<Subscription>> {
        Ok(self
            .subscriptions
            .read()
            .await
            .values()
            .filter(|s| s.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn list_all(&self) -> Result<Vec<Subscription>> {
        Ok(self.subscriptions.read().await.values().cloned().collect())
    }

    async fn list_active_subscribers_for(&self, event: EventName) -> Result<Vec<Subscription>> {
        Ok(self
            .subscriptions
            .read()
            .await
            .values()
            .filter(|s| s.matches(event))
            .cloned()
            .collect())
    }

    async fn update(&self, id: i64, patch: SubscriptionPatch) -> Result<Subscription> {
        let patch = patch.validate()?;

        let mut subscriptions = self.subscriptions.write().await;
        let subscription = subscriptions
            .get_mut(&id)
            .ok_or_else(|| DomainError::not_found(ENTITY, id))?;

        patch.apply_to(subscription);
        subscription.updated_at = Utc::now();
        Ok(subscription.clone())
    }

    async fn remove(&self, id: i64) -> Result<()> {
        self.subscriptions
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| DomainError::not_found(ENTITY, id))
    }
}

// ============================================================================
// CollectingEventEmitter - Records events for assertions
// ============================================================================

/// Event emitter that keeps every event in memory
#[derive(Debug, Default, Clone)]
pub struct CollectingEventEmitter {
    events: Arc<RwLock<Vec<Event>>>,
}

impl CollectingEventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// All events emitted so far, in emission order
    pub async fn events(&self) -> Vec<Event> {
        self.events.read().await.clone()
    }

    /// Names of all events emitted so far
    pub async fn names(&self) -> Vec<EventName> {
        self.events.read().await.iter().map(|e| e.event).collect()
    }

    pub async fn clear(&self) {
        self.events.write().await.clear();
    }
}

#[async_trait]
impl EventEmitter for CollectingEventEmitter {
    async fn emit(&self, event: Event) {
        self.events.write().await.push(event);
    }
}
