// Webhook subscription model
//
// A subscription is an externally registered HTTP endpoint that wants a POST
// for a chosen set of event names. It is owned by the principal that
// registered it and is independent of every other entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{DomainError, Result};
use crate::events::EventName;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// Registered webhook subscriber
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct Subscription {
    pub id: i64,
    /// Absolute http(s) URL the envelope is POSTed to
    pub url: String,
    /// Deduplicated, sorted, never empty
    pub subscribed_events: Vec<EventName>,
    /// Signing key. Never serialized; see `has_secret`
    #[serde(skip)]
    pub secret: Option<String>,
    pub active: bool,
    pub owner_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    pub fn is_subscribed_to(&self, event: EventName) -> bool {
        self.subscribed_events.binary_search(&event).is_ok()
    }

    /// Whether this subscription should receive `event` right now
    pub fn matches(&self, event: EventName) -> bool {
        self.active && self.is_subscribed_to(event)
    }

    pub fn has_secret(&self) -> bool {
        self.secret.is_some()
    }
}

/// Input for registering a subscription
#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub owner_id: i64,
    pub url: String,
    pub events: Vec<EventName>,
    pub secret: Option<String>,
}

impl NewSubscription {
    /// Validate and normalize. Returns the cleaned URL, event set and secret.
    pub fn validate(self) -> Result<ValidatedSubscription> {
        Ok(ValidatedSubscription {
            owner_id: self.owner_id,
            url: validate_url(&self.url)?,
            events: normalize_events(self.events)?,
            secret: self.secret.filter(|s| !s.is_empty()),
        })
    }
}

/// A [`NewSubscription`] that passed validation
#[derive(Debug, Clone)]
pub struct ValidatedSubscription {
    pub owner_id: i64,
    pub url: String,
    pub events: Vec<EventName>,
    pub secret: Option<String>,
}

/// Partial update. Absent fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionPatch {
    pub url: Option<String>,
    pub events: Option<Vec<EventName>>,
    pub active: Option<bool>,
}

impl SubscriptionPatch {
    pub fn validate(self) -> Result<Self> {
        Ok(Self {
            url: self.url.as_deref().map(validate_url).transpose()?,
            events: self.events.map(normalize_events).transpose()?,
            active: self.active,
        })
    }

    /// Apply an already validated patch
    pub fn apply_to(self, subscription: &mut Subscription) {
        if let Some(url) = self.url {
            subscription.url = url;
        }
        if let Some(events) = self.events {
            subscription.subscribed_events = events;
        }
        if let Some(active) = self.active {
            subscription.active = active;
        }
    }
}

/// Require a well-formed absolute http(s) URL with a host
pub fn validate_url(raw: &str) -> Result<String> {
    let parsed = Url::parse(raw.trim())
        .map_err(|e| DomainError::validation(format!("Invalid webhook URL: {}", e)))?;

    if parsed.scheme() != "https" && parsed.scheme() != "http" {
        return Err(DomainError::validation(
            "Webhook URL must use http or https",
        ));
    }

    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(DomainError::validation("Webhook URL must include a host"));
    }

    Ok(parsed.to_string())
}

/// Deduplicate and sort; reject an empty set
pub fn normalize_events(mut events: Vec<EventName>) -> Result<Vec<EventName>> {
    events.sort();
    events.dedup();
    if events.is_empty() {
        return Err(DomainError::validation(
            "At least one event must be subscribed",
        ));
    }
    Ok(events)
}
