// Event Catalog
//
// The closed set of domain event names raised by CRUD services, and the
// envelope `{event, timestamp, data}` that is written to admin streams and
// POSTed to webhook subscribers. A new event name must be added here before
// it can be emitted or subscribed to.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DomainError;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

// ============================================================================
// Event Names
// ============================================================================

/// Domain event name. The wire form is the dotted string (`category.created`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub enum EventName {
    #[serde(rename = "user.created")]
    UserCreated,
    #[serde(rename = "user.updated")]
    UserUpdated,
    #[serde(rename = "user.deleted")]
    UserDeleted,
    #[serde(rename = "project.created")]
    ProjectCreated,
    #[serde(rename = "project.updated")]
    ProjectUpdated,
    #[serde(rename = "project.deleted")]
    ProjectDeleted,
    #[serde(rename = "project.member_added")]
    ProjectMemberAdded,
    #[serde(rename = "project.member_removed")]
    ProjectMemberRemoved,
    #[serde(rename = "category.created")]
    CategoryCreated,
    #[serde(rename = "category.updated")]
    CategoryUpdated,
    #[serde(rename = "category.deleted")]
    CategoryDeleted,
    #[serde(rename = "template.created")]
    TemplateCreated,
    #[serde(rename = "template.updated")]
    TemplateUpdated,
    #[serde(rename = "template.deleted")]
    TemplateDeleted,
}

impl EventName {
    /// Every event name, in catalog order
    pub const ALL: [EventName; 14] = [
        EventName::UserCreated,
        EventName::UserUpdated,
        EventName::UserDeleted,
        EventName::ProjectCreated,
        EventName::ProjectUpdated,
        EventName::ProjectDeleted,
        EventName::ProjectMemberAdded,
        EventName::ProjectMemberRemoved,
        EventName::CategoryCreated,
        EventName::CategoryUpdated,
        EventName::CategoryDeleted,
        EventName::TemplateCreated,
        EventName::TemplateUpdated,
        EventName::TemplateDeleted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventName::UserCreated => "user.created",
            EventName::UserUpdated => "user.updated",
            EventName::UserDeleted => "user.deleted",
            EventName::ProjectCreated => "project.created",
            EventName::ProjectUpdated => "project.updated",
            EventName::ProjectDeleted => "project.deleted",
            EventName::ProjectMemberAdded => "project.member_added",
            EventName::ProjectMemberRemoved => "project.member_removed",
            EventName::CategoryCreated => "category.created",
            EventName::CategoryUpdated => "category.updated",
            EventName::CategoryDeleted => "category.deleted",
            EventName::TemplateCreated => "template.created",
            EventName::TemplateUpdated => "template.updated",
            EventName::TemplateDeleted => "template.deleted",
        }
    }

    /// Domain the event belongs to (`user`, `project`, `category`, `template`)
    pub fn category(&self) -> &'static str {
        match self {
            EventName::UserCreated | EventName::UserUpdated | EventName::UserDeleted => "user",
            EventName::ProjectCreated
            | EventName::ProjectUpdated
            | EventName::ProjectDeleted
            | EventName::ProjectMemberAdded
            | EventName::ProjectMemberRemoved => "project",
            EventName::CategoryCreated
            | EventName::CategoryUpdated
            | EventName::CategoryDeleted => "category",
            EventName::TemplateCreated
            | EventName::TemplateUpdated
            | EventName::TemplateDeleted => "template",
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventName {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventName::ALL
            .iter()
            .find(|name| name.as_str() == s)
            .copied()
            .ok_or_else(|| DomainError::validation(format!("Unknown event name: {}", s)))
    }
}

// ============================================================================
// Event Envelope
// ============================================================================

/// Immutable record of a domain state change.
///
/// Serialized as `{"event": "...", "timestamp": "...", "data": ...}`. Never
/// persisted; one instance per emission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct Event {
    /// Event name (e.g. "category.created")
    pub event: EventName,

    /// Emission time, RFC 3339 with millisecond precision
    pub timestamp: DateTime<Utc>,

    /// Snapshot of the entity that triggered the event
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub data: serde_json::Value,
}

impl Event {
    /// Create an event stamped with the current time
    pub fn new(event: EventName, data: serde_json::Value) -> Self {
        Self {
            event,
            timestamp: Utc::now().trunc_subsecs(3),
            data,
        }
    }

    /// Create an event whose payload is a snapshot of a domain object.
    ///
    /// A serialization failure degrades the payload to `null` rather than
    /// failing the mutation that raised the event.
    pub fn snapshot<T: Serialize>(event: EventName, entity: &T) -> Self {
        let data = serde_json::to_value(entity).unwrap_or_else(|e| {
            tracing::warn!(event = %event, error = %e, "Failed to serialize event payload");
            serde_json::Value::Null
        });
        Self::new(event, data)
    }

    /// Serialize the envelope once; the returned bytes are both signed and sent.
    pub fn to_json_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn from_json_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}
