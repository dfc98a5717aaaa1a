// Mailplate Core
//
// Storage-agnostic building blocks of the notification pipeline.
//
// Key design decisions:
// - Event names form a closed enum; the wire form is the dotted string
// - The envelope is serialized once and the same bytes are signed and sent
// - The webhook registry and the outbound transport are traits, so the
//   dispatcher can be tested against in-memory doubles
// - Emission is infallible for callers; delivery failures stay downstream

pub mod error;
pub mod events;
pub mod memory;
pub mod signing;
pub mod telemetry;
pub mod traits;
pub mod webhook;

// Re-exports for convenience
pub use error::{DeliveryError, DomainError, Result};
pub use events::{Event, EventName};
pub use memory::{CollectingEventEmitter, InMemorySubscriptionStore};
pub use signing::{sign_payload, verify_signature, EVENT_HEADER, SIGNATURE_HEADER};
pub use traits::{DeliveryRequest, EventEmitter, SubscriptionStore, WebhookTransport};
pub use webhook::{NewSubscription, Subscription, SubscriptionPatch};
