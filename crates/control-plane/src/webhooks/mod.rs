// Webhook fan-out and the live admin stream
//
// CRUD service -> EventBus -> Dispatcher -> { StreamManager, HttpTransport }

pub mod bus;
pub mod delivery;
pub mod dispatcher;
pub mod streams;

pub use bus::{DeliveryMode, EventBus};
pub use delivery::HttpTransport;
pub use dispatcher::{DeliveryOutcome, DispatchReport, Dispatcher};
pub use streams::{ConnectionId, ConnectionInfo, StreamGuard, StreamManager};
