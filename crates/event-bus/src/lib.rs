//! Listener protocol through which a run reports status changes, return
//! values, variables, connections and imports, plus the broadcast bus the
//! kernel uses to fan messages out.

pub mod bus;
pub mod errors;
pub mod events;
pub mod listener;

pub use bus::{Event, EventBus, InMemoryBus};
pub use errors::{BusError, ListenerError, ListenerResult};
pub use events::{
    Connection, ConnectionEvent, Phase, ReturnValueEvent, Scope, Status, StatusEvent,
    VariableEvent, VariableScope,
};
pub use tokio::sync::broadcast::Receiver;

pub use listener::{
    ConnectionObserver, ImportObserver, Listener, ListenerSet, ReturnValueObserver,
    StatusObserver, VariableObserver,
};
