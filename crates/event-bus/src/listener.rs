//! Capability-tagged execution listeners and the per-run dispatch snapshot.

use std::sync::Arc;

use robotkernel_core_types::{LibraryDoc, Value};
use robotkernel_suite::Suite;
use tracing::warn;

use crate::errors::ListenerResult;
use crate::events::{ConnectionEvent, ReturnValueEvent, StatusEvent, VariableEvent};

pub trait StatusObserver: Send + Sync {
    fn name(&self) -> &str;
    fn on_status(&self, event: &StatusEvent) -> ListenerResult;
}

pub trait ReturnValueObserver: Send + Sync {
    fn name(&self) -> &str;
    fn on_return_value(&self, event: &ReturnValueEvent) -> ListenerResult;
}

pub trait VariableObserver: Send + Sync {
    fn name(&self) -> &str;
    fn on_variable(&self, event: &VariableEvent) -> ListenerResult;

    /// Variables to seed into the suite scope before a run starts.
    fn restore(&self) -> Vec<(String, Value)> {
        Vec::new()
    }
}

pub trait ConnectionObserver: Send + Sync {
    fn name(&self) -> &str;
    /// Capability kinds this observer tracks; empty tracks every kind.
    fn kinds(&self) -> &[String];
    fn on_connection(&self, event: &ConnectionEvent) -> ListenerResult;
}

pub trait ImportObserver: Send + Sync {
    fn name(&self) -> &str;
    fn on_library_imported(&self, library: &LibraryDoc) -> ListenerResult;
    fn on_suite_built(&self, suite: &Suite) -> ListenerResult;
}

/// A listener tagged by the capability it implements.
#[derive(Clone)]
pub enum Listener {
    Status(Arc<dyn StatusObserver>),
    ReturnValue(Arc<dyn ReturnValueObserver>),
    Variable(Arc<dyn VariableObserver>),
    Connection(Arc<dyn ConnectionObserver>),
    Import(Arc<dyn ImportObserver>),
}

impl Listener {
    pub fn name(&self) -> &str {
        match self {
            Self::Status(inner) => inner.name(),
            Self::ReturnValue(inner) => inner.name(),
            Self::Variable(inner) => inner.name(),
            Self::Connection(inner) => inner.name(),
            Self::Import(inner) => inner.name(),
        }
    }
}

/// Immutable ordered snapshot of listeners attached to one run.
#[derive(Clone, Default)]
pub struct ListenerSet {
    listeners: Arc<Vec<Listener>>,
}

impl ListenerSet {
    pub fn new(listeners: Vec<Listener>) -> Self {
        Self {
            listeners: Arc::new(listeners),
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.listeners.iter().map(Listener::name).collect()
    }

    /// New snapshot with `extra` appended after the current listeners.
    pub fn extended(&self, extra: impl IntoIterator<Item = Listener>) -> Self {
        let mut listeners = self.listeners.as_ref().clone();
        listeners.extend(extra);
        Self::new(listeners)
    }

    pub fn status(&self, event: &StatusEvent) {
        for listener in self.listeners.iter() {
            if let Listener::Status(inner) = listener {
                report(inner.name(), inner.on_status(event));
            }
        }
    }

    pub fn return_value(&self, event: &ReturnValueEvent) {
        for listener in self.listeners.iter() {
            if let Listener::ReturnValue(inner) = listener {
                report(inner.name(), inner.on_return_value(event));
            }
        }
    }

    pub fn variable(&self, event: &VariableEvent) {
        for listener in self.listeners.iter() {
            if let Listener::Variable(inner) = listener {
                report(inner.name(), inner.on_variable(event));
            }
        }
    }

    pub fn connection(&self, event: &ConnectionEvent) {
        for listener in self.listeners.iter() {
            if let Listener::Connection(inner) = listener {
                let kinds = inner.kinds();
                if kinds.is_empty() || kinds.iter().any(|kind| *kind == event.kind) {
                    report(inner.name(), inner.on_connection(event));
                }
            }
        }
    }

    pub fn library_imported(&self, library: &LibraryDoc) {
        for listener in self.listeners.iter() {
            if let Listener::Import(inner) = listener {
                report(inner.name(), inner.on_library_imported(library));
            }
        }
    }

    pub fn suite_built(&self, suite: &Suite) {
        for listener in self.listeners.iter() {
            if let Listener::Import(inner) = listener {
                report(inner.name(), inner.on_suite_built(suite));
            }
        }
    }

    /// Variables restored by every variable observer, in registration order.
    pub fn restored_variables(&self) -> Vec<(String, Value)> {
        self.listeners
            .iter()
            .filter_map(|listener| match listener {
                Listener::Variable(inner) => Some(inner.restore()),
                _ => None,
            })
            .flatten()
            .collect()
    }
}

fn report(listener: &str, result: ListenerResult) {
    if let Err(err) = result {
        warn!(listener, error = %err, "listener failed; continuing run");
    }
}
