//! Listeners the session attaches to every run, and the shared state they
//! feed: the keyword catalog, cached suite variables, return values and
//! open connections.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use robotkernel_catalog::CatalogHandle;
use robotkernel_core_types::{LibraryDoc, Value};
use robotkernel_event_bus::{
    Connection, ConnectionEvent, ConnectionObserver, ImportObserver, ListenerResult,
    ReturnValueEvent, ReturnValueObserver, StatusEvent, StatusObserver, VariableEvent,
    VariableObserver,
};
use robotkernel_suite::{variable_key, Suite};
use tracing::{debug, warn};

/// Keeps the catalog in sync with imported libraries and suite keywords.
pub struct KeywordsIndexer {
    catalog: CatalogHandle,
}

impl KeywordsIndexer {
    pub fn new(catalog: CatalogHandle) -> Self {
        Self { catalog }
    }
}

impl ImportObserver for KeywordsIndexer {
    fn name(&self) -> &str {
        "keywords_indexer"
    }

    fn on_library_imported(&self, library: &LibraryDoc) -> ListenerResult {
        self.catalog.write().import_library(library);
        Ok(())
    }

    fn on_suite_built(&self, suite: &Suite) -> ListenerResult {
        self.catalog.write().import_from_suite(suite);
        Ok(())
    }
}

/// Variables created by earlier runs, restored as suite variables.
#[derive(Clone, Default)]
pub struct SuiteVariables {
    inner: Arc<RwLock<Vec<(String, String, Value)>>>,
}

impl SuiteVariables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, name: &str, value: Value) {
        let key = variable_key(name);
        let mut entries = self.inner.write();
        match entries.iter_mut().find(|(existing, _, _)| *existing == key) {
            Some(entry) => {
                entry.1 = name.to_string();
                entry.2 = value;
            }
            None => entries.push((key, name.to_string(), value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        let key = variable_key(name);
        self.inner
            .read()
            .iter()
            .find(|(existing, _, _)| *existing == key)
            .map(|(_, _, value)| value.clone())
    }

    /// Forgets the given names; returns how many entries were dropped.
    pub fn purge<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> usize {
        let keys: Vec<String> = names.into_iter().map(variable_key).collect();
        let mut entries = self.inner.write();
        let before = entries.len();
        entries.retain(|(key, _, _)| !keys.contains(key));
        before - entries.len()
    }

    pub fn snapshot(&self) -> Vec<(String, Value)> {
        self.inner
            .read()
            .iter()
            .map(|(_, name, value)| (name.clone(), value.clone()))
            .collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.inner
            .read()
            .iter()
            .map(|(_, name, _)| name.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    pub fn clear(&self) {
        self.inner.write().clear();
    }
}

/// Caches variables assigned outside user keywords and seeds the next run.
pub struct VariablesListener {
    store: SuiteVariables,
}

impl VariablesListener {
    pub fn new(store: SuiteVariables) -> Self {
        Self { store }
    }
}

impl VariableObserver for VariablesListener {
    fn name(&self) -> &str {
        "variables"
    }

    fn on_variable(&self, event: &VariableEvent) -> ListenerResult {
        if !event.in_user_keyword {
            self.store.set(&event.name, event.value.clone());
        }
        Ok(())
    }

    fn restore(&self) -> Vec<(String, Value)> {
        self.store.snapshot()
    }
}

/// Return values of one run, in execution order.
#[derive(Clone, Default)]
pub struct ReturnValues {
    inner: Arc<Mutex<Vec<Value>>>,
}

impl ReturnValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, value: Value) {
        self.inner.lock().push(value);
    }

    pub fn last(&self) -> Option<Value> {
        self.inner.lock().last().cloned()
    }

    pub fn to_vec(&self) -> Vec<Value> {
        self.inner.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

/// Records values of keywords called directly from a test or task.
pub struct ReturnValueListener {
    values: ReturnValues,
}

impl ReturnValueListener {
    pub fn new(values: ReturnValues) -> Self {
        Self { values }
    }
}

impl ReturnValueObserver for ReturnValueListener {
    fn name(&self) -> &str {
        "return_values"
    }

    fn on_return_value(&self, event: &ReturnValueEvent) -> ListenerResult {
        if event.depth == 1 && event.value != Value::None {
            self.values.push(event.value.clone());
        }
        Ok(())
    }
}

pub type StatusCallback = Arc<dyn Fn(&StatusEvent) + Send + Sync>;

/// Forwards status changes to the progress display.
pub struct StatusEventListener {
    callback: StatusCallback,
}

impl StatusEventListener {
    pub fn new(callback: StatusCallback) -> Self {
        Self { callback }
    }
}

impl StatusObserver for StatusEventListener {
    fn name(&self) -> &str {
        "status_events"
    }

    fn on_status(&self, event: &StatusEvent) -> ListenerResult {
        (self.callback)(event);
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct TrackedConnection {
    pub kind: String,
    pub handle: Arc<dyn Connection>,
    /// Registration order across the session.
    pub order: u64,
}

#[derive(Default)]
struct RegistryState {
    next: u64,
    connections: Vec<TrackedConnection>,
}

/// Connections opened by any run of the session.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    inner: Arc<Mutex<RegistryState>>,
}

fn same_handle(a: &Arc<dyn Connection>, b: &Arc<dyn Connection>) -> bool {
    Arc::as_ptr(a).cast::<()>() == Arc::as_ptr(b).cast::<()>()
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracks a connection; registering the same handle twice is a no-op.
    pub fn register(&self, kind: &str, handle: Arc<dyn Connection>) {
        let mut state = self.inner.lock();
        if state
            .connections
            .iter()
            .any(|tracked| same_handle(&tracked.handle, &handle))
        {
            return;
        }
        let order = state.next;
        state.next += 1;
        debug!(kind, order, "tracking connection");
        state.connections.push(TrackedConnection {
            kind: kind.to_string(),
            handle,
            order,
        });
    }

    pub fn len(&self) -> usize {
        self.inner.lock().connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().connections.is_empty()
    }

    /// Latest connection whose kind is one of `kinds`; any kind when empty.
    pub fn most_recent(&self, kinds: &[&str]) -> Option<Arc<dyn Connection>> {
        self.inner
            .lock()
            .connections
            .iter()
            .rev()
            .find(|tracked| kinds.is_empty() || kinds.contains(&tracked.kind.as_str()))
            .map(|tracked| Arc::clone(&tracked.handle))
    }

    /// Stops tracking a connection, e.g. once it turned out to be broken.
    pub fn remove(&self, handle: &Arc<dyn Connection>) -> bool {
        let mut state = self.inner.lock();
        let before = state.connections.len();
        state
            .connections
            .retain(|tracked| !same_handle(&tracked.handle, handle));
        before != state.connections.len()
    }

    /// Closes every closable connection and forgets all of them. Returns the
    /// number of connections closed.
    pub fn close_all(&self) -> usize {
        let drained = std::mem::take(&mut self.inner.lock().connections);
        let mut closed = 0;
        for tracked in drained {
            if !tracked.handle.is_closable() {
                continue;
            }
            match tracked.handle.close() {
                Ok(()) => closed += 1,
                Err(err) => warn!(kind = %tracked.kind, error = %err, "closing connection failed"),
            }
        }
        closed
    }
}

/// Tracks connections of the given capability kinds.
pub struct ConnectionsListener {
    name: String,
    kinds: Vec<String>,
    registry: ConnectionRegistry,
}

impl ConnectionsListener {
    pub fn new(kind: &str, registry: ConnectionRegistry) -> Self {
        Self {
            name: format!("connections:{kind}"),
            kinds: vec![kind.to_string()],
            registry,
        }
    }
}

impl ConnectionObserver for ConnectionsListener {
    fn name(&self) -> &str {
        &self.name
    }

    fn kinds(&self) -> &[String] {
        &self.kinds
    }

    fn on_connection(&self, event: &ConnectionEvent) -> ListenerResult {
        self.registry.register(&event.kind, Arc::clone(&event.handle));
        Ok(())
    }
}
