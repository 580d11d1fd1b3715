//! Messages the session pushes to the host while a cell runs.

use std::sync::Arc;

use parking_lot::Mutex;
use robotkernel_core_types::DisplayId;
use robotkernel_event_bus::{EventBus, InMemoryBus, Receiver};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use tracing::debug;

/// `{mime type: payload}` as sent to display surfaces.
pub type MimeBundle = Map<String, JsonValue>;

pub const TRIGGER_MIME: &str = "application/vnd.robotkernel.trigger+json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "msg_type", rename_all = "snake_case")]
pub enum FrontendMessage {
    Error {
        ename: String,
        evalue: String,
        traceback: Vec<String>,
    },
    ExecuteResult {
        execution_count: u64,
        data: MimeBundle,
        metadata: MimeBundle,
    },
    DisplayData {
        data: MimeBundle,
        metadata: MimeBundle,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        display_id: Option<String>,
    },
    UpdateDisplayData {
        data: MimeBundle,
        metadata: MimeBundle,
        display_id: String,
    },
}

impl FrontendMessage {
    pub fn msg_type(&self) -> &'static str {
        match self {
            Self::Error { .. } => "error",
            Self::ExecuteResult { .. } => "execute_result",
            Self::DisplayData { .. } => "display_data",
            Self::UpdateDisplayData { .. } => "update_display_data",
        }
    }
}

/// Host transport as seen by the session.
pub trait Frontend: Send + Sync {
    fn send(&self, message: FrontendMessage);

    fn send_error(&self, ename: &str, evalue: &str, traceback: Vec<String>) {
        self.send(FrontendMessage::Error {
            ename: ename.to_string(),
            evalue: evalue.to_string(),
            traceback,
        });
    }

    fn send_execute_result(&self, execution_count: u64, data: MimeBundle, metadata: MimeBundle) {
        self.send(FrontendMessage::ExecuteResult {
            execution_count,
            data,
            metadata,
        });
    }

    fn send_display_data(
        &self,
        data: MimeBundle,
        metadata: MimeBundle,
        display_id: Option<&DisplayId>,
    ) {
        self.send(FrontendMessage::DisplayData {
            data,
            metadata,
            display_id: display_id.map(ToString::to_string),
        });
    }

    fn send_update_display_data(&self, data: MimeBundle, metadata: MimeBundle, display_id: &DisplayId) {
        self.send(FrontendMessage::UpdateDisplayData {
            data,
            metadata,
            display_id: display_id.to_string(),
        });
    }
}

/// Keeps every message in memory; used by tests and the batch CLI.
#[derive(Debug, Default)]
pub struct RecordingFrontend {
    messages: Mutex<Vec<FrontendMessage>>,
}

impl RecordingFrontend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<FrontendMessage> {
        self.messages.lock().clone()
    }

    pub fn take(&self) -> Vec<FrontendMessage> {
        std::mem::take(&mut *self.messages.lock())
    }

    pub fn of_type(&self, msg_type: &str) -> Vec<FrontendMessage> {
        self.messages
            .lock()
            .iter()
            .filter(|message| message.msg_type() == msg_type)
            .cloned()
            .collect()
    }
}

impl Frontend for RecordingFrontend {
    fn send(&self, message: FrontendMessage) {
        self.messages.lock().push(message);
    }
}

/// Publishes messages on a broadcast bus; dropped when nobody listens.
#[derive(Clone)]
pub struct BusFrontend {
    bus: Arc<InMemoryBus<FrontendMessage>>,
}

impl BusFrontend {
    pub fn new(capacity: usize) -> Self {
        Self {
            bus: InMemoryBus::new(capacity),
        }
    }

    pub fn bus(&self) -> Arc<InMemoryBus<FrontendMessage>> {
        Arc::clone(&self.bus)
    }

    pub fn subscribe(&self) -> Receiver<FrontendMessage> {
        self.bus.subscribe()
    }
}

impl Frontend for BusFrontend {
    fn send(&self, message: FrontendMessage) {
        let msg_type = message.msg_type();
        if self.bus.send(message).is_err() {
            debug!(msg_type, "frontend message dropped without subscribers");
        }
    }
}

/// Builds a bundle with a single entry.
pub fn bundle(mime: &str, payload: impl Into<JsonValue>) -> MimeBundle {
    let mut map = MimeBundle::new();
    map.insert(mime.to_string(), payload.into());
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_tagged_by_msg_type() {
        let message = FrontendMessage::UpdateDisplayData {
            data: bundle("text/html", "<b>x</b>"),
            metadata: MimeBundle::new(),
            display_id: "d1".into(),
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["msg_type"], "update_display_data");
        assert_eq!(json["display_id"], "d1");
        let back: FrontendMessage = serde_json::from_value(json).unwrap();
        assert_eq!(back, message);
    }

    #[test]
    fn recording_frontend_filters_by_type() {
        let frontend = RecordingFrontend::new();
        frontend.send_error("E", "boom", vec!["line".into()]);
        frontend.send_display_data(bundle("text/plain", "x"), MimeBundle::new(), None);
        assert_eq!(frontend.of_type("error").len(), 1);
        assert_eq!(frontend.take().len(), 2);
        assert!(frontend.messages().is_empty());
    }

    #[tokio::test]
    async fn bus_frontend_reaches_subscribers() {
        let frontend = BusFrontend::new(8);
        let mut rx = frontend.subscribe();
        frontend.send_error("E", "boom", Vec::new());
        let received = rx.recv().await.unwrap();
        assert_eq!(received.msg_type(), "error");
    }

    #[test]
    fn bus_frontend_without_subscribers_does_not_panic() {
        let frontend = BusFrontend::new(1);
        frontend.send_error("E", "boom", Vec::new());
        assert_eq!(frontend.bus().receiver_count(), 0);
    }
}
