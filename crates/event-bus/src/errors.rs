use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ListenerError {
    #[error("listener '{listener}' failed: {message}")]
    Failed { listener: String, message: String },
    #[error("connection '{kind}' could not be closed: {message}")]
    Close { kind: String, message: String },
}

impl ListenerError {
    pub fn failed(listener: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            listener: listener.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    #[error("no subscriber is listening")]
    NoSubscribers,
}

pub type ListenerResult = Result<(), ListenerError>;
