use serde::{Deserialize, Serialize};

use crate::errors::KernelError;
use crate::frontend::MimeBundle;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecuteReply {
    Ok {
        execution_count: u64,
    },
    Error {
        ename: String,
        evalue: String,
        traceback: Vec<String>,
    },
}

impl ExecuteReply {
    pub fn ok(execution_count: u64) -> Self {
        Self::Ok { execution_count }
    }

    /// Reply for a run with failed items: the captured console output is
    /// the traceback.
    pub fn failed_run(traceback: Vec<String>) -> Self {
        Self::Error {
            ename: String::new(),
            evalue: String::new(),
            traceback,
        }
    }

    pub fn from_error(err: &KernelError, code: &str) -> Self {
        Self::Error {
            ename: err.ename().to_string(),
            evalue: err.to_string(),
            traceback: err.traceback(code),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompleteReply {
    pub matches: Vec<String>,
    pub cursor_start: usize,
    pub cursor_end: usize,
    pub metadata: MimeBundle,
    pub status: String,
}

impl CompleteReply {
    pub fn new(matches: Vec<String>, cursor_start: usize, cursor_end: usize) -> Self {
        Self {
            matches,
            cursor_start,
            cursor_end,
            metadata: MimeBundle::new(),
            status: "ok".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectReply {
    pub status: String,
    pub data: MimeBundle,
    pub metadata: MimeBundle,
    pub found: bool,
}

impl InspectReply {
    pub fn new(data: MimeBundle) -> Self {
        Self {
            status: "ok".to_string(),
            found: !data.is_empty(),
            data,
            metadata: MimeBundle::new(),
        }
    }

    pub fn not_found() -> Self {
        Self::new(MimeBundle::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use robotkernel_suite::DataError;

    #[test]
    fn execute_reply_serializes_with_status_tag() {
        let json = serde_json::to_value(ExecuteReply::ok(3)).unwrap();
        assert_eq!(json, serde_json::json!({"status": "ok", "execution_count": 3}));

        let err = KernelError::from(DataError::MixedMode { line: 4 });
        let reply = ExecuteReply::from_error(&err, "");
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["ename"], "DataError");
        assert_eq!(json["evalue"], "One file cannot have both tests and tasks.");
    }

    #[test]
    fn failed_run_has_empty_ename() {
        let reply = ExecuteReply::failed_run(vec!["Robocode Lab".into()]);
        assert!(!reply.is_ok());
        assert_eq!(
            reply,
            ExecuteReply::Error {
                ename: String::new(),
                evalue: String::new(),
                traceback: vec!["Robocode Lab".into()],
            }
        );
    }

    #[test]
    fn inspect_reply_found_tracks_data() {
        assert!(!InspectReply::not_found().found);
        let mut data = MimeBundle::new();
        data.insert("text/plain".into(), "doc".into());
        assert!(InspectReply::new(data).found);
    }
}
