use serde::Serialize;
use serde_json::{Value, json};

/// Structured result of one worker invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkerResponse {
    pub status_code: u16,
    pub body: Value,
}

impl WorkerResponse {
    pub fn success(class_index: usize) -> Self {
        Self {
            status_code: 200,
            body: json!(class_index),
        }
    }

    /// A clean `failure` transition: the invocation itself succeeded.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status_code: 200,
            body: json!({ "error": message.into() }),
        }
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self {
            status_code: 500,
            body: json!({ "error": message.into() }),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status_code == 200
    }

    pub fn class_index(&self) -> Option<usize> {
        self.body.as_u64().map(|v| v as usize)
    }

    pub fn error(&self) -> Option<&str> {
        self.body.get("error").and_then(Value::as_str)
    }
}
