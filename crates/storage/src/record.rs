use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Processing status of a submitted image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageStatus {
    Pending,
    InProgress,
    Success,
    Failure,
}

impl ImageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageStatus::Pending => "pending",
            ImageStatus::InProgress => "in_progress",
            ImageStatus::Success => "success",
            ImageStatus::Failure => "failure",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ImageStatus::Success | ImageStatus::Failure)
    }
}

impl fmt::Display for ImageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One persisted entry per submitted image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub image_id: String,
    pub status: ImageStatus,
    pub stored_key: String,
    pub submitted_at: DateTime<Utc>,
    #[serde(default)]
    pub processed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub result: Option<usize>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl ImageRecord {
    pub fn pending(image_id: impl Into<String>, stored_key: impl Into<String>) -> Self {
        Self {
            image_id: image_id.into(),
            status: ImageStatus::Pending,
            stored_key: stored_key.into(),
            submitted_at: Utc::now(),
            processed_at: None,
            result: None,
            error_message: None,
        }
    }

    /// Applies the fields an update touches; everything else is left as is.
    pub fn apply(&mut self, update: &RecordUpdate) {
        self.status = update.status;
        self.processed_at = Some(update.processed_at);
        if let Some(result) = update.result {
            self.result = Some(result);
        }
        if let Some(message) = &update.error_message {
            self.error_message = Some(message.clone());
        }
    }
}

/// The field set written by a worker-driven status transition.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordUpdate {
    pub status: ImageStatus,
    pub processed_at: DateTime<Utc>,
    pub result: Option<usize>,
    pub error_message: Option<String>,
}

impl RecordUpdate {
    pub fn new(status: ImageStatus) -> Self {
        Self {
            status,
            processed_at: Utc::now(),
            result: None,
            error_message: None,
        }
    }

    pub fn with_result(mut self, result: usize) -> Self {
        self.result = Some(result);
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }
}
