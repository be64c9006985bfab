use std::sync::Arc;
use storage::{ImageRecord, ImageStatus, RecordStore, RecordUpdate, StoreError};
use thiserror::Error;

/// A target status together with the payload that status carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusChange {
    InProgress,
    Success { class_index: usize },
    Failure { message: String },
}

impl StatusChange {
    pub fn status(&self) -> ImageStatus {
        match self {
            StatusChange::InProgress => ImageStatus::InProgress,
            StatusChange::Success { .. } => ImageStatus::Success,
            StatusChange::Failure { .. } => ImageStatus::Failure,
        }
    }

    fn to_update(&self) -> RecordUpdate {
        let update = RecordUpdate::new(self.status());
        match self {
            StatusChange::InProgress => update,
            StatusChange::Success { class_index } => update.with_result(*class_index),
            StatusChange::Failure { message } => update.with_error(message.clone()),
        }
    }
}

/// Statuses a record may hold for a write of `to` to be accepted.
///
/// Re-writing the same non-initial status is allowed so redelivered writes
/// are idempotent. Nothing moves a record back to `pending`.
pub fn permitted_sources(to: ImageStatus) -> &'static [ImageStatus] {
    match to {
        ImageStatus::Pending => &[],
        ImageStatus::InProgress => &[ImageStatus::Pending, ImageStatus::InProgress],
        ImageStatus::Success => &[ImageStatus::InProgress, ImageStatus::Success],
        ImageStatus::Failure => &[
            ImageStatus::Pending,
            ImageStatus::InProgress,
            ImageStatus::Failure,
        ],
    }
}

pub fn is_permitted(from: ImageStatus, to: ImageStatus) -> bool {
    permitted_sources(to).contains(&from)
}

#[derive(Error, Debug)]
pub enum TransitionError {
    #[error("Illegal transition for {image_id}: {from} -> {to}")]
    Illegal {
        image_id: String,
        from: ImageStatus,
        to: ImageStatus,
    },

    #[error("Record store error: {0}")]
    Store(#[from] StoreError),
}

/// Drives worker-side status transitions against a [`RecordStore`].
pub struct StatusTracker {
    records: Arc<dyn RecordStore>,
}

impl StatusTracker {
    pub fn new(records: Arc<dyn RecordStore>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &Arc<dyn RecordStore> {
        &self.records
    }

    /// Writes `change` to the record for `image_id` if its current status is a
    /// permitted source, stamping `processed_at`.
    pub fn transition(
        &self,
        image_id: &str,
        change: StatusChange,
    ) -> Result<ImageRecord, TransitionError> {
        let to = change.status();
        let update = change.to_update();

        match self.records.update(image_id, &update, permitted_sources(to)) {
            Ok(record) => {
                tracing::debug!(image_id, status = %to, "Status updated");
                Ok(record)
            }
            Err(StoreError::ConditionFailed { current, .. }) => Err(TransitionError::Illegal {
                image_id: image_id.to_string(),
                from: current,
                to,
            }),
            Err(e) => Err(e.into()),
        }
    }
}
