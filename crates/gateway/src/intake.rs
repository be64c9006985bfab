use base64::{Engine, engine::general_purpose::STANDARD};
use serde::Serialize;
use std::sync::Arc;
use storage::keys::{MAX_IMAGE_ID_LEN, is_valid_image_id, upload_key};
use storage::{ImageRecord, ImageStatus, ObjectStore, RecordStore, RecordUpdate, StoreError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("Invalid image_id {0:?}: expected 1-128 letters, digits, '-' or '_'")]
    InvalidImageId(String),

    #[error("Invalid image_data: {0}")]
    InvalidEncoding(#[from] base64::DecodeError),

    #[error("Image payload is empty")]
    EmptyImage,

    #[error("Image is {size} bytes, limit is {limit}")]
    TooLarge { size: usize, limit: u64 },

    #[error("Image {0} was already submitted")]
    Duplicate(String),

    #[error("Storage error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for IntakeError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::RecordExists(id) => IntakeError::Duplicate(id),
            other => IntakeError::Store(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Submission {
    pub image_id: String,
    pub bucket: String,
    pub stored_key: String,
    pub size: usize,
}

/// Accepts uploads: stores the raw bytes and opens a `pending` record.
pub struct IntakeService {
    objects: Arc<dyn ObjectStore>,
    records: Arc<dyn RecordStore>,
    bucket: String,
    max_upload_bytes: u64,
}

impl IntakeService {
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        records: Arc<dyn RecordStore>,
        bucket: impl Into<String>,
        max_upload_bytes: u64,
    ) -> Self {
        Self {
            objects,
            records,
            bucket: bucket.into(),
            max_upload_bytes,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn records(&self) -> &Arc<dyn RecordStore> {
        &self.records
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_bytes
    }

    /// Decodes a base64 payload, then [`submit`](Self::submit)s it.
    pub fn submit_base64(&self, image_id: &str, image_data: &str) -> Result<Submission, IntakeError> {
        Self::check_image_id(image_id)?;
        let raw = STANDARD.decode(image_data.trim())?;
        self.submit(image_id, &raw)
    }

    /// Writes `raw` under the deterministic key for `image_id` and creates its
    /// `pending` record. An id can only be submitted once.
    #[tracing::instrument(skip(self, raw), fields(size = raw.len()))]
    pub fn submit(&self, image_id: &str, raw: &[u8]) -> Result<Submission, IntakeError> {
        Self::check_image_id(image_id)?;
        if raw.is_empty() {
            return Err(IntakeError::EmptyImage);
        }
        if raw.len() as u64 > self.max_upload_bytes {
            return Err(IntakeError::TooLarge {
                size: raw.len(),
                limit: self.max_upload_bytes,
            });
        }
        let stored_key = upload_key(image_id);

        // Creating the record claims the id; only the claimant writes the key
        self.records
            .create(ImageRecord::pending(image_id, &stored_key))?;
        if let Err(e) = self.objects.put(&self.bucket, &stored_key, raw) {
            self.abandon(image_id, &e);
            return Err(e.into());
        }

        tracing::info!(bucket = %self.bucket, key = %stored_key, "Upload stored");

        Ok(Submission {
            image_id: image_id.to_string(),
            bucket: self.bucket.clone(),
            stored_key,
            size: raw.len(),
        })
    }

    /// Closes a claimed record whose bytes never landed so it does not sit
    /// in `pending` forever.
    fn abandon(&self, image_id: &str, cause: &StoreError) {
        let update = RecordUpdate::new(ImageStatus::Failure)
            .with_error(format!("Upload could not be stored: {cause}"));
        if let Err(e) = self
            .records
            .update(image_id, &update, &[ImageStatus::Pending])
        {
            tracing::error!(image_id, error = %e, "Failed to close abandoned upload record");
        }
    }

    fn check_image_id(image_id: &str) -> Result<(), IntakeError> {
        if is_valid_image_id(image_id) {
            Ok(())
        } else {
            Err(IntakeError::InvalidImageId(image_id.to_string()))
        }
    }
}
