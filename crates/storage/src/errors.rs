use crate::record::ImageStatus;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Object not found: {bucket}/{key}")]
    ObjectNotFound { bucket: String, key: String },

    #[error("Record not found: {0}")]
    RecordNotFound(String),

    #[error("Record already exists: {0}")]
    RecordExists(String),

    #[error("Record {image_id} is {current}, update requires one of {allowed:?}")]
    ConditionFailed {
        image_id: String,
        current: ImageStatus,
        allowed: Vec<ImageStatus>,
    },

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Store lock poisoned")]
    Poisoned,
}
