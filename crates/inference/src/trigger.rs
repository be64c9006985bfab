use crate::error::WorkerError;
use serde::Deserialize;
use storage::StorageEvent;
use storage::keys::image_id_from_key;

/// One unit of work: the stored object to classify and the record it
/// belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    pub bucket: String,
    pub object_key: String,
    pub image_id: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Payload {
    Notification(StorageEvent),
    Direct { bucket: String, key: String },
}

impl Trigger {
    /// Parses a storage-change notification (first record only) or a flat
    /// `{"bucket", "key"}` object.
    pub fn parse(payload: &str) -> Result<Self, WorkerError> {
        let payload: Payload = serde_json::from_str(payload).map_err(|e| {
            WorkerError::MalformedTrigger(format!("unrecognized trigger payload: {e}"))
        })?;

        let (bucket, object_key) = match payload {
            Payload::Notification(event) => {
                if event.records.len() > 1 {
                    tracing::warn!(
                        records = event.records.len(),
                        "Notification carries several records, only the first is processed"
                    );
                }
                let record = event.records.into_iter().next().ok_or_else(|| {
                    WorkerError::MalformedTrigger("notification has no records".to_string())
                })?;
                (record.s3.bucket.name, record.s3.object.key)
            }
            Payload::Direct { bucket, key } => (bucket, key),
        };

        Self::from_location(bucket, object_key)
    }

    pub fn from_location(
        bucket: impl Into<String>,
        object_key: impl Into<String>,
    ) -> Result<Self, WorkerError> {
        let bucket = bucket.into();
        let object_key = object_key.into();

        if bucket.is_empty() {
            return Err(WorkerError::MalformedTrigger("empty bucket name".to_string()));
        }
        let image_id = image_id_from_key(&object_key)
            .ok_or_else(|| {
                WorkerError::MalformedTrigger(format!(
                    "cannot derive image id from key {object_key:?}"
                ))
            })?
            .to_string();

        Ok(Self {
            bucket,
            object_key,
            image_id,
        })
    }
}
