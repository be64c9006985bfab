//! Storage-change notifications
//!
//! Mirrors the object-created event a blob store emits: a list of records,
//! each naming the bucket and the key of the new object.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageEvent {
    #[serde(rename = "Records")]
    pub records: Vec<EventRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    #[serde(rename = "eventName", default, skip_serializing_if = "Option::is_none")]
    pub event_name: Option<String>,
    pub s3: EventEntity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEntity {
    pub bucket: BucketRef,
    pub object: ObjectRef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketRef {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRef {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl StorageEvent {
    pub fn object_created(bucket: impl Into<String>, key: impl Into<String>, size: u64) -> Self {
        Self {
            records: vec![EventRecord {
                event_name: Some("ObjectCreated:Put".to_string()),
                s3: EventEntity {
                    bucket: BucketRef {
                        name: bucket.into(),
                    },
                    object: ObjectRef {
                        key: key.into(),
                        size: Some(size),
                    },
                },
            }],
        }
    }
}
