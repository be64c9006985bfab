pub mod artifact;
pub mod errors;
pub mod keys;
pub mod notification;
pub mod objects;
pub mod record;
pub mod records;

pub use artifact::{ArtifactLocation, ArtifactSource, ObjectArtifactSource};
pub use errors::StoreError;
pub use notification::StorageEvent;
pub use objects::{FsObjectStore, MemoryObjectStore, ObjectStore};
pub use record::{ImageRecord, ImageStatus, RecordUpdate};
pub use records::{FsRecordStore, MemoryRecordStore, RecordStore};
