use crate::errors::StoreError;
use crate::objects::{ObjectStore, write_atomic};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where a model artifact lives in object storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLocation {
    pub bucket: String,
    pub key: String,
}

impl ArtifactLocation {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

/// Copies a remote artifact to a local path.
pub trait ArtifactSource: Send + Sync {
    /// Transfers the artifact at `location` to `dest` and returns the local
    /// path. `dest` only appears once the transfer has completed.
    fn fetch(&self, location: &ArtifactLocation, dest: &Path) -> Result<PathBuf, StoreError>;
}

/// Artifact source backed by any [`ObjectStore`].
pub struct ObjectArtifactSource {
    store: Arc<dyn ObjectStore>,
}

impl ObjectArtifactSource {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }
}

impl ArtifactSource for ObjectArtifactSource {
    fn fetch(&self, location: &ArtifactLocation, dest: &Path) -> Result<PathBuf, StoreError> {
        let bytes = self.store.get(&location.bucket, &location.key)?;
        write_atomic(dest, &bytes)?;
        tracing::info!(
            bucket = %location.bucket,
            key = %location.key,
            dest = %dest.display(),
            size = bytes.len(),
            "Model artifact fetched"
        );
        Ok(dest.to_path_buf())
    }
}
