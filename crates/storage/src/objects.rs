use crate::errors::StoreError;
use crate::keys::is_safe_segment;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// Blob storage addressed by `(bucket, key)`.
pub trait ObjectStore: Send + Sync {
    /// Fails with [`StoreError::ObjectNotFound`] if nothing is stored there.
    fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Stores `bytes`, replacing any previous object at the same key.
    fn put(&self, bucket: &str, key: &str, bytes: &[u8]) -> Result<(), StoreError>;
}

#[derive(Default)]
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<(String, String), Vec<u8>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.read().map(|o| o.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ObjectStore for MemoryObjectStore {
    fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        let objects = self.objects.read().map_err(|_| StoreError::Poisoned)?;
        objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| StoreError::ObjectNotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }

    fn put(&self, bucket: &str, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let mut objects = self.objects.write().map_err(|_| StoreError::Poisoned)?;
        objects.insert((bucket.to_string(), key.to_string()), bytes.to_vec());
        Ok(())
    }
}

/// Object store laid out as `root/bucket/key` on the local filesystem.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, StoreError> {
        if !is_safe_segment(bucket) || bucket.contains('/') {
            return Err(StoreError::InvalidKey(bucket.to_string()));
        }
        let mut path = self.root.join(bucket);
        for segment in key.split('/') {
            if !is_safe_segment(segment) {
                return Err(StoreError::InvalidKey(key.to_string()));
            }
            path.push(segment);
        }
        Ok(path)
    }
}

impl ObjectStore for FsObjectStore {
    fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.object_path(bucket, key)?;
        fs::read(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StoreError::ObjectNotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            },
            _ => StoreError::IoError(e),
        })
    }

    fn put(&self, bucket: &str, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let path = self.object_path(bucket, key)?;
        write_atomic(&path, bytes)?;
        tracing::debug!(bucket, key, size = bytes.len(), "Object stored");
        Ok(())
    }
}

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Writes to a sibling temp file, syncs it, then renames over `path`. The
/// temp file is removed if any step fails.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
    let tmp = path.with_file_name(format!(
        ".{file_name}.{}.{}.tmp",
        std::process::id(),
        TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));

    let written = File::create(&tmp)
        .and_then(|mut file| {
            file.write_all(bytes)?;
            file.sync_all()
        })
        .and_then(|()| fs::rename(&tmp, path));
    if written.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    written
}
