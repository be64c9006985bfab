use crate::errors::StoreError;
use crate::keys::is_valid_image_id;
use crate::objects::write_atomic;
use crate::record::{ImageRecord, ImageStatus, RecordUpdate};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

/// Keyed persistence for [`ImageRecord`]s.
pub trait RecordStore: Send + Sync {
    /// Inserts a new record. Fails with [`StoreError::RecordExists`] if the id
    /// is taken.
    fn create(&self, record: ImageRecord) -> Result<(), StoreError>;

    fn get(&self, image_id: &str) -> Result<Option<ImageRecord>, StoreError>;

    /// Applies `update` to an existing record, atomically checking that its
    /// current status is one of `allowed_from`.
    ///
    /// Fails with [`StoreError::RecordNotFound`] if the id does not exist and
    /// with [`StoreError::ConditionFailed`] if the status check does not hold.
    fn update(
        &self,
        image_id: &str,
        update: &RecordUpdate,
        allowed_from: &[ImageStatus],
    ) -> Result<ImageRecord, StoreError>;
}

fn check_condition(
    record: &ImageRecord,
    allowed_from: &[ImageStatus],
) -> Result<(), StoreError> {
    if allowed_from.contains(&record.status) {
        Ok(())
    } else {
        Err(StoreError::ConditionFailed {
            image_id: record.image_id.clone(),
            current: record.status,
            allowed: allowed_from.to_vec(),
        })
    }
}

#[derive(Default)]
pub struct MemoryRecordStore {
    records: RwLock<HashMap<String, ImageRecord>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemoryRecordStore {
    fn create(&self, record: ImageRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().map_err(|_| StoreError::Poisoned)?;
        if records.contains_key(&record.image_id) {
            return Err(StoreError::RecordExists(record.image_id));
        }
        records.insert(record.image_id.clone(), record);
        Ok(())
    }

    fn get(&self, image_id: &str) -> Result<Option<ImageRecord>, StoreError> {
        let records = self.records.read().map_err(|_| StoreError::Poisoned)?;
        Ok(records.get(image_id).cloned())
    }

    fn update(
        &self,
        image_id: &str,
        update: &RecordUpdate,
        allowed_from: &[ImageStatus],
    ) -> Result<ImageRecord, StoreError> {
        let mut records = self.records.write().map_err(|_| StoreError::Poisoned)?;
        let record = records
            .get_mut(image_id)
            .ok_or_else(|| StoreError::RecordNotFound(image_id.to_string()))?;
        check_condition(record, allowed_from)?;
        record.apply(update);
        Ok(record.clone())
    }
}

/// One JSON document per record under a directory.
///
/// Read-modify-write cycles are serialized within the process; documents are
/// replaced by atomic rename so readers never observe a partial write.
pub struct FsRecordStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FsRecordStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, image_id: &str) -> Result<PathBuf, StoreError> {
        if !is_valid_image_id(image_id) {
            return Err(StoreError::InvalidKey(image_id.to_string()));
        }
        Ok(self.dir.join(format!("{image_id}.json")))
    }

    fn read(&self, path: &Path) -> Result<Option<ImageRecord>, StoreError> {
        match fs::read(path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, path: &Path, record: &ImageRecord) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(record)?;
        write_atomic(path, &bytes)?;
        Ok(())
    }
}

impl RecordStore for FsRecordStore {
    fn create(&self, record: ImageRecord) -> Result<(), StoreError> {
        let path = self.record_path(&record.image_id)?;
        let _guard = self.write_lock.lock().map_err(|_| StoreError::Poisoned)?;
        if path.exists() {
            return Err(StoreError::RecordExists(record.image_id));
        }
        self.write(&path, &record)
    }

    fn get(&self, image_id: &str) -> Result<Option<ImageRecord>, StoreError> {
        let path = self.record_path(image_id)?;
        self.read(&path)
    }

    fn update(
        &self,
        image_id: &str,
        update: &RecordUpdate,
        allowed_from: &[ImageStatus],
    ) -> Result<ImageRecord, StoreError> {
        let path = self.record_path(image_id)?;
        let _guard = self.write_lock.lock().map_err(|_| StoreError::Poisoned)?;
        let mut record = self
            .read(&path)?
            .ok_or_else(|| StoreError::RecordNotFound(image_id.to_string()))?;
        check_condition(&record, allowed_from)?;
        record.apply(update);
        self.write(&path, &record)?;
        Ok(record)
    }
}
