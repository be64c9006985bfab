use std::sync::Arc;
use std::thread;

use storage::{
    ArtifactLocation, ArtifactSource, FsObjectStore, FsRecordStore, ImageRecord, ImageStatus,
    MemoryObjectStore, ObjectArtifactSource, ObjectStore, RecordStore, RecordUpdate, StoreError,
};
use tempfile::tempdir;

/// Objects written through one handle are readable through a fresh one
#[test]
fn test_object_store_survives_reopen() {
    let dir = tempdir().unwrap();

    {
        let store = FsObjectStore::open(dir.path()).unwrap();
        store
            .put("uploads", "upload_abc.jpg", b"\xff\xd8\xff")
            .unwrap();
    }

    let store = FsObjectStore::open(dir.path()).unwrap();
    assert_eq!(
        store.get("uploads", "upload_abc.jpg").unwrap(),
        b"\xff\xd8\xff"
    );
    assert!(dir.path().join("uploads").join("upload_abc.jpg").exists());
}

#[test]
fn test_object_store_missing_object() {
    let dir = tempdir().unwrap();
    let store = FsObjectStore::open(dir.path()).unwrap();

    let err = store.get("uploads", "upload_nope.jpg").unwrap_err();
    assert!(
        matches!(err, StoreError::ObjectNotFound { ref bucket, ref key } if bucket == "uploads" && key == "upload_nope.jpg"),
        "unexpected error: {err:?}"
    );
}

/// Keys that would escape the store root are refused before touching disk
#[test]
fn test_object_store_rejects_path_traversal() {
    let dir = tempdir().unwrap();
    let store = FsObjectStore::open(dir.path().join("objects")).unwrap();

    for (bucket, key) in [
        ("uploads", "../escape.jpg"),
        ("uploads", "a/../../escape.jpg"),
        ("..", "escape.jpg"),
        ("up/loads", "a.jpg"),
        ("uploads", ""),
    ] {
        let err = store.put(bucket, key, b"x").unwrap_err();
        assert!(
            matches!(err, StoreError::InvalidKey(_)),
            "{bucket}/{key} should be rejected, got {err:?}"
        );
    }
    assert!(!dir.path().join("escape.jpg").exists());
}

#[test]
fn test_object_store_nested_keys() {
    let dir = tempdir().unwrap();
    let store = FsObjectStore::open(dir.path()).unwrap();

    store.put("uploads", "2024/05/upload_a.jpg", b"a").unwrap();
    assert_eq!(store.get("uploads", "2024/05/upload_a.jpg").unwrap(), b"a");
}

/// Record lifecycle through the filesystem store, including reopen
#[test]
fn test_record_store_lifecycle() {
    let dir = tempdir().unwrap();

    {
        let store = FsRecordStore::open(dir.path()).unwrap();
        store
            .create(ImageRecord::pending("abc123", "upload_abc123.jpg"))
            .unwrap();
        store
            .update(
                "abc123",
                &RecordUpdate::new(ImageStatus::InProgress),
                &[ImageStatus::Pending],
            )
            .unwrap();
    }

    let store = FsRecordStore::open(dir.path()).unwrap();
    let record = store.get("abc123").unwrap().unwrap();
    assert_eq!(record.status, ImageStatus::InProgress);
    assert_eq!(record.stored_key, "upload_abc123.jpg");
    assert!(record.processed_at.is_some());

    let record = store
        .update(
            "abc123",
            &RecordUpdate::new(ImageStatus::Success).with_result(3),
            &[ImageStatus::InProgress],
        )
        .unwrap();
    assert_eq!(record.result, Some(3));
    assert!(record.error_message.is_none());
}

#[test]
fn test_record_store_duplicate_and_missing() {
    let dir = tempdir().unwrap();
    let store = FsRecordStore::open(dir.path()).unwrap();

    store.create(ImageRecord::pending("abc", "k")).unwrap();
    assert!(matches!(
        store.create(ImageRecord::pending("abc", "k")),
        Err(StoreError::RecordExists(_))
    ));

    let err = store
        .update(
            "ghost",
            &RecordUpdate::new(ImageStatus::InProgress),
            &[ImageStatus::Pending],
        )
        .unwrap_err();
    assert!(matches!(err, StoreError::RecordNotFound(_)));
    assert!(!dir.path().join("ghost.json").exists());
}

#[test]
fn test_record_store_rejects_invalid_ids() {
    let dir = tempdir().unwrap();
    let store = FsRecordStore::open(dir.path()).unwrap();

    assert!(matches!(
        store.get("../secrets"),
        Err(StoreError::InvalidKey(_))
    ));
}

/// Concurrent updates to disjoint records do not interfere
#[test]
fn test_record_store_concurrent_disjoint_updates() {
    let dir = tempdir().unwrap();
    let store = Arc::new(FsRecordStore::open(dir.path()).unwrap());

    for i in 0..8 {
        store
            .create(ImageRecord::pending(format!("img{i}"), format!("upload_img{i}.jpg")))
            .unwrap();
    }

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let id = format!("img{i}");
                store
                    .update(
                        &id,
                        &RecordUpdate::new(ImageStatus::InProgress),
                        &[ImageStatus::Pending],
                    )
                    .unwrap();
                store
                    .update(
                        &id,
                        &RecordUpdate::new(ImageStatus::Success).with_result(i),
                        &[ImageStatus::InProgress],
                    )
                    .unwrap();
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    for i in 0..8 {
        let record = store.get(&format!("img{i}")).unwrap().unwrap();
        assert_eq!(record.status, ImageStatus::Success);
        assert_eq!(record.result, Some(i));
    }
}

#[test]
fn test_artifact_source_stages_file() {
    let dir = tempdir().unwrap();
    let objects = Arc::new(MemoryObjectStore::new());
    objects.put("models", "model.onnx", b"onnx-bytes").unwrap();

    let source = ObjectArtifactSource::new(objects);
    let dest = dir.path().join("staging").join("model.onnx");
    let path = source
        .fetch(&ArtifactLocation::new("models", "model.onnx"), &dest)
        .unwrap();

    assert_eq!(path, dest);
    assert_eq!(std::fs::read(&dest).unwrap(), b"onnx-bytes");
}

#[test]
fn test_artifact_source_missing_artifact_leaves_no_file() {
    let dir = tempdir().unwrap();
    let source = ObjectArtifactSource::new(Arc::new(MemoryObjectStore::new()));
    let dest = dir.path().join("model.onnx");

    let err = source
        .fetch(&ArtifactLocation::new("models", "model.onnx"), &dest)
        .unwrap_err();
    assert!(matches!(err, StoreError::ObjectNotFound { .. }));
    assert!(!dest.exists());
}
