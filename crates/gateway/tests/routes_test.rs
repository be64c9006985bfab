use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use gateway::{AppState, IntakeService, router};
use image::{ImageFormat, RgbImage};
use serde_json::{Value, json};
use storage::{
    ImageStatus, MemoryObjectStore, MemoryRecordStore, ObjectStore, RecordStore, RecordUpdate,
    StorageEvent,
};
use tokio::sync::mpsc;
use tower::ServiceExt;

struct TestApp {
    app: Router,
    objects: Arc<MemoryObjectStore>,
    records: Arc<MemoryRecordStore>,
    notifications: mpsc::Receiver<StorageEvent>,
    model_ready: Arc<AtomicBool>,
}

fn test_app(max_upload_bytes: u64) -> TestApp {
    let objects = Arc::new(MemoryObjectStore::new());
    let records = Arc::new(MemoryRecordStore::new());
    let (tx, rx) = mpsc::channel(16);
    let model_ready = Arc::new(AtomicBool::new(false));

    let probe = model_ready.clone();
    let state = AppState {
        intake: Arc::new(IntakeService::new(
            objects.clone(),
            records.clone(),
            "uploads",
            max_upload_bytes,
        )),
        notifications: tx,
        model_ready: Arc::new(move || probe.load(Ordering::SeqCst)),
    };

    TestApp {
        app: router(state),
        objects,
        records,
        notifications: rx,
        model_ready,
    }
}

fn jpeg_base64() -> String {
    let img = RgbImage::from_pixel(8, 8, image::Rgb([200, 10, 10]));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Jpeg).unwrap();
    STANDARD.encode(buf.into_inner())
}

fn upload_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/upload")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

// ========== Upload ==========

#[tokio::test]
async fn test_upload_stores_image_and_queues_notification() {
    let mut t = test_app(1024 * 1024);
    let image_data = jpeg_base64();

    let (status, body) = send(
        &t.app,
        upload_request(json!({ "image_id": "abc123", "image_data": image_data })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["image_id"], "abc123");
    assert_eq!(body["stored_key"], "upload_abc123.jpg");
    assert!(body["message"].is_string());

    assert_eq!(
        t.objects.get("uploads", "upload_abc123.jpg").unwrap(),
        STANDARD.decode(image_data).unwrap()
    );
    let record = t.records.get("abc123").unwrap().unwrap();
    assert_eq!(record.status, ImageStatus::Pending);

    let event = t.notifications.try_recv().unwrap();
    assert_eq!(event.records[0].s3.bucket.name, "uploads");
    assert_eq!(event.records[0].s3.object.key, "upload_abc123.jpg");
}

#[tokio::test]
async fn test_upload_duplicate_is_conflict() {
    let mut t = test_app(1024 * 1024);
    let body = json!({ "image_id": "dup", "image_data": jpeg_base64() });

    let (status, _) = send(&t.app, upload_request(body.clone())).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&t.app, upload_request(body)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("dup"));

    // Only the first upload is announced
    assert!(t.notifications.try_recv().is_ok());
    assert!(t.notifications.try_recv().is_err());
}

#[tokio::test]
async fn test_upload_validation_errors() {
    let mut t = test_app(64);

    for body in [
        json!({ "image_id": "ok", "image_data": "@@not-base64@@" }),
        json!({ "image_id": "../escape", "image_data": jpeg_base64() }),
        json!({ "image_id": "empty", "image_data": "" }),
        json!({ "image_id": "big", "image_data": STANDARD.encode([0u8; 65]) }),
        json!({ "image_id": "missing" }),
    ] {
        let (status, response) = send(&t.app, upload_request(body.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        assert!(response["error"].is_string(), "{body}");
    }

    assert!(t.objects.is_empty());
    assert!(t.notifications.try_recv().is_err());
}

#[tokio::test]
async fn test_upload_rejects_non_json_body() {
    let t = test_app(1024);

    let request = Request::builder()
        .method("POST")
        .uri("/upload")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let (status, body) = send(&t.app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

// ========== Status ==========

#[tokio::test]
async fn test_status_round_trip() {
    let t = test_app(1024 * 1024);
    send(
        &t.app,
        upload_request(json!({ "image_id": "abc123", "image_data": jpeg_base64() })),
    )
    .await;

    let (status, body) = send(&t.app, get("/status?image_id=abc123")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "status": "pending", "result": null, "error": null })
    );

    t.records
        .update(
            "abc123",
            &RecordUpdate::new(ImageStatus::InProgress),
            &[ImageStatus::Pending],
        )
        .unwrap();
    t.records
        .update(
            "abc123",
            &RecordUpdate::new(ImageStatus::Success).with_result(17),
            &[ImageStatus::InProgress],
        )
        .unwrap();

    let (_, body) = send(&t.app, get("/status?image_id=abc123")).await;
    assert_eq!(
        body,
        json!({ "status": "success", "result": 17, "error": null })
    );
}

#[tokio::test]
async fn test_status_reports_failure_message() {
    let t = test_app(1024 * 1024);
    send(
        &t.app,
        upload_request(json!({ "image_id": "bad", "image_data": jpeg_base64() })),
    )
    .await;
    t.records
        .update(
            "bad",
            &RecordUpdate::new(ImageStatus::Failure).with_error("Inference error: boom"),
            &[ImageStatus::Pending],
        )
        .unwrap();

    let (_, body) = send(&t.app, get("/status?image_id=bad")).await;
    assert_eq!(body["status"], "failure");
    assert_eq!(body["error"], "Inference error: boom");
    assert!(body["result"].is_null());
}

#[tokio::test]
async fn test_status_unknown_id_is_pending() {
    let t = test_app(1024);

    let (status, body) = send(&t.app, get("/status?image_id=never-uploaded")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "pending");
}

#[tokio::test]
async fn test_status_requires_image_id() {
    let t = test_app(1024);

    for uri in ["/status", "/status?image_id=", "/status?image_id=a%2Fb"] {
        let (status, body) = send(&t.app, get(uri)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert!(body["error"].is_string());
    }
}

// ========== Health ==========

#[tokio::test]
async fn test_health_reports_model_readiness() {
    let t = test_app(1024);

    let (status, body) = send(&t.app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok", "model_loaded": false }));

    t.model_ready.store(true, Ordering::SeqCst);
    let (_, body) = send(&t.app, get("/health")).await;
    assert_eq!(body["model_loaded"], true);
}
