//! Upload, delete and health endpoint tests.
//!
//! Run with: `cargo test -p vitrine-api --test upload_test`

mod helpers;

use axum::http::StatusCode;
use helpers::{fixtures, setup_test_app, upload_form, UPSTREAM_TOKEN};
use mockito::Matcher;
use serde_json::{json, Value};

#[tokio::test]
async fn test_health() {
    let app = setup_test_app().await;

    let response = app.client().get("/health").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body = response.json::<Value>();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["storage_backend"], "local");
    assert!(body["version"].as_str().is_some());
}

#[tokio::test]
async fn test_openapi_document_lists_endpoints() {
    let app = setup_test_app().await;

    let response = app.client().get("/api-docs/openapi.json").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body = response.json::<Value>();
    assert!(body["paths"].get("/upload").is_some());
    assert!(body["paths"].get("/delete").is_some());
}

#[tokio::test]
async fn test_upload_product_image_creates_variants_and_notifies() {
    let mut app = setup_test_app().await;
    let upstream = app
        .upstream
        .mock("PATCH", "/product/42/images")
        .match_header("authorization", format!("Bearer {UPSTREAM_TOKEN}").as_str())
        .match_body(Matcher::PartialJson(json!({ "video": "" })))
        .with_status(200)
        .create_async()
        .await;

    let form = upload_form(
        "product",
        "42",
        vec![("Pizza.JPG", "image/jpeg", fixtures::jpeg(2400, 600))],
    );
    let response = app.client().post("/upload").multipart(form).await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body = response.json::<Value>();
    let urls = body["urls"].as_array().expect("urls array");
    assert_eq!(urls.len(), 3);
    assert!(urls[0].as_str().unwrap_or_default().ends_with("Pts/H/pizza.jpg"));
    assert!(urls[1].as_str().unwrap_or_default().ends_with("Pts/M/pizza.jpg"));
    assert!(urls[2].as_str().unwrap_or_default().ends_with("Pts/L/pizza.jpg"));
    assert!(body["blurHash"].as_str().is_some());
    assert_eq!(body["warnings"], json!([]));

    assert_eq!(
        app.storage.uploaded_keys(),
        vec!["Pts/H/pizza.jpg", "Pts/M/pizza.jpg", "Pts/L/pizza.jpg"]
    );
    assert_eq!(app.leftover_uploads(), 0);
    upstream.assert_async().await;
}

#[tokio::test]
async fn test_upload_branch_image_stores_original() {
    let mut app = setup_test_app().await;
    let upstream = app
        .upstream
        .mock("PATCH", "/branch/7/image")
        .match_body(Matcher::Json(json!({
            "image": format!("{}/BPfs/front.png", vitrine_storage::mock::MOCK_BASE_URL),
        })))
        .with_status(204)
        .create_async()
        .await;

    let form = upload_form(
        "branch",
        "7",
        vec![("front.png", "image/png", fixtures::png(64, 64))],
    );
    let response = app.client().post("/upload").multipart(form).await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(app.storage.uploaded_keys(), vec!["BPfs/front.png"]);
    let stored = app.storage.get("BPfs/front.png").expect("stored object");
    assert_eq!(stored.content_type, "image/png");
    upstream.assert_async().await;
}

#[tokio::test]
async fn test_upload_keeps_going_after_bad_file() {
    let mut app = setup_test_app().await;
    let _upstream = app
        .upstream
        .mock("PATCH", "/product/1/images")
        .with_status(200)
        .create_async()
        .await;

    let form = upload_form(
        "product",
        "1",
        vec![
            ("broken.jpg", "image/jpeg", b"definitely not an image".to_vec()),
            ("clip.mp4", "video/mp4", fixtures::mp4()),
        ],
    );
    let response = app.client().post("/upload").multipart(form).await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body = response.json::<Value>();
    let warnings = body["warnings"].as_array().expect("warnings array");
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0]
        .as_str()
        .unwrap_or_default()
        .starts_with("Failed to process broken.jpg"));
    assert_eq!(app.storage.uploaded_keys(), vec!["Pts/Video/clip.mp4"]);
    assert!(body.get("blurHash").is_none());
    assert_eq!(app.leftover_uploads(), 0);
}

#[tokio::test]
async fn test_upload_unknown_entity_type_is_rejected_before_storage() {
    let mut app = setup_test_app().await;
    let upstream = app
        .upstream
        .mock("PATCH", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let form = upload_form(
        "widget",
        "1",
        vec![("a.jpg", "image/jpeg", fixtures::jpeg(32, 32))],
    );
    let response = app.client().post("/upload").multipart(form).await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert!(app.storage.uploaded_keys().is_empty());
    assert!(app.storage.deleted_keys().is_empty());
    assert_eq!(app.leftover_uploads(), 0);
    upstream.assert_async().await;
}

#[tokio::test]
async fn test_upload_missing_entity_id_is_bad_request() {
    let app = setup_test_app().await;

    let form = axum_test::multipart::MultipartForm::new()
        .add_text("entityType", "menu")
        .add_part(
            "files",
            axum_test::multipart::Part::bytes(bytes::Bytes::from(fixtures::jpeg(16, 16)))
                .file_name("menu.jpg")
                .mime_type("image/jpeg"),
        );
    let response = app.client().post("/upload").multipart(form).await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body = response.json::<Value>();
    assert_eq!(body["error"], "Files, entity type, or entity ID missing");
    assert_eq!(app.leftover_uploads(), 0);
}

#[tokio::test]
async fn test_upload_too_many_files_is_bad_request() {
    let app = setup_test_app().await;

    let files = (0..5)
        .map(|_| ("a.jpg", "image/jpeg", fixtures::jpeg(8, 8)))
        .collect();
    let response = app
        .client()
        .post("/upload")
        .multipart(upload_form("menu", "1", files))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert!(app.storage.uploaded_keys().is_empty());
    assert_eq!(app.leftover_uploads(), 0);
}

#[tokio::test]
async fn test_upload_replaces_previous_files() {
    let mut app = setup_test_app().await;
    for key in ["Cts/H/old.jpg", "Cts/M/old.jpg", "Cts/L/old.jpg"] {
        app.storage.insert(key, vec![1, 2, 3]);
    }
    let _upstream = app
        .upstream
        .mock("PATCH", "/category/3/images")
        .with_status(200)
        .create_async()
        .await;

    let form = upload_form(
        "category",
        "3",
        vec![("new.jpg", "image/jpeg", fixtures::jpeg(300, 200))],
    )
    .add_text("imagePrevName", "old.jpg");
    let response = app.client().post("/upload").multipart(form).await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let mut deleted = app.storage.deleted_keys();
    deleted.sort();
    assert_eq!(deleted, vec!["Cts/H/old.jpg", "Cts/L/old.jpg", "Cts/M/old.jpg"]);
    assert!(app.storage.get("Cts/H/old.jpg").is_none());
    assert!(app.storage.get("Cts/H/new.jpg").is_some());
}

#[tokio::test]
async fn test_upload_upstream_failure_is_bad_gateway() {
    let mut app = setup_test_app().await;
    let _upstream = app
        .upstream
        .mock("PATCH", "/menu/5/image")
        .with_status(500)
        .create_async()
        .await;

    let form = upload_form(
        "menu",
        "5",
        vec![("menu.png", "image/png", fixtures::png(16, 16))],
    );
    let response = app.client().post("/upload").multipart(form).await;

    assert_eq!(response.status_code(), StatusCode::BAD_GATEWAY);
    let body = response.json::<Value>();
    assert_eq!(body["code"], "UPSTREAM_NOTIFY_ERROR");
    assert_eq!(app.storage.uploaded_keys(), vec!["Mns/menu.png"]);
    assert_eq!(app.leftover_uploads(), 0);
}

#[tokio::test]
async fn test_upload_branding_is_not_notified() {
    let mut app = setup_test_app().await;
    let upstream = app
        .upstream
        .mock("PATCH", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let form = upload_form(
        "branding",
        "1",
        vec![("logo.png", "image/png", fixtures::png(16, 16))],
    );
    let response = app.client().post("/upload").multipart(form).await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(app.storage.uploaded_keys(), vec!["Bds/logo.png"]);
    upstream.assert_async().await;
}

#[tokio::test]
async fn test_delete_requires_image_name() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .post("/delete")
        .json(&json!({ "entityType": "product" }))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body = response.json::<Value>();
    assert_eq!(body["error"], "Entity type or image name missing");
    assert!(app.storage.deleted_keys().is_empty());
}

#[tokio::test]
async fn test_delete_unknown_entity_type_is_bad_request() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .post("/delete")
        .json(&json!({ "entityType": "Product", "imageName": "a.jpg" }))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert!(app.storage.deleted_keys().is_empty());
}

#[tokio::test]
async fn test_delete_product_image_and_video() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .post("/delete")
        .json(&json!({
            "entityType": "product",
            "imageName": "pizza.jpg",
            "videoName": "clip.mp4",
        }))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(
        response.json::<Value>(),
        json!({ "message": "Files deleted successfully" })
    );
    let mut deleted = app.storage.deleted_keys();
    deleted.sort();
    assert_eq!(
        deleted,
        vec![
            "Pts/H/pizza.jpg",
            "Pts/L/pizza.jpg",
            "Pts/M/pizza.jpg",
            "Pts/Video/clip.mp4",
        ]
    );
}

#[tokio::test]
async fn test_delete_storage_failure_is_server_error() {
    let app = setup_test_app().await;
    app.storage.fail_deletes_matching("/M/");

    let response = app
        .client()
        .post("/delete")
        .json(&json!({ "entityType": "banner", "imageName": "promo.jpg" }))
        .await;

    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = response.json::<Value>();
    assert_eq!(body["code"], "DELETION_ERROR");
}
