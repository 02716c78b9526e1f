//! Defines routes for the upload, relay and video endpoints.
//!
//! ## Structure
//! - **File API**
//!   - `POST   /api/upload`            — store a base64 payload
//!   - `POST   /api/upload/multipart`  — store a multipart `file` part
//!   - `GET    /api/files`             — list stored files
//!   - `GET    /api/file/{filename}`   — download one file
//!   - `DELETE /api/file/{filename}`   — delete one file
//!
//! - **Streaming / relay**
//!   - `GET    /api/video`             — first video, full or byte range
//!   - `GET    /socket`                — WebSocket photo relay
//!
//! - **Static**
//!   - `GET    /uploads/{filename}`    — same as `/api/file/{filename}`, linked from listings
//!   - anything else falls back to the public web client directory

use crate::{
    handlers::{
        file_handlers::{delete_file, get_file, list_files, upload_file, upload_multipart},
        health_handlers::{healthz, readyz},
        relay_handlers::relay_socket,
        video_handlers::stream_video,
    },
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use std::path::Path;
use tower_http::{services::ServeDir, trace::TraceLayer};

/// Build the API router. The router carries `AppState` to all handlers.
pub fn routes() -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/api/upload", post(upload_file))
        .route("/api/upload/multipart", post(upload_multipart))
        .route("/api/files", get(list_files))
        .route("/api/file/{filename}", get(get_file).delete(delete_file))
        .route("/uploads/{filename}", get(get_file))
        .route("/api/video", get(stream_video))
        .route("/socket", get(relay_socket))
}

/// Build the complete application: API routes, the public web client,
/// request body limit and HTTP tracing.
pub fn app(state: AppState, public_dir: impl AsRef<Path>, max_body_bytes: usize) -> Router {
    let public = ServeDir::new(public_dir.as_ref());

    routes()
        .fallback_service(public)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{
            file::FileEntry,
            relay::{RECEIVE_PHOTO, RelayEvent, SEND_PHOTO},
            upload::{DeleteResponse, UploadResponse},
        },
        services::storage_service::{MAX_FILENAME_LEN, StorageService},
    };
    use axum::http::StatusCode;
    use axum_test::{
        TestServer,
        multipart::{MultipartForm, Part},
    };
    use base64::{Engine as _, engine::general_purpose};
    use serde_json::{Value, json};
    use std::time::Duration;
    use tempfile::TempDir;

    const BODY_LIMIT: usize = 10 * 1024 * 1024;

    struct TestApp {
        server: TestServer,
        state: AppState,
        storage: StorageService,
        _storage_dir: TempDir,
        _public_dir: TempDir,
    }

    async fn setup() -> TestApp {
        setup_with(BODY_LIMIT, false).await
    }

    /// `http_transport` binds a real listener, needed for WebSocket tests.
    async fn setup_with(max_body_bytes: usize, http_transport: bool) -> TestApp {
        let storage_dir = tempfile::tempdir().expect("storage dir");
        let public_dir = tempfile::tempdir().expect("public dir");
        std::fs::write(public_dir.path().join("index.html"), "<h1>relay</h1>").unwrap();

        let storage = StorageService::open(storage_dir.path())
            .await
            .expect("open storage");
        let state = AppState::new(storage.clone());
        let app = app(state.clone(), public_dir.path(), max_body_bytes);
        let server = if http_transport {
            TestServer::builder()
                .http_transport()
                .build(app)
                .expect("test server")
        } else {
            TestServer::new(app).expect("test server")
        };

        TestApp {
            server,
            state,
            storage,
            _storage_dir: storage_dir,
            _public_dir: public_dir,
        }
    }

    /// Poll until the relay registry holds `expected` clients.
    async fn wait_for_clients(state: &AppState, expected: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while state.relay.client_count().await != expected {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("relay client count never settled");
    }

    fn video_bytes(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[tokio::test]
    async fn upload_then_fetch_round_trips() {
        let app = setup().await;
        let payload = b"\x89PNG\r\n\x1a\nnot really a png";
        let encoded = general_purpose::STANDARD.encode(payload);

        let response = app
            .server
            .post("/api/upload")
            .json(&json!({
                "filename": "photo.png",
                "data": format!("data:image/png;base64,{}", encoded),
            }))
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let body: UploadResponse = response.json();
        assert!(body.success);
        assert_eq!(body.filename, "photo.png");

        let response = app.server.get("/api/file/photo.png").await;
        assert_eq!(response.status_code(), StatusCode::OK);
        assert_eq!(response.header("content-type"), "image/png");
        assert_eq!(response.as_bytes().as_ref(), payload);

        let response = app.server.get("/uploads/photo.png").await;
        assert_eq!(response.status_code(), StatusCode::OK);
        assert_eq!(response.as_bytes().as_ref(), payload);
    }

    #[tokio::test]
    async fn upload_without_fields_is_rejected() {
        let app = setup().await;

        for body in [
            json!({ "data": "aGVsbG8=" }),
            json!({ "filename": "a.txt" }),
            json!({ "filename": "", "data": "aGVsbG8=" }),
            json!({}),
        ] {
            let response = app.server.post("/api/upload").json(&body).await;
            assert_eq!(response.status_code(), StatusCode::BAD_REQUEST, "{body}");
            let error: Value = response.json();
            assert!(error["error"].is_string());
        }

        assert!(app.storage.list_files().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn upload_with_bad_base64_is_server_error() {
        let app = setup().await;
        let response = app
            .server
            .post("/api/upload")
            .json(&json!({ "filename": "a.txt", "data": "!!!" }))
            .await;
        assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        let error: Value = response.json();
        assert_eq!(error["error"], "invalid base64 payload");
        assert!(app.storage.list_files().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_includes_uploaded_files() {
        let app = setup().await;
        for name in ["b.jpg", "a.jpg"] {
            app.server
                .post("/api/upload")
                .json(&json!({ "filename": name, "data": "aGVsbG8=" }))
                .await;
        }

        let response = app.server.get("/api/files").await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let files: Vec<FileEntry> = response.json();
        assert_eq!(
            files,
            vec![
                FileEntry::new("a.jpg".into()),
                FileEntry::new("b.jpg".into())
            ]
        );
        assert_eq!(files[0].url, "/uploads/a.jpg");
    }

    #[tokio::test]
    async fn delete_then_fetch_is_not_found() {
        let app = setup().await;
        app.server
            .post("/api/upload")
            .json(&json!({ "filename": "gone.txt", "data": "aGVsbG8=" }))
            .await;

        let response = app.server.delete("/api/file/gone.txt").await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let body: DeleteResponse = response.json();
        assert!(body.success);

        let response = app.server.get("/api/file/gone.txt").await;
        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

        let response = app.server.delete("/api/file/gone.txt").await;
        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn traversal_names_are_forbidden() {
        let app = setup().await;

        let response = app.server.get("/api/file/..%2F..%2Fetc%2Fpasswd").await;
        assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

        let response = app.server.delete("/api/file/..%2F..%2Fetc%2Fpasswd").await;
        assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

        let response = app.server.get("/uploads/..%2F..%2Fetc%2Fpasswd").await;
        assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

        let response = app
            .server
            .post("/api/upload")
            .json(&json!({ "filename": "../escape.txt", "data": "aGVsbG8=" }))
            .await;
        assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

        let parent = app.storage.base_path.parent().unwrap();
        assert!(!parent.join("escape.txt").exists());
        assert!(app.storage.list_files().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn multipart_upload_prefixes_timestamp() {
        let app = setup().await;
        let form = MultipartForm::new().add_part(
            "file",
            Part::bytes(b"jpeg bytes".to_vec())
                .file_name("cat.jpg")
                .mime_type("image/jpeg"),
        );

        let response = app.server.post("/api/upload/multipart").multipart(form).await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let body: UploadResponse = response.json();
        let (millis, original) = body.filename.split_once('-').expect("timestamp prefix");
        assert!(millis.parse::<i64>().is_ok());
        assert_eq!(original, "cat.jpg");

        let response = app.server.get(&format!("/api/file/{}", body.filename)).await;
        assert_eq!(response.as_bytes().as_ref(), b"jpeg bytes");
    }

    #[tokio::test]
    async fn multipart_without_file_part_is_rejected() {
        let app = setup().await;
        let form = MultipartForm::new().add_text("note", "no file here");
        let response = app.server.post("/api/upload/multipart").multipart(form).await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn video_range_request_returns_partial_content() {
        let app = setup().await;
        let bytes = video_bytes(1000);
        app.storage
            .write_bytes("clip.mp4", bytes.clone().into())
            .await
            .unwrap();

        let response = app
            .server
            .get("/api/video")
            .add_header("Range", "bytes=0-99")
            .await;
        assert_eq!(response.status_code(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(response.header("content-range"), "bytes 0-99/1000");
        assert_eq!(response.header("accept-ranges"), "bytes");
        assert_eq!(response.header("content-type"), "video/mp4");
        assert_eq!(response.as_bytes().as_ref(), &bytes[..100]);

        let response = app
            .server
            .get("/api/video")
            .add_header("Range", "bytes=900-")
            .await;
        assert_eq!(response.status_code(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(response.header("content-range"), "bytes 900-999/1000");
        assert_eq!(response.as_bytes().as_ref(), &bytes[900..]);
    }

    #[tokio::test]
    async fn video_without_range_returns_full_file() {
        let app = setup().await;
        let bytes = video_bytes(1000);
        app.storage
            .write_bytes("clip.webm", bytes.clone().into())
            .await
            .unwrap();

        let response = app.server.get("/api/video").await;
        assert_eq!(response.status_code(), StatusCode::OK);
        assert_eq!(response.header("content-length"), "1000");
        assert_eq!(response.header("content-type"), "video/webm");
        assert_eq!(response.header("accept-ranges"), "bytes");
        assert_eq!(response.as_bytes().as_ref(), bytes.as_slice());
    }

    #[tokio::test]
    async fn video_errors() {
        let app = setup().await;
        let response = app.server.get("/api/video").await;
        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

        app.storage
            .write_bytes("clip.mov", video_bytes(10).into())
            .await
            .unwrap();
        let response = app
            .server
            .get("/api/video")
            .add_header("Range", "bytes=20-30")
            .await;
        assert_eq!(response.status_code(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(response.header("content-range"), "bytes */10");

        let response = app
            .server
            .get("/api/video")
            .add_header("Range", "pages=1")
            .await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn static_public_dir_and_probes() {
        let app = setup().await;
        let response = app.server.get("/index.html").await;
        assert_eq!(response.status_code(), StatusCode::OK);
        assert_eq!(response.text(), "<h1>relay</h1>");

        let response = app.server.get("/healthz").await;
        assert_eq!(response.status_code(), StatusCode::OK);

        let response = app.server.get("/readyz").await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["checks"]["disk"]["ok"], true);
        assert!(app.storage.list_files().await.unwrap().is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn uploads_route_refuses_symlink_out_of_root() {
        let app = setup().await;
        let outside = tempfile::tempdir().unwrap();
        let secret = outside.path().join("secret.txt");
        std::fs::write(&secret, "TOP-SECRET").unwrap();
        std::os::unix::fs::symlink(&secret, app.storage.base_path.join("link.txt")).unwrap();

        for url in ["/api/file/link.txt", "/uploads/link.txt"] {
            let response = app.server.get(url).await;
            assert_eq!(response.status_code(), StatusCode::FORBIDDEN, "{url}");
            assert!(!response.text().contains("TOP-SECRET"));
        }
    }

    #[tokio::test]
    async fn uploads_route_hides_in_flight_files() {
        let app = setup().await;
        std::fs::write(app.storage.base_path.join(".upload-inflight"), "partial").unwrap();

        let response = app.server.get("/uploads/.upload-inflight").await;
        assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
        assert!(!response.text().contains("partial"));
    }

    #[tokio::test]
    async fn listed_urls_fetch_names_with_reserved_characters() {
        let app = setup().await;
        let name = "100%25 off #1?.jpg";
        app.storage
            .write_bytes(name, b"discount".to_vec().into())
            .await
            .unwrap();

        let files: Vec<FileEntry> = app.server.get("/api/files").await.json();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, name);

        let response = app.server.get(&files[0].url).await;
        assert_eq!(response.status_code(), StatusCode::OK);
        assert_eq!(response.as_bytes().as_ref(), b"discount");
    }

    #[tokio::test]
    async fn body_limit_and_content_type_keep_their_status() {
        let app = setup_with(1024, false).await;

        let response = app
            .server
            .post("/api/upload")
            .json(&json!({ "filename": "big.bin", "data": "A".repeat(4096) }))
            .await;
        assert_eq!(response.status_code(), StatusCode::PAYLOAD_TOO_LARGE);

        let response = app.server.post("/api/upload").text("filename=a.txt").await;
        assert_eq!(response.status_code(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

        let response = app
            .server
            .post("/api/upload")
            .bytes(b"{ not json".as_slice().into())
            .content_type("application/json")
            .await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

        assert!(app.storage.list_files().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn multipart_long_original_name_is_shortened() {
        let app = setup().await;
        let original = format!("{}.jpg", "a".repeat(300));
        let form = MultipartForm::new().add_part(
            "file",
            Part::bytes(b"long".to_vec())
                .file_name(original)
                .mime_type("image/jpeg"),
        );

        let response = app.server.post("/api/upload/multipart").multipart(form).await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let body: UploadResponse = response.json();
        assert!(body.filename.len() <= MAX_FILENAME_LEN);
        assert!(body.filename.ends_with(".jpg"));

        let response = app.server.get(&format!("/api/file/{}", body.filename)).await;
        assert_eq!(response.as_bytes().as_ref(), b"long");
    }

    #[tokio::test]
    async fn websocket_clients_relay_photos_to_each_other() {
        let app = setup_with(BODY_LIMIT, true).await;

        let mut sender = app
            .server
            .get_websocket("/socket")
            .await
            .into_websocket()
            .await;
        let mut receiver = app
            .server
            .get_websocket("/socket")
            .await
            .into_websocket()
            .await;
        wait_for_clients(&app.state, 2).await;

        let photo = json!("data:image/png;base64,AAAA");
        sender
            .send_text(json!({ "event": SEND_PHOTO, "data": photo.clone() }).to_string())
            .await;

        let frame: RelayEvent = serde_json::from_str(&receiver.receive_text().await).unwrap();
        assert_eq!(frame, RelayEvent::new(RECEIVE_PHOTO, photo));

        let echoed =
            tokio::time::timeout(Duration::from_millis(200), sender.receive_text()).await;
        assert!(echoed.is_err(), "sender must not get its own photo back");

        drop(sender);
        wait_for_clients(&app.state, 1).await;
    }
}
