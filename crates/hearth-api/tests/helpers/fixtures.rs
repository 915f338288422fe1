//! Upstream feed stub: a tiny HTTP server handing out image bytes, so the
//! mirror pipeline has something real to download in tests.

use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tokio::task::JoinHandle;

/// Minimal JFIF header bytes; enough to look like a JPEG payload.
pub const JPEG_BYTES: &[u8] = &[
    0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46, 0x00, 0x01, 0xFF, 0xD9,
];

async fn serve_jpeg() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "image/jpeg")], JPEG_BYTES)
}

async fn serve_missing() -> impl IntoResponse {
    StatusCode::NOT_FOUND
}

/// Start a stub upstream on an ephemeral port. URLs under `/ok/` return JPEG
/// bytes; URLs under `/missing/` return 404. Returns the base URL.
pub async fn spawn_upstream_stub() -> String {
    let (base_url, _handle) = spawn_upstream_stub_with_handle().await;
    base_url
}

/// Like [`spawn_upstream_stub`], but also returns the server task handle so a
/// test can abort it and exercise the dead-upstream path.
pub async fn spawn_upstream_stub_with_handle() -> (String, JoinHandle<()>) {
    let app = Router::new()
        .route("/ok/{name}", get(serve_jpeg))
        .route("/missing/{name}", get(serve_missing));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind upstream stub");
    let addr = listener.local_addr().expect("Failed to read stub address");

    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .await
            .expect("Upstream stub server failed");
    });

    (format!("http://{}", addr), handle)
}
