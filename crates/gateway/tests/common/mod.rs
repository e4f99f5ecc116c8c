//! In-process mock of the inspection backend.
//!
//! Serves the routes the gateway calls on `127.0.0.1:0`, counts hits per
//! route and records the multipart fields of analyze uploads.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::ws::{Message, WebSocketUpgrade};
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::{stream, StreamExt};
use serde::Deserialize;
use serde_json::json;

use inspecta_gateway::{BackendApi, GatewayPolicies};

#[derive(Default)]
pub struct MockBackend {
    pub verify_hits: AtomicU32,
    pub identity_hits: AtomicU32,
    pub history_hits: AtomicU32,
    pub analyze_hits: AtomicU32,
    pub finalize_hits: AtomicU32,
    pub health_hits: AtomicU32,
    /// Leading analyze calls answered with 500.
    pub analyze_failures: AtomicU32,
    pub health_delay_ms: AtomicU64,
    pub report_hits: AtomicU32,
    /// Pause between the first and second chunk of the report body.
    pub report_stall_ms: AtomicU64,
    pub analyze_fields: Mutex<Vec<(String, String)>>,
    pub finalize_fields: Mutex<Vec<(String, String)>>,
    /// When set, the session socket pushes `session:aborted` with it.
    pub abort_reason: Mutex<Option<String>>,
}

impl MockBackend {
    pub fn hits(counter: &AtomicU32) -> u32 {
        counter.load(Ordering::SeqCst)
    }

    pub fn field(&self, name: &str) -> Option<String> {
        self.analyze_fields
            .lock()
            .unwrap()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    }
}

/// Start the mock backend and return its base URL.
pub async fn spawn(mock: Arc<MockBackend>) -> String {
    let app = Router::new()
        .route("/model/info", get(model_info))
        .route("/health", get(health))
        .route("/inspection/verify", get(verify_vehicle))
        .route("/identity/verify", post(verify_identity))
        .route("/vehicle/history", get(vehicle_history))
        .route("/inspection/analyze", post(analyze))
        .route("/inspection/finalize", post(finalize))
        .route("/inspection/report/{id}/pdf", get(report_pdf))
        .route("/ws/inspection/{session_id}", get(session_ws))
        .with_state(mock);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// Client with production budgets but a 1 ms backoff base.
pub fn fast_api(base_url: &str) -> BackendApi {
    BackendApi::new(base_url)
        .with_policies(GatewayPolicies::default().with_base_delay(Duration::from_millis(1)))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct PlateQuery {
    plate: String,
}

async fn model_info() -> Json<serde_json::Value> {
    Json(json!({"version": "1.4.0", "build": "42", "commit": "abc"}))
}

async fn health(State(mock): State<Arc<MockBackend>>) -> Json<serde_json::Value> {
    mock.health_hits.fetch_add(1, Ordering::SeqCst);
    let delay = mock.health_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    Json(json!({
        "status": "ok",
        "quality_thresholds": {"very_blur_below": 40.0, "blur_below": 90.0, "warn_below": 140.0},
        "pdf_enabled": true
    }))
}

async fn verify_vehicle(
    State(mock): State<Arc<MockBackend>>,
    Query(q): Query<PlateQuery>,
) -> Json<serde_json::Value> {
    mock.verify_hits.fetch_add(1, Ordering::SeqCst);
    if q.plate == "ZZZ999" {
        return Json(json!({"found": false}));
    }
    Json(json!({
        "found": true,
        "data": {"plate": q.plate, "brand": "Mazda", "model": "3", "year": "2019", "id": "12345"}
    }))
}

#[derive(Deserialize)]
struct IdentityBody {
    name: String,
    document: String,
}

async fn verify_identity(
    State(mock): State<Arc<MockBackend>>,
    Json(body): Json<IdentityBody>,
) -> Json<serde_json::Value> {
    mock.identity_hits.fetch_add(1, Ordering::SeqCst);
    let valid = body.document == "12345";
    Json(json!({"valid": valid, "matched_driver": if valid { json!({"name": body.name}) } else { json!(null) }}))
}

async fn vehicle_history(
    State(mock): State<Arc<MockBackend>>,
    Query(q): Query<PlateQuery>,
) -> Json<serde_json::Value> {
    mock.history_hits.fetch_add(1, Ordering::SeqCst);
    Json(json!({"plate": q.plate, "infractions": 2, "previous_owners": 1, "tech_ok": true}))
}

async fn read_fields(mut multipart: Multipart) -> Vec<(String, String)> {
    let mut fields = Vec::new();
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        let value = match field.file_name().map(str::to_string) {
            Some(file_name) => {
                let _ = field.bytes().await;
                file_name
            }
            None => field.text().await.unwrap_or_default(),
        };
        fields.push((name, value));
    }
    fields
}

async fn analyze(State(mock): State<Arc<MockBackend>>, multipart: Multipart) -> Response {
    let hit = mock.analyze_hits.fetch_add(1, Ordering::SeqCst) + 1;
    let fields = read_fields(multipart).await;
    *mock.analyze_fields.lock().unwrap() = fields;

    if hit <= mock.analyze_failures.load(Ordering::SeqCst) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "detector crashed").into_response();
    }
    Json(json!({
        "session_id": mock.field("session_id"),
        "damage": [{"label": "dent", "confidence": 0.81, "box": [1.0, 2.0, 30.0, 40.0]}],
        "quality_status": "ok",
        "images_in_session": hit,
        "preproc_metrics": {"laplacian_var": 210.5}
    }))
    .into_response()
}

async fn finalize(State(mock): State<Arc<MockBackend>>, multipart: Multipart) -> Json<serde_json::Value> {
    mock.finalize_hits.fetch_add(1, Ordering::SeqCst);
    let fields = read_fields(multipart).await;
    let session_id = fields
        .iter()
        .find(|(n, _)| n == "session_id")
        .map(|(_, v)| v.clone());
    *mock.finalize_fields.lock().unwrap() = fields;
    Json(json!({
        "inspection_id": "insp-77",
        "session_id": session_id,
        "status": "approved",
        "verdict": {"status": "approved", "reasons": []}
    }))
}

async fn report_pdf(Path(id): Path<String>, State(mock): State<Arc<MockBackend>>) -> Response {
    mock.report_hits.fetch_add(1, Ordering::SeqCst);
    if id == "missing" {
        return (StatusCode::NOT_FOUND, "no such report").into_response();
    }
    let stall = mock.report_stall_ms.load(Ordering::SeqCst);
    if stall == 0 {
        return b"%PDF-1.4 mock".to_vec().into_response();
    }
    // Headers go out with the first chunk; the rest of the body stalls.
    let chunks = stream::iter([&b"%PDF-1.4"[..], &b" mock"[..]]).enumerate().then(
        move |(i, chunk)| async move {
            if i > 0 {
                tokio::time::sleep(Duration::from_millis(stall)).await;
            }
            Ok::<_, std::io::Error>(Bytes::from_static(chunk))
        },
    );
    Body::from_stream(chunks).into_response()
}

async fn session_ws(
    ws: WebSocketUpgrade,
    Path(session_id): Path<String>,
    State(mock): State<Arc<MockBackend>>,
) -> Response {
    let reason = mock.abort_reason.lock().unwrap().clone();
    ws.on_upgrade(move |mut socket| async move {
        let start = json!({"event": "analyze:start", "session_id": session_id}).to_string();
        let _ = socket.send(Message::Text(start.into())).await;
        if let Some(reason) = reason {
            let aborted = json!({"event": "session:aborted", "reason": reason}).to_string();
            let _ = socket.send(Message::Text(aborted.into())).await;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    })
}
