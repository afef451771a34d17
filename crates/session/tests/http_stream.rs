//! Full session against a local HTTP backend that streams NDJSON in small
//! chunks.

use std::net::SocketAddr;
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::body::Body;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use bytes::Bytes;
use futures_util::{StreamExt, stream};
use layers::Emphasis;
use scene::{LayerKind, RecordingSurface};
use serde_json::{Value, json};
use session::{RunStatus, SessionConfig, SessionController};
use streaming::SimulationRequest;

fn baseline_doc() -> Value {
    json!({
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "properties": {"name": "IVAN", "wind": 145},
             "geometry": {"type": "LineString", "coordinates": [[-75.0, 15.0], [-80.0, 20.0], [-85.0, 25.0]]}},
            {"type": "Feature", "properties": {"name": "IVAN-fix", "wind": 90},
             "geometry": {"type": "Point", "coordinates": [-85.0, 25.0]}}
        ]
    })
}

fn ndjson_body(user_input: &str) -> String {
    let lines = [
        json!({"status": "progress", "progress": 10, "message": format!("simulating: {user_input}")}),
        json!({"status": "oracle_analysis", "progress": 60, "message": "analyse terminée",
               "data": {"mechanism": "ocean cooling"}}),
        json!({"status": "complete", "result": {
            "lives_saved": 1200,
            "mitigated_data": {"type": "FeatureCollection", "features": [
                {"type": "Feature", "properties": {"wind": 70},
                 "geometry": {"type": "LineString", "coordinates": [[-75.0, 15.0], [-79.0, 21.0]]}}
            ]}
        }}),
    ];
    lines.iter().map(|l| format!("{l}\n")).collect()
}

async fn simulate(Json(req): Json<SimulationRequest>) -> Response {
    let body = ndjson_body(&req.user_input);
    let chunks: Vec<Bytes> = body
        .as_bytes()
        .chunks(7)
        .map(Bytes::copy_from_slice)
        .collect();
    let paced = stream::iter(chunks).then(|chunk| async move {
        tokio::time::sleep(Duration::from_millis(1)).await;
        Ok::<_, std::convert::Infallible>(chunk)
    });
    (
        [(header::CONTENT_TYPE, "application/x-ndjson")],
        Body::from_stream(paced),
    )
        .into_response()
}

async fn unavailable() -> Response {
    (StatusCode::SERVICE_UNAVAILABLE, "model warming up").into_response()
}

async fn baseline() -> Json<Value> {
    Json(baseline_doc())
}

async fn spawn_backend() -> SocketAddr {
    let app = Router::new()
        .route("/api/simulate/stream", post(simulate))
        .route("/api/unavailable", post(unavailable))
        .route("/data/baseline.geojson", get(baseline));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    addr
}

#[tokio::test]
async fn streams_a_run_and_synchronizes_both_layers() {
    let addr = spawn_backend().await;
    let config = SessionConfig {
        endpoint: format!("http://{addr}/api/simulate/stream"),
        baseline: Some(format!("http://{addr}/data/baseline.geojson")),
        ..SessionConfig::default()
    };
    let mut controller = SessionController::from_config(&config, RecordingSurface::new());
    let updates = controller.subscribe();

    let id = controller.run(SimulationRequest::new("cool the gulf", 1.0e9));
    controller.drive().await;

    let snap = controller.snapshot();
    assert_eq!(snap.session_id, Some(id));
    assert_eq!(snap.status, RunStatus::Succeeded);
    assert_eq!(snap.percent, 100.0);
    assert_eq!(snap.message, "analyse terminée");
    assert_eq!(snap.analysis, Some(json!({"mechanism": "ocean cooling"})));
    assert_eq!(snap.result.as_ref().map(|r| r["lives_saved"].clone()), Some(json!(1200)));
    assert_eq!(snap.malformed_frames, 0);
    assert_eq!(snap.baseline_entities, Some(2));
    assert_eq!(snap.mitigation_entities, Some(1));
    assert_eq!(snap.baseline_emphasis, Emphasis::Dimmed);
    assert_eq!(*updates.borrow(), snap);

    let surface = controller.surface();
    assert_eq!(surface.layer(LayerKind::Baseline).map(<[_]>::len), Some(2));
    assert_eq!(surface.layer(LayerKind::Mitigation).map(<[_]>::len), Some(1));
    assert!(surface.fly_count() >= 1);
}

#[tokio::test]
async fn request_body_reaches_the_backend() {
    let addr = spawn_backend().await;
    let config = SessionConfig {
        endpoint: format!("http://{addr}/api/simulate/stream"),
        ..SessionConfig::default()
    };
    let mut controller = SessionController::from_config(&config, RecordingSurface::new());
    controller.run(SimulationRequest::new("seed clouds", 5.0e8));

    // Opened, then the first progress frame.
    controller.step().await;
    controller.step().await;
    let snap = controller.snapshot();
    assert_eq!(snap.status, RunStatus::Running);
    assert_eq!(snap.percent, 10.0);
    assert_eq!(snap.message, "simulating: seed clouds");

    assert!(controller.cancel());
    controller.drive().await;
    assert_eq!(controller.status(), RunStatus::Cancelled);
    assert_eq!(controller.snapshot().percent, 10.0);
}

#[tokio::test]
async fn error_status_fails_the_run() {
    let addr = spawn_backend().await;
    let config = SessionConfig {
        endpoint: format!("http://{addr}/api/unavailable"),
        ..SessionConfig::default()
    };
    let mut controller = SessionController::from_config(&config, RecordingSurface::new());
    controller.run(SimulationRequest::new("anything", 0.0));
    controller.drive().await;

    let snap = controller.snapshot();
    assert_eq!(snap.status, RunStatus::Failed);
    let error = snap.error.expect("error text");
    assert!(error.contains("503"), "{error}");
    assert!(error.contains("model warming up"), "{error}");
    assert_eq!(snap.mitigation_entities, None);
}
