//! HttpSimulator against a local axum stub.
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{http::StatusCode, routing::get, routing::post, Json, Router};
use serde_json::{json, Value};

use schedwatch::types::{AddProcessRequest, ProcState, Workload};
use schedwatch::{Error, HttpSimulator, Monitor, MonitorConfig, Simulator};

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/api")
}

fn metrics() -> Value {
    json!({
        "cpu": 63.0,
        "running": true,
        "quantum_ms": 80,
        "processes": [
            {"pid": 1731000000001u64, "name": "db", "state": "running", "priority": 1, "cpu_burst": 0.4},
            {"pid": 1731000000002u64, "name": "batch", "state": "ready"}
        ],
        "bottlenecks": []
    })
}

#[tokio::test]
async fn fetch_decodes_partial_payload() {
    let base = serve(Router::new().route("/api/metrics", get(|| async { Json(metrics()) }))).await;
    let sim = HttpSimulator::new(&base, Duration::from_secs(2)).unwrap();
    let snap = sim.fetch().await.unwrap();
    assert!(snap.running);
    assert_eq!(snap.quantum_ms, 80);
    assert_eq!(snap.processes.len(), 2);
    assert_eq!(snap.processes[0].state, ProcState::Running);
    assert_eq!(snap.processes[1].effective_priority(), 5);
    assert!(snap.timeline.is_empty());
}

#[tokio::test]
async fn commands_post_to_their_endpoints() {
    let seen: Arc<Mutex<Vec<Value>>> = Arc::default();
    let sink = Arc::clone(&seen);
    let app = Router::new()
        .route("/api/start", post(|| async { StatusCode::OK }))
        .route("/api/stop", post(|| async { StatusCode::INTERNAL_SERVER_ERROR }))
        .route(
            "/api/add_process",
            post(move |Json(body): Json<Value>| {
                let sink = Arc::clone(&sink);
                async move {
                    sink.lock().unwrap().push(body);
                    Json(json!({"status": "added"}))
                }
            }),
        );
    let sim = HttpSimulator::new(&serve(app).await, Duration::from_secs(2)).unwrap();

    sim.start().await.unwrap();
    let err = sim.stop().await.unwrap_err();
    assert!(matches!(err, Error::Status { endpoint: "stop", status: 500 }));

    let req = AddProcessRequest::new(Some("editor"), Workload::Light, 2).unwrap();
    sim.add_process(&req).await.unwrap();
    sim.add_process(&AddProcessRequest::preset(Workload::Heavy))
        .await
        .unwrap();
    let bodies = seen.lock().unwrap().clone();
    assert_eq!(
        bodies,
        vec![
            json!({"name": "editor", "workload": "light", "priority": 2}),
            json!({"name": "heavy-batch", "workload": "heavy"}),
        ]
    );
}

#[tokio::test]
async fn bad_body_and_dead_server_are_distinct_errors() {
    let base = serve(Router::new().route("/api/metrics", get(|| async { "<html>oops</html>" }))).await;
    let sim = HttpSimulator::new(&base, Duration::from_secs(2)).unwrap();
    assert!(matches!(sim.fetch().await, Err(Error::Decode(_))));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let sim = HttpSimulator::new(&format!("http://{addr}/api"), Duration::from_secs(2)).unwrap();
    assert!(matches!(sim.fetch().await, Err(Error::Transport(_))));
}

#[tokio::test]
async fn monitor_over_http_publishes_view() {
    let base = serve(Router::new().route("/api/metrics", get(|| async { Json(metrics()) }))).await;
    let sim = HttpSimulator::new(&base, Duration::from_secs(2)).unwrap();
    let cfg = MonitorConfig {
        poll_interval: Duration::from_millis(50),
        ..Default::default()
    };
    let handle = Monitor::new(Arc::new(sim), cfg).spawn();
    let mut views = handle.subscribe();
    tokio::time::timeout(Duration::from_secs(5), views.changed())
        .await
        .expect("no view within 5s")
        .unwrap();

    let view = handle.current();
    assert_eq!(view.processes().len(), 2);
    assert_eq!(view.next_to_run().map(|p| p.entry.name.as_str()), Some("db"));
    assert_eq!(view.alerts()[0].detail, "System stable");
    handle.shutdown().await;
}
