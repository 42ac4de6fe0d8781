// Poll worker integration tests: run the poller against a local server
// standing in for the telemetry API, then shut it down and inspect state.

use axum::{Router, routing::get};
use roamwatch::config::PublishPolicy;
use roamwatch::device_repo::DeviceRepo;
use roamwatch::metrics::MetricsState;
use roamwatch::worker::{PollerConfig, PollerDeps, spawn};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::time::Duration;
use tokio::sync::broadcast;

const DEVICES_BODY: &str = r#"[
    {"role": "gateway"},
    {"role": "client", "connectionStatus": {
        "servedBy": "AXX000003",
        "downlinkPayloadDropCount": 3,
        "downlinkLossCount": 2,
        "uplinkPayloadDropCount": 1,
        "uplinkLossCount": 0
    }}
]"#;

/// Serves a fixed body on /api/devices from an ephemeral port.
async fn spawn_upstream(body: &'static str) -> String {
    let app = Router::new().route("/api/devices", get(move || async move { body }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}/api/devices")
}

fn spawn_poller(
    endpoint: &str,
    policy: PublishPolicy,
) -> (
    Arc<Mutex<MetricsState>>,
    broadcast::Receiver<roamwatch::models::MetricsSnapshot>,
    tokio::sync::oneshot::Sender<()>,
    tokio::task::JoinHandle<()>,
) {
    let device_repo =
        Arc::new(DeviceRepo::connect(endpoint, Duration::from_secs(2)).expect("client"));
    let metrics = Arc::new(Mutex::new(MetricsState::new()));
    let (tx, rx) = broadcast::channel(16);
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let handle = spawn(
        PollerDeps {
            device_repo,
            metrics: metrics.clone(),
            tx,
            ws_connections: Arc::new(AtomicUsize::new(0)),
            shutdown_rx,
        },
        PollerConfig {
            poll_interval_ms: 25,
            policy,
            stats_log_interval_secs: 3600,
        },
    );
    (metrics, rx, shutdown_tx, handle)
}

#[tokio::test]
async fn immediate_policy_updates_state_and_publishes() {
    let endpoint = spawn_upstream(DEVICES_BODY).await;
    let (metrics, mut rx, shutdown_tx, handle) = spawn_poller(&endpoint, PublishPolicy::Immediate);

    let snapshot = tokio::time::timeout(Duration::from_secs(3), rx.recv())
        .await
        .expect("snapshot within deadline")
        .expect("broadcast open");
    assert_eq!(snapshot.served_by, "3. Obergeschoss");
    assert_eq!(snapshot.roaming_count, 0);
    assert_eq!(snapshot.packet_losses_dl, 0);

    let _ = shutdown_tx.send(());
    handle.await.unwrap();

    let state = metrics.lock().unwrap();
    assert_eq!(state.last_served_by.as_deref(), Some("AXX000003"));
    // constant raw counters: baseline on the first poll, zero deltas after
    assert_eq!(state.packet_losses_dl, 0);
    assert_eq!(state.packet_losses_ul, 0);
}

#[tokio::test]
async fn windowed_policy_collects_samples_without_publishing() {
    let endpoint = spawn_upstream(DEVICES_BODY).await;
    let (metrics, mut rx, shutdown_tx, handle) = spawn_poller(&endpoint, PublishPolicy::Windowed);

    tokio::time::sleep(Duration::from_millis(200)).await;
    let _ = shutdown_tx.send(());
    handle.await.unwrap();

    let state = metrics.lock().unwrap();
    assert!(!state.window.is_empty(), "poller should have buffered samples");
    assert!(state.window.iter().all(|s| s == "AXX000003"));
    // resolution and publishing belong to the aggregation worker
    assert_eq!(state.last_served_by, None);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn non_json_body_leaves_state_untouched_and_loop_alive() {
    let endpoint = spawn_upstream("this is not json").await;
    let (metrics, _rx, shutdown_tx, handle) = spawn_poller(&endpoint, PublishPolicy::Immediate);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!handle.is_finished(), "poll loop must survive bad bodies");

    let _ = shutdown_tx.send(());
    handle.await.unwrap();

    let state = metrics.lock().unwrap();
    assert_eq!(state.last_served_by, None);
    assert_eq!(state.packet_losses_dl, 0);
    assert_eq!(state.packet_losses_ul, 0);
}

#[tokio::test]
async fn json_object_instead_of_list_is_a_skipped_cycle() {
    let endpoint = spawn_upstream(r#"{"devices": []}"#).await;
    let (metrics, _rx, shutdown_tx, handle) = spawn_poller(&endpoint, PublishPolicy::Immediate);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!handle.is_finished());

    let _ = shutdown_tx.send(());
    handle.await.unwrap();
    assert_eq!(metrics.lock().unwrap().last_served_by, None);
}

#[tokio::test]
async fn missing_client_device_is_a_skipped_cycle() {
    let endpoint = spawn_upstream(r#"[{"role": "gateway"}]"#).await;
    let (metrics, _rx, shutdown_tx, handle) = spawn_poller(&endpoint, PublishPolicy::Immediate);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!handle.is_finished());

    let _ = shutdown_tx.send(());
    handle.await.unwrap();
    assert_eq!(metrics.lock().unwrap().last_served_by, None);
}

#[tokio::test]
async fn unreachable_upstream_is_a_skipped_cycle() {
    // nothing listens here; connect fails every tick
    let (metrics, _rx, shutdown_tx, handle) =
        spawn_poller("http://127.0.0.1:1/api/devices", PublishPolicy::Immediate);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!handle.is_finished(), "poll loop must survive transport errors");

    let _ = shutdown_tx.send(());
    handle.await.unwrap();
    assert_eq!(metrics.lock().unwrap().last_served_by, None);
}
