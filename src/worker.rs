// Background poll worker: fetch the device list, fold the client device's
// connectivity state into the shared metrics, and (immediate policy) publish.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;

use tokio::sync::broadcast;
use tokio::time::{Duration, Instant, interval};

use crate::config::PublishPolicy;
use crate::device_repo::DeviceRepo;
use crate::metrics::MetricsState;
use crate::models::MetricsSnapshot;

/// Rate limit for "no receivers" logging (avoid a line per poll when no one
/// is on /ws/metrics)
const NO_RECEIVERS_LOG_INTERVAL: Duration = Duration::from_secs(60);

/// Repos, shared state, channels, and shutdown for the poll worker.
pub struct PollerDeps {
    pub device_repo: Arc<DeviceRepo>,
    pub metrics: Arc<Mutex<MetricsState>>,
    pub tx: broadcast::Sender<MetricsSnapshot>,
    pub ws_connections: Arc<AtomicUsize>,
    pub shutdown_rx: tokio::sync::oneshot::Receiver<()>,
}

/// Poll worker timing and policy config.
pub struct PollerConfig {
    pub poll_interval_ms: u64,
    pub policy: PublishPolicy,
    /// How often to log app stats (real seconds).
    pub stats_log_interval_secs: u64,
}

pub fn spawn(deps: PollerDeps, config: PollerConfig) -> tokio::task::JoinHandle<()> {
    let PollerDeps {
        device_repo,
        metrics,
        tx,
        ws_connections,
        mut shutdown_rx,
    } = deps;
    let PollerConfig {
        poll_interval_ms,
        policy,
        stats_log_interval_secs,
    } = config;

    tokio::spawn(async move {
        let mut tick = interval(Duration::from_millis(poll_interval_ms));
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut stats_log_tick = interval(Duration::from_secs(stats_log_interval_secs));
        stats_log_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let mut polls_ok: u64 = 0;
        let mut polls_failed: u64 = 0;
        let mut snapshots_published: u64 = 0;
        let mut last_no_receivers_log: Option<Instant> = None;

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    // The tick throttles every cycle, failures included, so a
                    // persistently broken upstream never turns into a hot loop.
                    let devices = match device_repo.fetch_devices().await {
                        Ok(d) => d,
                        Err(e) => {
                            polls_failed += 1;
                            tracing::warn!(
                                error = %e,
                                operation = "fetch_devices",
                                "poll cycle failed"
                            );
                            continue;
                        }
                    };

                    let Some(client) = devices.iter().find(|d| d.is_client()) else {
                        polls_failed += 1;
                        tracing::warn!(operation = "select_client", "client device not found");
                        continue;
                    };
                    let Some(status) = client.connection_status.as_ref() else {
                        polls_failed += 1;
                        tracing::warn!(
                            operation = "select_client",
                            "client device missing connectionStatus"
                        );
                        continue;
                    };

                    let mut state = match metrics.lock() {
                        Ok(s) => s,
                        Err(e) => {
                            tracing::warn!(error = %e, "metrics lock poisoned");
                            continue;
                        }
                    };
                    state.record_loss_counters(status.downlink_raw(), status.uplink_raw());

                    let mut publish: Option<MetricsSnapshot> = None;
                    if let Some(served_by) = status.served_by.as_deref() {
                        match policy {
                            PublishPolicy::Immediate => {
                                if state.apply_serving_ap(served_by) {
                                    tracing::info!(
                                        served_by,
                                        roaming_count = state.roaming_count,
                                        "roaming event"
                                    );
                                }
                                publish = Some(state.snapshot());
                            }
                            PublishPolicy::Windowed => state.push_sample(served_by),
                        }
                    }
                    drop(state);
                    polls_ok += 1;

                    if let Some(snapshot) = publish {
                        if tx.send(snapshot).is_err() {
                            let should_log = last_no_receivers_log
                                .is_none_or(|t| t.elapsed() >= NO_RECEIVERS_LOG_INTERVAL);
                            if should_log {
                                tracing::debug!(
                                    operation = "broadcast_snapshot",
                                    "No active WebSocket clients; broadcast channel has no receivers"
                                );
                                last_no_receivers_log = Some(Instant::now());
                            }
                        } else {
                            snapshots_published += 1;
                        }
                    }
                }
                _ = &mut shutdown_rx => {
                    tracing::debug!("Poll worker shutting down");
                    break;
                }
                _ = stats_log_tick.tick() => {
                    tracing::info!(
                        ws_clients =
                            ws_connections.load(std::sync::atomic::Ordering::Relaxed),
                        polls_ok,
                        polls_failed,
                        snapshots_published,
                        "app stats"
                    );
                }
            }
        }
    })
}
