// Window aggregation worker (windowed policy): every window interval,
// resolve the majority serving AP from the samples the poller collected,
// apply the roaming transition, and broadcast a snapshot.

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};

use crate::metrics::MetricsState;
use crate::models::MetricsSnapshot;

/// Config for the aggregation worker.
#[derive(Debug, Clone)]
pub struct AggregationWorkerConfig {
    pub window_interval_ms: u64,
}

/// Spawns the aggregation worker. Returns a join handle.
pub fn spawn(
    metrics: Arc<Mutex<MetricsState>>,
    tx: broadcast::Sender<MetricsSnapshot>,
    config: AggregationWorkerConfig,
    shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        run(metrics, tx, config, shutdown_rx).await;
    })
}

#[instrument(skip(metrics, tx, shutdown_rx), fields(window_interval_ms = config.window_interval_ms))]
async fn run(
    metrics: Arc<Mutex<MetricsState>>,
    tx: broadcast::Sender<MetricsSnapshot>,
    config: AggregationWorkerConfig,
    mut shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) {
    let mut window_tick =
        tokio::time::interval(Duration::from_millis(config.window_interval_ms));
    window_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = window_tick.tick() => {
                if let Some(snapshot) = run_one_tick(&metrics) {
                    // Send errors just mean no subscribers right now.
                    let _ = tx.send(snapshot);
                }
            }
            _ = &mut shutdown_rx => {
                debug!("Aggregation worker shutting down");
                break;
            }
        }
    }
}

/// Runs one aggregation pass: resolve the window, update roaming state, and
/// build a snapshot. An empty window skips the whole pass (no publish, no
/// state change).
pub fn run_one_tick(metrics: &Mutex<MetricsState>) -> Option<MetricsSnapshot> {
    let mut state = match metrics.lock() {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "metrics lock poisoned");
            return None;
        }
    };
    let Some(resolved) = state.resolve_and_clear_window() else {
        debug!("no samples collected in this window");
        return None;
    };
    if state.apply_serving_ap(&resolved) {
        info!(
            served_by = %resolved,
            roaming_count = state.roaming_count,
            "roaming event"
        );
    }
    Some(state.snapshot())
}
