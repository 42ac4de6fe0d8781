use anyhow::Result;
use roamwatch::*;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = config::AppConfig::load()?;
    let (tx, _) =
        broadcast::channel::<models::MetricsSnapshot>(app_config.publishing.broadcast_capacity);

    let device_repo = Arc::new(device_repo::DeviceRepo::connect(
        &app_config.telemetry.endpoint,
        std::time::Duration::from_millis(app_config.telemetry.request_timeout_ms),
    )?);
    let metrics = Arc::new(Mutex::new(metrics::MetricsState::new()));
    let ws_connections = Arc::new(AtomicUsize::new(0));

    let (poller_shutdown_tx, poller_shutdown_rx) = tokio::sync::oneshot::channel();
    let poller_handle = worker::spawn(
        worker::PollerDeps {
            device_repo: device_repo.clone(),
            metrics: metrics.clone(),
            tx: tx.clone(),
            ws_connections: ws_connections.clone(),
            shutdown_rx: poller_shutdown_rx,
        },
        worker::PollerConfig {
            poll_interval_ms: app_config.telemetry.poll_interval_ms,
            policy: app_config.aggregation.policy,
            stats_log_interval_secs: app_config.monitoring.stats_log_interval_secs,
        },
    );

    let mut aggregation = None;
    if app_config.aggregation.policy == config::PublishPolicy::Windowed {
        let (agg_shutdown_tx, agg_shutdown_rx) = tokio::sync::oneshot::channel();
        let handle = aggregation_worker::spawn(
            metrics.clone(),
            tx.clone(),
            aggregation_worker::AggregationWorkerConfig {
                window_interval_ms: app_config.aggregation.window_interval_ms,
            },
            agg_shutdown_rx,
        );
        aggregation = Some((agg_shutdown_tx, handle));
    }

    let app = routes::app(tx, metrics, ws_connections);
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);

    let in_container = std::path::Path::new("/.dockerenv").exists()
        || std::env::var("CONTAINER").as_deref() == Ok("1");

    if in_container {
        // In Docker: run server until error or SIGTERM (no signal handler; avoids immediate exit)
        axum::serve(listener, app).await?;
    } else {
        tokio::select! {
            result = axum::serve(listener, app) => {
                result?;
            }
            _ = async {
                #[cfg(unix)]
                {
                    let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                        Ok(s) => s,
                        Err(_) => {
                            let _ = tokio::signal::ctrl_c().await;
                            return;
                        }
                    };
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => {}
                        _ = sigterm.recv() => {}
                    }
                }
                #[cfg(not(unix))]
                {
                    tokio::signal::ctrl_c().await
                }
            } => {
                tracing::info!("Received shutdown signal");
                let _ = poller_shutdown_tx.send(());
                let _ = poller_handle.await;
                if let Some((agg_shutdown_tx, agg_handle)) = aggregation {
                    let _ = agg_shutdown_tx.send(());
                    let _ = agg_handle.await;
                }
            }
        }
    }

    Ok(())
}
