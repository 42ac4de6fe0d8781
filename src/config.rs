use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub aggregation: AggregationConfig,
    pub publishing: PublishingConfig,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    /// Upstream device-list endpoint, e.g. "http://10.5.0.1/api/devices".
    pub endpoint: String,
    pub poll_interval_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_request_timeout_ms() -> u64 {
    5_000
}

/// Snapshot publishing policy: broadcast after every successful poll, or
/// collect serving-AP samples and publish a majority-vote resolution on a
/// separate timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishPolicy {
    Immediate,
    Windowed,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AggregationConfig {
    pub policy: PublishPolicy,
    /// Sample-window length for the windowed policy; must exceed the poll interval.
    #[serde(default = "default_window_interval_ms")]
    pub window_interval_ms: u64,
}

fn default_window_interval_ms() -> u64 {
    2_000
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublishingConfig {
    /// Max number of snapshots kept in the broadcast channel for /ws/metrics (slow clients may lag).
    pub broadcast_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    /// How often to log app stats (ws clients, polls ok/failed, snapshots published) at INFO level.
    pub stats_log_interval_secs: u64,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(
            !self.telemetry.endpoint.is_empty(),
            "telemetry.endpoint must be non-empty"
        );
        anyhow::ensure!(
            self.telemetry.poll_interval_ms > 0,
            "telemetry.poll_interval_ms must be > 0, got {}",
            self.telemetry.poll_interval_ms
        );
        anyhow::ensure!(
            self.telemetry.request_timeout_ms > 0,
            "telemetry.request_timeout_ms must be > 0, got {}",
            self.telemetry.request_timeout_ms
        );
        if self.aggregation.policy == PublishPolicy::Windowed {
            anyhow::ensure!(
                self.aggregation.window_interval_ms > self.telemetry.poll_interval_ms,
                "aggregation.window_interval_ms must exceed telemetry.poll_interval_ms, got {} <= {}",
                self.aggregation.window_interval_ms,
                self.telemetry.poll_interval_ms
            );
        }
        anyhow::ensure!(
            self.publishing.broadcast_capacity > 0,
            "publishing.broadcast_capacity must be > 0, got {}",
            self.publishing.broadcast_capacity
        );
        anyhow::ensure!(
            self.monitoring.stats_log_interval_secs > 0,
            "monitoring.stats_log_interval_secs must be > 0, got {}",
            self.monitoring.stats_log_interval_secs
        );
        Ok(())
    }
}
