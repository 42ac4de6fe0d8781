// Upstream telemetry API client (device list endpoint)

use std::time::Duration;

use crate::models::Device;

/// Why a poll cycle failed. Every variant is recoverable; the poller logs
/// and moves on to the next tick.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(reqwest::StatusCode),
    #[error("undecodable body (expected a JSON device list): {0}")]
    Decode(#[from] serde_json::Error),
}

pub struct DeviceRepo {
    client: reqwest::Client,
    endpoint: String,
}

impl DeviceRepo {
    pub fn connect(endpoint: &str, request_timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }

    /// One GET against the device-list endpoint. A non-2xx status, a body
    /// that is not JSON, or a top-level shape other than a list all come
    /// back as errors; the caller treats them identically (skip the cycle).
    pub async fn fetch_devices(&self) -> Result<Vec<Device>, FetchError> {
        let response = self.client.get(&self.endpoint).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }
        let body = response.text().await?;
        let devices: Vec<Device> = serde_json::from_str(&body)?;
        Ok(devices)
    }
}
