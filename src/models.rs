// Wire models: upstream device records, published snapshots, inbound commands

use serde::{Deserialize, Serialize};

/// One entry of the upstream device list. Only the "client" role is tracked;
/// everything we do not read is left undeserialized.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub connection_status: Option<ConnectionStatus>,
}

impl Device {
    pub fn is_client(&self) -> bool {
        self.role.as_deref() == Some("client")
    }
}

/// Connectivity state of a device as reported by the telemetry API.
/// Loss counters are cumulative on the upstream side and may reset.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    #[serde(default)]
    pub served_by: Option<String>,
    #[serde(default)]
    pub downlink_payload_drop_count: u64,
    #[serde(default)]
    pub downlink_loss_count: u64,
    #[serde(default)]
    pub uplink_payload_drop_count: u64,
    #[serde(default)]
    pub uplink_loss_count: u64,
}

impl ConnectionStatus {
    /// Raw cumulative downlink loss: payload drops plus loss events.
    pub fn downlink_raw(&self) -> u64 {
        self.downlink_payload_drop_count + self.downlink_loss_count
    }

    /// Raw cumulative uplink loss: payload drops plus loss events.
    pub fn uplink_raw(&self) -> u64 {
        self.uplink_payload_drop_count + self.uplink_loss_count
    }
}

/// Published metrics snapshot. Field names match the original wire format
/// consumed by the dashboard (mixed casing is deliberate).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MetricsSnapshot {
    #[serde(rename = "servedBy")]
    pub served_by: String,
    #[serde(rename = "roamingCount")]
    pub roaming_count: u64,
    pub uptime: String,
    pub packet_losses_dl: u64,
    pub packet_losses_ul: u64,
}

/// Inbound subscriber command; anything that does not decode to one of these
/// is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "command", rename_all = "lowercase")]
pub enum ClientCommand {
    Reset,
}

/// Access-point id -> display label. Ids without an entry pass through as
/// their own label, so adding an AP is a data change here.
const AP_LABELS: &[(&str, &str)] = &[
    ("AXX000004", "1. Obergeschoss"),
    ("AXX000003", "3. Obergeschoss"),
];

pub fn ap_display_label(id: &str) -> &str {
    AP_LABELS
        .iter()
        .find(|(ap, _)| *ap == id)
        .map(|(_, label)| *label)
        .unwrap_or(id)
}
