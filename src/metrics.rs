// Shared metrics state: roaming transitions, cumulative loss deltas, uptime.
// All mutation happens under one Mutex; critical sections never await.

use std::time::Instant;

use crate::models::{MetricsSnapshot, ap_display_label};

/// Rolling metrics for the tracked client device. One instance per process,
/// shared as `Arc<Mutex<MetricsState>>` between the poller, the aggregation
/// worker and the WebSocket handlers.
#[derive(Debug)]
pub struct MetricsState {
    pub start_time: Instant,
    pub roaming_count: u64,
    pub last_served_by: Option<String>,
    pub packet_losses_dl: u64,
    pub packet_losses_ul: u64,
    prev_raw_dl: Option<u64>,
    prev_raw_ul: Option<u64>,
    /// Serving-AP samples since the last publish (windowed policy only).
    pub window: Vec<String>,
}

impl Default for MetricsState {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsState {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            roaming_count: 0,
            last_served_by: None,
            packet_losses_dl: 0,
            packet_losses_ul: 0,
            prev_raw_dl: None,
            prev_raw_ul: None,
            window: Vec::new(),
        }
    }

    /// Folds one poll's raw cumulative loss counters into the running totals.
    /// The first read establishes the baseline (delta 0); upstream counter
    /// resets show up as a decreasing raw value and are clamped to a zero
    /// delta rather than subtracted.
    pub fn record_loss_counters(&mut self, raw_dl: u64, raw_ul: u64) {
        if let Some(prev) = self.prev_raw_dl {
            self.packet_losses_dl += raw_dl.saturating_sub(prev);
        }
        if let Some(prev) = self.prev_raw_ul {
            self.packet_losses_ul += raw_ul.saturating_sub(prev);
        }
        self.prev_raw_dl = Some(raw_dl);
        self.prev_raw_ul = Some(raw_ul);
    }

    /// Applies a resolved serving AP. Counts a roaming event only on a
    /// transition between two known APs; the first observation after start
    /// or reset just establishes the baseline. Returns true on a transition.
    pub fn apply_serving_ap(&mut self, served_by: &str) -> bool {
        let roamed = self
            .last_served_by
            .as_deref()
            .is_some_and(|last| last != served_by);
        if roamed {
            self.roaming_count += 1;
        }
        if self.last_served_by.as_deref() != Some(served_by) {
            self.last_served_by = Some(served_by.to_string());
        }
        roamed
    }

    /// Appends one serving-AP sample to the current window.
    pub fn push_sample(&mut self, served_by: &str) {
        self.window.push(served_by.to_string());
    }

    /// Resolves the window's majority serving AP and clears the window.
    /// Ties break toward the value seen first in the window; an empty window
    /// yields None and stays a no-op.
    pub fn resolve_and_clear_window(&mut self) -> Option<String> {
        if self.window.is_empty() {
            return None;
        }
        let mut counts: Vec<(&str, usize)> = Vec::new();
        for sample in &self.window {
            match counts.iter_mut().find(|(id, _)| *id == sample.as_str()) {
                Some((_, n)) => *n += 1,
                None => counts.push((sample.as_str(), 1)),
            }
        }
        let mut best = counts[0];
        for candidate in &counts[1..] {
            if candidate.1 > best.1 {
                best = *candidate;
            }
        }
        let resolved = best.0.to_string();
        self.window.clear();
        Some(resolved)
    }

    /// Reset command: uptime restarts, roaming and loss totals zero out.
    /// `last_served_by` clears too, so the next resolved AP is a fresh
    /// baseline instead of a spurious roaming event. The raw-counter
    /// baselines are kept: the next delta stays a genuine per-poll delta.
    pub fn reset(&mut self) {
        self.start_time = Instant::now();
        self.roaming_count = 0;
        self.packet_losses_dl = 0;
        self.packet_losses_ul = 0;
        self.last_served_by = None;
        self.window.clear();
    }

    /// Builds the publishable view of the current state.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let served_by = self
            .last_served_by
            .as_deref()
            .map(ap_display_label)
            .unwrap_or("unknown");
        MetricsSnapshot {
            served_by: served_by.to_string(),
            roaming_count: self.roaming_count,
            uptime: format_uptime(self.start_time.elapsed().as_secs()),
            packet_losses_dl: self.packet_losses_dl,
            packet_losses_ul: self.packet_losses_ul,
        }
    }
}

/// Formats whole elapsed seconds as "X d   Y h   Z min" (non-breaking space
/// between value and unit, as the dashboard expects). Seconds are truncated,
/// not rounded.
pub fn format_uptime(uptime_seconds: u64) -> String {
    let days = uptime_seconds / (3600 * 24);
    let hours = (uptime_seconds % (3600 * 24)) / 3600;
    let minutes = (uptime_seconds % 3600) / 60;
    format!("{days}\u{a0}d   {hours}\u{a0}h   {minutes}\u{a0}min")
}
