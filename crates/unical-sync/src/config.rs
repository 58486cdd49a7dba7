//! Sync configuration.

use std::time::Duration;

use chrono::NaiveDate;
use unical_core::DateRange;

/// Configuration for [`SyncOrchestrator`](crate::SyncOrchestrator).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Period of the recurring auto-sync timer.
    pub auto_sync_interval: Duration,
    /// Whole months before today included in the fetch window.
    pub months_back: u32,
    /// Whole months after today included in the fetch window.
    pub months_ahead: u32,
    /// Capacity of the sync and auth broadcast channels.
    pub channel_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            auto_sync_interval: Duration::from_secs(Self::DEFAULT_INTERVAL_SECS),
            months_back: 1,
            months_ahead: 1,
            channel_capacity: Self::DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl SyncConfig {
    /// 15 minutes.
    pub const DEFAULT_INTERVAL_SECS: u64 = 15 * 60;
    pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the auto-sync period. A zero duration is ignored.
    pub fn with_auto_sync_interval(mut self, interval: Duration) -> Self {
        if !interval.is_zero() {
            self.auto_sync_interval = interval;
        }
        self
    }

    pub fn with_window(mut self, months_back: u32, months_ahead: u32) -> Self {
        self.months_back = months_back;
        self.months_ahead = months_ahead;
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// The window a cycle starting on `today` fetches.
    pub fn fetch_window(&self, today: NaiveDate) -> DateRange {
        DateRange::fetch_window(today, self.months_back, self.months_ahead)
    }
}
