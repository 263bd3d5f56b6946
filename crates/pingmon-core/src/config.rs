use std::time::Duration;

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub probe_interval: Duration,
    pub sweep_interval: Duration,
    pub feed_capacity: usize,
    pub thresholds: Thresholds,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            probe_interval: Duration::from_millis(1000),
            sweep_interval: Duration::from_millis(500),
            feed_capacity: 256,
            thresholds: Thresholds::default(),
        }
    }
}

/// Latency thresholds drive per-tick colour classification; count thresholds
/// drive the sound and chat notification paths. A count of zero disables that
/// path. The two pairs are configured independently.
#[derive(Debug, Clone, Copy)]
pub struct Thresholds {
    pub warning_ms: u64,
    pub timeout_ms: u64,
    pub sound_warning_count: u32,
    pub sound_timeout_count: u32,
    pub chat_warning_count: u32,
    pub chat_timeout_count: u32,
    pub warning_cap: u32,
    pub timeout_cap: u32,
    pub notification_enabled: bool,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            warning_ms: 2000,
            timeout_ms: 2000,
            sound_warning_count: 0,
            sound_timeout_count: 5,
            chat_warning_count: 0,
            chat_timeout_count: 0,
            warning_cap: 1000,
            timeout_cap: 1000,
            notification_enabled: false,
        }
    }
}
