use std::time::Duration;

/// Tunables for the tracking core. One instance is shared by every session
/// a registry creates.
#[derive(Clone, Debug)]
pub struct TrackerConfig {
    // ── Sample validation ──
    pub max_accuracy_m: f64,
    pub max_sample_age_s: f64,
    pub max_implied_speed_kmh: f64,

    // ── Buffer / smoothing ──
    pub buffer_capacity: usize,
    pub smoothing_window: usize,

    // ── Metrics ──
    pub metrics_interval: Duration,
    pub nominal_sample_interval_ms: u64,
    pub moving_speed_threshold_kmh: f64,

    // ── Route refresh ──
    pub route_refresh_interval: Duration,

    // ── Channels ──
    pub session_inbox_capacity: usize,
    pub subscriber_queue_capacity: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_accuracy_m: 50.0,
            max_sample_age_s: 10.0,
            max_implied_speed_kmh: 200.0,
            buffer_capacity: 100,
            smoothing_window: 5,
            metrics_interval: Duration::from_secs(5),
            nominal_sample_interval_ms: 3000,
            moving_speed_threshold_kmh: 5.0,
            route_refresh_interval: Duration::from_secs(15),
            session_inbox_capacity: 256,
            subscriber_queue_capacity: 64,
        }
    }
}
