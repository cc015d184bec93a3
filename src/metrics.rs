use crate::buffer::SessionBuffer;
use crate::config::TrackerConfig;
use crate::types::TrackingMetrics;

/// Recompute the metrics snapshot from the buffered samples.
///
/// Regenerated from scratch each cycle rather than mutated incrementally so
/// a dropped cycle can never leave the snapshot drifted. Speeds come from the
/// samples' own vendor-reported `speed_mps`, not re-derived from positions.
/// `cumulative_distance_m` is the session's running total, incremented once
/// per accepted sample along the smoothed trajectory.
pub fn compute(
    buffer: &SessionBuffer,
    cumulative_distance_m: f64,
    config: &TrackerConfig,
) -> TrackingMetrics {
    if buffer.is_empty() {
        return TrackingMetrics {
            total_distance_m: cumulative_distance_m,
            ..TrackingMetrics::default()
        };
    }

    let mut max_kmh = 0.0_f64;
    let mut sum_kmh = 0.0;
    let mut moving_samples = 0u64;
    let mut first_ts = f64::INFINITY;
    let mut last_ts = f64::NEG_INFINITY;

    for sample in buffer.iter() {
        let kmh = sample.speed_mps * 3.6;
        max_kmh = max_kmh.max(kmh);
        sum_kmh += kmh;
        if kmh > config.moving_speed_threshold_kmh {
            moving_samples += 1;
        }
        first_ts = first_ts.min(sample.timestamp);
        last_ts = last_ts.max(sample.timestamp);
    }

    let total_duration_ms = ((last_ts - first_ts).max(0.0) * 1000.0) as u64;
    let moving_duration_ms =
        (moving_samples * config.nominal_sample_interval_ms).min(total_duration_ms);

    TrackingMetrics {
        total_distance_m: cumulative_distance_m,
        average_speed_kmh: sum_kmh / buffer.len() as f64,
        max_speed_kmh: max_kmh,
        total_duration_ms,
        idle_duration_ms: total_duration_ms - moving_duration_ms,
        moving_duration_ms,
    }
}
