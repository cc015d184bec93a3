use serde::{Deserialize, Serialize};

/// A WGS84 coordinate pair in degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        GeoPoint { latitude, longitude }
    }
}

/// One raw position report from a vehicle. Transient: lives only in the
/// session buffer after validation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PositionSample {
    pub timestamp: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_m: f64,
    pub speed_mps: f64,
    pub bearing_deg: f64,
    pub source_tag: String,
}

impl PositionSample {
    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

/// Filtered position estimate. Speed and bearing are instantaneous values
/// carried over from the newest sample of the window, not averages.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SmoothedPosition {
    pub timestamp: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub speed_mps: f64,
    pub bearing_deg: f64,
    pub accuracy_m: f64,
}

impl SmoothedPosition {
    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

/// Snapshot of per-ride metrics, recomputed from the buffer each cycle.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TrackingMetrics {
    pub total_distance_m: f64,
    pub average_speed_kmh: f64,
    pub max_speed_kmh: f64,
    pub total_duration_ms: u64,
    pub idle_duration_ms: u64,
    pub moving_duration_ms: u64,
}

/// Remaining-route answer from the route computation service.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RouteEstimate {
    pub encoded_polyline: String,
    pub distance_m: f64,
    pub duration_s: f64,
}

/// The public event fanned out to every subscriber of a ride.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrackingUpdate {
    pub ride_id: String,
    pub position: SmoothedPosition,
    pub distance_traveled_m: f64,
    /// None until the first successful route refresh.
    pub eta_minutes: Option<f64>,
    pub route_polyline: String,
    pub accuracy_m: f64,
    pub timestamp: f64,
}

/// What a subscriber stream yields. `Gap` means this subscriber fell behind
/// and `missed` updates were dropped from its queue; the session itself is
/// unaffected.
#[derive(Clone, Debug)]
pub enum StreamItem {
    Update(TrackingUpdate),
    Gap { missed: u64 },
}

/// Wall clock as f64 epoch seconds.
pub fn current_timestamp() -> f64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
