use std::fmt::{Display, Formatter};
use std::path::PathBuf;

use async_trait::async_trait;

use crate::types::TrackingMetrics;

#[derive(Debug, Clone)]
pub enum PersistError {
    Io(String),
    Serialize(String),
}

impl Display for PersistError {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            PersistError::Io(msg) => write!(f, "I/O error: {}", msg),
            PersistError::Serialize(msg) => write!(f, "serialize error: {}", msg),
        }
    }
}

impl std::error::Error for PersistError {}

/// Best-effort storage boundary. Every call is fire-and-forget from the
/// session's point of view: failures are logged by the caller and never
/// affect in-memory tracking state.
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    async fn write_metrics(
        &self,
        ride_id: &str,
        metrics: &TrackingMetrics,
    ) -> Result<(), PersistError>;

    async fn write_polyline(&self, ride_id: &str, polyline: &str) -> Result<(), PersistError>;
}

/// Writes one pretty-printed JSON document per ride under an output
/// directory: `{dir}/{ride_id}_metrics.json` and `{dir}/{ride_id}_route.json`.
pub struct JsonFileSink {
    output_dir: PathBuf,
}

impl JsonFileSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        JsonFileSink { output_dir: output_dir.into() }
    }

    fn path_for(&self, ride_id: &str, suffix: &str) -> PathBuf {
        self.output_dir.join(format!("{}_{}.json", ride_id, suffix))
    }
}

#[async_trait]
impl PersistenceSink for JsonFileSink {
    async fn write_metrics(
        &self,
        ride_id: &str,
        metrics: &TrackingMetrics,
    ) -> Result<(), PersistError> {
        let json = serde_json::to_string_pretty(metrics)
            .map_err(|e| PersistError::Serialize(e.to_string()))?;
        tokio::fs::write(self.path_for(ride_id, "metrics"), json)
            .await
            .map_err(|e| PersistError::Io(e.to_string()))
    }

    async fn write_polyline(&self, ride_id: &str, polyline: &str) -> Result<(), PersistError> {
        let json = serde_json::to_string_pretty(&serde_json::json!({
            "ride_id": ride_id,
            "encoded_polyline": polyline,
        }))
        .map_err(|e| PersistError::Serialize(e.to_string()))?;
        tokio::fs::write(self.path_for(ride_id, "route"), json)
            .await
            .map_err(|e| PersistError::Io(e.to_string()))
    }
}

/// Discards everything; handy for tests and for running the core without a
/// storage backend.
pub struct NoopSink;

#[async_trait]
impl PersistenceSink for NoopSink {
    async fn write_metrics(
        &self,
        _ride_id: &str,
        _metrics: &TrackingMetrics,
    ) -> Result<(), PersistError> {
        Ok(())
    }

    async fn write_polyline(&self, _ride_id: &str, _polyline: &str) -> Result<(), PersistError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_json_file_sink_writes_metrics() {
        let dir = std::env::temp_dir().join(format!(
            "ride_tracker_sink_test_{}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let sink = JsonFileSink::new(&dir);

        let metrics = TrackingMetrics {
            total_distance_m: 1500.0,
            average_speed_kmh: 32.0,
            max_speed_kmh: 48.0,
            total_duration_ms: 120_000,
            idle_duration_ms: 30_000,
            moving_duration_ms: 90_000,
        };
        sink.write_metrics("ride-1", &metrics).await.unwrap();

        let written = std::fs::read_to_string(dir.join("ride-1_metrics.json")).unwrap();
        let parsed: TrackingMetrics = serde_json::from_str(&written).unwrap();
        assert_eq!(parsed.total_duration_ms, 120_000);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_json_file_sink_write_failure_is_reported() {
        let sink = JsonFileSink::new("/nonexistent-dir/really/not/here");
        let err = sink.write_polyline("ride-1", "abc").await.unwrap_err();
        assert!(matches!(err, PersistError::Io(_)));
    }

    #[tokio::test]
    async fn test_noop_sink() {
        let sink = NoopSink;
        sink.write_metrics("ride-1", &TrackingMetrics::default())
            .await
            .unwrap();
        sink.write_polyline("ride-1", "abc").await.unwrap();
    }
}
