use crate::types::{PositionSample, SmoothedPosition};

/// Recency-weighted position smoothing over a short window of valid samples.
///
/// The k-th sample of the window, counted from its oldest entry (1-indexed),
/// gets weight k, so the newest sample dominates while single-sample GPS
/// jitter is damped. Coordinates are weighted means; accuracy is the plain
/// mean of the window; speed and bearing are instantaneous quantities and are
/// taken verbatim from the newest sample.
///
/// This is deliberately a weighted average and nothing more, with no
/// covariance or state-transition model.
pub struct PositionSmoother {
    window_size: usize,
}

impl PositionSmoother {
    /// Create a smoother with the given window size (typically 5).
    pub fn new(window_size: usize) -> Self {
        PositionSmoother {
            window_size: window_size.max(1),
        }
    }

    /// Smooth the last `min(window, len)` of `samples` (chronological order).
    /// Empty input returns `None`; callers must not treat zeroed coordinates
    /// as a position.
    pub fn smooth(&self, samples: &[PositionSample]) -> Option<SmoothedPosition> {
        if samples.is_empty() {
            return None;
        }

        let start = samples.len().saturating_sub(self.window_size);
        let window = &samples[start..];
        let newest = window.last()?;

        let mut weight_sum = 0.0;
        let mut lat = 0.0;
        let mut lon = 0.0;
        let mut accuracy = 0.0;
        for (i, sample) in window.iter().enumerate() {
            let weight = (i + 1) as f64;
            weight_sum += weight;
            lat += sample.latitude * weight;
            lon += sample.longitude * weight;
            accuracy += sample.accuracy_m;
        }

        Some(SmoothedPosition {
            timestamp: newest.timestamp,
            latitude: lat / weight_sum,
            longitude: lon / weight_sum,
            speed_mps: newest.speed_mps,
            bearing_deg: newest.bearing_deg,
            accuracy_m: accuracy / window.len() as f64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample(lat: f64, lon: f64, accuracy_m: f64, timestamp: f64) -> PositionSample {
        PositionSample {
            timestamp,
            latitude: lat,
            longitude: lon,
            accuracy_m,
            speed_mps: 8.0,
            bearing_deg: 90.0,
            source_tag: "test".to_string(),
        }
    }

    #[test]
    fn test_empty_window_is_none() {
        let smoother = PositionSmoother::new(5);
        assert!(smoother.smooth(&[]).is_none());
    }

    #[test]
    fn test_single_sample_passthrough() {
        let smoother = PositionSmoother::new(5);
        let s = smoother.smooth(&[sample(37.0, -122.0, 10.0, 1.0)]).unwrap();
        assert_relative_eq!(s.latitude, 37.0);
        assert_relative_eq!(s.longitude, -122.0);
        assert_relative_eq!(s.accuracy_m, 10.0);
    }

    #[test]
    fn test_identical_inputs_return_centroid() {
        let smoother = PositionSmoother::new(5);
        let samples: Vec<_> =
            (0..5).map(|i| sample(37.5, -122.5, 8.0, i as f64)).collect();
        let s = smoother.smooth(&samples).unwrap();
        assert_relative_eq!(s.latitude, 37.5, epsilon = 1e-12);
        assert_relative_eq!(s.longitude, -122.5, epsilon = 1e-12);
    }

    #[test]
    fn test_linear_recency_weights() {
        let smoother = PositionSmoother::new(5);
        // Latitudes 0..4, weights 1..5 of sum 15:
        // (0*1 + 1*2 + 2*3 + 3*4 + 4*5) / 15 = 40/15
        let samples: Vec<_> =
            (0..5).map(|i| sample(i as f64, 0.0, 10.0, i as f64)).collect();
        let s = smoother.smooth(&samples).unwrap();
        assert_relative_eq!(s.latitude, 40.0 / 15.0, epsilon = 1e-12);
    }

    #[test]
    fn test_newest_sample_dominates() {
        let smoother = PositionSmoother::new(5);
        let mut samples: Vec<_> =
            (0..4).map(|i| sample(0.0, 0.0, 10.0, i as f64)).collect();
        samples.push(sample(1.0, 0.0, 10.0, 4.0));
        let s = smoother.smooth(&samples).unwrap();
        // Newest has weight 5 of 15
        assert_relative_eq!(s.latitude, 5.0 / 15.0, epsilon = 1e-12);
    }

    #[test]
    fn test_uses_only_window_tail() {
        let smoother = PositionSmoother::new(2);
        let samples = vec![
            sample(100.0, 0.0, 10.0, 0.0),
            sample(0.0, 0.0, 10.0, 1.0),
            sample(3.0, 0.0, 10.0, 2.0),
        ];
        // Window is the last two: (0*1 + 3*2) / 3 = 2
        let s = smoother.smooth(&samples).unwrap();
        assert_relative_eq!(s.latitude, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_accuracy_is_plain_mean() {
        let smoother = PositionSmoother::new(5);
        let samples = vec![
            sample(0.0, 0.0, 10.0, 0.0),
            sample(0.0, 0.0, 20.0, 1.0),
            sample(0.0, 0.0, 30.0, 2.0),
        ];
        let s = smoother.smooth(&samples).unwrap();
        assert_relative_eq!(s.accuracy_m, 20.0, epsilon = 1e-12);
    }

    #[test]
    fn test_speed_and_bearing_from_newest() {
        let smoother = PositionSmoother::new(5);
        let mut a = sample(0.0, 0.0, 10.0, 0.0);
        a.speed_mps = 1.0;
        a.bearing_deg = 10.0;
        let mut b = sample(0.1, 0.0, 10.0, 1.0);
        b.speed_mps = 9.0;
        b.bearing_deg = 270.0;
        let s = smoother.smooth(&[a, b]).unwrap();
        assert_relative_eq!(s.speed_mps, 9.0);
        assert_relative_eq!(s.bearing_deg, 270.0);
        assert_relative_eq!(s.timestamp, 1.0);
    }
}
