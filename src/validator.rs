use std::fmt::{Display, Formatter};

use crate::config::TrackerConfig;
use crate::geo_math;
use crate::types::PositionSample;

/// Why a raw sample was dropped. Carries the offending values so the reason
/// can be logged without re-deriving them.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleRejection {
    /// Reported accuracy radius too large to be useful.
    Inaccurate { accuracy_m: f64 },
    /// Sample older than the staleness cutoff at validation time.
    Stale { age_s: f64 },
    /// Timestamp not strictly after the last accepted sample.
    OutOfOrder { timestamp: f64, last_timestamp: f64 },
    /// Jump from the last accepted position implies an impossible speed.
    ImplausibleSpeed { implied_kmh: f64 },
}

impl Display for SampleRejection {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            SampleRejection::Inaccurate { accuracy_m } => {
                write!(f, "accuracy {:.1}m too imprecise", accuracy_m)
            }
            SampleRejection::Stale { age_s } => write!(f, "sample {:.1}s old", age_s),
            SampleRejection::OutOfOrder { timestamp, last_timestamp } => {
                write!(f, "timestamp {:.3} not after {:.3}", timestamp, last_timestamp)
            }
            SampleRejection::ImplausibleSpeed { implied_kmh } => {
                write!(f, "implied speed {:.0} km/h", implied_kmh)
            }
        }
    }
}

/// Pure accept/reject decision for one raw sample against the last accepted
/// one. No side effects; rejected samples must not touch any session state.
pub fn validate(
    sample: &PositionSample,
    last_accepted: Option<&PositionSample>,
    now: f64,
    config: &TrackerConfig,
) -> Result<(), SampleRejection> {
    if sample.accuracy_m > config.max_accuracy_m {
        return Err(SampleRejection::Inaccurate { accuracy_m: sample.accuracy_m });
    }

    let age_s = now - sample.timestamp;
    if age_s > config.max_sample_age_s {
        return Err(SampleRejection::Stale { age_s });
    }

    if let Some(last) = last_accepted {
        if sample.timestamp <= last.timestamp {
            return Err(SampleRejection::OutOfOrder {
                timestamp: sample.timestamp,
                last_timestamp: last.timestamp,
            });
        }

        let dt_s = sample.timestamp - last.timestamp;
        if dt_s > 0.0 {
            let implied_kmh =
                geo_math::implied_speed_kmh(&last.point(), &sample.point(), dt_s);
            if implied_kmh > config.max_implied_speed_kmh {
                return Err(SampleRejection::ImplausibleSpeed { implied_kmh });
            }
        }
    }

    Ok(())
}
