//! Real-time vehicle tracking core for a ride-hailing platform.
//!
//! For every active ride this crate ingests a stream of noisy position
//! reports, validates and smooths them, maintains distance/speed/ETA metrics,
//! periodically recomputes the remaining route, and fans a clean, ordered
//! stream of [`TrackingUpdate`]s out to every subscriber of that ride.
//!
//! The entry point is [`SessionRegistry`]: `start` a session per ride,
//! `dispatch` raw samples into it, `subscribe` for updates, `stop` when the
//! ride ends. Each session runs as its own actor task, so rides never share
//! mutable state.

pub mod buffer;
pub mod config;
pub mod dashboard;
pub mod geo_math;
pub mod metrics;
pub mod persist;
pub mod registry;
pub mod route;
pub mod session;
pub mod smoothing;
pub mod types;
pub mod validator;

pub use config::TrackerConfig;
pub use persist::{PersistError, PersistenceSink};
pub use registry::{RegistryError, SessionHandle, SessionRegistry, TrackingUpdates};
pub use route::{RouteError, RouteService};
pub use session::{SessionPhase, SessionSnapshot};
pub use types::{
    GeoPoint, PositionSample, RouteEstimate, SmoothedPosition, StreamItem,
    TrackingMetrics, TrackingUpdate,
};
