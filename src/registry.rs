use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot, RwLock};

use crate::config::TrackerConfig;
use crate::persist::PersistenceSink;
use crate::route::RouteService;
use crate::session::{self, RideContext, SessionCommand, SessionSnapshot};
use crate::types::{GeoPoint, PositionSample, StreamItem, TrackingUpdate};

/// Caller-facing registry errors. Streaming-path failures (route service,
/// persistence, slow subscribers) are absorbed internally and never show up
/// here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    SessionNotFound(String),
    DuplicateSession(String),
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            RegistryError::SessionNotFound(ride_id) => {
                write!(f, "no active tracking session for ride {}", ride_id)
            }
            RegistryError::DuplicateSession(ride_id) => {
                write!(f, "tracking session for ride {} already active", ride_id)
            }
        }
    }
}

impl std::error::Error for RegistryError {}

/// Handle to one live session. Cheap to clone; all operations go through the
/// session's inbox, so they are serialized with ingestion.
#[derive(Clone, Debug)]
pub struct SessionHandle {
    ride_id: String,
    cmd_tx: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    pub fn ride_id(&self) -> &str {
        &self.ride_id
    }

    /// Attach a new subscriber. Every subscriber gets its own bounded queue
    /// and the same ordered sequence of updates.
    pub async fn subscribe(&self) -> Result<TrackingUpdates, RegistryError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(SessionCommand::Subscribe { reply: reply_tx })
            .await
            .map_err(|_| RegistryError::SessionNotFound(self.ride_id.clone()))?;
        let rx = reply_rx
            .await
            .map_err(|_| RegistryError::SessionNotFound(self.ride_id.clone()))?;
        Ok(TrackingUpdates { rx })
    }

    /// Point-in-time state snapshot, serialized after any commands already
    /// in the inbox.
    pub async fn snapshot(&self) -> Result<SessionSnapshot, RegistryError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(SessionCommand::Snapshot { reply: reply_tx })
            .await
            .map_err(|_| RegistryError::SessionNotFound(self.ride_id.clone()))?;
        reply_rx
            .await
            .map_err(|_| RegistryError::SessionNotFound(self.ride_id.clone()))
    }
}

/// Subscriber stream for one ride. `recv` yields updates in order; a `Gap`
/// item means this subscriber fell behind and dropped the oldest updates.
/// `None` is the clean close after the session stops.
pub struct TrackingUpdates {
    rx: broadcast::Receiver<TrackingUpdate>,
}

impl TrackingUpdates {
    pub async fn recv(&mut self) -> Option<StreamItem> {
        match self.rx.recv().await {
            Ok(update) => Some(StreamItem::Update(update)),
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                Some(StreamItem::Gap { missed })
            }
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }
}

/// Entry point for the rest of the platform: creates, looks up and destroys
/// per-ride tracking sessions. Sessions never share mutable state, so there
/// is no cross-ride locking beyond this map.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, SessionHandle>>,
    config: TrackerConfig,
    route_service: Arc<dyn RouteService>,
    sink: Arc<dyn PersistenceSink>,
}

impl SessionRegistry {
    pub fn new(
        config: TrackerConfig,
        route_service: Arc<dyn RouteService>,
        sink: Arc<dyn PersistenceSink>,
    ) -> Self {
        SessionRegistry {
            sessions: RwLock::new(HashMap::new()),
            config,
            route_service,
            sink,
        }
    }

    /// Begin tracking a ride. Rejected with `DuplicateSession` while a
    /// session for the same ride id is active.
    pub async fn start(
        &self,
        ride_id: &str,
        driver_id: &str,
        rider_id: &str,
        destination: GeoPoint,
        initial_polyline: &str,
    ) -> Result<SessionHandle, RegistryError> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(ride_id) {
            return Err(RegistryError::DuplicateSession(ride_id.to_string()));
        }

        let ctx = RideContext {
            ride_id: ride_id.to_string(),
            driver_id: driver_id.to_string(),
            rider_id: rider_id.to_string(),
            destination,
            initial_polyline: initial_polyline.to_string(),
        };
        let cmd_tx = session::spawn(
            ctx,
            self.config.clone(),
            Arc::clone(&self.route_service),
            Arc::clone(&self.sink),
        );
        let handle = SessionHandle { ride_id: ride_id.to_string(), cmd_tx };
        sessions.insert(ride_id.to_string(), handle.clone());
        log::info!("[registry] started tracking for ride {}", ride_id);
        Ok(handle)
    }

    /// Feed one raw sample. Non-blocking: a full session inbox drops the
    /// sample with a warning rather than stalling the ingestion source.
    pub async fn dispatch(
        &self,
        ride_id: &str,
        sample: PositionSample,
    ) -> Result<(), RegistryError> {
        let handle = self.lookup(ride_id).await?;
        match handle.cmd_tx.try_send(SessionCommand::Ingest(sample)) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                log::warn!("[registry] ride {} inbox full, dropping sample", ride_id);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                Err(RegistryError::SessionNotFound(ride_id.to_string()))
            }
        }
    }

    pub async fn subscribe(&self, ride_id: &str) -> Result<TrackingUpdates, RegistryError> {
        self.lookup(ride_id).await?.subscribe().await
    }

    pub async fn snapshot(&self, ride_id: &str) -> Result<SessionSnapshot, RegistryError> {
        self.lookup(ride_id).await?.snapshot().await
    }

    /// Stop tracking a ride. Returns only after the session task has exited:
    /// both periodic schedules are cancelled and no further update will be
    /// emitted on any subscriber stream.
    pub async fn stop(&self, ride_id: &str) -> Result<(), RegistryError> {
        let handle = self
            .sessions
            .write()
            .await
            .remove(ride_id)
            .ok_or_else(|| RegistryError::SessionNotFound(ride_id.to_string()))?;

        let (ack_tx, ack_rx) = oneshot::channel();
        if handle
            .cmd_tx
            .send(SessionCommand::Stop { ack: ack_tx })
            .await
            .is_ok()
        {
            // Quiescent once acked
            let _ = ack_rx.await;
        }
        log::info!("[registry] stopped tracking for ride {}", ride_id);
        Ok(())
    }

    pub async fn active_rides(&self) -> Vec<String> {
        self.sessions.read().await.keys().cloned().collect()
    }

    pub async fn stop_all(&self) {
        for ride_id in self.active_rides().await {
            let _ = self.stop(&ride_id).await;
        }
    }

    async fn lookup(&self, ride_id: &str) -> Result<SessionHandle, RegistryError> {
        self.sessions
            .read()
            .await
            .get(ride_id)
            .cloned()
            .ok_or_else(|| RegistryError::SessionNotFound(ride_id.to_string()))
    }
}
