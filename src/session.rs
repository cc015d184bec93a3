// session.rs — the per-ride tracking actor.
//
// One tokio task owns all mutable state for one ride (single-writer).
// Ingestion, subscriber attachment, timer ticks and route results all arrive
// as messages on the same bounded inbox, so they are serialized relative to
// each other without any locking. The only slow operation, the route
// computation call, runs on its own task and posts its result back as a
// message; at most one request is in flight per session.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::buffer::SessionBuffer;
use crate::config::TrackerConfig;
use crate::geo_math;
use crate::metrics;
use crate::persist::PersistenceSink;
use crate::route::{RouteError, RouteService};
use crate::smoothing::PositionSmoother;
use crate::types::{
    current_timestamp, GeoPoint, PositionSample, RouteEstimate, SmoothedPosition,
    TrackingUpdate,
};
use crate::validator;

// ─── Commands ────────────────────────────────────────────────────────────────

pub(crate) enum SessionCommand {
    Ingest(PositionSample),
    Subscribe {
        reply: oneshot::Sender<broadcast::Receiver<TrackingUpdate>>,
    },
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    RouteResult(Result<RouteEstimate, RouteError>),
    Stop {
        ack: oneshot::Sender<()>,
    },
}

// ─── Session state ───────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionPhase {
    /// Allocated and ingesting; periodic cycles not yet running.
    Starting,
    /// First subscriber attached; ingestion plus both periodic cycles.
    Active,
    /// Terminal.
    Stopped,
}

/// Point-in-time view of one session, for dashboards and tests.
#[derive(Clone, Debug)]
pub struct SessionSnapshot {
    pub ride_id: String,
    pub phase: SessionPhase,
    pub buffer_len: usize,
    pub cumulative_distance_m: f64,
    pub smoothed: Option<SmoothedPosition>,
    pub route_polyline: String,
    pub eta_minutes: Option<f64>,
    pub accepted_samples: u64,
    pub rejected_samples: u64,
}

/// Identity and routing target of one tracked ride.
#[derive(Clone, Debug)]
pub struct RideContext {
    pub ride_id: String,
    pub driver_id: String,
    pub rider_id: String,
    pub destination: GeoPoint,
    pub initial_polyline: String,
}

pub(crate) struct TrackingSession {
    ctx: RideContext,
    started_at: f64,
    config: TrackerConfig,

    buffer: SessionBuffer,
    smoother: PositionSmoother,
    smoothed: Option<SmoothedPosition>,
    cumulative_distance_m: f64,

    route_polyline: String,
    eta_minutes: Option<f64>,
    route_in_flight: bool,

    phase: SessionPhase,
    accepted_samples: u64,
    rejected_samples: u64,

    updates: broadcast::Sender<TrackingUpdate>,
    route_service: Arc<dyn RouteService>,
    sink: Arc<dyn PersistenceSink>,
    // For the route task to post its result back to the inbox
    cmd_tx: mpsc::Sender<SessionCommand>,
}

/// Spawn the actor task for one ride and return its command inbox.
pub(crate) fn spawn(
    ctx: RideContext,
    config: TrackerConfig,
    route_service: Arc<dyn RouteService>,
    sink: Arc<dyn PersistenceSink>,
) -> mpsc::Sender<SessionCommand> {
    let (cmd_tx, cmd_rx) = mpsc::channel(config.session_inbox_capacity);
    let (updates, _) = broadcast::channel(config.subscriber_queue_capacity);

    let session = TrackingSession {
        started_at: current_timestamp(),
        buffer: SessionBuffer::new(config.buffer_capacity),
        smoother: PositionSmoother::new(config.smoothing_window),
        smoothed: None,
        cumulative_distance_m: 0.0,
        route_polyline: ctx.initial_polyline.clone(),
        eta_minutes: None,
        route_in_flight: false,
        phase: SessionPhase::Starting,
        accepted_samples: 0,
        rejected_samples: 0,
        updates,
        route_service,
        sink,
        cmd_tx: cmd_tx.clone(),
        ctx,
        config,
    };

    tokio::spawn(session.run(cmd_rx));
    cmd_tx
}

impl TrackingSession {
    async fn run(mut self, mut cmd_rx: mpsc::Receiver<SessionCommand>) {
        log::info!(
            "[session] ride {} tracking started (driver {}, rider {})",
            self.ctx.ride_id,
            self.ctx.driver_id,
            self.ctx.rider_id
        );

        let mut metrics_timer = interval_at(
            Instant::now() + self.config.metrics_interval,
            self.config.metrics_interval,
        );
        let mut route_timer = interval_at(
            Instant::now() + self.config.route_refresh_interval,
            self.config.route_refresh_interval,
        );
        metrics_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        route_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => match cmd {
                    Some(SessionCommand::Ingest(sample)) => self.handle_sample(sample),
                    Some(SessionCommand::Subscribe { reply }) => {
                        if self.phase == SessionPhase::Starting {
                            self.phase = SessionPhase::Active;
                            log::info!("[session] ride {} active", self.ctx.ride_id);
                        }
                        let _ = reply.send(self.updates.subscribe());
                    }
                    Some(SessionCommand::Snapshot { reply }) => {
                        let _ = reply.send(self.snapshot());
                    }
                    Some(SessionCommand::RouteResult(result)) => self.handle_route_result(result),
                    Some(SessionCommand::Stop { ack }) => {
                        self.shutdown();
                        let _ = ack.send(());
                        return;
                    }
                    // Registry dropped the handle; treat like a stop
                    None => {
                        self.shutdown();
                        return;
                    }
                },
                _ = metrics_timer.tick(), if self.phase == SessionPhase::Active => {
                    self.metrics_cycle();
                }
                _ = route_timer.tick(), if self.phase == SessionPhase::Active => {
                    self.route_cycle();
                }
            }
        }
    }

    // ── Ingestion ────────────────────────────────────────────────────────

    fn handle_sample(&mut self, sample: PositionSample) {
        let now = current_timestamp();
        if let Err(reason) =
            validator::validate(&sample, self.buffer.latest(), now, &self.config)
        {
            self.rejected_samples += 1;
            log::debug!(
                "[session] ride {} dropped sample from {}: {}",
                self.ctx.ride_id,
                sample.source_tag,
                reason
            );
            return;
        }

        self.accepted_samples += 1;
        self.buffer.push(sample);

        let window = self.buffer.recent(self.config.smoothing_window);
        if let Some(next) = self.smoother.smooth(&window) {
            if let Some(prev) = &self.smoothed {
                self.cumulative_distance_m +=
                    geo_math::haversine_distance_m(&prev.point(), &next.point());
            }
            self.emit_update(&next);
            self.smoothed = Some(next);
        }
    }

    fn emit_update(&self, position: &SmoothedPosition) {
        let update = TrackingUpdate {
            ride_id: self.ctx.ride_id.clone(),
            position: position.clone(),
            distance_traveled_m: self.cumulative_distance_m,
            eta_minutes: self.eta_minutes,
            route_polyline: self.route_polyline.clone(),
            accuracy_m: position.accuracy_m,
            timestamp: position.timestamp,
        };
        // Send only fails when nobody is subscribed
        let _ = self.updates.send(update);
    }

    // ── Periodic cycles ──────────────────────────────────────────────────

    fn metrics_cycle(&self) {
        let snapshot =
            metrics::compute(&self.buffer, self.cumulative_distance_m, &self.config);
        let sink = Arc::clone(&self.sink);
        let ride_id = self.ctx.ride_id.clone();
        tokio::spawn(async move {
            if let Err(e) = sink.write_metrics(&ride_id, &snapshot).await {
                log::warn!("[persist] ride {} metrics write failed: {}", ride_id, e);
            }
        });

        // Heartbeat for subscribers that attached between samples
        if let Some(position) = &self.smoothed {
            self.emit_update(position);
        }
    }

    fn route_cycle(&mut self) {
        // A slow response must not cause overlapping requests
        if self.route_in_flight {
            return;
        }
        let origin = match &self.smoothed {
            Some(position) => position.point(),
            None => return,
        };

        self.route_in_flight = true;
        let service = Arc::clone(&self.route_service);
        let destination = self.ctx.destination;
        let tx = self.cmd_tx.clone();
        tokio::spawn(async move {
            let result = service.get_route(origin, destination).await;
            // Dropped on arrival if the session stopped meanwhile
            let _ = tx.send(SessionCommand::RouteResult(result)).await;
        });
    }

    fn handle_route_result(&mut self, result: Result<RouteEstimate, RouteError>) {
        self.route_in_flight = false;
        match result {
            Ok(estimate) => {
                log::debug!(
                    "[route] ride {} refreshed: {:.0}m remaining, eta {:.1}min",
                    self.ctx.ride_id,
                    estimate.distance_m,
                    estimate.duration_s / 60.0
                );
                self.route_polyline = estimate.encoded_polyline;
                self.eta_minutes = Some(estimate.duration_s / 60.0);

                if let Some(position) = self.smoothed.clone() {
                    self.emit_update(&position);
                }

                let sink = Arc::clone(&self.sink);
                let ride_id = self.ctx.ride_id.clone();
                let polyline = self.route_polyline.clone();
                tokio::spawn(async move {
                    if let Err(e) = sink.write_polyline(&ride_id, &polyline).await {
                        log::warn!(
                            "[persist] ride {} polyline write failed: {}",
                            ride_id,
                            e
                        );
                    }
                });
            }
            Err(e) => {
                // Stale-but-valid beats none: keep the previous polyline
                log::warn!("[route] ride {} refresh failed: {}", self.ctx.ride_id, e);
            }
        }
    }

    // ── Shutdown ─────────────────────────────────────────────────────────

    fn shutdown(&mut self) {
        if self.phase == SessionPhase::Stopped {
            return;
        }
        self.phase = SessionPhase::Stopped;

        let final_metrics =
            metrics::compute(&self.buffer, self.cumulative_distance_m, &self.config);
        let sink = Arc::clone(&self.sink);
        let ride_id = self.ctx.ride_id.clone();
        tokio::spawn(async move {
            if let Err(e) = sink.write_metrics(&ride_id, &final_metrics).await {
                log::warn!("[persist] ride {} final metrics write failed: {}", ride_id, e);
            }
        });

        log::info!(
            "[session] ride {} stopped after {:.0}s: {} samples accepted, {} rejected, {:.0}m",
            self.ctx.ride_id,
            current_timestamp() - self.started_at,
            self.accepted_samples,
            self.rejected_samples,
            self.cumulative_distance_m
        );
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            ride_id: self.ctx.ride_id.clone(),
            phase: self.phase,
            buffer_len: self.buffer.len(),
            cumulative_distance_m: self.cumulative_distance_m,
            smoothed: self.smoothed.clone(),
            route_polyline: self.route_polyline.clone(),
            eta_minutes: self.eta_minutes,
            accepted_samples: self.accepted_samples,
            rejected_samples: self.rejected_samples,
        }
    }
}
