use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use std::sync::Arc;
use tokio::time::{interval, Duration};

use ride_tracker_rs::dashboard::start_dashboard;
use ride_tracker_rs::geo_math;
use ride_tracker_rs::persist::JsonFileSink;
use ride_tracker_rs::registry::SessionRegistry;
use ride_tracker_rs::route::StraightLineRouter;
use ride_tracker_rs::types::{current_timestamp, GeoPoint, PositionSample, StreamItem};
use ride_tracker_rs::TrackerConfig;

#[derive(Parser, Debug)]
#[command(name = "ride_tracker")]
#[command(about = "Ride tracking core - simulated feed driver", long_about = None)]
struct Args {
    /// Duration in seconds (0 = continuous)
    #[arg(value_name = "SECONDS", default_value = "60")]
    duration: u64,

    /// Number of simulated rides
    #[arg(long, default_value = "1")]
    rides: usize,

    /// Seconds between position samples
    #[arg(long, default_value = "3.0")]
    sample_interval: f64,

    /// Dashboard port (0 disables the dashboard)
    #[arg(long, default_value = "8080")]
    port: u16,

    /// Output directory for persisted metrics and routes
    #[arg(long, default_value = "ride_tracker_sessions")]
    output_dir: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    println!("[{}] Ride Tracker RS starting", ts_now());
    println!("  Duration: {} seconds (0=continuous)", args.duration);
    println!("  Rides: {}", args.rides);
    println!("  Sample interval: {}s", args.sample_interval);
    println!("  Output dir: {}", args.output_dir);

    std::fs::create_dir_all(&args.output_dir)?;

    let registry = Arc::new(SessionRegistry::new(
        TrackerConfig::default(),
        Arc::new(StraightLineRouter::new(40.0)),
        Arc::new(JsonFileSink::new(&args.output_dir)),
    ));

    if args.port > 0 {
        tokio::spawn(start_dashboard(registry.clone(), args.port));
    }

    let mut feeders = Vec::new();
    for n in 0..args.rides {
        let ride_id = format!("ride-{:03}", n + 1);
        feeders.push(tokio::spawn(simulate_ride(
            registry.clone(),
            ride_id,
            args.duration,
            args.sample_interval,
        )));
    }

    let totals = futures::future::join_all(feeders).await;

    registry.stop_all().await;

    println!("\n=== Final Stats ===");
    for result in totals.into_iter().flatten() {
        let (ride_id, dispatched, distance_m) = result;
        println!(
            "{}: {} samples dispatched, {:.0} m tracked",
            ride_id, dispatched, distance_m
        );
    }

    Ok(())
}

/// Drive one synthetic ride: start a session, subscribe a printing consumer,
/// then feed eastbound samples at the configured cadence until the duration
/// runs out. Returns (ride_id, samples dispatched, tracked distance).
async fn simulate_ride(
    registry: Arc<SessionRegistry>,
    ride_id: String,
    duration: u64,
    sample_interval: f64,
) -> (String, u64, f64) {
    let origin = GeoPoint::new(37.7749, -122.4194);
    let destination = geo_math::destination_point(&origin, 90.0, 5_000.0);

    let handle = match registry
        .start(
            &ride_id,
            &format!("driver-{}", ride_id),
            &format!("rider-{}", ride_id),
            destination,
            "",
        )
        .await
    {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("[{}] failed to start {}: {}", ts_now(), ride_id, e);
            return (ride_id, 0, 0.0);
        }
    };

    // Print incoming updates the way a rider's map view would consume them
    match handle.subscribe().await {
        Ok(mut updates) => {
            tokio::spawn(async move {
                while let Some(item) = updates.recv().await {
                    match item {
                        StreamItem::Update(u) => println!(
                            "[{}] {} at {:.5},{:.5}  dist {:.0}m  eta {}",
                            ts_now(),
                            u.ride_id,
                            u.position.latitude,
                            u.position.longitude,
                            u.distance_traveled_m,
                            u.eta_minutes
                                .map(|m| format!("{:.1}min", m))
                                .unwrap_or_else(|| "-".to_string()),
                        ),
                        StreamItem::Gap { missed } => println!(
                            "[{}] {} fell behind: {} updates dropped",
                            ts_now(),
                            ride_id,
                            missed
                        ),
                    }
                }
            });
        }
        Err(e) => eprintln!("[{}] subscribe failed: {}", ts_now(), e),
    }

    let samples = if duration == 0 {
        u64::MAX
    } else {
        (duration as f64 / sample_interval).ceil() as u64
    };

    let mut ticker = interval(Duration::from_secs_f64(sample_interval));
    let mut dispatched = 0u64;
    let ride_id = handle.ride_id().to_string();
    for seq in 0..samples {
        ticker.tick().await;
        let sample = synthetic_sample(&origin, seq, sample_interval);
        if registry.dispatch(&ride_id, sample).await.is_err() {
            break;
        }
        dispatched += 1;
    }

    let distance_m = handle
        .snapshot()
        .await
        .map(|s| s.cumulative_distance_m)
        .unwrap_or(0.0);
    (ride_id, dispatched, distance_m)
}

/// Deterministic synthetic fix: ~30 km/h eastbound with sinusoidal jitter.
/// Every tenth report is a low-accuracy outlier so the validator has
/// something to drop.
fn synthetic_sample(origin: &GeoPoint, seq: u64, sample_interval: f64) -> PositionSample {
    let along_m = 8.33 * sample_interval * seq as f64;
    let jitter_m = (seq as f64 * 0.7).sin() * 3.0;
    let point = geo_math::destination_point(origin, 90.0, along_m + jitter_m);
    let accuracy_m = if seq % 10 == 9 {
        80.0
    } else {
        5.0 + (seq as f64 * 0.3).sin() * 2.0
    };

    PositionSample {
        timestamp: current_timestamp(),
        latitude: point.latitude,
        longitude: point.longitude,
        accuracy_m,
        speed_mps: 8.33,
        bearing_deg: 90.0,
        source_tag: "sim".to_string(),
    }
}

fn ts_now() -> String {
    Utc::now().format("%H:%M:%S").to_string()
}
