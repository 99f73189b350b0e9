#[macro_use] extern crate log;
extern crate env_logger;

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_std::task;

use racetrack::config::Config;
use racetrack::location::simulated::{ DragRun, SimulatedProvider };
use racetrack::location::{ now_ms, LocationSampler };
use racetrack::metadata::RaceCatalog;
use racetrack::session::{ SessionContext, SessionRegistry, TrackerEvent };
use racetrack::store::{ JsonFileStore, SessionStore };

/// Usage: racetrack [config.yaml] [race id] [vehicle id]
fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let mut args = std::env::args().skip(1);
    let config_path = args.next().map(PathBuf::from);
    let race_id = args.next();
    let vehicle_id = args.next();

    if let Err(err) = task::block_on(run(config_path, race_id, vehicle_id)) {
        error!["{}", err];
        std::process::exit(1);
    }
}

async fn run(config_path: Option<PathBuf>, race_id: Option<String>, vehicle_id: Option<String>) -> Result<(), Box<dyn Error>> {
    let config = match &config_path {
        Some(path) => Config::load(path).await?,
        None => Config::default(),
    };

    if let Some(race) = race_id.as_deref() {
        match config.catalog.race(race).await {
            Some(info) => info!["Race: {}", info.name],
            None => info!["Race {} is not in the local catalog", race],
        }
    }
    if let Some(vehicle) = vehicle_id.as_deref() {
        if let Some(info) = config.catalog.vehicle(vehicle).await {
            info!["Vehicle: {}", info.label()];
        }
    }

    let provider = Arc::new(SimulatedProvider::granted());
    let store = Arc::new(JsonFileStore::new(config.storage_directory.clone()));
    let mut registry = SessionRegistry::new(provider.clone(), store.clone(), config.session.clone());

    let drag = DragRun {
        start_ms: now_ms(),
        ..DragRun::default()
    };
    let samples = drag.samples();

    // Show where we are before the green light.
    if let Some(first) = samples.first() {
        provider.push_fix(first.clone());
    }
    let start = LocationSampler::new(provider.clone()).get_current_sample(&config.position).await?;
    info!["Start position {:.5}, {:.5}", start.latitude, start.longitude];

    let key = registry.create();
    let session = registry.get_mut(key).ok_or("session vanished from the registry")?;
    session
        .start(SessionContext {
            race_id,
            vehicle_id,
            session_type: config.session_type,
        })
        .await?;

    let producer = task::spawn(provider.clone().replay(samples, Duration::from_millis(10)));

    while let Some(event) = session.pump().await {
        match event {
            TrackerEvent::SampleRecorded { buffered } => {
                if buffered % 25 == 0 {
                    info!["{} fixes, top speed so far {:.1} mph", buffered, session.metrics().top_speed];
                }
            }
            TrackerEvent::SampleDiscarded => debug!["Fix discarded"],
            TrackerEvent::LocationError(err) => warn!["GPS: {}", err],
            TrackerEvent::AutoSaved(id) => info!["Auto-saved {}", id],
            TrackerEvent::PersistFailed(err) => warn!["Auto-save failed: {}", err],
            TrackerEvent::WatchClosed => break,
        }
    }
    producer.await;

    session.end().await?;
    let metrics = session.metrics().clone();
    info![
        "0-60 {:.2}s, 1/4 mile {:.2}s, 1/2 mile {:.2}s (est.), top {:.1} mph, avg {:.1} mph, {:.3} mi in {:.1}s",
        metrics.zero_to_sixty,
        metrics.quarter_mile,
        metrics.half_mile,
        metrics.top_speed,
        metrics.average_speed,
        metrics.total_distance,
        session.active_duration().as_secs_f64()
    ];

    match session.id().cloned() {
        Some(id) => {
            let stored = store.load_session(&id).await?;
            if stored.route_data == session.route() && stored.performance_metrics == metrics {
                info!["Session {} stored in {}", id, store.directory().display()];
            } else {
                warn!["Session {} did not round-trip cleanly", id];
            }
        }
        None => warn![
            "Session was not persisted: {}",
            session.persistence_warning().unwrap_or("unknown error")
        ],
    }

    registry.dispose(key);
    Ok(())
}
