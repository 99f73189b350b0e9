pub mod registry;

use std::fmt;
use std::sync::Arc;
use std::time::{ Duration, Instant };

use async_std::channel::Receiver;
use async_std::prelude::*;
use async_std::stream;
use async_std::stream::Interval;
use serde::{ Deserialize, Serialize };

use crate::error::{ LocationError, PersistenceError, SessionError };
use crate::location::{ now_ms, GpsSample, LocationSampler, PositionUpdate, WatchOptions };
use crate::metrics;
use crate::metrics::PerformanceMetrics;
use crate::store::{ SessionId, SessionRecord, SessionStore };

pub use registry::{ SessionKey, SessionRegistry };

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Active,
    Paused,
    Ended,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Active => "active",
            SessionState::Paused => "paused",
            SessionState::Ended => "ended",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionType {
    Race,
    Drag,
    Practice,
}

impl Default for SessionType {
    fn default() -> Self {
        SessionType::Race
    }
}

/// What a session is tracking. Race and vehicle ids belong to the metadata
/// service and are passed through untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionContext {
    pub race_id: Option<String>,
    pub vehicle_id: Option<String>,
    pub session_type: SessionType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    pub watch: WatchOptions,
    /// `None` disables auto-persist.
    pub auto_save_interval: Option<Duration>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        SessionOptions {
            watch: WatchOptions::racing(),
            auto_save_interval: Some(Duration::from_secs(30)),
        }
    }
}

#[derive(Debug)]
pub enum TrackerEvent {
    SampleRecorded { buffered: usize },
    SampleDiscarded,
    LocationError(LocationError),
    /// The platform ended the watch subscription.
    WatchClosed,
    AutoSaved(SessionId),
    PersistFailed(String),
}

enum Tick {
    /// `None` once the watch channel is closed.
    Position(Option<PositionUpdate>),
    AutoSave,
}

/// One tracked race attempt.
///
/// The route buffer only grows while the session is active, is never
/// reordered, and the metrics are always recomputed from it in full.
pub struct RaceSession {
    id: Option<SessionId>,
    context: SessionContext,
    state: SessionState,
    route: Vec<GpsSample>,
    lap_markers: Vec<u64>,
    metrics: PerformanceMetrics,
    start_time: Option<u64>,
    end_time: Option<u64>,
    active_since: Option<Instant>,
    active_elapsed: Duration,
    discarded: usize,
    last_error: Option<LocationError>,
    persistence_warning: Option<String>,

    options: SessionOptions,
    sampler: LocationSampler,
    store: Arc<dyn SessionStore>,
    subscription: Option<Receiver<PositionUpdate>>,
    autosave: Option<Interval>,
}

impl RaceSession {
    pub fn new(sampler: LocationSampler, store: Arc<dyn SessionStore>, options: SessionOptions) -> RaceSession {
        RaceSession {
            id: None,
            context: SessionContext::default(),
            state: SessionState::Idle,
            route: vec![],
            lap_markers: vec![],
            metrics: PerformanceMetrics::default(),
            start_time: None,
            end_time: None,
            active_since: None,
            active_elapsed: Duration::ZERO,
            discarded: 0,
            last_error: None,
            persistence_warning: None,
            options,
            sampler,
            store,
            subscription: None,
            autosave: None,
        }
    }

    pub async fn load(
        id: &SessionId,
        sampler: LocationSampler,
        store: Arc<dyn SessionStore>,
        options: SessionOptions,
    ) -> Result<RaceSession, PersistenceError> {
        let record = store.load_session(id).await?;

        let mut session = RaceSession::new(sampler, store, options);
        session.id = Some(record.session_id.unwrap_or_else(|| id.clone()));
        session.context = SessionContext {
            race_id: record.race_id,
            vehicle_id: record.vehicle_id,
            session_type: record.session_type,
        };
        session.route = record.route_data;
        session.lap_markers = record.lap_markers;
        session.metrics = record.performance_metrics;
        session.start_time = record.start_time;
        session.end_time = record.end_time;
        session.state = SessionState::Ended;

        Ok(session)
    }

    pub fn id(&self) -> Option<&SessionId> {
        self.id.as_ref()
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn route(&self) -> &[GpsSample] {
        &self.route
    }

    pub fn metrics(&self) -> &PerformanceMetrics {
        &self.metrics
    }

    pub fn start_time(&self) -> Option<u64> {
        self.start_time
    }

    pub fn end_time(&self) -> Option<u64> {
        self.end_time
    }

    pub fn discarded(&self) -> usize {
        self.discarded
    }

    pub fn last_error(&self) -> Option<&LocationError> {
        self.last_error.as_ref()
    }

    pub fn persistence_warning(&self) -> Option<&str> {
        self.persistence_warning.as_deref()
    }

    pub fn active_duration(&self) -> Duration {
        self.active_elapsed + self.active_since.map(|since| since.elapsed()).unwrap_or_default()
    }

    fn require(&self, allowed: &[SessionState], operation: &'static str) -> Result<(), SessionError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(SessionError::InvalidTransition { state: self.state, operation })
        }
    }

    fn transition(&mut self, next: SessionState) {
        info!["Session {} -> {}", self.state, next];
        self.state = next;
    }

    fn watch(&mut self) -> Result<Receiver<PositionUpdate>, SessionError> {
        match self.sampler.start_watching(&self.options.watch) {
            Ok(updates) => Ok(updates),
            Err(err) => {
                warn!["Could not subscribe to location updates: {}", err];
                self.last_error = Some(err.clone());
                Err(err.into())
            }
        }
    }

    fn arm(&mut self, updates: Receiver<PositionUpdate>) {
        self.subscription = Some(updates);
        self.autosave = self.options.auto_save_interval.map(stream::interval);
        self.active_since = Some(Instant::now());
    }

    /// Unsubscribes before returning, so nothing can be appended afterwards.
    fn disarm(&mut self) {
        self.sampler.stop_watching();
        self.subscription = None;
        self.autosave = None;
        if let Some(since) = self.active_since.take() {
            self.active_elapsed += since.elapsed();
        }
    }

    pub async fn start(&mut self, context: SessionContext) -> Result<(), SessionError> {
        self.require(&[SessionState::Idle], "start")?;

        let status = self.sampler.request_permission().await;
        if !status.is_granted() {
            self.last_error = Some(LocationError::PermissionDenied(status));
            return Err(SessionError::Permission(status));
        }
        let updates = self.watch()?;

        self.context = context;
        self.route.clear();
        self.lap_markers.clear();
        self.metrics = PerformanceMetrics::default();
        self.last_error = None;
        self.start_time = Some(now_ms());
        self.active_elapsed = Duration::ZERO;
        self.arm(updates);
        self.transition(SessionState::Active);

        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), SessionError> {
        self.require(&[SessionState::Active], "pause")?;
        self.disarm();
        self.transition(SessionState::Paused);
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), SessionError> {
        self.require(&[SessionState::Paused], "resume")?;
        let updates = self.watch()?;
        self.arm(updates);
        self.transition(SessionState::Active);
        Ok(())
    }

    /// Finishes the session and makes a final persist attempt. A failed
    /// persist is left on `persistence_warning`; the session still ends.
    pub async fn end(&mut self) -> Result<(), SessionError> {
        self.require(&[SessionState::Active, SessionState::Paused], "end")?;

        self.disarm();
        self.end_time = Some(now_ms());
        self.recompute();
        self.transition(SessionState::Ended);

        if self.save_session().await.is_err() {
            warn!["Final save failed, keeping {} fixes in memory for a retry", self.route.len()];
        }
        Ok(())
    }

    /// Appends a fix while active. Returns whether it was kept.
    pub fn on_sample_received(&mut self, sample: GpsSample) -> bool {
        if self.state != SessionState::Active {
            trace!["Dropping fix while {}", self.state];
            self.discarded += 1;
            return false;
        }
        if let Some(last) = self.route.last() {
            if sample.timestamp < last.timestamp {
                debug!["Dropping out-of-order fix at {} (last {})", sample.timestamp, last.timestamp];
                self.discarded += 1;
                return false;
            }
        }

        self.route.push(sample);
        self.recompute();
        true
    }

    pub fn mark_lap(&mut self) -> Result<(), SessionError> {
        let at = self.route.last().map(|sample| sample.timestamp).unwrap_or_else(now_ms);
        self.mark_lap_at(at)
    }

    /// Records an external lap boundary at `timestamp` (ms).
    pub fn mark_lap_at(&mut self, timestamp: u64) -> Result<(), SessionError> {
        self.require(&[SessionState::Active, SessionState::Paused], "mark a lap on")?;
        self.lap_markers.push(timestamp);
        self.recompute();
        Ok(())
    }

    fn recompute(&mut self) {
        self.metrics = metrics::compute(&self.route, &self.lap_markers);
    }

    pub fn to_record(&self) -> SessionRecord {
        SessionRecord {
            session_id: self.id.clone(),
            race_id: self.context.race_id.clone(),
            vehicle_id: self.context.vehicle_id.clone(),
            session_type: self.context.session_type,
            route_data: self.route.clone(),
            performance_metrics: self.metrics.clone(),
            lap_markers: self.lap_markers.clone(),
            start_time: self.start_time,
            end_time: self.end_time,
        }
    }

    /// Persists the current state. The first success assigns the session id;
    /// later calls overwrite under it.
    pub async fn save_session(&mut self) -> Result<SessionId, PersistenceError> {
        let record = self.to_record();
        match self.store.save_session(self.id.as_ref(), &record).await {
            Ok(id) => {
                if self.id.is_none() {
                    info!["Session saved as {}", id];
                }
                self.id = Some(id.clone());
                self.persistence_warning = None;
                Ok(id)
            }
            Err(err) => {
                warn!["Failed to save session: {}", err];
                self.persistence_warning = Some(err.to_string());
                Err(err)
            }
        }
    }

    async fn next_tick(&mut self) -> Option<Tick> {
        match (self.subscription.as_ref(), self.autosave.as_mut()) {
            (None, None) => None,
            (Some(updates), None) => Some(Tick::Position(updates.recv().await.ok())),
            (None, Some(timer)) => timer.next().await.map(|_| Tick::AutoSave),
            (Some(updates), Some(timer)) => {
                let position = async { Some(Tick::Position(updates.recv().await.ok())) };
                let save = async { timer.next().await.map(|_| Tick::AutoSave) };
                position.race(save).await
            }
        }
    }

    /// Waits for the next location update or auto-persist tick and applies
    /// it. Returns `None` when nothing is armed (idle, paused or ended).
    pub async fn pump(&mut self) -> Option<TrackerEvent> {
        let event = match self.next_tick().await? {
            Tick::Position(Some(Ok(sample))) => {
                if self.on_sample_received(sample) {
                    TrackerEvent::SampleRecorded { buffered: self.route.len() }
                } else {
                    TrackerEvent::SampleDiscarded
                }
            }
            Tick::Position(Some(Err(err))) => {
                warn!["Location update failed: {}", err];
                self.last_error = Some(err.clone());
                TrackerEvent::LocationError(err)
            }
            Tick::Position(None) => {
                info!["Location watch closed by the platform"];
                self.sampler.stop_watching();
                self.subscription = None;
                TrackerEvent::WatchClosed
            }
            Tick::AutoSave => match self.save_session().await {
                Ok(id) => TrackerEvent::AutoSaved(id),
                Err(err) => TrackerEvent::PersistFailed(err.to_string()),
            },
        };
        Some(event)
    }
}
