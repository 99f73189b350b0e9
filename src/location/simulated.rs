use std::collections::HashMap;
use std::sync::{ Arc, Mutex, MutexGuard };
use std::time::Duration;

use async_std::channel;
use async_std::channel::Sender;
use async_std::task;
use async_trait::async_trait;

use crate::error::LocationError;
use crate::location::geo::{ calculate_distance_meters, latitude_delta, EARTH_RADIUS_METERS };
use crate::location::{ GpsSample, LocationProvider, PermissionStatus, PositionOptions, PositionUpdate, Watch, WatchId, WatchOptions };

struct WatchState {
    sender: Sender<PositionUpdate>,
    options: WatchOptions,
    last_emitted: Option<GpsSample>,
}

impl WatchState {
    fn accepts(&self, sample: &GpsSample) -> bool {
        match &self.last_emitted {
            None => true,
            Some(last) => {
                let elapsed = Duration::from_millis(sample.timestamp.saturating_sub(last.timestamp));
                elapsed >= self.options.time_interval
                    && calculate_distance_meters(last, sample) >= self.options.distance_filter
            }
        }
    }
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    watches: HashMap<WatchId, WatchState>,
    last_fix: Option<GpsSample>,
}

/// Software location capability. Fixes and errors are pushed in by the
/// owner and fanned out to every live watch, applying each watch's
/// distance filter and time interval the way a device would.
pub struct SimulatedProvider {
    permission: PermissionStatus,
    fix_latency: Duration,
    inner: Mutex<Inner>,
}

impl SimulatedProvider {
    pub fn new(permission: PermissionStatus) -> SimulatedProvider {
        SimulatedProvider {
            permission,
            fix_latency: Duration::ZERO,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn granted() -> SimulatedProvider {
        SimulatedProvider::new(PermissionStatus::Granted)
    }

    pub fn with_fix_latency(mut self, latency: Duration) -> SimulatedProvider {
        self.fix_latency = latency;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A poisoned lock only means a pushing thread panicked; the map itself
        // is still consistent.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn push_fix(&self, sample: GpsSample) {
        let mut inner = self.lock();
        inner.last_fix = Some(sample.clone());

        inner.watches.retain(|id, watch| {
            if !watch.accepts(&sample) {
                return true;
            }
            watch.last_emitted = Some(sample.clone());
            match watch.sender.try_send(Ok(sample.clone())) {
                Ok(()) => true,
                Err(_) => {
                    debug!["Watch {:?} has no receiver left, dropping it", id];
                    false
                }
            }
        });
    }

    pub fn push_error(&self, error: LocationError) {
        let mut inner = self.lock();
        inner.watches.retain(|_, watch| watch.sender.try_send(Err(error.clone())).is_ok());
    }

    /// Terminates every live watch, as a platform does when the location
    /// service goes away.
    pub fn finish(&self) {
        let mut inner = self.lock();
        info!["Closing {} location watch(es)", inner.watches.len()];
        inner.watches.clear();
    }

    pub fn active_watches(&self) -> usize {
        self.lock().watches.len()
    }

    /// Pushes `samples` one by one, `pace` apart, then finishes.
    pub async fn replay(self: Arc<Self>, samples: Vec<GpsSample>, pace: Duration) {
        info!["Replaying {} simulated fixes", samples.len()];
        for sample in samples {
            self.push_fix(sample);
            task::sleep(pace).await;
        }
        self.finish();
    }
}

#[async_trait]
impl LocationProvider for SimulatedProvider {
    async fn request_permission(&self) -> PermissionStatus {
        self.permission
    }

    async fn current_position(&self, _options: &PositionOptions) -> Result<GpsSample, LocationError> {
        if !self.permission.is_granted() {
            return Err(LocationError::PermissionDenied(self.permission));
        }
        if !self.fix_latency.is_zero() {
            task::sleep(self.fix_latency).await;
        }
        let last_fix = self.lock().last_fix.clone();
        last_fix.ok_or_else(|| LocationError::PositionUnavailable("no fix acquired yet".to_string()))
    }

    fn watch_position(&self, options: &WatchOptions) -> Result<Watch, LocationError> {
        if !self.permission.is_granted() {
            return Err(LocationError::PermissionDenied(self.permission));
        }

        let (sender, updates) = channel::unbounded();
        let mut inner = self.lock();
        let id = WatchId(inner.next_id);
        inner.next_id += 1;
        inner.watches.insert(id, WatchState {
            sender,
            options: options.clone(),
            last_emitted: None,
        });

        Ok(Watch { id, updates })
    }

    fn clear_watch(&self, id: WatchId) {
        self.lock().watches.remove(&id);
    }
}

/// A straight-line, constant-acceleration run heading due north, sampled at a
/// fixed rate. Speeds are capped at `top_speed`.
#[derive(Debug, Clone)]
pub struct DragRun {
    pub latitude: f64,
    pub longitude: f64,
    pub start_ms: u64,
    /// Meters per second squared.
    pub acceleration: f64,
    /// Meters per second.
    pub top_speed: f64,
    pub duration: Duration,
    pub interval: Duration,
}

impl Default for DragRun {
    fn default() -> Self {
        DragRun {
            latitude: 34.1486,
            longitude: -118.2534,
            start_ms: 0,
            acceleration: 6.0,
            top_speed: 60.0,
            duration: Duration::from_secs(20),
            interval: Duration::from_millis(200),
        }
    }
}

impl DragRun {
    pub fn samples(&self) -> Vec<GpsSample> {
        let step_ms = self.interval.as_millis().max(1) as u64;
        let total_ms = self.duration.as_millis() as u64;
        let time_to_top = self.top_speed / self.acceleration;

        (0..=total_ms / step_ms)
            .map(|step| {
                let t = (step * step_ms) as f64 / 1000.0;
                let (traveled, speed) = if t <= time_to_top {
                    (0.5 * self.acceleration * t * t, self.acceleration * t)
                } else {
                    let ramp = 0.5 * self.acceleration * time_to_top * time_to_top;
                    (ramp + self.top_speed * (t - time_to_top), self.top_speed)
                };

                let mut sample = GpsSample::new(
                    self.latitude + latitude_delta(traveled, EARTH_RADIUS_METERS),
                    self.longitude,
                    self.start_ms + step * step_ms,
                );
                sample.speed = Some(speed);
                sample.heading = Some(0.0);
                sample.accuracy = Some(3.0);
                sample
            })
            .collect()
    }
}
