pub mod geo;
pub mod sampler;
pub mod simulated;

use std::fmt;
use std::time::{ Duration, SystemTime, UNIX_EPOCH };

use async_std::channel::Receiver;
use async_trait::async_trait;
use serde::{ Deserialize, Serialize };

use crate::error::LocationError;

pub use geo::{ calculate_distance, calculate_distance_meters, calculate_speed };
pub use sampler::LocationSampler;
pub use simulated::SimulatedProvider;

/// One GPS fix. Timestamps are milliseconds since the unix epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GpsSample {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    /// Meters per second, as reported by the device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
    pub timestamp: u64,
}

impl GpsSample {
    pub fn new(latitude: f64, longitude: f64, timestamp: u64) -> GpsSample {
        GpsSample {
            latitude,
            longitude,
            altitude: None,
            accuracy: None,
            speed: None,
            heading: None,
            timestamp,
        }
    }

    pub fn age_at(&self, now_ms: u64) -> Duration {
        Duration::from_millis(now_ms.saturating_sub(self.timestamp))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
    Restricted,
    Undetermined,
}

impl PermissionStatus {
    pub fn is_granted(self) -> bool {
        self == PermissionStatus::Granted
    }
}

impl fmt::Display for PermissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PermissionStatus::Granted => "granted",
            PermissionStatus::Denied => "denied",
            PermissionStatus::Restricted => "restricted",
            PermissionStatus::Undetermined => "undetermined",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accuracy {
    High,
    Low,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PositionOptions {
    pub accuracy: Accuracy,
    pub timeout: Duration,
    /// Cached fixes up to this age are acceptable.
    pub maximum_age: Duration,
}

impl Default for PositionOptions {
    fn default() -> Self {
        PositionOptions {
            accuracy: Accuracy::High,
            timeout: Duration::from_secs(15),
            maximum_age: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WatchOptions {
    pub accuracy: Accuracy,
    /// Minimum movement in meters between two reported fixes.
    pub distance_filter: f64,
    /// Minimum time between two reported fixes.
    pub time_interval: Duration,
}

impl WatchOptions {
    /// Dense sampling used while a race is being tracked.
    pub fn racing() -> WatchOptions {
        WatchOptions {
            accuracy: Accuracy::High,
            distance_filter: 1.0,
            time_interval: Duration::from_millis(100),
        }
    }
}

impl Default for WatchOptions {
    fn default() -> Self {
        WatchOptions::racing()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(pub u64);

/// What a watch subscription delivers: a fix, or a transient acquisition
/// failure on the same channel.
pub type PositionUpdate = Result<GpsSample, LocationError>;

/// A live subscription. Dropping the receiver stops delivery to this
/// consumer; `LocationProvider::clear_watch` releases the platform side.
pub struct Watch {
    pub id: WatchId,
    pub updates: Receiver<PositionUpdate>,
}

/// The platform location capability the tracker is built on.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn request_permission(&self) -> PermissionStatus;

    async fn current_position(&self, options: &PositionOptions) -> Result<GpsSample, LocationError>;

    fn watch_position(&self, options: &WatchOptions) -> Result<Watch, LocationError>;

    fn clear_watch(&self, id: WatchId);
}

pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}
