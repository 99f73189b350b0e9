//! Race session tracking: GPS sampling, a pause/resume session lifecycle,
//! performance metrics derived from the recorded route, and persistence of
//! finished runs.

#[macro_use] extern crate log;

pub mod config;
pub mod error;
pub mod location;
pub mod metadata;
pub mod metrics;
pub mod session;
pub mod store;

pub use config::Config;
pub use error::{ ConfigError, LocationError, PersistenceError, SessionError };
pub use location::{ GpsSample, LocationProvider, LocationSampler, PermissionStatus };
pub use metrics::PerformanceMetrics;
pub use session::{ RaceSession, SessionContext, SessionRegistry, SessionState, TrackerEvent };
pub use store::{ JsonFileStore, MemoryStore, SessionId, SessionRecord, SessionStore };
