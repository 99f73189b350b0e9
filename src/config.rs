use std::convert::TryFrom;
use std::path::{ Path, PathBuf };
use std::time::Duration;

use async_std::fs;
use yaml_rust::{ Yaml, YamlLoader };

use crate::error::ConfigError;
use crate::location::{ Accuracy, PositionOptions, WatchOptions };
use crate::metadata::StaticCatalog;
use crate::session::{ SessionOptions, SessionType };

pub const DEFAULT_STORAGE_DIRECTORY: &str = "sessions";

/// Everything the tracker reads from its YAML config file. Every key is
/// optional.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub position: PositionOptions,
    pub session: SessionOptions,
    pub session_type: SessionType,
    pub storage_directory: PathBuf,
    pub catalog: StaticCatalog,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            position: PositionOptions::default(),
            session: SessionOptions::default(),
            session_type: SessionType::default(),
            storage_directory: PathBuf::from(DEFAULT_STORAGE_DIRECTORY),
            catalog: StaticCatalog::default(),
        }
    }
}

fn number(value: &Yaml, key: &str, default: f64) -> Result<f64, ConfigError> {
    match value {
        Yaml::Real(_) => value.as_f64().ok_or_else(|| ConfigError::Invalid(format!["'{}' is not a number", key])),
        Yaml::Integer(int) => Ok(*int as f64),
        Yaml::BadValue | Yaml::Null => Ok(default),
        other => Err(ConfigError::Invalid(format!["'{}' must be a number, got {:?}", key, other])),
    }
}

fn millis(value: &Yaml, key: &str, default: Duration) -> Result<Duration, ConfigError> {
    let ms = number(value, key, default.as_millis() as f64)?;
    if ms < 0.0 {
        return Err(ConfigError::Invalid(format!["'{}' must not be negative", key]));
    }
    Ok(Duration::from_millis(ms as u64))
}

fn accuracy(value: &Yaml, default: Accuracy) -> Result<Accuracy, ConfigError> {
    match value {
        Yaml::BadValue | Yaml::Null => Ok(default),
        Yaml::String(name) => match name.as_str() {
            "high" => Ok(Accuracy::High),
            "low" => Ok(Accuracy::Low),
            other => Err(ConfigError::Invalid(format!["unknown accuracy '{}'", other])),
        },
        other => Err(ConfigError::Invalid(format!["accuracy must be high or low, got {:?}", other])),
    }
}

fn session_type(value: &Yaml) -> Result<SessionType, ConfigError> {
    match value {
        Yaml::BadValue | Yaml::Null => Ok(SessionType::default()),
        Yaml::String(name) => match name.as_str() {
            "race" => Ok(SessionType::Race),
            "drag" => Ok(SessionType::Drag),
            "practice" => Ok(SessionType::Practice),
            other => Err(ConfigError::Invalid(format!["unknown session type '{}'", other])),
        },
        other => Err(ConfigError::Invalid(format!["session type must be a string, got {:?}", other])),
    }
}

impl Config {
    pub async fn load(path: &Path) -> Result<Config, ConfigError> {
        info!["Loading config file {}", path.display()];
        let text = fs::read_to_string(path).await?;
        Config::try_from(text.as_str())
    }

    fn from_document(doc: &Yaml) -> Result<Config, ConfigError> {
        let defaults = Config::default();
        let location = &doc["location"];
        let session = &doc["session"];

        let accuracy = accuracy(&location["accuracy"], defaults.position.accuracy)?;
        let position = PositionOptions {
            accuracy,
            timeout: millis(&location["timeout_ms"], "timeout_ms", defaults.position.timeout)?,
            maximum_age: millis(&location["maximum_age_ms"], "maximum_age_ms", defaults.position.maximum_age)?,
        };

        let racing = WatchOptions::racing();
        let distance_filter = number(&location["distance_filter_m"], "distance_filter_m", racing.distance_filter)?;
        if distance_filter < 0.0 {
            return Err(ConfigError::Invalid("'distance_filter_m' must not be negative".to_string()));
        }
        let watch = WatchOptions {
            accuracy,
            distance_filter,
            time_interval: millis(&location["time_interval_ms"], "time_interval_ms", racing.time_interval)?,
        };

        let default_save = defaults.session.auto_save_interval.unwrap_or_default();
        let auto_save = millis(&session["auto_save_interval_ms"], "auto_save_interval_ms", default_save)?;
        let auto_save_interval = if auto_save.is_zero() { None } else { Some(auto_save) };

        let storage_directory = match &doc["storage"]["directory"] {
            Yaml::String(directory) => PathBuf::from(directory),
            Yaml::BadValue | Yaml::Null => defaults.storage_directory,
            other => return Err(ConfigError::Invalid(format!["storage directory must be a string, got {:?}", other])),
        };

        Ok(Config {
            position,
            session: SessionOptions { watch, auto_save_interval },
            session_type: session_type(&session["session_type"])?,
            storage_directory,
            catalog: StaticCatalog::from_yaml(doc)?,
        })
    }
}

impl TryFrom<&str> for Config {
    type Error = ConfigError;

    fn try_from(text: &str) -> Result<Self, Self::Error> {
        let docs = YamlLoader::load_from_str(text)?;
        match docs.first() {
            Some(doc) => Config::from_document(doc),
            None => Ok(Config::default()),
        }
    }
}
