use std::collections::HashMap;

use async_trait::async_trait;
use yaml_rust::Yaml;

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq)]
pub struct RaceInfo {
    pub id: String,
    pub name: String,
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VehicleInfo {
    pub id: String,
    pub make: String,
    pub model: String,
    pub year: Option<u32>,
}

impl VehicleInfo {
    pub fn label(&self) -> String {
        match self.year {
            Some(year) => format!["{} {} {}", year, self.make, self.model],
            None => format!["{} {}", self.make, self.model],
        }
    }
}

/// Read-only lookup of the races and vehicles sessions refer to. The tracker
/// never validates its ids against this.
#[async_trait]
pub trait RaceCatalog: Send + Sync {
    async fn race(&self, id: &str) -> Option<RaceInfo>;

    async fn vehicle(&self, id: &str) -> Option<VehicleInfo>;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaticCatalog {
    races: HashMap<String, RaceInfo>,
    vehicles: HashMap<String, VehicleInfo>,
}

fn required_str(entry: &Yaml, key: &str, section: &str) -> Result<String, ConfigError> {
    entry[key]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| ConfigError::Invalid(format!["{} entry is missing '{}'", section, key]))
}

impl StaticCatalog {
    pub fn new(races: Vec<RaceInfo>, vehicles: Vec<VehicleInfo>) -> StaticCatalog {
        StaticCatalog {
            races: races.into_iter().map(|race| (race.id.clone(), race)).collect(),
            vehicles: vehicles.into_iter().map(|vehicle| (vehicle.id.clone(), vehicle)).collect(),
        }
    }

    /// Reads the `races` and `vehicles` lists of a config document. Missing
    /// lists are empty.
    pub fn from_yaml(doc: &Yaml) -> Result<StaticCatalog, ConfigError> {
        let mut races = vec![];
        if let Some(entries) = doc["races"].as_vec() {
            for entry in entries {
                races.push(RaceInfo {
                    id: required_str(entry, "id", "race")?,
                    name: required_str(entry, "name", "race")?,
                    location: entry["location"].as_str().map(str::to_string),
                });
            }
        }

        let mut vehicles = vec![];
        if let Some(entries) = doc["vehicles"].as_vec() {
            for entry in entries {
                let year = match &entry["year"] {
                    Yaml::Integer(year) if *year > 0 => Some(*year as u32),
                    Yaml::BadValue | Yaml::Null => None,
                    other => return Err(ConfigError::Invalid(format!["vehicle year {:?} is not a year", other])),
                };
                vehicles.push(VehicleInfo {
                    id: required_str(entry, "id", "vehicle")?,
                    make: required_str(entry, "make", "vehicle")?,
                    model: required_str(entry, "model", "vehicle")?,
                    year,
                });
            }
        }

        Ok(StaticCatalog::new(races, vehicles))
    }

    pub fn len(&self) -> usize {
        self.races.len() + self.vehicles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RaceCatalog for StaticCatalog {
    async fn race(&self, id: &str) -> Option<RaceInfo> {
        self.races.get(id).cloned()
    }

    async fn vehicle(&self, id: &str) -> Option<VehicleInfo> {
        self.vehicles.get(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use yaml_rust::YamlLoader;

    fn parse(text: &str) -> Result<StaticCatalog, ConfigError> {
        StaticCatalog::from_yaml(&YamlLoader::load_from_str(text).unwrap()[0])
    }

    #[async_std::test]
    async fn lookups_from_yaml() {
        let catalog = parse(
            "
races:
  - id: mulholland
    name: Mulholland Sprint
    location: Los Angeles
vehicles:
  - id: gt86
    make: Toyota
    model: GT86
    year: 2017
  - id: e30
    make: BMW
    model: M3
",
        )
        .unwrap();

        assert_eq!(3, catalog.len());
        assert_eq!("Mulholland Sprint", catalog.race("mulholland").await.unwrap().name);
        assert_eq!("2017 Toyota GT86", catalog.vehicle("gt86").await.unwrap().label());
        assert_eq!("BMW M3", catalog.vehicle("e30").await.unwrap().label());
        assert_eq!(None, catalog.race("unknown").await);
    }

    #[test]
    fn incomplete_entries_are_rejected() {
        assert!(matches!(parse("races:\n  - id: x\n"), Err(ConfigError::Invalid(_))));
        assert!(matches!(
            parse("vehicles:\n  - { id: a, make: b, model: c, year: soon }\n"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn missing_sections_are_empty() {
        assert!(parse("storage:\n  directory: x\n").unwrap().is_empty());
    }
}
