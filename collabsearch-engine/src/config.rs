//! Configuration lookup.
//!
//! The configuration is a JSON-shaped tree loaded from JSON or TOML. Keys are
//! dotted paths from the root (`collaborative.max_age`). Contributor keys use
//! the `<package>$<identifier>.<field>` convention, so every widget instance
//! gets its own section.

use crate::error::{CollabResult, CollaborationError};
use collabsearch_bus::{Bus, Subscription, DEFAULT_CAPACITY, DEFAULT_DEBOUNCE};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default cache lifetime, in seconds, attached to outbound queries.
pub const DEFAULT_MAX_AGE: u64 = 60;

/// Keyed configuration lookup with a dedicated error bus for missing keys.
#[derive(Debug, Clone)]
pub struct ConfigService {
    config: Value,
    errors: Bus<String>,
}

impl Default for ConfigService {
    fn default() -> Self {
        Self::new(Value::Object(Default::default()))
    }
}

impl ConfigService {
    /// Wraps an already-parsed configuration tree.
    pub fn new(config: Value) -> Self {
        Self {
            config,
            errors: Bus::new("config-errors"),
        }
    }

    /// Parses a JSON configuration.
    pub fn from_json_str(s: &str) -> CollabResult<Self> {
        Ok(Self::new(serde_json::from_str(s)?))
    }

    /// Parses a TOML configuration.
    pub fn from_toml_str(s: &str) -> CollabResult<Self> {
        let table: toml::Value =
            toml::from_str(s).map_err(|e| CollaborationError::Serialization(e.to_string()))?;
        Ok(Self::new(serde_json::to_value(table)?))
    }

    /// Loads a configuration file, picking the format from its extension
    /// (`.toml`, anything else is read as JSON). Falls back to an empty
    /// configuration with a warning when the file is missing or malformed.
    pub fn load_from(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                warn!("Failed to read config file {:?}: {}", path, e);
                return Self::default();
            }
        };
        let is_toml = path.extension().is_some_and(|ext| ext == "toml");
        let parsed = if is_toml {
            Self::from_toml_str(&contents)
        } else {
            Self::from_json_str(&contents)
        };
        match parsed {
            Ok(service) => {
                info!("Loaded configuration from {:?}", path);
                service
            }
            Err(e) => {
                warn!("Failed to parse config file {:?}: {}. Using empty configuration.", path, e);
                Self::default()
            }
        }
    }

    /// The whole configuration tree.
    pub fn config(&self) -> &Value {
        &self.config
    }

    /// Replaces the configuration tree.
    pub fn set_config(&mut self, config: Value) {
        self.config = config;
    }

    /// Looks up a key. A missing (or null) key is published on the error bus
    /// and yields `None`.
    pub fn get_value(&self, key: &str) -> Option<Value> {
        match self.try_value(key) {
            Some(value) => Some(value.clone()),
            None => {
                debug!(key, "configuration key not found");
                self.errors.publish(key.to_string());
                None
            }
        }
    }

    /// Looks up a key without reporting a miss.
    pub fn try_value(&self, key: &str) -> Option<&Value> {
        let mut current = &self.config;
        for segment in key.split('.') {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        (!current.is_null()).then_some(current)
    }

    /// Looks up a contributor field under `<package>$<identifier>.<field>`.
    pub fn contributor_value(&self, package: &str, identifier: &str, field: &str) -> Option<Value> {
        self.get_value(&contributor_key(package, identifier, field))
    }

    /// Subscribes to missing-key reports.
    pub fn errors(&self) -> Subscription<String> {
        self.errors.subscribe()
    }
}

/// Builds the configuration key of a contributor field.
pub fn contributor_key(package: &str, identifier: &str, field: &str) -> String {
    format!("{package}${identifier}.{field}")
}

/// Engine-wide settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Collection assumed for legacy single-filter collaborations.
    pub default_collection: Option<String>,
    /// Cache lifetime, in seconds, attached to every outbound query.
    pub max_age: u64,
    /// Debounce window of contributor subscriptions.
    pub debounce: Duration,
    /// Capacity of every bus.
    pub bus_capacity: usize,
    /// Refresh the per-collection counts after every collaboration event.
    pub refresh_count_all: bool,
    /// Flag enable/disable events with `all: true`, so every contributor
    /// re-evaluates. Existing widget consumers rely on it.
    pub broadcast_enable_as_all: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_collection: None,
            max_age: DEFAULT_MAX_AGE,
            debounce: DEFAULT_DEBOUNCE,
            bus_capacity: DEFAULT_CAPACITY,
            refresh_count_all: true,
            broadcast_enable_as_all: true,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct EngineSection {
    default_collection: Option<String>,
    max_age: Option<u64>,
    debounce_ms: Option<u64>,
    bus_capacity: Option<usize>,
    refresh_count_all: Option<bool>,
    broadcast_enable_as_all: Option<bool>,
}

impl EngineConfig {
    /// Reads the optional `collaborative` section. Absent fields keep their
    /// defaults; a malformed section is ignored with a warning.
    pub fn from_config(config: &ConfigService) -> Self {
        let defaults = Self::default();
        let Some(section) = config.try_value("collaborative") else {
            return defaults;
        };
        let section: EngineSection = match serde_json::from_value(section.clone()) {
            Ok(section) => section,
            Err(e) => {
                warn!("Ignoring malformed collaborative section: {}", e);
                return defaults;
            }
        };
        Self {
            default_collection: section.default_collection.or(defaults.default_collection),
            max_age: section.max_age.unwrap_or(defaults.max_age),
            debounce: section
                .debounce_ms
                .map_or(defaults.debounce, Duration::from_millis),
            bus_capacity: section.bus_capacity.unwrap_or(defaults.bus_capacity),
            refresh_count_all: section
                .refresh_count_all
                .unwrap_or(defaults.refresh_count_all),
            broadcast_enable_as_all: section
                .broadcast_enable_as_all
                .unwrap_or(defaults.broadcast_enable_as_all),
        }
    }

    #[must_use]
    pub fn with_default_collection(mut self, collection: impl Into<String>) -> Self {
        self.default_collection = Some(collection.into());
        self
    }
}
