//! Database configuration file.
//!
//! Defines the YAML-serializable settings that say which database to open,
//! where its migrations live, how statements are traced and which pragmas
//! to apply after opening.
//!
//! # Example YAML
//!
//! ```yaml
//! version: "1.0"
//! database: app.db
//! migrations: migrations/
//! trace: finish
//! verbose: false
//! read_only: false
//! atomic_migrations: true
//! pragmas:
//!   foreign_keys: 1
//!   journal_mode: WAL
//! ```

use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sqlmigrate_core::{TraceMode, Value};

use crate::error::Result;

/// Target used when a configuration names no database.
pub const DEFAULT_DATABASE: &str = ":memory:";

fn default_version() -> String {
    "1.0".to_string()
}

fn default_database() -> String {
    DEFAULT_DATABASE.to_string()
}

fn default_true() -> bool {
    true
}

/// Top-level database configuration.
///
/// Every field has a default, so an empty file is a valid configuration
/// for an in-memory database without migrations.
///
/// # Examples
///
/// ```
/// use sqlmigrate_source::DatabaseConfig;
///
/// let config: DatabaseConfig = serde_yaml::from_str("database: app.db").unwrap();
/// assert_eq!(config.database, "app.db");
/// assert!(config.atomic_migrations);
/// assert!(config.pragmas.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Configuration format version.
    #[serde(default = "default_version")]
    pub version: String,
    /// Database target: a path, `""` for an anonymous disk database, or
    /// `:memory:`.
    #[serde(default = "default_database")]
    pub database: String,
    /// Migration directory or bundle file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migrations: Option<PathBuf>,
    /// Statement tracing reported to the log sink.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<TraceMode>,
    /// Also forward the engine's own trace and profile hooks.
    #[serde(default)]
    pub verbose: bool,
    /// Open the database read-only.
    #[serde(default)]
    pub read_only: bool,
    /// Run each migration inside its own transaction.
    #[serde(default = "default_true")]
    pub atomic_migrations: bool,
    /// Pragmas applied after opening, in file order.
    #[serde(default, with = "ordered_pragmas")]
    pub pragmas: Vec<(String, Value)>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            database: default_database(),
            migrations: None,
            trace: None,
            verbose: false,
            read_only: false,
            atomic_migrations: true,
            pragmas: Vec::new(),
        }
    }
}

impl DatabaseConfig {
    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::SourceError::IoError) if the file cannot
    /// be read, or [`YamlError`](crate::SourceError::YamlError) if parsing
    /// fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let config = serde_yaml::from_reader(reader)?;
        Ok(config)
    }

    /// Saves the configuration as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::SourceError::IoError) if the file cannot
    /// be written, or [`YamlError`](crate::SourceError::YamlError) if
    /// serialization fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }

    /// Returns the configured value for `pragma`, if any.
    pub fn pragma(&self, pragma: &str) -> Option<&Value> {
        self.pragmas
            .iter()
            .find(|(name, _)| name == pragma)
            .map(|(_, value)| value)
    }
}

/// Serializes `Vec<(String, Value)>` as a mapping while keeping order.
mod ordered_pragmas {
    use std::fmt;

    use serde::de::{MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserializer, Serializer};
    use sqlmigrate_core::Value as SqlValue;

    pub fn serialize<S: Serializer>(
        pragmas: &[(String, SqlValue)],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(pragmas.len()))?;
        for (name, value) in pragmas {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<(String, SqlValue)>, D::Error> {
        struct PragmaVisitor;

        impl<'de> Visitor<'de> for PragmaVisitor {
            type Value = Vec<(String, SqlValue)>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a mapping of pragma names to values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut pragmas = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((name, value)) = access.next_entry::<String, SqlValue>()? {
                    pragmas.push((name, value));
                }
                Ok(pragmas)
            }

            fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
                Ok(Vec::new())
            }
        }

        deserializer.deserialize_any(PragmaVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_yaml() -> &'static str {
        r#"
version: "1.0"
database: app.db
migrations: migrations/
trace: finish
verbose: true
read_only: false
atomic_migrations: false
pragmas:
  journal_mode: WAL
  foreign_keys: 1
  cache_size: 0
"#
    }

    #[test]
    fn test_deserialize_complete() {
        let config: DatabaseConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        assert_eq!(config.database, "app.db");
        assert_eq!(config.migrations, Some(PathBuf::from("migrations/")));
        assert_eq!(config.trace, Some(TraceMode::Finish));
        assert!(config.verbose);
        assert!(!config.atomic_migrations);
        let names: Vec<&str> = config.pragmas.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["journal_mode", "foreign_keys", "cache_size"]);
        assert_eq!(config.pragma("journal_mode"), Some(&Value::from("WAL")));
        assert_eq!(config.pragma("cache_size"), Some(&Value::Integer(0)));
    }

    #[test]
    fn test_deserialize_minimal_uses_defaults() {
        let config: DatabaseConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, DatabaseConfig::default());
        assert_eq!(config.database, DEFAULT_DATABASE);
        assert!(config.trace.is_none());
    }

    #[test]
    fn test_empty_pragmas_key() {
        let config: DatabaseConfig = serde_yaml::from_str("pragmas:\n").unwrap();
        assert!(config.pragmas.is_empty());
    }

    #[test]
    fn test_load_save_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sqlmigrate.yml");

        let original: DatabaseConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        original.save(&path).unwrap();

        let loaded = DatabaseConfig::load(&path).unwrap();
        assert_eq!(loaded, original);
    }
}
