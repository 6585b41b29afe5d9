//! Migration loading with builder pattern and fallback chains.
//!
//! Provides [`MigrationSet`], an ordered list of
//! [`MigrationDescriptor`]s read from disk, and [`MigrationSetBuilder`]
//! for trying several locations in turn.
//!
//! # Loading patterns
//!
//! ```no_run
//! use sqlmigrate_source::MigrationSet;
//!
//! // A directory of `<version>_<name>.sql` files
//! let set = MigrationSet::from_dir("migrations/").unwrap();
//!
//! // A single JSON or YAML bundle
//! let set = MigrationSet::from_bundle("migrations.yaml").unwrap();
//!
//! // The first location that loads wins
//! let set = MigrationSet::builder()
//!     .from_dir("/etc/app/migrations/")
//!     .from_bundle("migrations.json")
//!     .build()
//!     .unwrap();
//! ```

use std::collections::BTreeMap;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlmigrate_core::{MigrationDescriptor, validate_migrations};
use tracing::{debug, warn};

use crate::error::{Result, SourceError};

static FILE_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)(?:[_-](.+))?\.sql$").expect("static regex must compile")
});

/// Describes where a [`MigrationSet`] was loaded from.
#[derive(Debug, Clone, PartialEq)]
pub enum MigrationOrigin {
    /// A directory of `.sql` files.
    Directory(PathBuf),
    /// A single JSON or YAML bundle file.
    Bundle(PathBuf),
    /// Built in code.
    Inline,
    /// Loaded through a fallback chain of multiple locations.
    Multiple(Vec<MigrationOrigin>),
}

/// On-disk bundle layout.
///
/// ```yaml
/// name: app
/// migrations:
///   - version: 1
///     name: init
///     statements:
///       - CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)
///   - version: 2
///     statements:
///       - ALTER TABLE users ADD COLUMN email TEXT
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MigrationBundle {
    /// Optional bundle label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Descriptors in application order.
    #[serde(default)]
    pub migrations: Vec<MigrationDescriptor>,
}

/// Ordered migration descriptors plus where they came from.
///
/// Every constructor rejects lists with zero versions, duplicate versions
/// or descending versions. Descriptors without statements are kept and
/// logged at `warn`.
#[derive(Debug, Clone)]
pub struct MigrationSet {
    migrations: Vec<MigrationDescriptor>,
    origin: MigrationOrigin,
}

impl MigrationSet {
    /// Returns a new [`MigrationSetBuilder`] for configuring a fallback chain.
    pub fn builder() -> MigrationSetBuilder {
        MigrationSetBuilder::new()
    }

    /// Wraps descriptors built in code.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Validation`] for the first fatal problem.
    pub fn from_migrations(migrations: Vec<MigrationDescriptor>) -> Result<Self> {
        Self::checked(migrations, MigrationOrigin::Inline)
    }

    /// Loads every `<version>_<name>.sql` (or `<version>.sql`) file in a
    /// directory, ordered by version.
    ///
    /// Each file becomes one descriptor whose single statement entry is the
    /// whole file body. Files with other extensions are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::IoError`] if the directory or a file cannot be
    /// read, [`SourceError::InvalidFileName`] for a `.sql` file without a
    /// leading version, or [`SourceError::Validation`] for duplicate or zero
    /// versions.
    pub fn from_dir(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut by_version: BTreeMap<u32, Vec<MigrationDescriptor>> = BTreeMap::new();

        for entry in std::fs::read_dir(path)? {
            let entry = entry?;
            let file_path = entry.path();
            if file_path.extension().and_then(|e| e.to_str()) != Some("sql") {
                continue;
            }
            let migration = read_sql_file(&file_path)?;
            debug!(file = %file_path.display(), version = migration.version, "Read migration file");
            by_version.entry(migration.version).or_default().push(migration);
        }

        let migrations = by_version.into_values().flatten().collect();
        Self::checked(migrations, MigrationOrigin::Directory(path.to_path_buf()))
    }

    /// Loads a [`MigrationBundle`] from a `.json`, `.yaml` or `.yml` file.
    ///
    /// Files with any other extension are parsed as JSON. Descriptor order
    /// in the file is kept.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::IoError`], [`SourceError::JsonError`] or
    /// [`SourceError::YamlError`] if the file cannot be read or parsed, or
    /// [`SourceError::Validation`] if the list is not strictly ascending.
    pub fn from_bundle(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let bundle: MigrationBundle = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => serde_yaml::from_reader(reader)?,
            _ => serde_json::from_reader(reader)?,
        };

        Self::checked(bundle.migrations, MigrationOrigin::Bundle(path.to_path_buf()))
    }

    /// Loads from a directory or a bundle file, depending on what `path` is.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.is_dir() {
            Self::from_dir(path)
        } else {
            Self::from_bundle(path)
        }
    }

    fn checked(migrations: Vec<MigrationDescriptor>, origin: MigrationOrigin) -> Result<Self> {
        for problem in validate_migrations(&migrations) {
            if problem.is_fatal() {
                return Err(problem.into());
            }
            warn!(origin = ?origin, "{problem}");
        }
        Ok(Self { migrations, origin })
    }

    /// Descriptors in application order.
    pub fn migrations(&self) -> &[MigrationDescriptor] {
        &self.migrations
    }

    /// Consumes the set and returns its descriptors.
    pub fn into_migrations(self) -> Vec<MigrationDescriptor> {
        self.migrations
    }

    /// Looks up a descriptor by version.
    pub fn get(&self, version: u32) -> Option<&MigrationDescriptor> {
        self.migrations.iter().find(|m| m.version == version)
    }

    /// Highest version in the set, or `0` when empty.
    pub fn latest_version(&self) -> u32 {
        self.migrations.iter().map(|m| m.version).max().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    /// Returns a reference to the origin metadata.
    pub fn origin(&self) -> &MigrationOrigin {
        &self.origin
    }

    /// Converts the set into its bundle form, e.g. for writing to disk.
    pub fn to_bundle(&self, name: Option<String>) -> MigrationBundle {
        MigrationBundle {
            name,
            migrations: self.migrations.clone(),
        }
    }
}

fn read_sql_file(path: &Path) -> Result<MigrationDescriptor> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| SourceError::InvalidFileName(path.to_path_buf()))?;
    let captures = FILE_NAME_RE
        .captures(file_name)
        .ok_or_else(|| SourceError::InvalidFileName(path.to_path_buf()))?;
    let version: u32 = captures[1]
        .parse()
        .map_err(|_| SourceError::InvalidFileName(path.to_path_buf()))?;

    let body = std::fs::read_to_string(path)?;
    let mut migration = MigrationDescriptor::new(version).with_statement(body);
    if let Some(name) = captures.get(2) {
        migration = migration.with_name(name.as_str());
    }
    Ok(migration)
}

/// Builder for constructing a [`MigrationSet`] with a fallback chain.
///
/// Locations are tried in the order they are added. The first successful
/// load wins; if all fail, [`SourceError::NoSourcesAvailable`] is returned.
///
/// # Example
///
/// ```no_run
/// use sqlmigrate_source::MigrationSet;
///
/// let set = MigrationSet::builder()
///     .from_dir("/opt/app/migrations/")
///     .from_bundle("/opt/app/migrations.json")
///     .build()
///     .unwrap();
/// ```
pub struct MigrationSetBuilder {
    origins: Vec<MigrationOrigin>,
}

impl MigrationSetBuilder {
    /// Creates a new builder with no locations.
    pub fn new() -> Self {
        Self {
            origins: Vec::new(),
        }
    }

    /// Adds a directory of `.sql` files as a location.
    pub fn from_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.origins.push(MigrationOrigin::Directory(path.into()));
        self
    }

    /// Adds a bundle file as a location.
    pub fn from_bundle(mut self, path: impl Into<PathBuf>) -> Self {
        self.origins.push(MigrationOrigin::Bundle(path.into()));
        self
    }

    /// Attempts to load from the configured locations in order.
    ///
    /// Validation failures count as a failed location, so a broken
    /// directory falls through to the next entry.
    pub fn build(self) -> Result<MigrationSet> {
        if self.origins.is_empty() {
            return Err(SourceError::NoSourcesAvailable);
        }

        let all_origins = self.origins.clone();

        for origin in &self.origins {
            let result = match origin {
                MigrationOrigin::Directory(path) => MigrationSet::from_dir(path),
                MigrationOrigin::Bundle(path) => MigrationSet::from_bundle(path),
                MigrationOrigin::Inline | MigrationOrigin::Multiple(_) => continue,
            };

            match result {
                Ok(mut set) => {
                    set.origin = MigrationOrigin::Multiple(all_origins);
                    return Ok(set);
                }
                Err(err) => debug!(origin = ?origin, error = %err, "Migration source skipped"),
            }
        }

        Err(SourceError::NoSourcesAvailable)
    }
}

impl Default for MigrationSetBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, body: &str) {
        std::fs::write(dir.join(name), body).unwrap();
    }

    #[test]
    fn test_from_dir_orders_by_version() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "10_later.sql", "CREATE TABLE c (id INTEGER);");
        write(dir.path(), "2.sql", "CREATE TABLE b (id INTEGER);");
        write(dir.path(), "001_init.sql", "CREATE TABLE a (id INTEGER);");
        write(dir.path(), "README.md", "ignored");

        let set = MigrationSet::from_dir(dir.path()).unwrap();
        let versions: Vec<u32> = set.migrations().iter().map(|m| m.version).collect();
        assert_eq!(versions, vec![1, 2, 10]);
        assert_eq!(set.get(1).unwrap().name.as_deref(), Some("init"));
        assert!(set.get(2).unwrap().name.is_none());
        assert_eq!(set.latest_version(), 10);
        assert_eq!(
            set.origin(),
            &MigrationOrigin::Directory(dir.path().to_path_buf())
        );
    }

    #[test]
    fn test_from_dir_keeps_file_body_as_one_statement() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "1_init.sql",
            "CREATE TABLE a (id INTEGER);\nCREATE TABLE b (id INTEGER);\n",
        );

        let set = MigrationSet::from_dir(dir.path()).unwrap();
        assert_eq!(set.migrations()[0].statements.len(), 1);
    }

    #[test]
    fn test_from_dir_rejects_unversioned_sql() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "init.sql", "SELECT 1");

        let err = MigrationSet::from_dir(dir.path()).unwrap_err();
        assert!(matches!(err, SourceError::InvalidFileName(_)));
    }

    #[test]
    fn test_from_dir_rejects_duplicate_versions() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "1_a.sql", "SELECT 1");
        write(dir.path(), "01_b.sql", "SELECT 2");

        let err = MigrationSet::from_dir(dir.path()).unwrap_err();
        assert!(matches!(
            err,
            SourceError::Validation(sqlmigrate_core::ValidationError::DuplicateVersion(1))
        ));
    }

    #[test]
    fn test_from_bundle_yaml_and_json() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = dir.path().join("m.yaml");
        std::fs::write(
            &yaml,
            "migrations:\n  - version: 1\n    statements:\n      - CREATE TABLE t (id INTEGER)\n",
        )
        .unwrap();
        let set = MigrationSet::from_bundle(&yaml).unwrap();
        assert_eq!(set.len(), 1);

        let json = dir.path().join("m.json");
        std::fs::write(
            &json,
            r#"{"migrations": [{"version": 1, "statements": []}, {"version": 2, "statements": ["SELECT 1"]}]}"#,
        )
        .unwrap();
        let set = MigrationSet::from_bundle(&json).unwrap();
        assert_eq!(set.latest_version(), 2);
    }

    #[test]
    fn test_from_bundle_rejects_descending() {
        let dir = tempfile::tempdir().unwrap();
        let json = dir.path().join("m.json");
        std::fs::write(
            &json,
            r#"{"migrations": [{"version": 2, "statements": ["SELECT 1"]}, {"version": 1, "statements": ["SELECT 1"]}]}"#,
        )
        .unwrap();
        assert!(MigrationSet::from_bundle(&json).is_err());
    }

    #[test]
    fn test_builder_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "1_init.sql", "SELECT 1");

        let set = MigrationSet::builder()
            .from_dir("/nonexistent/migrations/")
            .from_dir(dir.path())
            .build()
            .unwrap();
        assert_eq!(set.len(), 1);
        assert!(matches!(set.origin(), MigrationOrigin::Multiple(o) if o.len() == 2));
    }

    #[test]
    fn test_builder_all_fail() {
        let result = MigrationSet::builder()
            .from_dir("/nonexistent/dir/")
            .from_bundle("/nonexistent/bundle.json")
            .build();
        assert!(matches!(result, Err(SourceError::NoSourcesAvailable)));

        assert!(MigrationSet::builder().build().is_err());
    }

    #[test]
    fn test_from_migrations_and_bundle_conversion() {
        let set = MigrationSet::from_migrations(vec![
            MigrationDescriptor::new(1).with_statement("SELECT 1"),
        ])
        .unwrap();
        assert_eq!(set.origin(), &MigrationOrigin::Inline);

        let bundle = set.to_bundle(Some("app".into()));
        assert_eq!(bundle.name.as_deref(), Some("app"));
        assert_eq!(bundle.migrations.len(), 1);
    }
}
