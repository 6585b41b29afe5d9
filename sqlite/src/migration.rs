//! Linear schema migrations tracked by `PRAGMA user_version`.
//!
//! A [`Migrator`] wraps a [`Database`] and an ordered list of
//! [`MigrationDescriptor`]s. On open it reads the persisted version and
//! applies, in list order, every descriptor with a greater version. Each
//! descriptor runs as one batch that ends by stamping its version, so the
//! persisted version always names the last migration that completed.
//!
//! # Example
//!
//! ```
//! use sqlmigrate_sqlite::{Database, MigrationDescriptor, Migrator};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> sqlmigrate_sqlite::Result<()> {
//! let migrations = vec![
//!     MigrationDescriptor::new(1).with_statement("CREATE TABLE users (id INTEGER PRIMARY KEY)"),
//!     MigrationDescriptor::new(2).with_statement("ALTER TABLE users ADD COLUMN email TEXT"),
//! ];
//!
//! let mut migrator = Migrator::new(Database::in_memory(), migrations);
//! let report = migrator.open_default().await?;
//! assert_eq!(report.applied, vec![1, 2]);
//! assert_eq!(migrator.version().await, 2);
//! # Ok(())
//! # }
//! ```

use sqlmigrate_core::{MigrationDescriptor, USER_VERSION_PRAGMA, Value, validate_migrations};
use tracing::{debug, info, warn};

use crate::connection::{Database, OpenFlags, default_open_flags};
use crate::error::{Result, SqliteError};
use crate::scope::Scope;

/// Version reported when the persisted version cannot be read.
pub const UNKNOWN_VERSION: i64 = -1;

/// How migration batches are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationOptions {
    /// Wrap each descriptor's batch in its own transaction.
    ///
    /// A descriptor that opens its own transaction with `BEGIN` (see
    /// [`MigrationDescriptor::manages_transaction`]) always runs unwrapped.
    pub atomic: bool,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self { atomic: true }
    }
}

/// Outcome of one migration sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    /// Persisted version before the sweep.
    pub from: i64,
    /// Persisted version after the sweep.
    pub to: i64,
    /// Versions applied, in application order.
    pub applied: Vec<u32>,
}

impl MigrationReport {
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }
}

/// Persisted version compared with the known migrations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    pub current_version: i64,
    /// Highest known descriptor version, `0` with no descriptors.
    pub latest_version: u32,
    /// Versions that the next sweep would apply, in list order.
    pub pending: Vec<u32>,
}

impl MigrationStatus {
    pub fn is_current(&self) -> bool {
        self.pending.is_empty()
    }

    /// `true` when the database carries a version newer than any known
    /// descriptor.
    pub fn is_ahead(&self) -> bool {
        self.current_version > i64::from(self.latest_version)
    }
}

/// A [`Database`] that brings itself up to date on open.
#[derive(Debug)]
pub struct Migrator {
    db: Database,
    migrations: Vec<MigrationDescriptor>,
    options: MigrationOptions,
}

impl Migrator {
    /// Creates a migrator with atomic batches.
    ///
    /// Problems found in `migrations` are logged as warnings; the list is
    /// kept as given.
    pub fn new(db: Database, migrations: Vec<MigrationDescriptor>) -> Self {
        for problem in validate_migrations(&migrations) {
            warn!(database = %db.filename(), "{problem}");
        }
        Self {
            db,
            migrations,
            options: MigrationOptions::default(),
        }
    }

    pub fn with_options(mut self, options: MigrationOptions) -> Self {
        self.options = options;
        self
    }

    /// Opens the database with `flags` and applies pending migrations.
    ///
    /// # Errors
    ///
    /// Returns the open failure, or [`SqliteError::MigrationError`] for the
    /// first migration that fails. The connection stays open either way
    /// once opening succeeded.
    pub async fn open(&mut self, flags: OpenFlags) -> Result<MigrationReport> {
        self.db.open(flags).await?;
        self.migrate().await
    }

    /// [`open`](Self::open) with [`default_open_flags`].
    pub async fn open_default(&mut self) -> Result<MigrationReport> {
        self.open(default_open_flags()).await
    }

    /// Applies every descriptor with a version above the persisted one.
    ///
    /// Descriptors are applied in list order and the sweep stops at the
    /// first failure; migrations applied before it stay applied. When the
    /// persisted version cannot be read nothing is applied.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::NotOpen`] when the database is closed.
    pub async fn migrate(&mut self) -> Result<MigrationReport> {
        if !self.db.is_open() {
            return Err(SqliteError::NotOpen);
        }

        let from = self.version().await;
        let mut report = MigrationReport {
            from,
            to: from,
            applied: Vec::new(),
        };
        if from == UNKNOWN_VERSION {
            warn!(database = %self.db.filename(), "user_version unreadable, skipping migrations");
            return Ok(report);
        }

        let pending: Vec<&MigrationDescriptor> = self.pending_for(from);
        info!(
            database = %self.db.filename(),
            current_version = from,
            pending = pending.len(),
            "checking database migrations"
        );

        for migration in pending {
            let version = migration.version;
            let sql = migration.batch_sql();
            debug!(migration = %migration.label(), "applying migration");

            let result = if self.options.atomic && !migration.manages_transaction() {
                self.db
                    .transaction(move |scope| apply_batch(scope, version, &sql))
                    .await
            } else {
                self.db
                    .scoped(move |scope| apply_batch(scope, version, &sql))
                    .await
            };

            if let Err(e) = result {
                warn!(migration = %migration.label(), error = %e, "migration failed");
                return Err(SqliteError::MigrationError {
                    version,
                    source: Box::new(e),
                });
            }

            info!(migration = %migration.label(), "migration applied");
            report.applied.push(version);
            report.to = i64::from(version);
        }

        Ok(report)
    }

    /// Persisted version, or [`UNKNOWN_VERSION`] when the database is
    /// closed or the pragma yields no row.
    pub async fn version(&self) -> i64 {
        match self.db.scoped(persisted_version).await {
            Ok(version) => version,
            Err(e) => {
                debug!(error = %e, "user_version unavailable");
                UNKNOWN_VERSION
            }
        }
    }

    /// Current version, latest known version and pending versions.
    pub async fn status(&self) -> MigrationStatus {
        let current_version = self.version().await;
        let pending = if current_version == UNKNOWN_VERSION {
            Vec::new()
        } else {
            self.pending_for(current_version)
                .into_iter()
                .map(|m| m.version)
                .collect()
        };
        MigrationStatus {
            current_version,
            latest_version: self.latest_version(),
            pending,
        }
    }

    /// Versions the next sweep would apply.
    pub async fn pending(&self) -> Vec<u32> {
        self.status().await.pending
    }

    /// Descriptors with a version above `version`, in list order.
    pub fn pending_for(&self, version: i64) -> Vec<&MigrationDescriptor> {
        self.migrations
            .iter()
            .filter(|m| i64::from(m.version) > version)
            .collect()
    }

    pub fn latest_version(&self) -> u32 {
        self.migrations.iter().map(|m| m.version).max().unwrap_or(0)
    }

    pub async fn close(&mut self) -> Result<()> {
        self.db.close().await
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn database_mut(&mut self) -> &mut Database {
        &mut self.db
    }

    pub fn into_database(self) -> Database {
        self.db
    }

    pub fn migrations(&self) -> &[MigrationDescriptor] {
        &self.migrations
    }

    pub fn options(&self) -> MigrationOptions {
        self.options
    }
}

/// Runs one descriptor's batch and checks that it stamped `version`.
fn apply_batch(scope: &Scope<'_>, version: u32, sql: &str) -> Result<()> {
    scope.exec(sql)?;
    let found = persisted_version(scope)?;
    if found != i64::from(version) {
        return Err(SqliteError::VersionMismatch {
            expected: version,
            found,
        });
    }
    Ok(())
}

fn persisted_version(scope: &Scope<'_>) -> Result<i64> {
    let row = scope.pragma(USER_VERSION_PRAGMA, None)?;
    Ok(row
        .as_ref()
        .and_then(|row| row.get(USER_VERSION_PRAGMA))
        .and_then(Value::as_i64)
        .unwrap_or(UNKNOWN_VERSION))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptors() -> Vec<MigrationDescriptor> {
        vec![
            MigrationDescriptor::new(1).with_statement("CREATE TABLE a (id INTEGER)"),
            MigrationDescriptor::new(2).with_statement("CREATE TABLE b (id INTEGER)"),
            MigrationDescriptor::new(3).with_statement("CREATE TABLE c (id INTEGER)"),
        ]
    }

    #[test]
    fn test_pending_for_keeps_list_order() {
        let migrator = Migrator::new(Database::in_memory(), descriptors());
        let versions: Vec<u32> = migrator.pending_for(1).iter().map(|m| m.version).collect();
        assert_eq!(versions, vec![2, 3]);
        assert!(migrator.pending_for(3).is_empty());
        assert_eq!(migrator.pending_for(UNKNOWN_VERSION).len(), 3);
        assert_eq!(migrator.latest_version(), 3);
    }

    #[test]
    fn test_status_helpers() {
        let status = MigrationStatus {
            current_version: 4,
            latest_version: 3,
            pending: vec![],
        };
        assert!(status.is_current());
        assert!(status.is_ahead());
    }

    #[tokio::test]
    async fn test_closed_migrator_reports_unknown_version() {
        let migrator = Migrator::new(Database::in_memory(), descriptors());
        assert_eq!(migrator.version().await, UNKNOWN_VERSION);
        assert!(migrator.status().await.pending.is_empty());
    }

    #[tokio::test]
    async fn test_migrate_requires_open_database() {
        let mut migrator = Migrator::new(Database::in_memory(), descriptors());
        let err = migrator.migrate().await.unwrap_err();
        assert!(err.is_not_open());
    }

    #[tokio::test]
    async fn test_open_applies_everything_then_nothing() {
        let mut migrator = Migrator::new(Database::in_memory(), descriptors());
        let report = migrator.open_default().await.unwrap();
        assert_eq!(report.from, 0);
        assert_eq!(report.to, 3);
        assert_eq!(report.applied, vec![1, 2, 3]);

        let again = migrator.migrate().await.unwrap();
        assert!(again.is_noop());
        assert_eq!(again.from, 3);
    }

    #[tokio::test]
    async fn test_non_atomic_migrations() {
        let mut migrator = Migrator::new(Database::in_memory(), descriptors())
            .with_options(MigrationOptions { atomic: false });
        migrator.open_default().await.unwrap();
        assert_eq!(migrator.version().await, 3);
    }
}
