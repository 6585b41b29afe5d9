//! Migration list validation.
//!
//! The migrator does not enforce ordering, it applies descriptors in the
//! order given. These checks let loaders reject lists that would apply
//! out of order or skip versions silently.
//!
//! # Examples
//!
//! ```
//! use sqlmigrate_core::*;
//!
//! let ok = vec![
//!     MigrationDescriptor::new(1).with_statement("CREATE TABLE a (id INTEGER)"),
//!     MigrationDescriptor::new(2).with_statement("CREATE TABLE b (id INTEGER)"),
//! ];
//! assert!(validate_migrations(&ok).is_empty());
//!
//! let reversed: Vec<_> = ok.iter().rev().cloned().collect();
//! assert!(!validate_migrations(&reversed).is_empty());
//! ```

use std::collections::HashSet;

use thiserror::Error;

use crate::MigrationDescriptor;

/// Structural problems in a migration list.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Version `0` is the fresh-database value and can never be applied.
    #[error("migration version must be greater than zero")]
    ZeroVersion,
    /// Two descriptors share a version.
    #[error("duplicate migration version: {0}")]
    DuplicateVersion(u32),
    /// A descriptor follows one with a higher version.
    #[error("migration {version} is listed after migration {previous}")]
    OutOfOrder { previous: u32, version: u32 },
    /// A descriptor has no statements and would only bump the version.
    #[error("migration {0} has no statements")]
    EmptyMigration(u32),
}

impl ValidationError {
    /// `true` for problems that make a list unusable rather than just odd.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ValidationError::EmptyMigration(_))
    }
}

/// Validates a single descriptor.
pub fn validate_migration(migration: &MigrationDescriptor) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    if migration.version == 0 {
        errors.push(ValidationError::ZeroVersion);
    }
    if migration.statements.iter().all(|s| s.trim().is_empty()) {
        errors.push(ValidationError::EmptyMigration(migration.version));
    }
    errors
}

/// Validates a migration list in the order it will be applied.
///
/// Reports zero versions, duplicates, descending neighbours and empty
/// descriptors. All problems are collected.
pub fn validate_migrations(migrations: &[MigrationDescriptor]) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut seen: HashSet<u32> = HashSet::new();
    let mut previous: Option<u32> = None;

    for migration in migrations {
        errors.extend(validate_migration(migration));

        if !seen.insert(migration.version) {
            errors.push(ValidationError::DuplicateVersion(migration.version));
        } else if let Some(prev) = previous {
            if migration.version < prev {
                errors.push(ValidationError::OutOfOrder {
                    previous: prev,
                    version: migration.version,
                });
            }
        }
        previous = Some(migration.version);
    }

    errors
}
