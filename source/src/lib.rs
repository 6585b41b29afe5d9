//! Migration sources and configuration for sqlmigrate.
//!
//! This crate reads [`MigrationDescriptor`](sqlmigrate_core::MigrationDescriptor)
//! lists from disk and loads the YAML [`DatabaseConfig`] used by the
//! command-line tool.
//!
//! # Quick start
//!
//! ```no_run
//! use sqlmigrate_source::{DatabaseConfig, MigrationSet};
//!
//! // Load migrations from a directory of `<version>_<name>.sql` files
//! let set = MigrationSet::from_dir("migrations/").unwrap();
//! println!("latest version: {}", set.latest_version());
//!
//! // Fall back to a bundle when the directory is missing
//! let set = MigrationSet::builder()
//!     .from_dir("migrations/")
//!     .from_bundle("migrations.yaml")
//!     .build()
//!     .unwrap();
//!
//! let config = DatabaseConfig::load("sqlmigrate.yml").unwrap();
//! println!("database: {}", config.database);
//! ```

mod config;
mod error;
mod loader;

pub use config::{DEFAULT_DATABASE, DatabaseConfig};
pub use error::{Result, SourceError};
pub use loader::{MigrationBundle, MigrationOrigin, MigrationSet, MigrationSetBuilder};
