//! Core types shared by the sqlmigrate crates.
//!
//! This crate has no database dependency. It defines:
//!
//! - [`Value`] and [`Row`]: scalars and ordered column mappings exchanged
//!   with the connection wrapper.
//! - [`Params`]: positional or named statement parameters, plus the
//!   [`to_query_param`] and [`escape_like`] helpers.
//! - [`MigrationDescriptor`]: a versioned group of statements, with
//!   [`validate_migrations`] for list-level checks.
//!
//! # Example
//!
//! ```
//! use sqlmigrate_core::*;
//!
//! let migrations = vec![
//!     MigrationDescriptor::new(1)
//!         .with_name("init")
//!         .with_statement("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)"),
//!     MigrationDescriptor::new(2)
//!         .with_statement("ALTER TABLE users ADD COLUMN email TEXT"),
//! ];
//! assert!(validate_migrations(&migrations).is_empty());
//!
//! let pattern = format!("%{}%", escape_like("100%"));
//! assert_eq!(pattern, "%100/%%");
//!
//! let params = to_query_param([("name", "alice")]);
//! assert_eq!(params.len(), 1);
//! ```

mod params;
mod types;
mod validate;

pub use params::{
    LIKE_ESCAPE, PARAMETER_MARKERS, ParameterError, Params, escape_like, to_query_param,
    validate_parameter_name,
};
pub use types::*;
pub use validate::{ValidationError, validate_migration, validate_migrations};
