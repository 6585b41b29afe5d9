//! Async SQLite connection wrapper with `user_version` migrations.
//!
//! This crate puts a small asynchronous surface over an embedded SQLite
//! connection and a linear migration mechanism on top of it.
//!
//! # Architecture
//!
//! - **`connection`**: [`Database`], one optional connection per target,
//!   every operation resolved on the `tokio-rusqlite` executor thread
//! - **`scope`**: [`Scope`] and [`PreparedStatement`], synchronous statement
//!   issuers used inside transaction and prepare bodies
//! - **`migration`**: [`Migrator`], applies pending [`MigrationDescriptor`]s
//!   and stamps `user_version`
//! - **`log`**: [`LogSink`] and the events reported for each statement
//!
//! # Quick start
//!
//! ```no_run
//! use sqlmigrate_sqlite::{Database, MigrationDescriptor, Migrator};
//!
//! # #[tokio::main]
//! # async fn main() -> sqlmigrate_sqlite::Result<()> {
//! let migrations = vec![
//!     MigrationDescriptor::new(1)
//!         .with_statement("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)"),
//! ];
//!
//! let mut migrator = Migrator::new(Database::new("app.db"), migrations);
//! migrator.open_default().await?;
//!
//! let db = migrator.database();
//! let inserted = db.run("INSERT INTO users (name) VALUES (?)", ["alice"]).await?;
//! println!("inserted row {}", inserted.last_insert_id);
//!
//! let count = db
//!     .transaction(|scope| {
//!         let mut stmt = scope.prepare("INSERT INTO users (name) VALUES (?)")?;
//!         for name in ["bob", "carol"] {
//!             stmt.run([name])?;
//!         }
//!         stmt.finalize()?;
//!         scope.get("SELECT COUNT(*) AS n FROM users", ())
//!     })
//!     .await?;
//! println!("{count:?}");
//! # Ok(())
//! # }
//! ```

mod connection;
mod convert;
mod error;
mod log;
mod migration;
mod pragma;
mod scope;

pub use connection::{ConnectionOptions, Database, MEMORY, OpenFlags, default_open_flags};
pub use error::{Result, SqliteError};
pub use log::{LogEvent, LogLevel, LogSink, NullSink, TracingSink};
pub use migration::{
    MigrationOptions, MigrationReport, MigrationStatus, Migrator, UNKNOWN_VERSION,
};
pub use scope::{PreparedStatement, RunResult, Scope};
pub use sqlmigrate_core::{MigrationDescriptor, Params, Row, TraceMode, Value};
