//! Migration lifecycle example.
//!
//! Writes a migration directory, brings a database up to date in two
//! steps, and prints the status after each.
//!
//! # Usage
//!
//! ```bash
//! cargo run -p sqlmigrate-demos --example migration_lifecycle
//! ```

use std::path::Path;

use sqlmigrate_source::MigrationSet;
use sqlmigrate_sqlite::{Database, Migrator, Value};

fn write_migration(dir: &Path, name: &str, sql: &str) {
    std::fs::write(dir.join(name), sql).unwrap();
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_writer(std::io::stderr)
        .init();

    // === Step 1: A migration directory with one migration ===
    let root = std::env::temp_dir().join("sqlmigrate_lifecycle_example");
    let _ = std::fs::remove_dir_all(&root);
    let migrations_dir = root.join("migrations");
    std::fs::create_dir_all(&migrations_dir).unwrap();
    let db_path = root.join("app.db").to_string_lossy().into_owned();

    write_migration(
        &migrations_dir,
        "0001_init.sql",
        "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL);",
    );

    println!("=== First run ===");
    let set = MigrationSet::from_dir(&migrations_dir).unwrap();
    let mut migrator = Migrator::new(Database::new(db_path.clone()), set.into_migrations());
    let report = migrator.open_default().await.unwrap();
    println!("Applied {:?}, now at version {}", report.applied, report.to);

    migrator
        .database()
        .run("INSERT INTO users (name) VALUES (?)", ["alice"])
        .await
        .unwrap();
    migrator.close().await.unwrap();

    // === Step 2: Add a second migration and reopen ===
    write_migration(
        &migrations_dir,
        "0002_email.sql",
        "ALTER TABLE users ADD COLUMN email TEXT;\n\
         UPDATE users SET email = lower(name) || '@example.com';",
    );

    println!("\n=== Second run ===");
    let set = MigrationSet::from_dir(&migrations_dir).unwrap();
    let mut migrator = Migrator::new(Database::new(db_path), set.into_migrations());

    let before = migrator.status().await;
    println!("Before open: current {}, pending {:?}", before.current_version, before.pending);

    let report = migrator.open_default().await.unwrap();
    println!("Applied {:?}, now at version {}", report.applied, report.to);

    let rows = migrator
        .database()
        .all("SELECT id, name, email FROM users", ())
        .await
        .unwrap();
    println!("{}", serde_json::to_string_pretty(&rows).unwrap());

    let status = migrator.status().await;
    assert!(status.is_current());
    assert_eq!(
        rows[0].get("email"),
        Some(&Value::from("alice@example.com"))
    );

    migrator.close().await.unwrap();
    std::fs::remove_dir_all(&root).unwrap();
    println!("\nDone.");
}
