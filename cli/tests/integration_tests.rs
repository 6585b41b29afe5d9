use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn sqlmigrate(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_sqlmigrate"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run sqlmigrate")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn path_str(path: &Path) -> &str {
    path.to_str().expect("temp paths are UTF-8")
}

/// Writes a two-step migration directory for a `users` table.
fn write_migrations(root: &Path) -> PathBuf {
    let dir = root.join("migrations");
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join("0001_init.sql"),
        "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT);",
    )
    .unwrap();
    fs::write(
        dir.join("0002_email.sql"),
        "ALTER TABLE users ADD COLUMN email TEXT;",
    )
    .unwrap();
    dir
}

#[test]
fn test_migrate_then_version() {
    let tmp = tempfile::tempdir().unwrap();
    let migrations = write_migrations(tmp.path());
    let db = tmp.path().join("app.db");

    let out = sqlmigrate(&["migrate", "--db", path_str(&db), "--source", path_str(&migrations)]);
    assert!(out.status.success(), "migrate failed: {}", stderr(&out));
    assert!(stdout(&out).contains("from version 0 to 2 (applied: 1, 2)"));

    let out = sqlmigrate(&["version", "--db", path_str(&db)]);
    assert!(out.status.success());
    assert_eq!(stdout(&out).trim(), "2");
}

#[test]
fn test_second_migrate_is_a_noop() {
    let tmp = tempfile::tempdir().unwrap();
    let migrations = write_migrations(tmp.path());
    let db = tmp.path().join("app.db");
    let args = ["migrate", "--db", path_str(&db), "--source", path_str(&migrations)];

    assert!(sqlmigrate(&args).status.success());
    let out = sqlmigrate(&args);
    assert!(out.status.success());
    assert!(stdout(&out).contains("up to date at version 2"));
}

#[test]
fn test_status_lists_pending_versions() {
    let tmp = tempfile::tempdir().unwrap();
    let migrations = write_migrations(tmp.path());
    let db = tmp.path().join("app.db");

    let out = sqlmigrate(&["status", "--db", path_str(&db), "--source", path_str(&migrations)]);
    assert!(out.status.success(), "status failed: {}", stderr(&out));
    let text = stdout(&out);
    assert!(text.contains("Current version: 0"));
    assert!(text.contains("Latest version: 2"));
    assert!(text.contains("Pending: 1, 2"));
}

#[test]
fn test_exec_and_query() {
    let tmp = tempfile::tempdir().unwrap();
    let migrations = write_migrations(tmp.path());
    let db = tmp.path().join("app.db");
    let db = path_str(&db);

    assert!(sqlmigrate(&["migrate", "--db", db, "--source", path_str(&migrations)]).status.success());
    let out = sqlmigrate(&[
        "exec",
        "--db",
        db,
        "INSERT INTO users (name, email) VALUES ('alice', 'alice@example.com')",
    ]);
    assert!(out.status.success(), "exec failed: {}", stderr(&out));

    let out = sqlmigrate(&[
        "query",
        "--db",
        db,
        "SELECT name, email FROM users WHERE id = ?",
        "--param",
        "1",
    ]);
    assert!(out.status.success(), "query failed: {}", stderr(&out));
    let rows: serde_json::Value = serde_json::from_str(&stdout(&out)).unwrap();
    assert_eq!(rows[0]["name"], "alice");
    assert_eq!(rows[0]["email"], "alice@example.com");

    let out = sqlmigrate(&[
        "query",
        "--db",
        db,
        "SELECT name FROM users WHERE id = $id",
        "--named",
        "id=1",
        "--format",
        "table",
    ]);
    assert!(out.status.success(), "query failed: {}", stderr(&out));
    let text = stdout(&out);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines, vec!["name", "-----", "alice"]);
}

#[test]
fn test_config_supplies_database_and_source() {
    let tmp = tempfile::tempdir().unwrap();
    let migrations = write_migrations(tmp.path());
    let db = tmp.path().join("configured.db");
    let config = tmp.path().join("sqlmigrate.yml");
    fs::write(
        &config,
        format!(
            "database: {}\nmigrations: {}\npragmas:\n  foreign_keys: 1\n",
            db.display(),
            migrations.display()
        ),
    )
    .unwrap();

    let out = sqlmigrate(&["--config", path_str(&config), "migrate"]);
    assert!(out.status.success(), "migrate failed: {}", stderr(&out));
    assert!(db.exists());

    let out = sqlmigrate(&["--config", path_str(&config), "version"]);
    assert_eq!(stdout(&out).trim(), "2");
}

#[test]
fn test_failing_migration_exits_nonzero() {
    let tmp = tempfile::tempdir().unwrap();
    let migrations = write_migrations(tmp.path());
    fs::write(
        migrations.join("0003_broken.sql"),
        "INSERT INTO missing (id) VALUES (1);",
    )
    .unwrap();
    let db = tmp.path().join("app.db");

    let out = sqlmigrate(&["migrate", "--db", path_str(&db), "--source", path_str(&migrations)]);
    assert!(!out.status.success());
    assert!(stderr(&out).contains("migration 3 failed"));

    let out = sqlmigrate(&["version", "--db", path_str(&db)]);
    assert_eq!(stdout(&out).trim(), "2");
}

#[test]
fn test_migration_file_ending_in_comment() {
    let tmp = tempfile::tempdir().unwrap();
    let migrations = tmp.path().join("migrations");
    fs::create_dir_all(&migrations).unwrap();
    fs::write(
        migrations.join("0001_init.sql"),
        "CREATE TABLE users (id INTEGER PRIMARY KEY);\n-- indexes come in a later migration\n",
    )
    .unwrap();
    let db = tmp.path().join("app.db");
    let args = ["migrate", "--db", path_str(&db), "--source", path_str(&migrations)];

    let out = sqlmigrate(&args);
    assert!(out.status.success(), "migrate failed: {}", stderr(&out));
    let out = sqlmigrate(&["version", "--db", path_str(&db)]);
    assert_eq!(stdout(&out).trim(), "1");

    let out = sqlmigrate(&args);
    assert!(out.status.success(), "second migrate failed: {}", stderr(&out));
    assert!(stdout(&out).contains("up to date at version 1"));
}

#[test]
fn test_migrate_without_source_is_an_error() {
    let tmp = tempfile::tempdir().unwrap();
    let db = tmp.path().join("app.db");

    let out = sqlmigrate(&["migrate", "--db", path_str(&db)]);
    assert!(!out.status.success());
    assert!(stderr(&out).contains("No migration source"));
}

#[test]
fn test_missing_config_is_an_error() {
    let out = sqlmigrate(&["--config", "/nonexistent/sqlmigrate.yml", "version"]);
    assert!(!out.status.success());
    assert!(stderr(&out).contains("Failed to load config"));
}
