//! Batched inserts inside one transaction.
//!
//! Shows the synchronous [`Scope`](sqlmigrate_sqlite::Scope) body: a
//! prepared statement reused for many rows, a rollback on failure, and a
//! LIKE search with escaped user input.
//!
//! # Usage
//!
//! ```bash
//! cargo run -p sqlmigrate-demos --example transaction_batch
//! ```

use sqlmigrate_core::escape_like;
use sqlmigrate_sqlite::{ConnectionOptions, Database, LogEvent, LogLevel, TraceMode, Value};

#[tokio::main]
async fn main() {
    let options = ConnectionOptions::default()
        .with_trace(Some(TraceMode::Finish))
        .with_sink(|event: &LogEvent| {
            if event.level == LogLevel::Error || event.channel == "transaction" {
                println!(
                    "  [{}] {} {:?}",
                    event.channel,
                    event.sql.as_deref().unwrap_or_default(),
                    event.time
                );
            }
        });

    let mut db = Database::with_options(":memory:", options);
    db.open_default().await.unwrap();
    db.exec("CREATE TABLE items (id INTEGER PRIMARY KEY, label TEXT NOT NULL UNIQUE)")
        .await
        .unwrap();

    println!("=== Batch insert ===");
    let inserted = db
        .transaction(|scope| {
            let mut stmt = scope.prepare("INSERT INTO items (label) VALUES (?)")?;
            for i in 0..500 {
                let label = if i % 50 == 0 {
                    format!("{i}%_off")
                } else {
                    format!("item-{i}")
                };
                stmt.run([label])?;
            }
            stmt.finalize()?;
            Ok(500)
        })
        .await
        .unwrap();
    println!("Inserted {inserted} rows");

    println!("\n=== Rollback on failure ===");
    let result = db
        .transaction(|scope| {
            scope.run("INSERT INTO items (label) VALUES ('fresh')", ())?;
            scope.run("INSERT INTO items (label) VALUES ('item-1')", ())
        })
        .await;
    println!("Duplicate insert failed: {}", result.is_err());

    let fresh = db
        .get("SELECT id FROM items WHERE label = 'fresh'", ())
        .await
        .unwrap();
    println!("'fresh' kept after rollback: {}", fresh.is_some());

    println!("\n=== Escaped LIKE ===");
    let pattern = format!("%{}", escape_like("%_off"));
    let rows = db
        .all(
            "SELECT label FROM items WHERE label LIKE ? ESCAPE '/' ORDER BY id",
            [pattern],
        )
        .await
        .unwrap();
    let labels: Vec<&Value> = rows.iter().filter_map(|row| row.get("label")).collect();
    println!("{} labels end in '%_off': {labels:?}", labels.len());

    db.close().await.unwrap();
}
