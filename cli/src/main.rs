use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use sqlmigrate_core::{MigrationDescriptor, Params, Row, TraceMode, Value, to_query_param};
use sqlmigrate_source::{DatabaseConfig, MigrationSet};
use sqlmigrate_sqlite::{
    ConnectionOptions, Database, MigrationOptions, Migrator, OpenFlags, default_open_flags,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// CLI-specific output format enum with clap argument parsing support.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliOutputFormat {
    Json,
    Table,
}

/// CLI-specific trace mode enum with clap argument parsing support.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliTraceMode {
    Run,
    Finish,
}

impl From<CliTraceMode> for TraceMode {
    fn from(mode: CliTraceMode) -> Self {
        match mode {
            CliTraceMode::Run => Self::Run,
            CliTraceMode::Finish => Self::Finish,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "sqlmigrate")]
#[command(about = "Apply and inspect user_version based SQLite migrations")]
#[command(version)]
struct Cli {
    /// Enable debug logging and the engine's own trace hooks.
    #[arg(long, short, global = true)]
    verbose: bool,
    /// YAML configuration supplying defaults for the other options.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply every pending migration.
    Migrate(MigrateArgs),
    /// Show current, latest and pending migration versions.
    Status(StatusArgs),
    /// Print the persisted user_version.
    Version(TargetArgs),
    /// Execute a `;`-separated SQL batch.
    Exec(ExecArgs),
    /// Run a query and print its rows.
    Query(QueryArgs),
}

#[derive(Debug, Args)]
struct TargetArgs {
    /// Database path, `:memory:`, or an SQLite URI.
    #[arg(long)]
    db: Option<String>,
    /// Report each statement as it runs or finishes.
    #[arg(long)]
    trace: Option<CliTraceMode>,
}

#[derive(Debug, Args)]
struct MigrateArgs {
    #[command(flatten)]
    target: TargetArgs,
    /// Migration directory or JSON/YAML bundle.
    #[arg(long)]
    source: Option<PathBuf>,
    /// Run migration batches without wrapping each in a transaction.
    #[arg(long)]
    no_atomic: bool,
}

#[derive(Debug, Args)]
struct StatusArgs {
    #[command(flatten)]
    target: TargetArgs,
    /// Migration directory or JSON/YAML bundle.
    #[arg(long)]
    source: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct ExecArgs {
    #[command(flatten)]
    target: TargetArgs,
    /// SQL batch to execute.
    sql: String,
}

#[derive(Debug, Args)]
struct QueryArgs {
    #[command(flatten)]
    target: TargetArgs,
    /// SQL statement to run.
    sql: String,
    /// Positional parameter; repeat for each `?`.
    #[arg(long = "param")]
    params: Vec<String>,
    /// Named parameter as `name=value`, bound to `$name`.
    #[arg(long = "named")]
    named: Vec<String>,
    /// Output format.
    #[arg(long, default_value = "json")]
    format: CliOutputFormat,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match load_config(cli.config.as_deref(), cli.verbose) {
        Ok(config) => match cli.command {
            Command::Migrate(args) => run_migrate(args, config).await,
            Command::Status(args) => run_status(args, config).await,
            Command::Version(args) => run_version(args, config).await,
            Command::Exec(args) => run_exec(args, config).await,
            Command::Query(args) => run_query(args, config).await,
        },
        Err(err) => Err(err),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run_migrate(args: MigrateArgs, config: DatabaseConfig) -> Result<(), String> {
    let migrations = load_migrations(args.source.as_deref(), &config)?;
    let db = open_database(&args.target, &config).await?;
    let options = MigrationOptions {
        atomic: config.atomic_migrations && !args.no_atomic,
    };

    let mut migrator = Migrator::new(db, migrations).with_options(options);
    let report = migrator
        .migrate()
        .await
        .map_err(|e| format!("Migration failed: {e}"))?;

    let target = migrator.database().filename().to_string();
    if report.is_noop() {
        println!("Database '{target}' is up to date at version {}.", report.to);
    } else {
        println!(
            "Migrated '{target}' from version {} to {} (applied: {}).",
            report.from,
            report.to,
            join_versions(&report.applied)
        );
    }

    migrator
        .close()
        .await
        .map_err(|e| format!("Failed to close database: {e}"))
}

async fn run_status(args: StatusArgs, config: DatabaseConfig) -> Result<(), String> {
    let migrations = load_migrations(args.source.as_deref(), &config)?;
    let db = open_database(&args.target, &config).await?;
    let mut migrator = Migrator::new(db, migrations);

    let status = migrator.status().await;
    println!("Migration Status:");
    println!("  Database: {}", migrator.database().filename());
    println!("  Current version: {}", status.current_version);
    println!("  Latest version: {}", status.latest_version);
    if status.pending.is_empty() {
        println!("  Pending: none");
    } else {
        println!("  Pending: {}", join_versions(&status.pending));
    }
    if status.is_ahead() {
        println!("  Warning: database is newer than the known migrations");
    }

    migrator
        .close()
        .await
        .map_err(|e| format!("Failed to close database: {e}"))
}

async fn run_version(args: TargetArgs, config: DatabaseConfig) -> Result<(), String> {
    let db = open_database(&args, &config).await?;
    let mut migrator = Migrator::new(db, Vec::new());
    println!("{}", migrator.version().await);
    migrator
        .close()
        .await
        .map_err(|e| format!("Failed to close database: {e}"))
}

async fn run_exec(args: ExecArgs, config: DatabaseConfig) -> Result<(), String> {
    let mut db = open_database(&args.target, &config).await?;
    db.exec(args.sql)
        .await
        .map_err(|e| format!("Execution failed: {e}"))?;
    db.close()
        .await
        .map_err(|e| format!("Failed to close database: {e}"))
}

async fn run_query(args: QueryArgs, config: DatabaseConfig) -> Result<(), String> {
    let params = build_params(&args.params, &args.named)?;
    let mut db = open_database(&args.target, &config).await?;
    let rows = db
        .all(args.sql, params)
        .await
        .map_err(|e| format!("Query failed: {e}"))?;

    match args.format {
        CliOutputFormat::Json => {
            let json = serde_json::to_string_pretty(&rows)
                .map_err(|e| format!("Failed to serialize rows: {e}"))?;
            println!("{json}");
        }
        CliOutputFormat::Table => print!("{}", format_table(&rows)),
    }

    db.close()
        .await
        .map_err(|e| format!("Failed to close database: {e}"))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Loads the `--config` file, or the defaults when none is given.
fn load_config(path: Option<&Path>, verbose: bool) -> Result<DatabaseConfig, String> {
    let mut config = match path {
        Some(path) => DatabaseConfig::load(path)
            .map_err(|e| format!("Failed to load config '{}': {e}", path.display()))?,
        None => DatabaseConfig::default(),
    };
    config.verbose |= verbose;
    Ok(config)
}

/// Reads migrations from `--source`, falling back to the config entry.
fn load_migrations(
    source: Option<&Path>,
    config: &DatabaseConfig,
) -> Result<Vec<MigrationDescriptor>, String> {
    let Some(path) = source.or(config.migrations.as_deref()) else {
        return Err("No migration source given (use --source or set 'migrations' in the config)".to_string());
    };
    let set = MigrationSet::from_path(path)
        .map_err(|e| format!("Failed to load migrations from '{}': {e}", path.display()))?;
    debug!(source = %path.display(), count = set.len(), "Loaded migrations");
    Ok(set.into_migrations())
}

fn open_flags(config: &DatabaseConfig) -> OpenFlags {
    if config.read_only {
        OpenFlags::SQLITE_OPEN_READ_ONLY
            | OpenFlags::SQLITE_OPEN_FULL_MUTEX
            | OpenFlags::SQLITE_OPEN_URI
    } else {
        default_open_flags()
    }
}

/// Opens the target named by `--db` or the config and applies the
/// configured pragmas in order.
async fn open_database(target: &TargetArgs, config: &DatabaseConfig) -> Result<Database, String> {
    let filename = target.db.clone().unwrap_or_else(|| config.database.clone());
    let options = ConnectionOptions::default()
        .with_verbose(config.verbose)
        .with_trace(target.trace.map(TraceMode::from).or(config.trace));

    let mut db = Database::with_options(filename, options);
    db.open(open_flags(config))
        .await
        .map_err(|e| format!("Failed to open database '{}': {e}", db.filename()))?;

    for (name, value) in &config.pragmas {
        db.pragma(name.clone(), Some(value.clone()))
            .await
            .map_err(|e| format!("Failed to apply pragma '{name}': {e}"))?;
    }
    Ok(db)
}

/// Parses a command-line scalar: `null`, an integer, a float, or text.
fn parse_value(raw: &str) -> Value {
    if raw.eq_ignore_ascii_case("null") {
        Value::Null
    } else if let Ok(v) = raw.parse::<i64>() {
        Value::Integer(v)
    } else if let Ok(v) = raw.parse::<f64>() {
        Value::Real(v)
    } else {
        Value::Text(raw.to_string())
    }
}

fn build_params(positional: &[String], named: &[String]) -> Result<Params, String> {
    if !positional.is_empty() && !named.is_empty() {
        return Err("--param and --named cannot be combined".to_string());
    }
    if !named.is_empty() {
        let mut entries = Vec::with_capacity(named.len());
        for pair in named {
            let (key, raw) = pair
                .split_once('=')
                .ok_or_else(|| format!("Named parameter '{pair}' must be name=value"))?;
            entries.push((key.to_string(), parse_value(raw)));
        }
        return Ok(to_query_param(entries));
    }
    if positional.is_empty() {
        return Ok(Params::None);
    }
    Ok(Params::positional(positional.iter().map(|raw| parse_value(raw))))
}

fn join_versions(versions: &[u32]) -> String {
    versions
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Renders rows as an aligned text table with a header line.
fn format_table(rows: &[Row]) -> String {
    let Some(first) = rows.first() else {
        return "(no rows)\n".to_string();
    };
    let columns: Vec<&str> = first.columns().collect();
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| row.values().iter().map(Value::to_string).collect())
        .collect();

    let mut widths: Vec<usize> = columns.iter().map(|c| c.len()).collect();
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    let mut out = String::new();
    out.push_str(&render_line(columns.iter().copied(), &widths));
    out.push_str(&render_line(rule.iter().map(String::as_str), &widths));
    for row in &cells {
        out.push_str(&render_line(row.iter().map(String::as_str), &widths));
    }
    out
}

fn render_line<'a>(values: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    let mut line = values
        .zip(widths)
        .map(|(value, &width)| format!("{value:<width$}"))
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_string();
    line.push('\n');
    line
}
