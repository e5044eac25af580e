mod config;
mod logging;
mod report;

use std::path::PathBuf;

use chrono::NaiveDateTime;
use clap::{Args, Parser, Subcommand};
use thiserror::Error;

use pressgen_core::{Error as CoreError, SchemaMap};
use pressgen_generate::{
    DependencyReport, GenerationEngine, GenerationError, GenerationReport, ImporterRegistry,
    RunOutcome,
};
use pressgen_store::{MemoryStore, PostgresStore, Store, StoreError};

use config::{
    FileConfig, Overrides, load_config, parse_quantity, parse_reference_time, redact_database_url,
    resolve,
};
use logging::{LogSettings, init_logging};
use report::write_json_atomic;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("generation failed: {0}")]
    Generation(#[from] GenerationError),
    #[error("core error: {0}")]
    Core(#[from] CoreError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("failed to parse config file: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("logging setup failed: {0}")]
    Logging(String),
}

#[derive(Parser, Debug)]
#[command(
    name = "pressgen",
    version,
    about = "Seed a publishing platform database with realistic synthetic data"
)]
struct Cli {
    /// Default log filter, overridden by RUST_LOG.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
    /// Emit logs as JSON lines.
    #[arg(long, global = true, default_value_t = false)]
    log_json: bool,
    /// Append logs to a file instead of stderr.
    #[arg(long, global = true, value_name = "FILE")]
    log_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate rows for the requested tables and their dependencies.
    Generate(GenerateArgs),
    /// List the registered tables.
    Tables,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Comma-separated tables to generate (default: all).
    #[arg(long, value_delimiter = ',', value_name = "TABLES")]
    tables: Vec<String>,
    /// Clear the resolved tables first, keeping the owner account.
    #[arg(long, default_value_t = false)]
    clear: bool,
    /// Import a base content pack before generating.
    #[arg(long, value_name = "FILE")]
    base_pack: Option<PathBuf>,
    /// Override a table's quantity; repeatable.
    #[arg(long = "quantity", value_name = "TABLE=COUNT", value_parser = parse_quantity)]
    quantities: Vec<(String, usize)>,
    /// Seed for reproducible output.
    #[arg(long)]
    seed: Option<u64>,
    /// Reference clock for the run (RFC 3339).
    #[arg(long, value_name = "TIMESTAMP", value_parser = parse_reference_time)]
    now: Option<NaiveDateTime>,
    /// Print the resolved import order and exit without touching storage.
    #[arg(long, default_value_t = false)]
    print_dependencies: bool,
    /// Postgres connection string.
    #[arg(long, env = "DATABASE_URL", value_name = "URL")]
    database_url: Option<String>,
    /// Generate into a throwaway in-memory store.
    #[arg(long, default_value_t = false)]
    in_memory: bool,
    /// Schema map JSON replacing the built-in platform schema.
    #[arg(long, value_name = "FILE")]
    schema: Option<PathBuf>,
    /// TOML file with defaults for these flags.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Write the run report as JSON.
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    init_logging(&LogSettings {
        level: &cli.log_level,
        json: cli.log_json,
        file: cli.log_file.as_deref(),
    })?;

    match cli.command {
        Command::Generate(args) => run_generate(args).await,
        Command::Tables => run_tables(),
    }
}

async fn run_generate(args: GenerateArgs) -> Result<(), CliError> {
    let file = match &args.config {
        Some(path) => load_config(path)?,
        None => FileConfig::default(),
    };
    let resolved = resolve(
        file,
        Overrides {
            tables: args.tables,
            clear: args.clear,
            base_pack: args.base_pack,
            quantities: args.quantities,
            seed: args.seed,
            now: args.now,
            print_dependencies: args.print_dependencies,
            database_url: args.database_url,
            schema: args.schema,
        },
    )?;

    let schema = match &resolved.schema {
        Some(path) => SchemaMap::from_path(path)?,
        None => SchemaMap::builtin()?,
    };
    let options = resolved.options;

    let outcome = match (args.in_memory, resolved.database_url) {
        (false, Some(url)) => {
            tracing::info!(database = %redact_database_url(&url), "connecting to postgres");
            let store = PostgresStore::connect(&url).await?;
            execute(store, schema, options).await?
        }
        (true, _) => execute(MemoryStore::new(), schema, options).await?,
        (false, None) if options.print_dependencies => {
            execute(MemoryStore::new(), schema, options).await?
        }
        (false, None) => {
            return Err(CliError::Config(
                "no database: pass --database-url, set DATABASE_URL or use --in-memory"
                    .to_string(),
            ));
        }
    };

    match &outcome {
        RunOutcome::Dependencies(report) => print_dependencies(report),
        RunOutcome::Completed(report) => print_summary(report),
    }
    if let Some(path) = &args.report {
        match &outcome {
            RunOutcome::Dependencies(report) => write_json_atomic(path, report)?,
            RunOutcome::Completed(report) => write_json_atomic(path, report)?,
        }
        tracing::info!(path = %path.display(), "report written");
    }
    Ok(())
}

async fn execute<S: Store>(
    store: S,
    schema: SchemaMap,
    options: pressgen_generate::GenerateOptions,
) -> Result<RunOutcome, CliError> {
    let engine = GenerationEngine::new(store, schema, options);
    Ok(engine.run().await?)
}

fn run_tables() -> Result<(), CliError> {
    let registry = ImporterRegistry::new();
    for table in registry.tables() {
        let importer = registry.create(&table)?;
        let dependencies = registry
            .spec(&table)
            .map(|spec| spec.dependencies.join(", "))
            .unwrap_or_default();
        println!(
            "{:<26} {:<13} {:>6}  {}",
            table,
            format!("{:?}", importer.mode()),
            importer.default_quantity(),
            dependencies
        );
    }
    Ok(())
}

fn print_dependencies(report: &DependencyReport) {
    for (position, entry) in report.order.iter().enumerate() {
        let marker = if entry.requested { "*" } else { " " };
        println!(
            "{:>3}. {marker} {:<26} <- {}",
            position + 1,
            entry.table,
            entry.dependencies.join(", ")
        );
    }
}

fn print_summary(report: &GenerationReport) {
    println!("run {} (seed {})", report.run_id, report.seed);
    for table in &report.tables {
        println!(
            "  {:<26} {:>8} rows  {:>6} ms",
            table.table, table.rows_generated, table.duration_ms
        );
    }
    println!(
        "{} rows in {} ms",
        report.rows_generated(),
        report.duration_ms
    );
}
