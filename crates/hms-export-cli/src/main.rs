//! hms-export CLI - export Hive metastore table definitions.

use clap::{Parser, Subcommand};
use hms_export::exporter::failure_report;
use hms_export::{Config, ExportError, Exporter};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "hms-export")]
#[command(about = "Export Hive metastore table definitions as create scripts")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export create scripts for every table
    Export {
        #[command(flatten)]
        selection: Selection,

        /// Override output location (local path or dbfs:/ path)
        #[arg(long)]
        output: Option<String>,

        /// Keep scripts as CREATE TABLE instead of CREATE OR REPLACE TABLE
        #[arg(long)]
        no_replace: bool,
    },

    /// Fetch everything and report what an export would write
    Plan {
        #[command(flatten)]
        selection: Selection,
    },

    /// List databases in the catalog
    ListDatabases,

    /// List tables of the selected databases
    ListTables {
        /// Only list these databases (repeatable)
        #[arg(long = "database")]
        databases: Vec<String>,

        /// Override number of workers
        #[arg(long)]
        workers: Option<usize>,
    },

    /// Test the catalog connection
    HealthCheck,
}

#[derive(clap::Args)]
struct Selection {
    /// Override number of workers
    #[arg(long)]
    workers: Option<usize>,

    /// Only export these databases (repeatable)
    #[arg(long = "database")]
    databases: Vec<String>,

    /// Only export the first N databases
    #[arg(long)]
    limit: Option<usize>,
}

impl Selection {
    fn apply(self, config: &mut Config) {
        if let Some(w) = self.workers {
            config.export.workers = Some(w);
        }
        if !self.databases.is_empty() {
            config.export.databases = self.databases;
        }
        if let Some(limit) = self.limit {
            config.export.database_limit = Some(limit);
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if let ExportError::BatchHasFailures { ref failures, .. } = e {
                print!("{}", failure_report(failures));
            }
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), ExportError> {
    let cli = Cli::parse();

    // Setup logging
    setup_logging(&cli.verbosity, &cli.log_format);

    let mut config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::Export {
            selection,
            output,
            no_replace,
        } => {
            // Apply overrides
            selection.apply(&mut config);
            if let Some(output) = output {
                config.export.output = output;
            }
            if no_replace {
                config.export.create_or_replace = false;
            }
            config.validate()?;

            let exporter = Exporter::from_config(config)?;
            let result = exporter.run().await?;

            if !result.database_failures.is_empty() {
                print!("{}", failure_report(&result.database_failures));
            }

            if cli.output_json {
                println!("{}", result.to_json()?);
            } else {
                println!("\nExport completed!");
                println!("  Run ID: {}", result.run_id);
                println!("  Duration: {:.2}s", result.duration_seconds);
                println!(
                    "  Databases: {}/{}",
                    result.databases_total - result.databases_failed,
                    result.databases_total
                );
                println!("  Tables: {}", result.tables_exported);
                println!("  Output: {}", result.output);
            }
        }

        Commands::Plan { selection } => {
            selection.apply(&mut config);
            config.validate()?;

            let exporter = Exporter::from_config(config)?;
            let plan = exporter.plan().await?;

            if cli.output_json {
                println!("{}", plan.to_json()?);
            } else {
                print!("{}", failure_report(&plan.database_failures));
                print!("{}", failure_report(plan.failures.values()));
                println!("Export plan:");
                println!("  Databases: {}", plan.databases.len());
                println!("  Databases failed: {}", plan.database_failures.len());
                println!("  Tables: {}", plan.tables_total());
                println!("  good: {}", plan.scripts.len());
                println!("  bad: {}", plan.failures.len());
            }
        }

        Commands::ListDatabases => {
            let exporter = Exporter::from_config(config)?;
            let databases = exporter.resolve_databases().await?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&databases)?);
            } else {
                for database in &databases {
                    println!("{}", database);
                }
            }
        }

        Commands::ListTables { databases, workers } => {
            if !databases.is_empty() {
                config.export.databases = databases;
            }
            if let Some(w) = workers {
                config.export.workers = Some(w);
            }
            config.validate()?;

            let exporter = Exporter::from_config(config)?;
            let databases = exporter.resolve_databases().await?;
            let listing = exporter.list_tables(databases).await?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&listing)?);
            } else {
                print!("{}", failure_report(&listing.database_failures));
                for table in &listing.tables {
                    println!("{}", table);
                }
            }
        }

        Commands::HealthCheck => {
            let exporter = Exporter::from_config(config)?;
            let result = exporter.health_check().await;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Health Check Results:");
                println!(
                    "  Catalog ({}): {} ({}ms)",
                    result.catalog_type,
                    if result.connected { "OK" } else { "FAILED" },
                    result.latency_ms
                );
                if let Some(count) = result.databases_visible {
                    println!("    Databases visible: {}", count);
                }
                if let Some(ref err) = result.error {
                    println!("    Error: {}: {}", err.kind, err.message);
                }
                println!("  Sink: {}", result.sink_type);
                println!(
                    "\n  Overall: {}",
                    if result.connected { "HEALTHY" } else { "UNHEALTHY" }
                );
            }

            if let Some(err) = result.error {
                return Err(hms_export::CatalogError::new(err.kind, err.message).into());
            }
        }
    }

    Ok(())
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
