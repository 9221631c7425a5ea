//! mssql-clone CLI - clone every user database on a SQL Server instance.

mod logging;

use clap::{Parser, Subcommand};
use logging::{setup_logging, RunLog};
use mssql_clone::{CloneError, Config, ConnectionResolver, DatabaseOutcome, Orchestrator, RunReport};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

#[derive(Parser)]
#[command(name = "mssql-clone")]
#[command(about = "Clone every user database on a SQL Server instance")]
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

    /// Directory for the run log file (overrides logging.directory)
    #[arg(long)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Clone every selected user database: schema, then data
    Run {
        /// Clone-name suffix, must start with '_' (default: generated from the current time)
        #[arg(long)]
        suffix: Option<String>,

        /// Maximum concurrent table copies per database
        #[arg(long)]
        parallel_tables: Option<usize>,

        /// Drop a clone created by this run when its schema fails to apply
        #[arg(long)]
        drop_on_failure: bool,
    },

    /// List the user databases and the clone names a run would create
    List {
        /// Clone-name suffix used for the listed names
        #[arg(long)]
        suffix: Option<String>,
    },

    /// Test the server connection
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<u8, CloneError> {
    let cli = Cli::parse();

    let mut config = Config::load(&cli.config)?;
    if let Some(dir) = &cli.log_dir {
        config.logging.directory = dir.clone();
    }
    match &cli.command {
        Commands::Run {
            suffix,
            parallel_tables,
            drop_on_failure,
        } => {
            if let Some(suffix) = suffix {
                config.clone.suffix = Some(suffix.clone());
            }
            if let Some(n) = parallel_tables {
                config.clone.parallel_tables = *n;
            }
            if *drop_on_failure {
                config.clone.drop_on_failure = true;
            }
        }
        Commands::List { suffix: Some(suffix) } => {
            config.clone.suffix = Some(suffix.clone());
        }
        Commands::List { suffix: None } | Commands::HealthCheck => {}
    }
    config.validate()?;

    // Only a full run keeps a log file.
    let run_log = match cli.command {
        Commands::Run { .. } => Some(RunLog::open(&config.logging.directory)?),
        _ => None,
    };
    setup_logging(
        &cli.verbosity,
        &cli.log_format,
        run_log.as_ref().map(|log| (log, config.logging.file_level.as_str())),
    )
    .map_err(CloneError::Config)?;
    info!("Loaded configuration from {:?}", cli.config);
    if let Some(log) = &run_log {
        info!("Writing run log to {}", log.path().display());
    }

    let code = match cli.command {
        Commands::Run { .. } => {
            let mut orchestrator = Orchestrator::new(config);
            let outcome = orchestrator.run().await;
            if let Some(log) = run_log {
                if let Err(e) = log.close() {
                    eprintln!("Could not close the run log: {}", e);
                }
            }
            let report = outcome?;

            if cli.output_json {
                println!("{}", report.to_json()?);
            } else {
                print_report(&report);
            }
            report.exit_code()
        }

        Commands::List { .. } => {
            let mut orchestrator = Orchestrator::new(config);
            let planned = orchestrator.plan().await?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&planned)?);
            } else {
                println!("Databases to clone (suffix {}):", orchestrator.suffix());
                for clone in &planned {
                    println!(
                        "  {} -> {} ({})",
                        clone.source,
                        clone.clone_name,
                        clone.collation.as_deref().unwrap_or("default collation")
                    );
                }
                if planned.is_empty() {
                    println!("  (none)");
                }
            }
            0
        }

        Commands::HealthCheck => {
            let resolver = ConnectionResolver::from_config(&config);
            let start = std::time::Instant::now();
            let healthy = resolver.validate(resolver.template()).await;
            let latency_ms = start.elapsed().as_millis() as u64;

            if cli.output_json {
                let result = serde_json::json!({
                    "connected": healthy,
                    "latency_ms": latency_ms,
                });
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Health Check Results:");
                println!(
                    "  SQL Server: {} ({}ms)",
                    if healthy { "OK" } else { "FAILED" },
                    latency_ms
                );
            }

            if !healthy {
                return Err(CloneError::ConnectionUnavailable(
                    mssql_clone::connection::redact_connection_string(resolver.template()),
                ));
            }
            0
        }
    };

    Ok(code)
}

fn print_report(report: &RunReport) {
    println!("\nClone run completed!");
    println!("  Run ID: {}", report.run_id);
    println!("  Suffix: {}", report.suffix);
    println!("  Duration: {:.2}s", report.duration_seconds);
    println!(
        "  Databases: {}/{}",
        report.databases_succeeded(),
        report.databases.len()
    );
    println!(
        "  Tables: {} copied, {} failed",
        report.tables_copied(),
        report.tables_failed()
    );
    println!("  Rows: {}", report.rows_copied());

    for database in &report.databases {
        match &database.outcome {
            DatabaseOutcome::Failed { stage, error } => {
                println!("  Failed: {} ({}): {}", database.clone_name, stage, error);
                if database.dropped {
                    println!("    dropped {}", database.clone_name);
                }
            }
            _ => {
                for table in database.tables.iter().filter(|t| !t.is_success()) {
                    println!(
                        "  Failed table: {}.{}: {}",
                        database.clone_name,
                        table.table,
                        table.error.as_deref().unwrap_or_default()
                    );
                }
            }
        }
    }
}
