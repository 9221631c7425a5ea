//! Console and run-log-file tracing setup.

use chrono::Local;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, Layer, Registry};

/// Parse a verbosity name, falling back to info.
pub fn parse_level(verbosity: &str) -> LevelFilter {
    match verbosity.to_lowercase().as_str() {
        "trace" => LevelFilter::TRACE,
        "debug" => LevelFilter::DEBUG,
        "info" => LevelFilter::INFO,
        "warn" => LevelFilter::WARN,
        "error" => LevelFilter::ERROR,
        "off" => LevelFilter::OFF,
        _ => LevelFilter::INFO,
    }
}

/// `mssql-clone_<YYYY-MM-DD-HH_mm_ss>.log`.
pub fn log_file_name<Tz>(now: chrono::DateTime<Tz>) -> String
where
    Tz: chrono::TimeZone,
    Tz::Offset: std::fmt::Display,
{
    format!("mssql-clone_{}.log", now.format("%Y-%m-%d-%H_%M_%S"))
}

/// Append-only plain-text log of one run.
pub struct RunLog {
    file: Arc<File>,
    path: PathBuf,
}

impl RunLog {
    /// Create the log file in `directory` and write the opening line.
    pub fn open(directory: &Path) -> io::Result<Self> {
        fs::create_dir_all(directory)?;
        let now = Local::now();
        let path = directory.join(log_file_name(now));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        writeln!(&file, "{} log opened", now.format("%Y-%m-%d %H:%M:%S"))?;
        Ok(Self {
            file: Arc::new(file),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the closing line with the completion time.
    pub fn close(self) -> io::Result<()> {
        writeln!(
            &*self.file,
            "{} log closed",
            Local::now().format("%Y-%m-%d %H:%M:%S")
        )?;
        self.file.sync_all()
    }
}

/// Install the console layer and, when given, the run log file layer.
pub fn setup_logging(
    verbosity: &str,
    format: &str,
    run_log: Option<(&RunLog, &str)>,
) -> Result<(), String> {
    let console_level = parse_level(verbosity);
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    let console = fmt::layer().with_target(false).with_writer(io::stderr);
    if format == "json" {
        layers.push(console.json().with_filter(console_level).boxed());
    } else {
        layers.push(console.with_filter(console_level).boxed());
    }

    if let Some((log, file_level)) = run_log {
        layers.push(
            fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(Arc::clone(&log.file))
                .with_filter(parse_level(file_level))
                .boxed(),
        );
    }

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .map_err(|e| e.to_string())
}
