use std::path::PathBuf;

use clap::{Args, Parser as ClapParser, Subcommand, ValueEnum};

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (oggflac ",
    env!("OGGFLAC_VERSION"),
    ", built ",
    env!("BUILD_TIMESTAMP"),
    ")"
);

#[derive(Debug, ClapParser)]
#[command(
    name         = env!("CARGO_PKG_NAME"),
    version      = env!("CARGO_PKG_VERSION"),
    long_version = LONG_VERSION,
    author       = env!("CARGO_PKG_AUTHORS"),
    about        = "Tools for inspecting and demultiplexing chained Ogg FLAC streams",
    long_about   = None,
)]
pub struct Cli {
    /// Set the log level
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Info)]
    pub loglevel: LogLevel,

    /// Treat unreadable STREAMINFO blocks as fatal errors.
    #[arg(long, global = true)]
    pub strict: bool,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,

    /// Show progress bars during operations.
    #[arg(long, global = true)]
    pub progress: bool,

    /// Choose an operation to perform.
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List the links of an Ogg FLAC stream.
    Info(InfoArgs),

    /// Write one link as a native FLAC file.
    Extract(ExtractArgs),
}

#[derive(Debug, Args)]
pub struct InfoArgs {
    /// Input Ogg FLAC stream (use "-" for stdin).
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Report format.
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

#[derive(Debug, Args)]
pub struct ExtractArgs {
    /// Input Ogg FLAC stream (use "-" for stdin).
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Output FLAC file.
    #[arg(long, short, value_name = "PATH")]
    pub output: PathBuf,

    /// Zero-based link number in a chained stream.
    #[arg(long, value_name = "INDEX", default_value_t = 0, conflicts_with = "serial")]
    pub link: usize,

    /// Extract the FLAC stream with this serial number instead.
    #[arg(long, value_name = "SERIAL", value_parser = parse_serial)]
    pub serial: Option<u32>,
}

/// Accepts decimal or `0x`-prefixed hexadecimal serial numbers.
fn parse_serial(value: &str) -> Result<u32, String> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map_err(|e| format!("invalid serial number '{value}': {e}"))
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogLevel {
    /// Disable logging output.
    Off,
    /// No output except errors.
    Error,
    /// Show warnings and errors.
    Warn,
    /// Show info, warnings and errors (default).
    Info,
    /// Show debug, info, warnings and errors.
    Debug,
    /// Show all log messages including trace.
    Trace,
}

impl LogLevel {
    /// Convert LogLevel to log::LevelFilter
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormat {
    /// Colorized human-readable text.
    Plain,
    /// Structured JSON per log record.
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
pub enum ReportFormat {
    /// Aligned human-readable text.
    Text,
    /// YAML document.
    Yaml,
}
