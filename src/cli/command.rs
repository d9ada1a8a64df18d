use std::path::PathBuf;

use clap::{Args, Parser as ClapParser, Subcommand, ValueEnum};
use iec61937::process::notify::DEFAULT_NOTIFY_PORT;

#[derive(Debug, ClapParser)]
#[command(
    name       = env!("CARGO_PKG_NAME"),
    version    = env!("CARGO_PKG_VERSION"),
    author     = env!("CARGO_PKG_AUTHORS"),
    about      = "Passthrough for S/PDIF capture carrying PCM or IEC 61937 compressed audio",
    long_about = None,
)]
pub struct Cli {
    /// Set the log level
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Info)]
    pub loglevel: LogLevel,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,

    /// Show progress during operations.
    #[arg(long, global = true)]
    pub progress: bool,

    /// Choose an operation to perform.
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Loop capture to playback, decoding compressed bursts on the way.
    Run(RunArgs),

    /// Print the burst layout of a capture dump
    Probe(ProbeArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Capture device or file (use "-" for stdin).
    #[arg(short, long, value_name = "INPUT")]
    pub input: String,

    /// Playback device or file (use "-" for stdout). A '#' is replaced by
    /// the channel count, so "dsp#" plays stereo on dsp2 and 5.1 on dsp6.
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: String,

    /// Output device buffer time in ms (default 2 packets).
    #[arg(short = 'b', long, value_name = "MS", default_value_t = 64)]
    pub buffer_time: u64,

    /// Log per-stage timings.
    #[arg(short, long)]
    pub verbose: bool,

    /// Drop the first N packets (debugging aid).
    #[arg(long, value_name = "N", default_value_t = 0)]
    pub skip_packets: u32,

    /// Port of the local status listener.
    #[arg(long, value_name = "PORT", default_value_t = DEFAULT_NOTIFY_PORT)]
    pub notify_port: u16,

    /// Do not send status notifications.
    #[arg(long)]
    pub no_notify: bool,
}

#[derive(Debug, Args)]
pub struct ProbeArgs {
    /// Capture dump (use "-" for stdin).
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,
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

impl Cli {
    /// Log level after applying `run --verbose`.
    pub fn level_filter(&self) -> log::LevelFilter {
        let base = self.loglevel.to_level_filter();
        match &self.command {
            Commands::Run(args) if args.verbose => base.max(log::LevelFilter::Debug),
            _ => base,
        }
    }
}
