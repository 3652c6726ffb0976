// CLI configuration
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// oxidemux - inspect, seek and retag Ogg streams
#[derive(Parser, Debug)]
#[command(name = "oxidemux")]
#[command(about = "Incremental Ogg demuxer and page writer", long_about = None)]
#[command(version)]
pub struct Config {
    /// Output format
    #[arg(short, long, value_enum, default_value = "pretty", global = true)]
    pub format: OutputFormat,

    /// Quiet mode (suppress progress messages)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose mode (debug logging unless RUST_LOG says otherwise)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Demuxer settings as JSON
    #[arg(long, value_name = "JSON", global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand
    #[command(subcommand)]
    pub command: Commands,
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON
    #[default]
    Pretty,
    /// Compact JSON, one document per file
    Json,
    /// Aligned columns
    Table,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the pages of each file
    Pages {
        /// File paths or glob patterns
        #[arg(value_name = "FILE", required = true)]
        files: Vec<String>,
    },

    /// List demuxed packets
    Packets {
        #[arg(value_name = "FILE", required = true)]
        files: Vec<String>,

        /// Include payloads, base64 encoded
        #[arg(short, long)]
        data: bool,

        /// Stop after this many packets
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show codec header, tags and duration
    Info {
        #[arg(value_name = "FILE", required = true)]
        files: Vec<String>,
    },

    /// Find where a sample lives
    Seek {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Target sample, in output samples
        #[arg(short, long)]
        sample: u64,
    },

    /// Rewrite the comment header
    Retag {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Set a field, replacing existing values (KEY=VALUE)
        #[arg(long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,

        /// Remove every value of a field
        #[arg(long = "remove", value_name = "KEY")]
        remove: Vec<String>,

        /// Write here instead of replacing the input
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Split a `KEY=VALUE` argument
pub fn parse_assignment(arg: &str) -> Option<(&str, &str)> {
    arg.split_once('=').filter(|(key, _)| !key.is_empty())
}
