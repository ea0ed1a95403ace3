// trimsaw-cli/src/cli.rs
//
// Command-line argument structures.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use trimsaw_core::config::{DEFAULT_OUTPUT_EXTENSION, DEFAULT_SEGMENT_FRAMES};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Trimsaw: video segmentation and audit tool",
    long_about = "Cuts source videos into fixed-length segments, verifies the results frame \
                  by frame and publishes an audit report next to the outputs."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (-v for debug, -vv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Cuts a source video into segments and audits the results
    Trim(TrimArgs),
    /// Prints the metadata ffprobe reports for a locator
    Probe(ProbeArgs),
}

#[derive(Parser, Debug)]
pub struct TrimArgs {
    /// Source video file
    #[arg(short = 'i', long = "input", required = true, value_name = "INPUT_FILE")]
    pub input: PathBuf,

    /// Root directory trimmed files are published under
    #[arg(short = 'o', long = "output", required = true, value_name = "OUTPUT_DIR")]
    pub output: PathBuf,

    /// Segment length, in frames unless --seconds is set
    #[arg(short = 'l', long, value_name = "LENGTH", default_value_t = DEFAULT_SEGMENT_FRAMES)]
    pub length: f64,

    /// Interpret lengths and overlaps as seconds instead of frames
    #[arg(long)]
    pub seconds: bool,

    /// Extra length pulled in before each segment start
    #[arg(long, value_name = "LENGTH", default_value_t = 0.0)]
    pub before_overlap: f64,

    /// Extra length appended after each segment end
    #[arg(long, value_name = "LENGTH", default_value_t = 0.0)]
    pub after_overlap: f64,

    /// Conversion backend: ffmpeg or opencv
    #[arg(long, value_name = "METHOD", default_value = "ffmpeg")]
    pub method: String,

    /// Path to the opencv converter binary
    #[arg(long, value_name = "BINARY")]
    pub opencv_converter: Option<PathBuf>,

    /// Extension for trimmed outputs, without the dot
    #[arg(long, value_name = "EXT", default_value = DEFAULT_OUTPUT_EXTENSION)]
    pub extension: String,

    /// Directory prefix outputs are grouped under at the destination
    #[arg(long, value_name = "DIR")]
    pub main_dir: Option<String>,

    /// Also write log records to a timestamped file in this directory
    #[arg(long, value_name = "LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Base directory for scratch space (defaults to the system temp dir)
    #[arg(long, value_name = "TEMP_DIR")]
    pub temp_dir: Option<PathBuf>,

    /// Attempts per segment whose frame count does not verify, including
    /// the first
    #[arg(long, value_name = "COUNT")]
    pub retries: Option<u32>,

    /// Token sent as an authorization header when probing remote locators
    #[arg(long, value_name = "TOKEN", env = "TRIMSAW_PROBE_TOKEN")]
    pub probe_token: Option<String>,
}

#[derive(Parser, Debug)]
pub struct ProbeArgs {
    /// Local path or URL to probe
    #[arg(required = true, value_name = "LOCATOR")]
    pub locator: String,

    /// Attach the authorization header to the probe
    #[arg(long)]
    pub with_auth: bool,

    /// Token sent as the authorization header
    #[arg(long, value_name = "TOKEN", env = "TRIMSAW_PROBE_TOKEN")]
    pub probe_token: Option<String>,
}
