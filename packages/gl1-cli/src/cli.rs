use clap::{Args, Parser, Subcommand};
use gl1_rs::SourceConfig;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "gl1pool",
    version,
    about = "GL1 trigger event window replay tool",
    long_about = "Replay GL1 trigger segment files through the sequence-ordered event window.\n\
                  Pool settings come from a JSON config ($GL1POOL_CONFIG) and command-line flags."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Command {
    /// Replay segment files through the event window, consuming one event at a time
    Replay(ReplayArgs),
    /// Fill the window once and print its pending keys
    Describe(DescribeArgs),
    /// Write synthetic GL1 segment files
    Synth(SynthArgs),
    /// Check segment files and report what they contain
    Validate(ValidateArgs),
}

/// Where raw events come from. Exactly one of the three must be given.
#[derive(Args)]
#[group(required = true, multiple = false)]
pub struct SourceArgs {
    /// Segment files, replayed in the order given
    #[arg(long, num_args = 1..)]
    pub files: Vec<PathBuf>,

    /// Text file listing one segment path per line
    #[arg(long)]
    pub list: Option<PathBuf>,

    /// Glob pattern; matches are replayed in sorted order
    #[arg(long)]
    pub glob: Option<String>,
}

impl SourceArgs {
    pub fn to_source_config(&self) -> SourceConfig {
        if let Some(ref path) = self.list {
            SourceConfig::ListFile { path: path.clone() }
        } else if let Some(ref pattern) = self.glob {
            SourceConfig::Glob {
                pattern: pattern.clone(),
            }
        } else {
            SourceConfig::Files {
                paths: self.files.clone(),
            }
        }
    }
}

/// Pool settings shared by the commands that drive a window.
#[derive(Args)]
pub struct PoolArgs {
    /// JSON pool configuration file
    #[arg(long, env = "GL1POOL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Pool name used in log records
    #[arg(long)]
    pub name: Option<String>,

    /// Pool verbosity (0 silent, 2 per-event trace, 3 field trace)
    #[arg(long, env = "GL1POOL_VERBOSITY")]
    pub verbosity: Option<u8>,

    /// Identifier of the GL1 sub-packet
    #[arg(long)]
    pub packet_id: Option<i32>,

    /// Minimum number of distinct events to keep buffered
    #[arg(long)]
    pub min_keep: Option<usize>,

    /// Hex dump every decoded GL1 packet to stderr
    #[arg(long)]
    pub dump: bool,
}

#[derive(Args)]
pub struct ReplayArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    #[command(flatten)]
    pub pool: PoolArgs,

    /// Stop after consuming this many events
    #[arg(long)]
    pub max_events: Option<u64>,

    /// Write every published packet as a JSON line to this file
    #[arg(long)]
    pub packets: Option<PathBuf>,

    /// Output file path for the summary (default: stdout)
    #[arg(short, long)]
    pub output: Option<String>,

    /// Compact JSON output
    #[arg(long)]
    pub compact: bool,
}

#[derive(Args)]
pub struct DescribeArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    #[command(flatten)]
    pub pool: PoolArgs,

    /// What to print: ALL, STORAGE or STACK
    #[arg(long, default_value = "ALL")]
    pub scope: String,

    /// Print pool statistics as JSON after the listing
    #[arg(long)]
    pub stats: bool,
}

#[derive(Args)]
pub struct SynthArgs {
    /// Directory to write segment files into
    #[arg(long)]
    pub output_dir: PathBuf,

    /// Run number stamped on every event
    #[arg(long, default_value_t = 1)]
    pub run: i32,

    /// Number of data events to generate
    #[arg(long, default_value_t = 100)]
    pub events: u32,

    /// Data events per segment file
    #[arg(long, default_value_t = 50)]
    pub per_segment: u32,

    /// First sequence number
    #[arg(long, default_value_t = 1)]
    pub first_sequence: i32,

    /// Repeat every Nth event under the same sequence number
    #[arg(long)]
    pub duplicate_every: Option<u32>,

    /// Leave out the GL1 sub-packet from every Nth event
    #[arg(long)]
    pub missing_every: Option<u32>,

    /// Identifier of the GL1 sub-packet
    #[arg(long, default_value_t = gl1_rs::DEFAULT_GL1_PACKET_ID)]
    pub packet_id: i32,

    /// Emit begin-run and end-run control events around the data
    #[arg(long)]
    pub control_events: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct ValidateArgs {
    /// Segment files to check
    #[arg(required = true, num_args = 1..)]
    pub files: Vec<PathBuf>,

    /// Identifier of the GL1 sub-packet
    #[arg(long, default_value_t = gl1_rs::DEFAULT_GL1_PACKET_ID)]
    pub packet_id: i32,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}
