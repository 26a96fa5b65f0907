use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "clipshrink")]
#[command(author, version, about = "Video compression service with cancellable jobs")]
pub struct Cli {
    /// Path to config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP API
    Start {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Compress video files or directories from the command line
    Compress {
        /// Input video file(s) or directories
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output directory, or output file when compressing a single input
        #[arg(short, long, default_value = "compressed")]
        output: PathBuf,

        /// Target size in MB
        #[arg(short = 's', long = "size")]
        target_size_mb: Option<u32>,

        /// Video codec
        #[arg(short = 'c', long, value_parser = ["libx264", "libx265", "vp9"])]
        codec: Option<String>,

        /// Constant Rate Factor, lower is better quality
        #[arg(long)]
        crf: Option<u32>,

        /// Encoding preset
        #[arg(short = 'p', long, value_parser = [
            "ultrafast", "superfast", "veryfast", "faster", "fast",
            "medium", "slow", "slower", "veryslow",
        ])]
        preset: Option<String>,

        /// Audio bitrate, e.g. 128k
        #[arg(short = 'a', long = "audio")]
        audio_bitrate: Option<String>,

        /// Maximum width to scale to, keeping the aspect ratio
        #[arg(short = 'w', long)]
        max_width: Option<u32>,

        /// Number of files compressed in parallel
        #[arg(short = 'j', long, default_value_t = 1)]
        jobs: usize,
    },

    /// Probe a media file and display information
    Probe {
        /// File to probe
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        #[arg(value_name = "CONFIG")]
        path: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
