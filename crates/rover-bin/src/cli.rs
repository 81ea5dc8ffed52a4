use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
#[clap(name = "rover")]
pub struct Cli {
    /// Path to the vision tuning config; falls back to built-in defaults
    /// if missing.
    #[clap(long, default_value = "./config/vision.toml")]
    pub config: PathBuf,

    /// Camera device identifier passed to the capture collaborator.
    #[clap(long, default_value = "/dev/video0")]
    pub camera_device: String,

    /// Disable the TCP frame streamer entirely.
    #[clap(long)]
    pub no_stream: bool,

    /// Enable verbose (debug-level) logging.
    #[clap(short, long)]
    pub verbose: bool,
}
