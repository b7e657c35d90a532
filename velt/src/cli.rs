use std::path::PathBuf;

use clap::Parser;

/// Script console host: executes config/script files and one-liners
/// against a fresh console, then drains the cooperative queues.
#[derive(Debug, Parser)]
#[command(name = "velt", version, about)]
pub struct Cli {
    /// Script files executed in order. The first one is treated as the
    /// default config for the writecfg header.
    pub scripts: Vec<PathBuf>,

    /// Evaluate a chunk after the files are loaded (repeatable).
    #[arg(short = 'e', long = "eval")]
    pub eval: Vec<String>,

    /// Print bytecode disassembly instead of executing.
    #[arg(long)]
    pub dump: bool,

    /// Run the frame tick this many times (10ms each) before exiting,
    /// draining deferred `sleep` commands.
    #[arg(long, default_value_t = 0)]
    pub ticks: u32,

    /// Write the persisted config to this path before exiting.
    #[arg(long = "write-cfg")]
    pub write_cfg: Option<PathBuf>,
}
