//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Asynchronous PDF-to-Markdown conversion service.
#[derive(Parser, Debug)]
#[command(name = "docflow")]
#[command(author, version, about)]
pub struct Args {
    /// Root directory for the task database and per-task file storage.
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Listener host.
    #[arg(long)]
    pub host: Option<String>,

    /// Listener port.
    #[arg(long)]
    pub port: Option<u16>,

    /// Increase output verbosity (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output.
    #[arg(short, long)]
    pub quiet: bool,
}
