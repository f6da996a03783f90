//! `docflow` daemon entry point.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use docflow_core::config::Config;
use docflow_core::pipeline::extractor::{Extractor, FakeExtractor};
use tracing::{debug, info, warn};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");
    info!("docflow starting");

    let mut config = Config::from_env();
    if let Some(data_dir) = args.data_dir {
        config.db_path = data_dir.join("task_db.sqlite");
        config.data_dir = data_dir;
    }
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    if config.vision_enabled() {
        warn!(
            "VISION_API_KEY is set, but this build ships no concrete VisionClient; \
             image descriptions will be skipped. Link one via the library API to enable C5."
        );
    }

    // No real PDF extractor ships with this binary (§1 external collaborator);
    // a consumer of docflow_core supplies one via `server::run` directly.
    let extractor: Arc<dyn Extractor> =
        Arc::new(FakeExtractor::failing("no Extractor configured for this deployment"));

    docflow_core::server::run(config, extractor, None).await
}
