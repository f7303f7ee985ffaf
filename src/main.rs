use std::fs::File;
use std::path::PathBuf;
use std::str::FromStr;

use clap::Parser;
use simplelog::{ConfigBuilder, LevelFilter, WriteLogger};

use sift::core::config::{self, SiftConfig};

const LOG_FILE: &str = "sift.log";

#[derive(Parser)]
#[command(name = "sift", about = "Terminal client for the Sift data-analysis agent")]
struct Args {
    /// Agent server URL (overrides SIFT_SERVER_URL and the config file)
    #[arg(short, long)]
    server: Option<String>,

    /// Read settings from this file instead of ~/.sift/config.toml
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let args = Args::parse();
    dotenv::dotenv().ok();

    // File logger: the terminal belongs to the TUI. SIFT_LOG picks the level.
    let level = std::env::var("SIFT_LOG")
        .ok()
        .and_then(|l| LevelFilter::from_str(&l).ok())
        .unwrap_or(LevelFilter::Debug);
    let log_config = ConfigBuilder::new().set_time_format_rfc3339().build();
    if let Ok(log_file) = File::create(LOG_FILE) {
        let _ = WriteLogger::init(level, log_config, log_file);
    }

    let loaded = match &args.config {
        Some(path) => config::load_config_from(path),
        None => config::load_config(),
    };
    let file_config = loaded.unwrap_or_else(|e| {
        eprintln!("Warning: {e}. Using default settings.");
        log::warn!("Config load failed: {}", e);
        SiftConfig::default()
    });
    let resolved = config::resolve(&file_config, args.server.as_deref());

    log::info!(
        "Sift starting up (server: {}, path: /{})",
        resolved.server_url,
        resolved.connection.socket_path
    );

    sift::tui::run(resolved)
}
