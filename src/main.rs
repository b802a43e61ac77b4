mod app;
mod input;
mod render;

use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug, Clone)]
#[command(name = "plantbuddy")]
#[command(about = "Look after Doug the houseplant from your terminal")]
pub(crate) struct Cli {
    /// Directory for the save, settings and log files
    #[arg(long)]
    pub(crate) data_dir: Option<PathBuf>,

    /// Seed for the soil-check dice (overrides settings.json)
    #[arg(long)]
    pub(crate) seed: Option<u64>,

    /// Start over: wipe the saved game before launching
    #[arg(long, default_value_t = false)]
    pub(crate) reset: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let paths = plantbuddy::config::project_paths(cli.data_dir.as_deref())?;
    init_tracing(&paths.log_path)?;
    tracing::info!("=== plantbuddy startup ===");
    app::run(cli, paths)
}

// The terminal belongs to the UI, so logs go to a file.
fn init_tracing(log_path: &Path) -> Result<()> {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .compact()
        .init();
    Ok(())
}
