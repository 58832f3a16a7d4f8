// Offline boot data renderer
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr};
use dragonfly_datamanager::ManagerConfig;
use std::io::stderr;
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, registry, EnvFilter};

mod bundle;
mod cmd;

use cmd::release::ReleaseArgs;
use cmd::render::RenderArgs;

#[derive(Parser, Debug)]
#[command(author, version, about = "Dragonfly boot data renderer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output - shows more detailed logs
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    /// Data manager configuration file (YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Reconciles every request in a bundle and prints the rendered documents.
    Render(RenderArgs),
    /// Releases the pool claims of every request in a bundle.
    Release(ReleaseArgs),
}

fn load_config(path: Option<&Path>) -> Result<ManagerConfig> {
    let Some(path) = path else {
        return Ok(ManagerConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("failed to read config {}", path.display()))?;
    serde_yaml::from_str(&text).wrap_err_with(|| format!("invalid config {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    // RUST_LOG wins over --verbose
    let level = if cli.verbose { "debug" } else { "info" };
    let default_directives = format!(
        "dragonfly_bootdata={level},dragonfly_datamanager={level}",
        level = level
    );
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));
    registry().with(filter).with(fmt::layer().with_writer(stderr)).init();

    let config = load_config(cli.config.as_deref())?;
    debug!(?config, "Loaded configuration");

    match cli.command {
        Commands::Render(args) => cmd::render::run(args, config).await,
        Commands::Release(args) => cmd::release::run(args, config).await,
    }
}
