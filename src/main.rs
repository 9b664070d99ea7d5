//! # git-config-server
//!
//! Service entrypoint: load settings, bring up the runtime, serve until
//! interrupted, then shut the notifier pool down cleanly.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use git_config_server::runtime::initialization::initialize;
use git_config_server::server;

#[derive(Parser, Debug)]
#[command(
    name = "git-config-server",
    version,
    about = "Git-backed configuration and secret management service"
)]
struct Cli {
    /// Path to configuration file (YAML, keyed under `configserver`)
    #[arg(short, long, value_name = "FILE", default_value = "config.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let state = initialize(&cli.config).await?;
    server::start(state.clone()).await?;

    // Orderly stop: in-flight refresh callbacks are abandoned and marked
    state.notifier.shutdown().await;
    Ok(())
}
