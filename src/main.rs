#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

use anyhow::Result;
use channel_memory::{app, cli::Cli, observability};
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = app::load_config(cli.config.as_deref())?;
    observability::init_tracing(&config.observability)?;
    app::dispatch(cli.command, config).await
}
