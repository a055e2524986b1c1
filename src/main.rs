use anyhow::Error;
use clap::Parser;

use args::{Args, SubCommands};

mod args;
mod clients;
mod commands;
mod handler;
mod models;
mod repos;
mod services;
mod utils;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "gaia_relay=info".to_string()),
        )
        .init();

    let args = Args::parse();
    match args.subcmd {
        Some(SubCommands::Start(_)) | None => {
            commands::start::run().await?;
        }
        Some(SubCommands::Config(_)) => {
            commands::config::run()?;
        }
        Some(SubCommands::Chat(chat)) => {
            commands::chat::run(chat).await?;
        }
    };
    Ok(())
}
