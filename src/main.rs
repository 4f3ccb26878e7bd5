use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use swift_example::config::{Cli, Command, ServeArgs};
use swift_example::routes::{self, AppState};
use swift_example::shell;
use swift_example::swift::SwiftClient;

async fn serve(args: ServeArgs) -> Result<()> {
    // Refuse to start without credentials for the Swift API.
    let config = args.swift_config()?;
    log::info!(
        "environment: {}, Swift API: {}",
        args.environment,
        config.api_url
    );

    let client = SwiftClient::new(&config);
    let state = AppState::new(Arc::new(client), args.public_api_url.clone());
    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("Failed to bind {}", args.bind))?;
    println!("swift-example listening on http://{}", args.bind);
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve(args) => serve(args).await,
        Command::Shell(args) => shell::run(&args.server).await,
    }
}
