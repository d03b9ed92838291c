//! Multi-room chat session server - Entry Point
//!
//! Spawns one hub per configured room and accepts WebSocket connections.

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use room_session::{handle_connection, Authenticator, Config, HubRegistry};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=room_session=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("room_session=info")),
        )
        .init();

    let config = Config::from_env()?;

    let listener = TcpListener::bind(&config.addr).await?;
    info!("Chat session server listening on {}", config.addr);

    let registry = Arc::new(HubRegistry::spawn(config.rooms.iter().copied()));
    info!("Started {} room hubs", registry.len());

    let authenticator: Arc<dyn Authenticator> = Arc::new(config.users);
    let session_config = Arc::new(config.session);

    // Connection accept loop
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                info!("New connection from {}", addr);
                let registry = registry.clone();
                let authenticator = authenticator.clone();
                let session_config = session_config.clone();

                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, registry, authenticator, session_config).await {
                        error!("Connection handler error: {}", e);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}
