pub mod adapters;
mod app;
pub mod auth;
pub mod config;
pub mod ports;
pub mod push;
pub mod state;
pub mod types;

use std::net::SocketAddr;

use tracing::info;

pub use app::{StartupError, app};
pub use push::vapid::{VapidKeys, generate_vapid_keys};

#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error("server i/o error: {0}")]
    Io(#[from] std::io::Error),
}

pub async fn serve(addr: SocketAddr, config: config::AppConfig) -> Result<(), ServeError> {
    let router = app(config)?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "listening");
    axum::serve(listener, router).await?;
    Ok(())
}
