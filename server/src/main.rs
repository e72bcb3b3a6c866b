mod config;
mod routes;
mod services;
mod state;

use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config::RelayConfig::from_env();
    let addr = match config.socket_addr() {
        Ok(addr) => addr,
        Err(e) => {
            tracing::error!(bind_addr = %config.bind_addr, port = config.port, error = %e, "invalid bind address");
            std::process::exit(1);
        }
    };

    let state = state::AppState::new(config);
    let app = routes::app(state);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%addr, error = %e, "failed to bind");
            std::process::exit(1);
        }
    };

    tracing::info!(%addr, "relay listening");
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "server failed");
        std::process::exit(1);
    }
}
