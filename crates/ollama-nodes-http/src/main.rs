//! Standalone server for the node front-end endpoints

use std::net::SocketAddr;

use ollama_nodes_http::{router, AppState, ADDR_ENV, DEFAULT_ADDR};

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let addr = std::env::var(ADDR_ENV).unwrap_or_else(|_| DEFAULT_ADDR.to_string());
    let addr: SocketAddr = match addr.parse() {
        Ok(addr) => addr,
        Err(e) => {
            log::error!("Invalid {} '{}': {}", ADDR_ENV, addr, e);
            std::process::exit(2);
        }
    };

    let state = AppState::default();
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            log::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    log::info!("Ollama node endpoints listening on http://{}", addr);
    if let Err(e) = axum::serve(listener, router(state)).await {
        log::error!("HTTP server error: {}", e);
        std::process::exit(1);
    }
}
