use tokio::net::TcpListener;
use tracing::{info, warn};
use tubegrab::{AppState, build_router, config::Config, error::ApiError};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "tubegrab=info,tower_http=info".to_string()),
        )
        .init();

    if let Err(error) = run().await {
        eprintln!("Server error: {}", error.message);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), ApiError> {
    let config = Config::from_env()?;

    if config.media_api.api_key.is_none() {
        warn!("RAPIDAPI_KEY not configured. Metadata lookups will answer 500 until it is set.");
    }

    let state = AppState::new(&config)?;
    let app = build_router(state, &config)?;

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .map_err(|error| {
            ApiError::internal(format!("Could not bind {}: {error}", config.bind_addr))
        })?;

    info!("Server running on http://{}", config.bind_addr);
    info!("Health check: http://{}/api/health", config.bind_addr);

    axum::serve(listener, app)
        .await
        .map_err(|error| ApiError::internal(format!("HTTP server error: {error}")))
}
