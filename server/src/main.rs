use clap::Parser;
use sketchroom_server::{serve, AppState, Config, ServerError};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    let config = Config::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let addr = config.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    tracing::info!("Shared canvas running at http://localhost:{}", config.port);
    if let Some(public_dir) = &config.public_dir {
        tracing::info!(public_dir = %public_dir.display(), "serving static assets");
    }

    let result = serve(listener, AppState::new(), config.public_dir).await;
    if let Err(error) = &result {
        tracing::error!(%error, "server stopped");
    }
    result
}
