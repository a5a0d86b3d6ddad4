//! Server-authoritative rooms for a real-time shared canvas.

use std::path::PathBuf;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub mod colors;
pub mod config;
pub mod error;
pub mod handlers;
pub mod logic;
pub mod registry;
pub mod room;
pub mod state;

pub use crate::colors::ColorAllocator;
pub use crate::config::Config;
pub use crate::error::{ProtocolError, ServerError};
pub use crate::registry::RoomRegistry;
pub use crate::room::{Operation, Room};
pub use crate::state::AppState;

use crate::handlers::{health_handler, ws_handler};

pub fn router(state: AppState, public_dir: Option<PathBuf>) -> Router {
    let app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler));
    let app = match public_dir {
        Some(public_dir) => {
            app.fallback_service(ServeDir::new(public_dir).append_index_html_on_directories(true))
        }
        None => app,
    };
    app.layer(TraceLayer::new_for_http()).with_state(state)
}

pub async fn serve(
    listener: TcpListener,
    state: AppState,
    public_dir: Option<PathBuf>,
) -> Result<(), ServerError> {
    axum::serve(listener, router(state, public_dir)).await?;
    Ok(())
}
