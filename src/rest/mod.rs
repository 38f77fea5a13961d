//! HTTP surface of the bot.
//!
//! Slack delivers chat events and interactive callbacks here; every
//! outward call goes through the injected providers held in [`AppState`].

use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

pub mod dto;
pub mod error;
pub mod routes;
pub mod state;

pub use state::AppState;

/// Build the router with all routes
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health::health))
        .route("/slack/interaction", post(routes::interaction::interaction))
        .route("/slack/events", post(routes::events::events))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

/// Start the HTTP server
pub async fn serve(state: AppState, host: &str, port: u16) -> Result<()> {
    let app = build_router(state);
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .with_context(|| format!("invalid listen address {host}:{port}"))?;

    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("could not bind {addr}"))?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{MockChatPoster, MockSourceHost};
    use crate::config::Config;
    use std::sync::Arc;

    #[test]
    fn test_build_router() {
        let state = AppState::new(
            Config::default(),
            Arc::new(MockSourceHost::default()),
            Arc::new(MockChatPoster::new()),
        );
        let _router = build_router(state);
    }
}
