//! HTTP boundary: axum router, shared state and server lifecycle.

mod predict;
mod user;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, info, warn};

use crate::accounts::AccountService;
use crate::config::ServerConfig;
use crate::pipeline::Predictor;

#[derive(Clone)]
pub struct AppState {
    pub predictor: Arc<dyn Predictor>,
    pub accounts: Arc<AccountService>,
}

impl AppState {
    pub fn new(predictor: Arc<dyn Predictor>, accounts: Arc<AccountService>) -> Self {
        Self {
            predictor,
            accounts,
        }
    }
}

/// Create the router with all routes configured
pub fn router(state: AppState, config: &ServerConfig) -> Router {
    let api_routes = Router::new()
        .route("/predict", post(predict::predict))
        .route("/user/register", post(user::register))
        .route("/user/login", post(user::login))
        .route("/user/google-auth", post(user::google_auth))
        .route("/user/current", get(user::current))
        .route("/user/logout", post(user::logout));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes)
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(cors_layer(&config.cors_origins))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

/// Bind and serve until Ctrl-C.
pub async fn serve(config: &ServerConfig, state: AppState) -> Result<()> {
    let app = router(state, config);
    let addr = config.bind_addr()?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;
    info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();
    layer.allow_origin(allowed)
}

/// `Authorization: Bearer <token>`
pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc-123"));
        assert_eq!(bearer_token(&headers), Some("abc-123"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }
}
