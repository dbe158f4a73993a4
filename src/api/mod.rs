//! API layer - HTTP handlers and routing
//!
//! The remote content service the client core talks to:
//! - Health probe and login
//! - Article endpoints, including the review workflow
//! - Comment endpoints
//! - User administration endpoints
//! - Notification endpoints
//! - Stored article images under `/images`

pub mod articles;
pub mod auth;
pub mod comments;
pub mod middleware;
pub mod notifications;
pub mod upload;
pub mod users;

use anyhow::Context;
use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    Router,
};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

pub use middleware::{ActorHeaders, ApiError, AppState};

/// Build the API router (mounted under `/api`)
pub fn build_api_router() -> Router<AppState> {
    Router::new()
        .merge(auth::router())
        .merge(articles::router())
        .merge(comments::router())
        .merge(users::router())
        .merge(notifications::router())
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> anyhow::Result<Router> {
    let origin = cors_origin
        .parse::<HeaderValue>()
        .with_context(|| format!("Invalid CORS origin: {}", cors_origin))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static("user-id"),
            HeaderName::from_static("user-role"),
        ]);

    let images = ServeDir::new(&state.upload_config.path);

    Ok(Router::new()
        .nest("/api", build_api_router())
        .nest_service(upload::IMAGES_ROUTE, images)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}
