//! Incident Portal
//!
//! A REST data service over SQLite for reported incidents, prayer commitments, crawler
//! sources, operators and visitor events, plus the client core that drives the public
//! feed and the admin console against it.

pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod db;
pub mod errors;
pub mod feed;
pub mod gateway;
pub mod models;
pub mod text;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use db::Repository;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub config: Arc<Config>,
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Clone the service key for the auth layer
    let service_key = state.config.service_key.clone();

    // Routes available to any visitor
    let public_routes = Router::new()
        .route("/incidents", get(api::list_incidents))
        .route("/incidents/{id}", get(api::get_incident))
        .route("/prayers", get(api::list_prayers).post(api::create_prayer))
        .route("/logs", post(api::create_log))
        .route("/auth/login", post(api::login));

    // Dashboard routes behind the service key
    let admin_routes = Router::new()
        // Incidents
        .route("/incidents", post(api::create_incident))
        .route(
            "/incidents/{id}",
            put(api::update_incident).delete(api::delete_incident),
        )
        // Crawler sources
        .route("/sources", get(api::list_sources).post(api::create_source))
        .route(
            "/sources/{id}",
            put(api::update_source).delete(api::delete_source),
        )
        // Operators
        .route("/users", get(api::list_users).post(api::create_user))
        .route("/users/{id}", put(api::update_user).delete(api::delete_user))
        // Event log
        .route("/logs", get(api::list_logs))
        .layer(middleware::from_fn(move |req, next| {
            auth::service_key_layer(service_key.clone(), req, next)
        }));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", public_routes.nest("/admin", admin_routes))
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests;
