//! Route table
//!
//! Each governed group is wrapped by the gateway with its own
//! `RouteConfig`; the Extension layer sits outside the gateway so the
//! config is visible when the middleware runs.

use axum::{
    Extension, Router,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::admin;
use super::health;
use super::middleware::{RouteConfig, gateway_middleware, security_headers_middleware};
use super::routes::{background, geocode, keys, weather};
use super::state::AppState;
use crate::domain::rate_limit::RateLimitQuota;

fn governed(router: Router<AppState>, state: &AppState, config: RouteConfig) -> Router<AppState> {
    router
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            gateway_middleware,
        ))
        .layer(Extension(config))
}

/// Create the full router with application state
pub fn create_router(state: AppState) -> Router {
    // Forecast and geocoding reads share a policy
    let forecast_routes = governed(
        Router::new()
            .route("/api/weather", get(weather::forecast))
            .route("/api/geocode", get(geocode::search)),
        &state,
        RouteConfig::public(RateLimitQuota::forecast_reads()),
    );

    let background_routes = governed(
        Router::new().route("/api/background", get(background::lookup)),
        &state,
        RouteConfig::public(RateLimitQuota::background_images()),
    );

    // Key issuance is an authentication endpoint: tight window
    let key_routes = governed(
        Router::new()
            .route("/api/keys", post(keys::create_key).get(keys::list_keys))
            .route(
                "/api/keys/{id}",
                axum::routing::patch(keys::update_key).delete(keys::delete_key),
            ),
        &state,
        RouteConfig::protected(RateLimitQuota::authentication()),
    );

    let admin_routes = governed(
        admin::create_admin_router(),
        &state,
        RouteConfig::protected(RateLimitQuota::default()),
    );

    // Bootstrap authenticates with a shared secret instead of a key, but
    // still sits behind the tight authentication window
    let bootstrap_route = governed(
        Router::new().route("/bootstrap", post(admin::bootstrap::mint_key)),
        &state,
        RouteConfig::public(RateLimitQuota::authentication()),
    );

    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::ready_check))
        .route("/live", get(health::live_check))
        .merge(forecast_routes)
        .merge(background_routes)
        .merge(key_routes)
        .nest("/admin", admin_routes.merge(bootstrap_route))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(axum::middleware::from_fn(security_headers_middleware)),
        )
}
