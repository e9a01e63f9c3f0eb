//! Administrative API surface

pub mod api_keys;
pub mod audit;
pub mod bootstrap;
pub mod rate_limits;

use axum::{
    Router,
    routing::{get, post},
};

use super::state::AppState;

/// Admin routes (all behind the gateway; handlers check the admin role)
pub fn create_admin_router() -> Router<AppState> {
    Router::new()
        .route(
            "/keys",
            get(api_keys::list_keys).post(api_keys::create_key),
        )
        .route(
            "/keys/{id}",
            get(api_keys::get_key)
                .patch(api_keys::update_key)
                .delete(api_keys::delete_key),
        )
        .route("/keys/{id}/deactivate", post(api_keys::deactivate_key))
        .route("/rate-limits", get(rate_limits::window_info))
        .route("/rate-limits/reset", post(rate_limits::reset_window))
        .route("/audit/logs", get(audit::recent_logs))
        .route("/audit/stats", get(audit::usage_stats))
        .route("/audit/associations", get(audit::associations))
        .route("/audit/suspicious", get(audit::suspicious_activity))
        .route("/audit/purge", post(audit::purge))
}
