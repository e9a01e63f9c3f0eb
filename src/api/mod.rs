//! API layer - HTTP endpoints and middleware

pub mod admin;
pub mod health;
pub mod middleware;
pub mod router;
pub mod routes;
pub mod state;
pub mod types;

pub use middleware::{AuthContext, RequireAdmin, RouteConfig};
pub use router::create_router;
pub use state::AppState;
