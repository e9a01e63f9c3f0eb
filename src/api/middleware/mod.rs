//! API middleware components

pub mod admin;
pub mod gateway;
pub mod security;

pub use admin::RequireAdmin;
pub use gateway::{AuthContext, RouteConfig, gateway_middleware};
pub use security::security_headers_middleware;
