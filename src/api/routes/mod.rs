//! Dashboard-facing API routes

pub mod background;
pub mod geocode;
pub mod keys;
pub mod weather;
