//! API key domain model

mod entity;
mod repository;

pub use entity::{ApiKey, ApiKeyRole};
pub use repository::ApiKeyRepository;

#[cfg(test)]
pub use repository::mock::MockApiKeyRepository;
