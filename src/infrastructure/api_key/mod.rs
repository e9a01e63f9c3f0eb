//! Key Registry infrastructure

mod generator;
mod hasher;
mod in_memory;
mod postgres;
mod service;

pub use generator::SecretGenerator;
pub use hasher::{Argon2SecretHasher, SecretHasher};
pub use in_memory::InMemoryApiKeyRepository;
pub use postgres::PostgresApiKeyRepository;
pub use service::{ApiKeyService, ApiKeyUpdate, IssuedApiKey};
