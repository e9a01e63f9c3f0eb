//! Rate limiter infrastructure

mod in_memory;
mod limiter;
mod postgres;

pub use in_memory::InMemoryRateLimitRepository;
pub use limiter::RateLimiter;
pub use postgres::PostgresRateLimitRepository;
