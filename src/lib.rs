//! Skycast API
//!
//! Backend for the Skycast weather dashboard:
//! - forecast, geocoding and background-image routes
//! - a request-governance layer in front of them: API keys, per-identifier
//!   rate limits, and an auditable trail of who called what

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use tracing::info;

use api::AppState;
use infrastructure::api_key::{
    ApiKeyService, InMemoryApiKeyRepository, PostgresApiKeyRepository, SecretGenerator,
};
use infrastructure::audit::{AuditService, InMemoryAuditRepository, PostgresAuditRepository};
use infrastructure::maintenance::{MaintenanceConfig, spawn_maintenance};
use infrastructure::rate_limit::{
    InMemoryRateLimitRepository, PostgresRateLimitRepository, RateLimiter,
};
use infrastructure::weather::{OpenMeteoClient, PexelsImageClient};

/// Create the application state with default configuration
pub async fn create_app_state() -> anyhow::Result<AppState> {
    create_app_state_with_config(&AppConfig::default()).await
}

/// Create the application state with custom configuration
pub async fn create_app_state_with_config(config: &AppConfig) -> anyhow::Result<AppState> {
    let generator = SecretGenerator::new(&config.governance.key_prefix);
    let maintenance = MaintenanceConfig {
        interval: Duration::from_secs(config.governance.maintenance_interval_secs),
        audit_retention_days: config.governance.audit_retention_days,
    };

    let open_meteo = Arc::new(OpenMeteoClient::new());
    let images = Arc::new(PexelsImageClient::new(config.weather.image_api_key.clone()));

    let (api_keys, rate_limiter, audit): (
        Arc<dyn api::state::ApiKeyServiceTrait>,
        Arc<dyn api::state::RateLimiterTrait>,
        Arc<dyn api::state::AuditServiceTrait>,
    ) = match config.storage.backend.as_str() {
        "postgres" => {
            let database_url = std::env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL is required for postgres storage"))?;

            info!("Connecting to PostgreSQL...");
            let pool = PgPoolOptions::new()
                .max_connections(config.storage.max_connections)
                .connect(&database_url)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to connect to PostgreSQL: {}", e))?;

            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to run migrations: {}", e))?;
            info!("PostgreSQL connection established");

            let api_keys = Arc::new(
                ApiKeyService::new(Arc::new(PostgresApiKeyRepository::new(pool.clone())))
                    .with_generator(generator),
            );
            let rate_limiter = Arc::new(RateLimiter::new(Arc::new(
                PostgresRateLimitRepository::new(pool.clone()),
            )));
            let audit = Arc::new(AuditService::new(Arc::new(PostgresAuditRepository::new(
                pool,
            ))));

            spawn_maintenance(rate_limiter.clone(), audit.clone(), maintenance);

            (api_keys, rate_limiter, audit)
        }
        _ => {
            info!("Using in-memory storage for governance state");

            let api_keys = Arc::new(
                ApiKeyService::new(Arc::new(InMemoryApiKeyRepository::new()))
                    .with_generator(generator),
            );
            let rate_limiter = Arc::new(RateLimiter::new(Arc::new(
                InMemoryRateLimitRepository::new(),
            )));
            let audit = Arc::new(AuditService::new(Arc::new(InMemoryAuditRepository::new())));

            spawn_maintenance(rate_limiter.clone(), audit.clone(), maintenance);

            (api_keys, rate_limiter, audit)
        }
    };

    Ok(AppState::new(
        api_keys,
        rate_limiter,
        audit,
        open_meteo.clone(),
        open_meteo,
        images,
        config.governance.bootstrap_secret.clone(),
    ))
}
