//! Application configuration

mod app_config;

pub use app_config::{
    AppConfig, GovernanceConfig, LogFormat, LoggingConfig, ServerConfig, StorageConfig,
    WeatherConfig,
};
