//! Weather, geocoding and background-image collaborator interfaces.
//!
//! These are plain I/O seams around external services. The governance core
//! treats them as opaque handlers; only the shapes exchanged with the
//! dashboard are modeled here.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// Measurement system requested by the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Metric,
    Imperial,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub temperature: f64,
    pub feels_like: f64,
    pub humidity: f64,
    pub wind_speed: f64,
    pub weather_code: i32,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HourlyPoint {
    pub time: String,
    pub temperature: f64,
    pub precipitation_probability: f64,
    pub weather_code: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyPoint {
    pub date: String,
    pub temperature_min: f64,
    pub temperature_max: f64,
    pub precipitation_probability: f64,
    pub weather_code: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Forecast {
    pub coordinates: Coordinates,
    pub units: Units,
    pub current: CurrentConditions,
    pub hourly: Vec<HourlyPoint>,
    pub daily: Vec<DailyPoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoMatch {
    pub name: String,
    pub region: Option<String>,
    pub country: Option<String>,
    pub coordinates: Coordinates,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackgroundImage {
    pub url: String,
    pub photographer: Option<String>,
    pub source: String,
}

/// Forecast source (e.g. Open-Meteo)
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn forecast(&self, coords: Coordinates, units: Units) -> Result<Forecast, DomainError>;
}

/// Location search source
#[async_trait]
pub trait GeocodingProvider: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<GeoMatch>, DomainError>;
}

/// Background-image source for the dashboard hero panel
#[async_trait]
pub trait ImageProvider: Send + Sync {
    async fn search(&self, query: &str) -> Result<Option<BackgroundImage>, DomainError>;
}
