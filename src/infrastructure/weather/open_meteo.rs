//! Open-Meteo forecast and geocoding clients
//!
//! Plain I/O wrappers; no governance logic lives here.

use async_trait::async_trait;
use serde::Deserialize;

use crate::domain::DomainError;
use crate::domain::weather::{
    Coordinates, CurrentConditions, DailyPoint, Forecast, GeoMatch, GeocodingProvider,
    HourlyPoint, Units, WeatherProvider,
};

const DEFAULT_FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";
const DEFAULT_GEOCODING_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";

/// HTTP client for the Open-Meteo forecast and geocoding APIs
#[derive(Debug, Clone)]
pub struct OpenMeteoClient {
    http: reqwest::Client,
    forecast_url: String,
    geocoding_url: String,
}

impl OpenMeteoClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            forecast_url: DEFAULT_FORECAST_URL.to_string(),
            geocoding_url: DEFAULT_GEOCODING_URL.to_string(),
        }
    }

    /// Point the client at custom endpoints (tests, proxies)
    pub fn with_urls(
        mut self,
        forecast_url: impl Into<String>,
        geocoding_url: impl Into<String>,
    ) -> Self {
        self.forecast_url = forecast_url.into();
        self.geocoding_url = geocoding_url.into();
        self
    }
}

impl Default for OpenMeteoClient {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current: CurrentBlock,
    hourly: HourlyBlock,
    daily: DailyBlock,
}

#[derive(Debug, Deserialize)]
struct CurrentBlock {
    temperature_2m: f64,
    apparent_temperature: f64,
    relative_humidity_2m: f64,
    wind_speed_10m: f64,
    weather_code: i32,
}

#[derive(Debug, Deserialize)]
struct HourlyBlock {
    time: Vec<String>,
    temperature_2m: Vec<f64>,
    precipitation_probability: Vec<f64>,
    weather_code: Vec<i32>,
}

#[derive(Debug, Deserialize)]
struct DailyBlock {
    time: Vec<String>,
    temperature_2m_min: Vec<f64>,
    temperature_2m_max: Vec<f64>,
    precipitation_probability_max: Vec<f64>,
    weather_code: Vec<i32>,
}

#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    #[serde(default)]
    results: Vec<GeocodingResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodingResult {
    name: String,
    latitude: f64,
    longitude: f64,
    admin1: Option<String>,
    country: Option<String>,
}

/// WMO weather code to a short human description
fn describe_weather_code(code: i32) -> &'static str {
    match code {
        0 => "Clear sky",
        1..=3 => "Partly cloudy",
        45 | 48 => "Fog",
        51..=57 => "Drizzle",
        61..=67 => "Rain",
        71..=77 => "Snow",
        80..=82 => "Rain showers",
        85 | 86 => "Snow showers",
        95..=99 => "Thunderstorm",
        _ => "Unknown",
    }
}

#[async_trait]
impl WeatherProvider for OpenMeteoClient {
    async fn forecast(&self, coords: Coordinates, units: Units) -> Result<Forecast, DomainError> {
        let (temperature_unit, wind_speed_unit) = match units {
            Units::Metric => ("celsius", "kmh"),
            Units::Imperial => ("fahrenheit", "mph"),
        };

        let response = self
            .http
            .get(&self.forecast_url)
            .query(&[
                ("latitude", coords.latitude.to_string()),
                ("longitude", coords.longitude.to_string()),
                ("temperature_unit", temperature_unit.to_string()),
                ("wind_speed_unit", wind_speed_unit.to_string()),
                (
                    "current",
                    "temperature_2m,apparent_temperature,relative_humidity_2m,wind_speed_10m,weather_code"
                        .to_string(),
                ),
                (
                    "hourly",
                    "temperature_2m,precipitation_probability,weather_code".to_string(),
                ),
                (
                    "daily",
                    "temperature_2m_min,temperature_2m_max,precipitation_probability_max,weather_code"
                        .to_string(),
                ),
                ("forecast_days", "7".to_string()),
                ("timezone", "auto".to_string()),
            ])
            .send()
            .await
            .map_err(|e| DomainError::provider("open-meteo", e.to_string()))?
            .error_for_status()
            .map_err(|e| DomainError::provider("open-meteo", e.to_string()))?;

        let body: ForecastResponse = response
            .json()
            .await
            .map_err(|e| DomainError::provider("open-meteo", format!("bad payload: {}", e)))?;

        let hourly = body
            .hourly
            .time
            .iter()
            .enumerate()
            .map(|(i, time)| HourlyPoint {
                time: time.clone(),
                temperature: body.hourly.temperature_2m.get(i).copied().unwrap_or_default(),
                precipitation_probability: body
                    .hourly
                    .precipitation_probability
                    .get(i)
                    .copied()
                    .unwrap_or_default(),
                weather_code: body.hourly.weather_code.get(i).copied().unwrap_or_default(),
            })
            .collect();

        let daily = body
            .daily
            .time
            .iter()
            .enumerate()
            .map(|(i, date)| DailyPoint {
                date: date.clone(),
                temperature_min: body.daily.temperature_2m_min.get(i).copied().unwrap_or_default(),
                temperature_max: body.daily.temperature_2m_max.get(i).copied().unwrap_or_default(),
                precipitation_probability: body
                    .daily
                    .precipitation_probability_max
                    .get(i)
                    .copied()
                    .unwrap_or_default(),
                weather_code: body.daily.weather_code.get(i).copied().unwrap_or_default(),
            })
            .collect();

        Ok(Forecast {
            coordinates: coords,
            units,
            current: CurrentConditions {
                temperature: body.current.temperature_2m,
                feels_like: body.current.apparent_temperature,
                humidity: body.current.relative_humidity_2m,
                wind_speed: body.current.wind_speed_10m,
                weather_code: body.current.weather_code,
                description: describe_weather_code(body.current.weather_code).to_string(),
            },
            hourly,
            daily,
        })
    }
}

#[async_trait]
impl GeocodingProvider for OpenMeteoClient {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<GeoMatch>, DomainError> {
        let response = self
            .http
            .get(&self.geocoding_url)
            .query(&[("name", query), ("count", &limit.to_string())])
            .send()
            .await
            .map_err(|e| DomainError::provider("open-meteo-geocoding", e.to_string()))?
            .error_for_status()
            .map_err(|e| DomainError::provider("open-meteo-geocoding", e.to_string()))?;

        let body: GeocodingResponse = response
            .json()
            .await
            .map_err(|e| {
                DomainError::provider("open-meteo-geocoding", format!("bad payload: {}", e))
            })?;

        Ok(body
            .results
            .into_iter()
            .map(|r| GeoMatch {
                name: r.name,
                region: r.admin1,
                country: r.country,
                coordinates: Coordinates {
                    latitude: r.latitude,
                    longitude: r.longitude,
                },
            })
            .collect())
    }
}
