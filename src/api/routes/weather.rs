//! Forecast endpoint

use axum::{Json, extract::{Query, State}};
use serde::Deserialize;

use crate::api::state::AppState;
use crate::api::types::ApiError;
use crate::domain::weather::{Coordinates, Forecast, Units};

#[derive(Debug, Deserialize)]
pub struct ForecastQuery {
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub units: Units,
}

/// GET /api/weather
pub async fn forecast(
    State(state): State<AppState>,
    Query(query): Query<ForecastQuery>,
) -> Result<Json<Forecast>, ApiError> {
    if !(-90.0..=90.0).contains(&query.lat) {
        return Err(ApiError::bad_request("latitude must be within -90..90"));
    }
    if !(-180.0..=180.0).contains(&query.lon) {
        return Err(ApiError::bad_request("longitude must be within -180..180"));
    }

    let coords = Coordinates {
        latitude: query.lat,
        longitude: query.lon,
    };

    let forecast = state.weather.forecast(coords, query.units).await?;
    Ok(Json(forecast))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forecast_query_defaults_units() {
        let query: ForecastQuery =
            serde_urlencoded::from_str("lat=38.71&lon=-9.13").unwrap();
        assert_eq!(query.units, Units::Metric);

        let query: ForecastQuery =
            serde_urlencoded::from_str("lat=38.71&lon=-9.13&units=imperial").unwrap();
        assert_eq!(query.units, Units::Imperial);
    }
}
