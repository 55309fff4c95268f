use std::time::Duration;

use chrono::{Local, NaiveDateTime, TimeZone, Timelike};
use serde::Deserialize;
use tracing::info;

use crate::error::PipelineError;
use crate::models::ForecastPoint;

const FORECAST_URL: &str = "https://api.openweathermap.org/data/2.5/forecast";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
pub struct ForecastResponse {
    pub list: Vec<ForecastEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ForecastEntry {
    /// Unix timestamp of the forecast slot.
    pub dt: i64,
    pub main: MainConditions,
    pub wind: Wind,
}

#[derive(Debug, Deserialize)]
pub struct MainConditions {
    pub temp: f64,
}

#[derive(Debug, Deserialize)]
pub struct Wind {
    pub speed: f64,
}

/// Client for the OpenWeatherMap 5-day/3-hour forecast endpoint.
pub struct WeatherClient {
    http: reqwest::Client,
    api_key: String,
}

impl WeatherClient {
    pub fn new(api_key: String) -> Result<Self, PipelineError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| PipelineError::Network(e.to_string()))?;
        Ok(Self { http, api_key })
    }

    pub async fn fetch_forecast(
        &self,
        lat: f64,
        lon: f64,
    ) -> Result<ForecastResponse, PipelineError> {
        info!(lat, lon, "fetching forecast");

        let response = self
            .http
            .get(FORECAST_URL)
            .query(&[
                ("lat", lat.to_string().as_str()),
                ("lon", lon.to_string().as_str()),
                ("appid", self.api_key.as_str()),
                ("units", "metric"),
            ])
            .send()
            .await
            .map_err(|e| PipelineError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::Network(format!(
                "forecast API returned {status}"
            )));
        }

        let forecast: ForecastResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::Serialization(e.to_string()))?;
        info!(slots = forecast.list.len(), "forecast downloaded");
        Ok(forecast)
    }
}

/// Reshapes the forecast into chart points: each 3-hour slot becomes one
/// sample keyed by local calendar date and seconds since local midnight.
pub fn reshape_forecast(forecast: &ForecastResponse) -> Vec<ForecastPoint> {
    forecast
        .list
        .iter()
        .filter_map(|entry| {
            let local = Local.timestamp_opt(entry.dt, 0).single()?;
            Some(forecast_point(
                local.naive_local(),
                entry.main.temp,
                entry.wind.speed,
            ))
        })
        .collect()
}

fn forecast_point(local: NaiveDateTime, temp_c: f64, wind_speed_ms: f64) -> ForecastPoint {
    ForecastPoint {
        date: local.date(),
        seconds_since_midnight: local.time().num_seconds_from_midnight(),
        temp_c,
        wind_speed_ms,
    }
}
