use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use crate::{
    config::OpenWeatherConfig,
    error::{IrrigationError, Result},
    model::{DataPoint, Forecast},
};

use super::{WeatherProvider, WeatherSnapshot};

const BASE_URL: &str = "https://api.openweathermap.org/data/2.5";

#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    units: String,
    forecast_steps: u32,
    base_url: String,
    http: Client,
}

impl OpenWeatherProvider {
    pub fn new(config: &OpenWeatherConfig) -> Result<Self> {
        config.validate()?;

        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| IrrigationError::ProviderUnavailable(e.to_string()))?;

        Ok(Self {
            api_key: config.api_key.clone(),
            units: config.units.clone(),
            forecast_steps: config.forecast_steps,
            base_url: BASE_URL.to_string(),
            http,
        })
    }

    async fn fetch_current(&self, location: &str) -> Result<Value> {
        let query = [
            ("q", location),
            ("appid", self.api_key.as_str()),
            ("units", self.units.as_str()),
        ];
        let url = format!("{}/weather", self.base_url);
        self.get_json(&url, &query, "current weather").await
    }

    async fn fetch_forecast(&self, location: &str) -> Result<Value> {
        let cnt = self.forecast_steps.to_string();
        let query = [
            ("q", location),
            ("appid", self.api_key.as_str()),
            ("units", self.units.as_str()),
            ("cnt", cnt.as_str()),
        ];
        let url = format!("{}/forecast", self.base_url);
        self.get_json(&url, &query, "forecast").await
    }

    async fn get_json(&self, url: &str, query: &[(&str, &str)], what: &str) -> Result<Value> {
        let res = self.http.get(url).query(query).send().await.map_err(|e| {
            IrrigationError::ProviderUnavailable(format!(
                "OpenWeatherMap {what} request failed: {e}"
            ))
        })?;

        let status = res.status();
        let body = res.text().await.map_err(|e| {
            IrrigationError::ProviderUnavailable(format!(
                "Failed to read OpenWeatherMap {what} response body: {e}"
            ))
        })?;

        tracing::debug!(%status, bytes = body.len(), "OpenWeatherMap {what} response");

        // Error bodies still carry `cod` and `message`, so keep them as JSON
        // and let the response code check report them.
        serde_json::from_str(&body).map_err(|e| {
            IrrigationError::data_format(format!(
                "OpenWeatherMap {what} returned {status} with a non-JSON body ({e}): {}",
                truncate_body(&body)
            ))
        })
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    async fn fetch(&self, location: &str) -> Result<WeatherSnapshot> {
        let (current, forecast) =
            tokio::try_join!(self.fetch_current(location), self.fetch_forecast(location))?;

        snapshot_from_responses(location, &current, &forecast)
    }
}

/// Validate both responses and build a snapshot. Nothing is built unless both
/// report success.
fn snapshot_from_responses(
    location: &str,
    current: &Value,
    forecast: &Value,
) -> Result<WeatherSnapshot> {
    // Either form of `cod` is accepted on both endpoints.
    let current_code = response_code(current);
    let forecast_code = response_code(forecast);

    if current_code != Some(200) || forecast_code != Some(200) {
        return Err(IrrigationError::data_format(format!(
            "OpenWeatherMap responses are not successful. \
             Current: {}. Forecast: {}.",
            describe_failure(current, current_code),
            describe_failure(forecast, forecast_code),
        )));
    }

    Ok(WeatherSnapshot {
        location: location.to_string(),
        current: DataPoint::from_record(current)?,
        forecast: Forecast::from_response(forecast)?,
        fetched_at: Utc::now(),
    })
}

/// The `cod` field: a number on the current endpoint, a string on forecast.
fn response_code(body: &Value) -> Option<u16> {
    match body.get("cod")? {
        Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn describe_failure(body: &Value, code: Option<u16>) -> String {
    let code = code.map_or_else(|| "missing".to_string(), |c| c.to_string());
    match body.get("message").and_then(Value::as_str) {
        Some(msg) if !msg.is_empty() => format!("code {code} ({msg})"),
        _ => format!("code {code}"),
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
