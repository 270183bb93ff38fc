use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{fmt::Debug, sync::Arc};
use tokio::sync::RwLock;

use crate::{
    config::Config,
    error::Result,
    model::{DataPoint, Forecast},
    provider::openweather::OpenWeatherProvider,
};

pub mod openweather;

/// Current conditions and forecast fetched together for one location.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherSnapshot {
    pub location: String,
    pub current: DataPoint,
    pub forecast: Forecast,
    pub fetched_at: DateTime<Utc>,
}

/// Something that can fetch weather for a location.
///
/// Transport failures and timeouts surface as
/// [`IrrigationError::ProviderUnavailable`](crate::IrrigationError::ProviderUnavailable),
/// unusable responses as [`IrrigationError::DataFormat`](crate::IrrigationError::DataFormat).
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    async fn fetch(&self, location: &str) -> Result<WeatherSnapshot>;
}

/// Holds the latest successfully fetched snapshot for a provider.
///
/// A refresh replaces current conditions and forecast together; a failed
/// refresh leaves the previous snapshot in place.
#[derive(Debug)]
pub struct WeatherSource<P> {
    provider: P,
    latest: RwLock<Option<Arc<WeatherSnapshot>>>,
}

impl<P: WeatherProvider> WeatherSource<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            latest: RwLock::new(None),
        }
    }

    pub async fn refresh(&self, location: &str) -> Result<()> {
        match self.provider.fetch(location).await {
            Ok(snapshot) => {
                tracing::info!(
                    location,
                    forecast_steps = snapshot.forecast.len(),
                    "weather refreshed"
                );
                *self.latest.write().await = Some(Arc::new(snapshot));
                Ok(())
            }
            Err(err) => {
                tracing::warn!(location, error = %err, "weather refresh failed, keeping previous data");
                Err(err)
            }
        }
    }

    /// Latest snapshot, `None` until the first successful refresh.
    pub async fn snapshot(&self) -> Option<Arc<WeatherSnapshot>> {
        self.latest.read().await.clone()
    }

    pub async fn current(&self) -> Option<DataPoint> {
        self.snapshot().await.map(|s| s.current.clone())
    }

    pub async fn forecast(&self) -> Option<Forecast> {
        self.snapshot().await.map(|s| s.forecast.clone())
    }
}

/// Construct the OpenWeatherMap provider from config.
pub fn provider_from_config(config: &Config) -> anyhow::Result<OpenWeatherProvider> {
    let ow = config.openweather()?;
    Ok(OpenWeatherProvider::new(ow)?)
}
