//! Core library for the `irrigation` CLI.
//!
//! This crate defines:
//! - Weather data model (observations and forecasts)
//! - The watering decision engine
//! - Abstraction over weather providers, with an OpenWeatherMap implementation
//! - Configuration & credentials handling
//!
//! It is used by `irrigation-cli`, but can also be embedded in other services
//! that read soil moisture sensors and drive an actuator.

pub mod config;
pub mod decision;
pub mod error;
pub mod model;
pub mod provider;

pub use config::{Config, IrrigationSettings, OpenWeatherConfig};
pub use decision::{Assessment, DecisionReason, WindowSummary, assess, evaluate};
pub use error::{IrrigationError, Result};
pub use model::{DataPoint, Forecast, STEP_HOURS};
pub use provider::{WeatherProvider, WeatherSnapshot, WeatherSource};
