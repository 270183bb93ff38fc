use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::decision::{self, Assessment, DEFAULT_LOOKAHEAD_HOURS};
use crate::error::IrrigationError;
use crate::model::Forecast;

/// Irrigation behaviour, passed explicitly into every refresh and decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IrrigationSettings {
    /// Location name handed to the weather provider.
    pub location: String,
    /// Sensor reading below which soil counts as dry.
    pub moisture_threshold: i32,
    /// Amount dispensed per watering; consumed by the actuator, not the engine.
    pub water_amount: u32,
    pub lookahead_hours: u32,
}

impl Default for IrrigationSettings {
    fn default() -> Self {
        Self {
            location: "Eindhoven".to_string(),
            moisture_threshold: 45,
            water_amount: 50,
            lookahead_hours: DEFAULT_LOOKAHEAD_HOURS,
        }
    }
}

impl IrrigationSettings {
    /// Reject settings the engine would refuse, before any network call.
    pub fn validate(&self) -> Result<(), IrrigationError> {
        if self.location.trim().is_empty() {
            return Err(IrrigationError::Config("location must not be empty".into()));
        }
        decision::lookahead_steps(self.lookahead_hours)?;
        Ok(())
    }

    /// Run the decision engine with these settings.
    pub fn assess(
        &self,
        forecast: &Forecast,
        soil_moisture: i32,
    ) -> Result<Assessment, IrrigationError> {
        decision::assess(
            forecast,
            soil_moisture,
            self.moisture_threshold,
            self.lookahead_hours,
        )
    }
}

/// OpenWeatherMap credentials and request shape.
#[derive(Clone, Serialize, Deserialize)]
pub struct OpenWeatherConfig {
    pub api_key: String,
    #[serde(default = "default_units")]
    pub units: String,
    /// Forecast entries requested per refresh (`cnt`). 8 covers 24 hours.
    #[serde(default = "default_forecast_steps")]
    pub forecast_steps: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_units() -> String {
    "metric".to_string()
}

fn default_forecast_steps() -> u32 {
    8
}

fn default_timeout_secs() -> u64 {
    5
}

impl OpenWeatherConfig {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            units: default_units(),
            forecast_steps: default_forecast_steps(),
            timeout_secs: default_timeout_secs(),
        }
    }

    /// A zero timeout fails every request; zero steps yields an empty forecast.
    pub fn validate(&self) -> Result<(), IrrigationError> {
        if self.timeout_secs == 0 {
            return Err(IrrigationError::Config("timeout_secs must be at least 1".into()));
        }
        if self.forecast_steps == 0 {
            return Err(IrrigationError::Config("forecast_steps must be at least 1".into()));
        }
        Ok(())
    }
}

impl std::fmt::Debug for OpenWeatherConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenWeatherConfig")
            .field("api_key", &"[REDACTED]")
            .field("units", &self.units)
            .field("forecast_steps", &self.forecast_steps)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// [settings]
/// location = "Eindhoven"
/// moisture_threshold = 45
///
/// [openweather]
/// api_key = "..."
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub settings: IrrigationSettings,
    pub openweather: Option<OpenWeatherConfig>,
}

impl Config {
    /// Load config from the default location, or return defaults if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return defaults.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to the default location.
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_file_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// Save config, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "irrigation", "irrigation-cli")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// OpenWeatherMap settings, or an error hinting at `irrigation configure`.
    pub fn openweather(&self) -> Result<&OpenWeatherConfig> {
        self.openweather
            .as_ref()
            .filter(|ow| !ow.api_key.is_empty())
            .ok_or_else(|| {
                anyhow!(
                    "No OpenWeatherMap API key configured.\n\
                     Hint: run `irrigation configure` and enter your API key."
                )
            })
    }

    /// Set or replace the API key, keeping any other provider options.
    pub fn upsert_api_key(&mut self, api_key: String) {
        match self.openweather.as_mut() {
            Some(ow) => ow.api_key = api_key,
            None => self.openweather = Some(OpenWeatherConfig::new(api_key)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_deployment() {
        let settings = IrrigationSettings::default();
        assert_eq!(settings.location, "Eindhoven");
        assert_eq!(settings.moisture_threshold, 45);
        assert_eq!(settings.water_amount, 50);
        assert_eq!(settings.lookahead_hours, 3);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_lookahead_and_location() {
        let settings = IrrigationSettings {
            lookahead_hours: 120,
            ..Default::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(IrrigationError::InvalidParameter(_))
        ));

        let settings = IrrigationSettings {
            location: "  ".into(),
            ..Default::default()
        };
        assert!(matches!(settings.validate(), Err(IrrigationError::Config(_))));
    }

    #[test]
    fn openweather_errors_when_missing_api_key() {
        let cfg = Config::default();
        let err = cfg.openweather().unwrap_err();
        assert!(err.to_string().contains("No OpenWeatherMap API key configured"));
    }

    #[test]
    fn upsert_keeps_provider_options() {
        let mut cfg = Config::default();
        cfg.upsert_api_key("FIRST".into());
        cfg.openweather.as_mut().unwrap().forecast_steps = 16;

        cfg.upsert_api_key("SECOND".into());

        let ow = cfg.openweather().expect("configured");
        assert_eq!(ow.api_key, "SECOND");
        assert_eq!(ow.forecast_steps, 16);
        assert_eq!(ow.units, "metric");
    }

    #[test]
    fn openweather_validate_rejects_zero_timeout_and_steps() {
        let mut ow = OpenWeatherConfig::new("KEY".into());
        assert!(ow.validate().is_ok());

        ow.timeout_secs = 0;
        let err = ow.validate().unwrap_err();
        assert!(err.to_string().contains("timeout_secs"));

        ow.timeout_secs = 5;
        ow.forecast_steps = 0;
        let err = ow.validate().unwrap_err();
        assert!(matches!(err, IrrigationError::Config(_)));
        assert!(err.to_string().contains("forecast_steps"));
    }

    #[test]
    fn debug_redacts_api_key() {
        let ow = OpenWeatherConfig::new("secret-key".into());
        let printed = format!("{ow:?}");
        assert!(!printed.contains("secret-key"));
        assert!(printed.contains("[REDACTED]"));
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            [settings]
            moisture_threshold = 30

            [openweather]
            api_key = "KEY"
            "#,
        )
        .expect("valid toml");

        assert_eq!(cfg.settings.moisture_threshold, 30);
        assert_eq!(cfg.settings.location, "Eindhoven");
        let ow = cfg.openweather().unwrap();
        assert_eq!(ow.timeout_secs, 5);
        assert_eq!(ow.forecast_steps, 8);
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config::default();
        cfg.settings.location = "Utrecht".into();
        cfg.upsert_api_key("KEY".into());
        cfg.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.settings, cfg.settings);
        assert_eq!(loaded.openweather().unwrap().api_key, "KEY");
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert!(cfg.openweather.is_none());
        assert_eq!(cfg.settings, IrrigationSettings::default());
    }
}
