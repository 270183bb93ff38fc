use anyhow::{Context, anyhow};
use chrono::Local;
use clap::{Parser, Subcommand};
use inquire::{CustomType, Password, Text};
use irrigation_core::{
    Config, DataPoint, IrrigationSettings, WeatherSource,
    provider::{openweather::OpenWeatherProvider, provider_from_config},
};
use std::path::PathBuf;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "irrigation", version, about = "Soil moisture and forecast driven watering decisions")]
pub struct Cli {
    /// Use this config file instead of the platform default.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Interactively set the API key and irrigation settings.
    Configure,

    /// Fetch and show current weather and the forecast.
    Weather {
        /// Location name; defaults to the configured one.
        #[arg(long)]
        location: Option<String>,

        /// Print the snapshot as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Decide whether to water for a soil moisture reading.
    Decide {
        /// Raw soil moisture sensor reading.
        #[arg(long, allow_negative_numbers = true)]
        moisture: i32,

        /// Override the configured moisture threshold.
        #[arg(long)]
        threshold: Option<i32>,

        /// Override the configured lookahead in hours (3..120).
        #[arg(long)]
        lookahead: Option<u32>,

        /// Override the configured location.
        #[arg(long)]
        location: Option<String>,

        /// Print the full assessment as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show the effective settings.
    Settings,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let config = self.load_config()?;

        match self.command {
            Command::Configure => configure(config, self.config.as_deref())?,
            Command::Weather { location, json } => {
                let location = location.unwrap_or_else(|| config.settings.location.clone());
                show_weather(&config, &location, json).await?;
            }
            Command::Decide {
                moisture,
                threshold,
                lookahead,
                location,
                json,
            } => {
                let mut settings = config.settings.clone();
                if let Some(threshold) = threshold {
                    settings.moisture_threshold = threshold;
                }
                if let Some(lookahead) = lookahead {
                    settings.lookahead_hours = lookahead;
                }
                if let Some(location) = location {
                    settings.location = location;
                }
                decide(&config, &settings, moisture, json).await?;
            }
            Command::Settings => show_settings(&config),
        }

        Ok(())
    }

    fn load_config(&self) -> anyhow::Result<Config> {
        match &self.config {
            Some(path) => Config::load_from(path),
            None => Config::load(),
        }
    }
}

fn configure(mut config: Config, path: Option<&std::path::Path>) -> anyhow::Result<()> {
    let api_key = Password::new("OpenWeatherMap API key:")
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;
    config.upsert_api_key(api_key.trim().to_string());

    let location = Text::new("Location:")
        .with_default(&config.settings.location)
        .prompt()?;
    config.settings.location = location;
    config.settings.moisture_threshold = CustomType::<i32>::new("Moisture threshold:")
        .with_default(config.settings.moisture_threshold)
        .prompt()?;
    config.settings.water_amount = CustomType::<u32>::new("Water amount:")
        .with_default(config.settings.water_amount)
        .prompt()?;
    config.settings.lookahead_hours = CustomType::<u32>::new("Lookahead hours:")
        .with_default(config.settings.lookahead_hours)
        .with_help_message("between 3 and 119")
        .prompt()?;

    config.settings.validate()?;

    let saved_to = match path {
        Some(path) => {
            config.save_to(path)?;
            path.to_path_buf()
        }
        None => config.save()?,
    };
    println!("Configuration saved to {}", saved_to.display());

    Ok(())
}

async fn refreshed_source(
    config: &Config,
    location: &str,
) -> anyhow::Result<WeatherSource<OpenWeatherProvider>> {
    let source = WeatherSource::new(provider_from_config(config)?);
    source
        .refresh(location)
        .await
        .with_context(|| format!("Could not fetch weather for '{location}'"))?;
    Ok(source)
}

async fn show_weather(config: &Config, location: &str, json: bool) -> anyhow::Result<()> {
    let source = refreshed_source(config, location).await?;
    let snapshot = source
        .snapshot()
        .await
        .ok_or_else(|| anyhow!("No weather data available"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(snapshot.as_ref())?);
        return Ok(());
    }

    let city = if snapshot.current.city_name.is_empty() {
        location
    } else {
        snapshot.current.city_name.as_str()
    };
    println!("Now in {city}");
    println!("  {}", format_point(&snapshot.current));
    println!("Forecast");
    for point in snapshot.forecast.points() {
        println!("  {}", format_point(point));
    }

    Ok(())
}

async fn decide(
    config: &Config,
    settings: &IrrigationSettings,
    moisture: i32,
    json: bool,
) -> anyhow::Result<()> {
    settings.validate()?;

    let source = refreshed_source(config, &settings.location).await?;
    let forecast = source
        .forecast()
        .await
        .ok_or_else(|| anyhow!("No forecast available"))?;

    let assessment = settings.assess(&forecast, moisture)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&assessment)?);
        return Ok(());
    }

    let summary = &assessment.summary;
    println!("{}", assessment.water);
    println!("  reason:      {}", assessment.reason);
    println!(
        "  moisture:    {moisture} (threshold {})",
        settings.moisture_threshold
    );
    println!(
        "  rainfall:    {:.2} mm forecast, {:.2} mm needed over {} steps",
        summary.total_rainfall_mm,
        summary.rain_need_mm(),
        summary.steps
    );
    println!("  max temp:    {:.1}", summary.max_temperature);
    println!("  max humid:   {}%", summary.max_humidity_pct);
    if assessment.water {
        println!("  water:       {}", settings.water_amount);
    }

    Ok(())
}

fn show_settings(config: &Config) {
    let s = &config.settings;
    println!("location:           {}", s.location);
    println!("moisture threshold: {}", s.moisture_threshold);
    println!("water amount:       {}", s.water_amount);
    println!("lookahead hours:    {}", s.lookahead_hours);
    match &config.openweather {
        Some(ow) => println!("openweather:        {ow:?}"),
        None => println!("openweather:        not configured"),
    }
}

fn format_point(point: &DataPoint) -> String {
    let rain = point
        .rain_three_hours_mm
        .map_or_else(|| "-".to_string(), |mm| format!("{mm:.1} mm"));
    format!(
        "{}  {:>5.1}°  {:>3}%  rain {:>7}  {}",
        point.timestamp.with_timezone(&Local).format("%a %H:%M"),
        point.temperature,
        point.humidity_pct,
        rain,
        point.description,
    )
}
