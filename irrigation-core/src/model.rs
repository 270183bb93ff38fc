use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{IrrigationError, Result};

/// Fixed duration covered by one forecast entry.
pub const STEP_HOURS: u32 = 3;

/// A single normalized weather observation, either current conditions or one
/// forecast time step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub timestamp: DateTime<Utc>,
    /// Provider units; Celsius with the default `metric` configuration.
    pub temperature: f64,
    pub humidity_pct: u8,
    pub condition_code: u32,
    pub description: String,
    pub icon: String,
    pub city_name: String,
    /// Millimeters over the last hour. `None` means not reported.
    pub rain_last_hour_mm: Option<f64>,
    /// Millimeters over the preceding 3 hour window. `None` means not reported.
    pub rain_three_hours_mm: Option<f64>,
}

impl DataPoint {
    /// Build a point from one provider observation record.
    ///
    /// Expects the OpenWeatherMap shape: `dt`, `main.temp`, `main.humidity`,
    /// `weather[0].{id,description,icon}`, an optional `name` and an optional
    /// `rain` object with `1h`/`3h` fields.
    pub fn from_record(record: &Value) -> Result<Self> {
        let raw = OwRecord::deserialize(record)?;
        raw.try_into()
    }

    /// Rainfall this point adds to a window total. Unreported counts as zero.
    pub fn rain_contribution_mm(&self) -> f64 {
        self.rain_three_hours_mm.unwrap_or(0.0)
    }
}

/// Chronologically ordered forecast steps, each covering [`STEP_HOURS`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    points: Vec<DataPoint>,
}

impl Forecast {
    pub fn new(points: Vec<DataPoint>) -> Self {
        Self { points }
    }

    /// Build a forecast from a provider response holding a `list` of records.
    ///
    /// Records without a `name` inherit the response's `city.name`.
    pub fn from_response(response: &Value) -> Result<Self> {
        let list = response
            .get("list")
            .and_then(Value::as_array)
            .ok_or_else(|| IrrigationError::data_format("forecast response has no `list` array"))?;

        let city = response.pointer("/city/name").and_then(Value::as_str);

        let points = list
            .iter()
            .enumerate()
            .map(|(idx, record)| {
                let mut point = DataPoint::from_record(record).map_err(|err| {
                    IrrigationError::data_format(format!("forecast entry {idx}: {err}"))
                })?;
                if point.city_name.is_empty() {
                    point.city_name = city.unwrap_or_default().to_string();
                }
                Ok(point)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { points })
    }

    pub fn points(&self) -> &[DataPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The first `steps` entries, or all of them if the forecast is shorter.
    pub fn window(&self, steps: usize) -> &[DataPoint] {
        &self.points[..steps.min(self.points.len())]
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    humidity: u8,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    id: u32,
    description: String,
    icon: String,
}

#[derive(Debug, Deserialize)]
struct OwRain {
    #[serde(rename = "1h", default)]
    one_hour: Option<f64>,
    #[serde(rename = "3h", default)]
    three_hours: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwRecord {
    dt: i64,
    main: OwMain,
    weather: Vec<OwWeather>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    rain: Option<OwRain>,
}

impl TryFrom<OwRecord> for DataPoint {
    type Error = IrrigationError;

    fn try_from(raw: OwRecord) -> Result<Self> {
        let timestamp = DateTime::from_timestamp(raw.dt, 0).ok_or_else(|| {
            IrrigationError::data_format(format!("timestamp {} is out of range", raw.dt))
        })?;

        if raw.main.humidity > 100 {
            return Err(IrrigationError::data_format(format!(
                "humidity {}% is outside 0-100",
                raw.main.humidity
            )));
        }

        let weather = raw
            .weather
            .into_iter()
            .next()
            .ok_or_else(|| IrrigationError::data_format("`weather` list is empty"))?;

        let (rain_last_hour_mm, rain_three_hours_mm) = match raw.rain {
            Some(rain) => (
                non_negative("rain.1h", rain.one_hour)?,
                non_negative("rain.3h", rain.three_hours)?,
            ),
            None => (None, None),
        };

        Ok(DataPoint {
            timestamp,
            temperature: raw.main.temp,
            humidity_pct: raw.main.humidity,
            condition_code: weather.id,
            description: weather.description,
            icon: weather.icon,
            city_name: raw.name.unwrap_or_default(),
            rain_last_hour_mm,
            rain_three_hours_mm,
        })
    }
}

fn non_negative(field: &str, value: Option<f64>) -> Result<Option<f64>> {
    match value {
        Some(mm) if mm < 0.0 || mm.is_nan() => Err(IrrigationError::data_format(format!(
            "`{field}` must be a non-negative amount, got {mm}"
        ))),
        other => Ok(other),
    }
}
