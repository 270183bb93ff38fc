//! Watering decision from soil moisture and a forecast window.
//!
//! The engine is a pure function: no I/O, no shared state. Callers re-run it
//! every time a fresh moisture reading or forecast arrives.

use serde::Serialize;

use crate::error::{IrrigationError, Result};
use crate::model::{Forecast, STEP_HOURS};

pub const MIN_LOOKAHEAD_HOURS: u32 = STEP_HOURS;
/// Exclusive upper bound: the provider's 5 day forecast horizon.
pub const MAX_LOOKAHEAD_HOURS: u32 = 120;
pub const DEFAULT_LOOKAHEAD_HOURS: u32 = 3;

/// Assumed minimum plant water need per forecast step, in millimeters.
pub const RAIN_NEED_PER_STEP_MM: f64 = 0.45;
/// Above this temperature moist soil may still need watering.
pub const HOT_TEMPERATURE: f64 = 30.0;
/// Moisture reading at or above which heat alone never triggers watering.
pub const MOIST_SOIL_CEILING: i32 = 60;

/// Aggregate of the forecast entries inside the lookahead window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WindowSummary {
    /// Requested step count, used to scale the rain need.
    pub steps: usize,
    /// Entries actually present; less than `steps` for a short forecast.
    pub points_used: usize,
    pub total_rainfall_mm: f64,
    /// Starts at 0, so an all sub-zero window reports 0.
    pub max_temperature: f64,
    /// Starts at 0. Not used by the decision rule.
    pub max_humidity_pct: u8,
}

impl WindowSummary {
    pub fn over(forecast: &Forecast, steps: usize) -> Self {
        let window = forecast.window(steps);

        let mut summary = Self {
            steps,
            points_used: window.len(),
            total_rainfall_mm: 0.0,
            max_temperature: 0.0,
            max_humidity_pct: 0,
        };

        for point in window {
            summary.total_rainfall_mm += point.rain_contribution_mm();
            if point.temperature > summary.max_temperature {
                summary.max_temperature = point.temperature;
            }
            if point.humidity_pct > summary.max_humidity_pct {
                summary.max_humidity_pct = point.humidity_pct;
            }
        }

        summary
    }

    /// Rain the plants need over the whole requested window.
    pub fn rain_need_mm(&self) -> f64 {
        RAIN_NEED_PER_STEP_MM * self.steps as f64
    }

    /// Forecast rain falls short of the need.
    pub fn is_dry(&self) -> bool {
        self.total_rainfall_mm < self.rain_need_mm()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    /// Soil below threshold and not enough rain coming.
    DrySoil,
    /// Soil below threshold but the forecast covers the need.
    RainExpected,
    /// Soil moist enough, yet hot with a dry forecast.
    HeatStress,
    /// Soil moist enough; nothing overrides it.
    MoistSoil,
}

impl DecisionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionReason::DrySoil => "soil is dry and little rain is forecast",
            DecisionReason::RainExpected => "soil is dry but forecast rain covers the need",
            DecisionReason::HeatStress => "soil is moist but hot weather with little rain is forecast",
            DecisionReason::MoistSoil => "soil moisture is adequate",
        }
    }
}

impl std::fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A watering decision together with the data it was based on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Assessment {
    pub water: bool,
    pub reason: DecisionReason,
    pub summary: WindowSummary,
}

/// Convert a lookahead in hours to a forecast step count.
///
/// Fails for anything outside `[MIN_LOOKAHEAD_HOURS, MAX_LOOKAHEAD_HOURS)`;
/// out-of-range values are never clamped.
pub fn lookahead_steps(lookahead_hours: u32) -> Result<usize> {
    if !(MIN_LOOKAHEAD_HOURS..MAX_LOOKAHEAD_HOURS).contains(&lookahead_hours) {
        return Err(IrrigationError::InvalidParameter(format!(
            "lookahead must be between {MIN_LOOKAHEAD_HOURS} and {} hours, got {lookahead_hours}",
            MAX_LOOKAHEAD_HOURS - 1
        )));
    }

    Ok((lookahead_hours / STEP_HOURS) as usize)
}

/// Decide whether to water, returning the reason and window aggregate.
pub fn assess(
    forecast: &Forecast,
    soil_moisture: i32,
    moisture_threshold: i32,
    lookahead_hours: u32,
) -> Result<Assessment> {
    let steps = lookahead_steps(lookahead_hours)?;
    let summary = WindowSummary::over(forecast, steps);

    tracing::debug!(
        steps = summary.steps,
        points_used = summary.points_used,
        total_rainfall_mm = summary.total_rainfall_mm,
        max_temperature = summary.max_temperature,
        max_humidity_pct = summary.max_humidity_pct,
        "aggregated forecast window"
    );

    let reason = if soil_moisture < moisture_threshold {
        if summary.is_dry() {
            DecisionReason::DrySoil
        } else {
            DecisionReason::RainExpected
        }
    } else if summary.max_temperature > HOT_TEMPERATURE
        && summary.is_dry()
        && soil_moisture < MOIST_SOIL_CEILING
    {
        DecisionReason::HeatStress
    } else {
        DecisionReason::MoistSoil
    };

    let water = matches!(reason, DecisionReason::DrySoil | DecisionReason::HeatStress);
    tracing::debug!(soil_moisture, moisture_threshold, water, %reason, "irrigation decision");

    Ok(Assessment {
        water,
        reason,
        summary,
    })
}

/// Should the actuator dispense water?
pub fn evaluate(
    forecast: &Forecast,
    soil_moisture: i32,
    moisture_threshold: i32,
    lookahead_hours: u32,
) -> Result<bool> {
    assess(forecast, soil_moisture, moisture_threshold, lookahead_hours).map(|a| a.water)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DataPoint;
    use chrono::{DateTime, Utc};

    fn step(idx: i64, temperature: f64, rain_3h: Option<f64>) -> DataPoint {
        DataPoint {
            timestamp: DateTime::<Utc>::from_timestamp(1_700_000_000 + idx * 10_800, 0).unwrap(),
            temperature,
            humidity_pct: 60,
            condition_code: 800,
            description: "clear sky".into(),
            icon: "01d".into(),
            city_name: "Eindhoven".into(),
            rain_last_hour_mm: None,
            rain_three_hours_mm: rain_3h,
        }
    }

    fn forecast(steps: &[(f64, Option<f64>)]) -> Forecast {
        Forecast::new(
            steps
                .iter()
                .enumerate()
                .map(|(i, (t, r))| step(i as i64, *t, *r))
                .collect(),
        )
    }

    #[test]
    fn rejects_out_of_range_lookahead() {
        let fc = forecast(&[(20.0, None)]);
        for hours in [0, 1, 2, 120, 121, 500] {
            let err = evaluate(&fc, 30, 45, hours).unwrap_err();
            assert!(
                matches!(err, IrrigationError::InvalidParameter(_)),
                "{hours}h should be rejected"
            );
        }
        assert!(evaluate(&fc, 30, 45, 3).is_ok());
        assert!(evaluate(&fc, 30, 45, 119).is_ok());
    }

    #[test]
    fn lookahead_truncates_to_whole_steps() {
        assert_eq!(lookahead_steps(3).unwrap(), 1);
        assert_eq!(lookahead_steps(5).unwrap(), 1);
        assert_eq!(lookahead_steps(24).unwrap(), 8);
        assert_eq!(lookahead_steps(119).unwrap(), 39);
    }

    #[test]
    fn dry_soil_without_rain_waters() {
        let fc = forecast(&[(20.0, None)]);
        assert!(evaluate(&fc, 30, 45, 3).unwrap());

        let assessment = assess(&fc, 30, 45, 3).unwrap();
        assert_eq!(assessment.reason, DecisionReason::DrySoil);
        assert_eq!(assessment.summary.total_rainfall_mm, 0.0);
    }

    #[test]
    fn dry_soil_with_enough_rain_skips() {
        let fc = forecast(&[(20.0, Some(1.0))]);
        assert!(!evaluate(&fc, 30, 45, 3).unwrap());
        assert_eq!(
            assess(&fc, 30, 45, 3).unwrap().reason,
            DecisionReason::RainExpected
        );
    }

    #[test]
    fn rain_exactly_at_need_is_enough() {
        let fc = forecast(&[(20.0, Some(0.45))]);
        assert!(!evaluate(&fc, 30, 45, 3).unwrap());
    }

    #[test]
    fn moist_soil_hot_and_dry_waters() {
        let fc = forecast(&[(32.0, None)]);
        assert!(evaluate(&fc, 50, 45, 3).unwrap());
        assert_eq!(
            assess(&fc, 50, 45, 3).unwrap().reason,
            DecisionReason::HeatStress
        );
    }

    #[test]
    fn very_moist_soil_ignores_heat() {
        let fc = forecast(&[(32.0, None)]);
        assert!(!evaluate(&fc, 65, 45, 3).unwrap());
        assert!(!evaluate(&fc, 60, 45, 3).unwrap());
    }

    #[test]
    fn moist_soil_needs_strictly_hotter_than_threshold() {
        let fc = forecast(&[(30.0, None)]);
        let assessment = assess(&fc, 50, 45, 3).unwrap();
        assert!(!assessment.water);
        assert_eq!(assessment.reason, DecisionReason::MoistSoil);
    }

    #[test]
    fn moist_soil_hot_but_rainy_skips() {
        let fc = forecast(&[(35.0, Some(2.0))]);
        assert!(!evaluate(&fc, 50, 45, 3).unwrap());
    }

    #[test]
    fn soil_at_threshold_counts_as_moist() {
        let fc = forecast(&[(20.0, None)]);
        assert!(!evaluate(&fc, 45, 45, 3).unwrap());
    }

    #[test]
    fn only_the_window_prefix_is_considered() {
        // Heavy rain in step 2 is outside a 3 hour lookahead.
        let fc = forecast(&[(20.0, None), (20.0, Some(10.0))]);
        assert!(evaluate(&fc, 30, 45, 3).unwrap());
        assert!(!evaluate(&fc, 30, 45, 6).unwrap());
    }

    #[test]
    fn short_forecast_uses_what_is_available() {
        let fc = forecast(&[(20.0, Some(0.5)), (20.0, Some(0.5))]);
        let assessment = assess(&fc, 30, 45, 24).unwrap();

        assert_eq!(assessment.summary.steps, 8);
        assert_eq!(assessment.summary.points_used, 2);
        // Need scales with the requested steps: 1.0 < 0.45 * 8.
        assert!(assessment.water);

        assert!(evaluate(&Forecast::default(), 30, 45, 24).unwrap());
    }

    #[test]
    fn sub_zero_window_reports_zero_max() {
        let fc = forecast(&[(-5.0, None), (-2.5, None)]);
        let summary = WindowSummary::over(&fc, 2);
        assert_eq!(summary.max_temperature, 0.0);
    }

    #[test]
    fn summary_tracks_max_humidity() {
        let mut points = vec![step(0, 10.0, None), step(1, 12.0, None)];
        points[1].humidity_pct = 93;
        let summary = WindowSummary::over(&Forecast::new(points), 2);
        assert_eq!(summary.max_humidity_pct, 93);
        assert_eq!(summary.max_temperature, 12.0);
    }

    #[test]
    fn evaluation_is_deterministic() {
        let fc = forecast(&[(31.0, Some(0.1)), (29.0, None), (33.0, Some(0.2))]);
        for hours in [3, 6, 9, 12, 60, 119] {
            let first = assess(&fc, 50, 45, hours).unwrap();
            let second = assess(&fc, 50, 45, hours).unwrap();
            assert_eq!(first, second);
        }
    }
}
