// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

use crate::fuel::fuel_for_minutes;
use crate::geo::{distance_nm, initial_bearing};
use crate::model::{AircraftProfile, Waypoint};
use crate::weather::WeatherObservation;
use crate::wind::{magnetic_from_true, solve_wind_triangle, WindError, WindInput, WindSolution};
use chrono::{DateTime, TimeDelta, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LegError {
    #[error(transparent)]
    Wind(#[from] WindError),
    #[error("Leg {from} -> {to} ends outside the representable time range ({duration_min:.0} min)")]
    EtaOutOfRange {
        from: String,
        to: String,
        duration_min: f64,
    },
}

/// How the performance figures of a leg were obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegStatus {
    /// Wind triangle solved with observed wind.
    Solved,
    /// No usable wind at the start point; computed as calm.
    NoWind,
    /// Wind too strong to hold the course. Headings are absent and time is
    /// estimated at true airspeed.
    Unsolvable,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub distance_nm: f64,
    pub true_track: f64,
    pub magnetic_track: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LegPerformance {
    pub true_airspeed: f64,
    pub headwind: f64,
    pub crosswind: f64,
    pub wca: Option<f64>,
    pub true_heading: Option<f64>,
    pub magnetic_heading: Option<f64>,
    pub groundspeed: f64,
    pub duration_min: f64,
    pub fuel: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteLeg {
    pub from: Waypoint,
    pub to: Waypoint,
    pub altitude_ft: u32,
    pub course: Course,
    pub wind: Option<WindInput>,
    pub performance: LegPerformance,
    pub status: LegStatus,
    pub departs_at: DateTime<Utc>,
    pub eta: DateTime<Utc>,
}

impl RouteLeg {
    pub fn is_degraded(&self) -> bool {
        self.status == LegStatus::Unsolvable
    }
}

/// Per-route inputs shared by every leg.
#[derive(Debug, Clone, Copy)]
pub struct LegContext<'a> {
    pub aircraft: &'a AircraftProfile,
    pub default_altitude_ft: u32,
}

/// Builds one leg from `from` to `to`.
///
/// The wind comes from the observation at the start point, the magnetic
/// variation from the start point (0 when unknown), the altitude from the end
/// point's target altitude falling back to the plan's cruise altitude.
/// Fails on invalid numeric input (non-positive cruise speed and the like)
/// or when the arrival time cannot be represented.
pub fn build_leg(
    from: &Waypoint,
    from_weather: Option<&WeatherObservation>,
    to: &Waypoint,
    ctx: &LegContext<'_>,
    departs_at: DateTime<Utc>,
) -> Result<RouteLeg, LegError> {
    let a = from.position();
    let b = to.position();
    let variation = from.magnetic_variation.unwrap_or(0.0);
    let tas = ctx.aircraft.cruise_speed_kt;

    let true_track = initial_bearing(&a, &b);
    let course = Course {
        distance_nm: distance_nm(&a, &b),
        true_track,
        magnetic_track: magnetic_from_true(true_track, variation),
    };

    let wind = from_weather.and_then(WeatherObservation::wind);
    if from_weather.is_some() && wind.is_none() {
        debug!(
            "Variable wind at leg start; computing calm — station={}",
            from.display_name()
        );
    }

    let (status, solution) = match wind {
        Some(w) => {
            let solution = solve_wind_triangle(true_track, tas, &w)?;
            let status = match solution {
                WindSolution::Solved { .. } => LegStatus::Solved,
                WindSolution::Unsolvable { .. } => LegStatus::Unsolvable,
            };
            (status, solution)
        }
        None => (
            LegStatus::NoWind,
            solve_wind_triangle(true_track, tas, &WindInput::calm())?,
        ),
    };

    let components = solution.components();
    let heading = solution.heading();
    if heading.is_none() {
        warn!(
            "Wind triangle has no solution; leg computed without wind correction — from={} to={} tas={} crosswind={:.1} headwind={:.1}",
            from.display_name(),
            to.display_name(),
            tas,
            components.crosswind,
            components.headwind
        );
    }

    let groundspeed = heading.map(|h| h.groundspeed).unwrap_or(tas);
    let duration_min = course.distance_nm / groundspeed * 60.0;
    let performance = LegPerformance {
        true_airspeed: tas,
        headwind: components.headwind,
        crosswind: components.crosswind,
        wca: heading.map(|h| h.wca),
        true_heading: heading.map(|h| h.true_heading),
        magnetic_heading: heading.map(|h| magnetic_from_true(h.true_heading, variation)),
        groundspeed,
        duration_min,
        fuel: fuel_for_minutes(duration_min, ctx.aircraft.fuel_burn_per_hour),
    };

    let eta = eta_after(departs_at, duration_min).ok_or_else(|| LegError::EtaOutOfRange {
        from: from.display_name().to_string(),
        to: to.display_name().to_string(),
        duration_min,
    })?;

    Ok(RouteLeg {
        from: from.clone(),
        to: to.clone(),
        altitude_ft: to.altitude_ft.unwrap_or(ctx.default_altitude_ft),
        course,
        wind,
        performance,
        status,
        departs_at,
        eta,
    })
}

fn eta_after(departs_at: DateTime<Utc>, duration_min: f64) -> Option<DateTime<Utc>> {
    let millis = (duration_min * 60_000.0).round();
    if !millis.is_finite() || millis.abs() >= i64::MAX as f64 {
        return None;
    }
    departs_at.checked_add_signed(TimeDelta::try_milliseconds(millis as i64)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 9, 0, 0).unwrap()
    }

    fn north_leg() -> (Waypoint, Waypoint) {
        (
            Waypoint::user("A", 50.0, 5.0),
            Waypoint::user("B", 51.0, 5.0),
        )
    }

    #[test]
    fn no_weather_falls_back_to_calm() {
        let aircraft = AircraftProfile::default_trainer();
        let ctx = LegContext {
            aircraft: &aircraft,
            default_altitude_ft: 3500,
        };
        let (a, b) = north_leg();
        let leg = build_leg(&a, None, &b, &ctx, t0()).unwrap();

        assert_eq!(leg.status, LegStatus::NoWind);
        assert_eq!(leg.performance.groundspeed, 110.0);
        assert_eq!(leg.performance.wca, Some(0.0));
        assert_abs_diff_eq!(leg.course.true_track, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(
            leg.performance.duration_min,
            leg.course.distance_nm / 110.0 * 60.0,
            epsilon = 1e-9
        );
        assert_abs_diff_eq!(
            leg.performance.fuel,
            leg.performance.duration_min / 60.0 * 35.0,
            epsilon = 1e-9
        );
        assert_eq!(leg.altitude_ft, 3500);
        assert!(leg.eta > leg.departs_at);
    }

    #[test]
    fn target_altitude_of_end_point_wins() {
        let aircraft = AircraftProfile::default_trainer();
        let ctx = LegContext {
            aircraft: &aircraft,
            default_altitude_ft: 3500,
        };
        let (a, b) = north_leg();
        let leg = build_leg(&a, None, &b.with_altitude(5500), &ctx, t0()).unwrap();
        assert_eq!(leg.altitude_ft, 5500);
    }

    #[test]
    fn headwind_slows_leg_down() {
        let aircraft = AircraftProfile::default_trainer();
        let ctx = LegContext {
            aircraft: &aircraft,
            default_altitude_ft: 3500,
        };
        let (a, b) = north_leg();
        let wx = WeatherObservation::new("A", 0.0, 20.0);
        let leg = build_leg(&a, Some(&wx), &b, &ctx, t0()).unwrap();

        assert_eq!(leg.status, LegStatus::Solved);
        assert_abs_diff_eq!(leg.performance.groundspeed, 90.0, epsilon = 1e-6);
        assert_abs_diff_eq!(leg.performance.headwind, 20.0, epsilon = 1e-9);
    }

    #[test]
    fn variation_from_start_point_applies_to_heading() {
        let aircraft = AircraftProfile::default_trainer();
        let ctx = LegContext {
            aircraft: &aircraft,
            default_altitude_ft: 3500,
        };
        let (a, b) = north_leg();
        let a = a.with_variation(2.0);
        let wx = WeatherObservation::new("A", 90.0, 15.0);
        let leg = build_leg(&a, Some(&wx), &b, &ctx, t0()).unwrap();

        let th = leg.performance.true_heading.unwrap();
        let mh = leg.performance.magnetic_heading.unwrap();
        assert_abs_diff_eq!(th - mh, 2.0, epsilon = 1e-9);
        assert_abs_diff_eq!(leg.course.magnetic_track, 358.0, epsilon = 1e-6);
    }

    #[test]
    fn unsolvable_wind_degrades_without_nan() {
        let mut aircraft = AircraftProfile::default_trainer();
        aircraft.cruise_speed_kt = 40.0;
        let ctx = LegContext {
            aircraft: &aircraft,
            default_altitude_ft: 3500,
        };
        let (a, b) = north_leg();
        let wx = WeatherObservation::new("A", 90.0, 60.0);
        let leg = build_leg(&a, Some(&wx), &b, &ctx, t0()).unwrap();

        assert!(leg.is_degraded());
        assert_eq!(leg.performance.true_heading, None);
        assert_eq!(leg.performance.magnetic_heading, None);
        assert_eq!(leg.performance.groundspeed, 40.0);
        assert!(leg.performance.duration_min.is_finite());
        assert!(leg.performance.fuel.is_finite());
    }

    #[test]
    fn crawling_headwind_does_not_overflow() {
        let mut aircraft = AircraftProfile::default_trainer();
        aircraft.cruise_speed_kt = 20.0;
        let ctx = LegContext {
            aircraft: &aircraft,
            default_altitude_ft: 3500,
        };
        let (a, b) = north_leg();
        let wx = WeatherObservation::new("A", 0.0, 20.0 - 1e-13);
        let leg = build_leg(&a, Some(&wx), &b, &ctx, t0()).unwrap();

        assert!(leg.is_degraded());
        assert_eq!(leg.performance.groundspeed, 20.0);
        assert!(leg.eta > leg.departs_at);
    }

    #[test]
    fn eta_past_the_calendar_is_an_error() {
        let aircraft = AircraftProfile::default_trainer();
        let ctx = LegContext {
            aircraft: &aircraft,
            default_altitude_ft: 3500,
        };
        let (a, b) = north_leg();
        let err = build_leg(&a, None, &b, &ctx, DateTime::<Utc>::MAX_UTC).unwrap_err();
        assert!(matches!(err, LegError::EtaOutOfRange { .. }));
    }
}
