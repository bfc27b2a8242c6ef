// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

use crate::fuel::{compute_fuel, endurance_minutes, FuelBreakdown, FuelError, FuelPolicyConfig, FuelRequest, ReservePolicy};
use crate::leg::{build_leg, LegContext, LegError, RouteLeg};
use crate::mass_balance::MassBalance;
use crate::model::{AircraftProfile, FlightPlan, ModelError, Payload, Waypoint};
use crate::weather::WeatherObservation;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fmt::Write as _;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointRole {
    Departure,
    Arrival,
}

impl fmt::Display for EndpointRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointRole::Departure => write!(f, "departure"),
            EndpointRole::Arrival => write!(f, "arrival"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RouteError {
    #[error("The {role} '{id}' is not resolved to valid coordinates")]
    UnresolvedEndpoint { role: EndpointRole, id: String },
    #[error("Need at least two resolved waypoints, got {0}")]
    InsufficientWaypoints(usize),
    #[error(transparent)]
    Aircraft(#[from] ModelError),
    #[error(transparent)]
    Fuel(#[from] FuelError),
    #[error(transparent)]
    Leg(#[from] LegError),
}

impl RouteError {
    /// Missing or unresolved route endpoints, as opposed to bad numbers.
    pub fn is_incomplete_route(&self) -> bool {
        matches!(
            self,
            RouteError::UnresolvedEndpoint { .. } | RouteError::InsufficientWaypoints(_)
        )
    }
}

/// Non-fatal findings attached to a computed log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LegWarning {
    SkippedWaypoint { id: String, index: usize },
    UnsolvableWind { from: String, to: String },
    VariableWind { station: String },
    SkippedAlternate { id: String },
    InsufficientFuel { required: f64, on_board: f64 },
    OutsideMassBalance,
}

impl fmt::Display for LegWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LegWarning::SkippedWaypoint { id, index } => {
                write!(f, "Waypoint #{} '{}' has no coordinates and was skipped", index + 1, id)
            }
            LegWarning::UnsolvableWind { from, to } => write!(
                f,
                "Wind too strong on {} -> {}: no heading correction, time estimated at TAS",
                from, to
            ),
            LegWarning::VariableWind { station } => write!(
                f,
                "Variable wind reported at {}: leg computed without wind",
                station
            ),
            LegWarning::SkippedAlternate { id } => {
                write!(f, "Alternate '{}' has no coordinates and was skipped", id)
            }
            LegWarning::InsufficientFuel { required, on_board } => write!(
                f,
                "Fuel required {:.1} exceeds fuel on board {:.1}",
                required, on_board
            ),
            LegWarning::OutsideMassBalance => write!(f, "Mass or CG outside aircraft limits"),
        }
    }
}

/// Everything the aggregator needs, borrowed from the caller.
#[derive(Debug, Clone)]
pub struct RouteInput<'a> {
    /// Departure, interior waypoints in route order, arrival.
    pub points: Vec<&'a Waypoint>,
    pub alternate: Option<&'a Waypoint>,
    pub aircraft: &'a AircraftProfile,
    pub cruise_altitude_ft: u32,
    pub departure_time: DateTime<Utc>,
    pub reserve_policy: ReservePolicy,
    pub payload: Option<&'a Payload>,
    /// Observations keyed by upper-case station id.
    pub weather: &'a HashMap<String, WeatherObservation>,
}

impl<'a> RouteInput<'a> {
    pub fn from_plan(plan: &'a FlightPlan, weather: &'a HashMap<String, WeatherObservation>) -> Self {
        Self {
            points: plan.route_points(),
            alternate: plan.alternate.as_ref(),
            aircraft: &plan.aircraft,
            cruise_altitude_ft: plan.cruise_altitude_ft,
            departure_time: plan.departure_time,
            reserve_policy: plan.reserve_policy,
            payload: Some(&plan.payload),
            weather,
        }
    }

    fn weather_at(&self, wp: &Waypoint) -> Option<&'a WeatherObservation> {
        if wp.id.is_empty() {
            return None;
        }
        self.weather.get(&wp.id.trim().to_uppercase())
    }
}

/// The computed navigation log. Superseded as a whole on recomputation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationLog {
    pub legs: Vec<RouteLeg>,
    pub alternate_leg: Option<RouteLeg>,
    pub total_distance_nm: f64,
    pub total_duration_min: f64,
    pub total_trip_fuel: f64,
    pub fuel: FuelBreakdown,
    pub fuel_on_board: f64,
    pub fuel_sufficient: bool,
    pub endurance_min: Option<f64>,
    #[serde(default)]
    pub mass_balance: Option<MassBalance>,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    pub generated_at: DateTime<Utc>,
    #[serde(default)]
    pub warnings: Vec<LegWarning>,
}

/// Checks there are at least two points and that departure and arrival
/// carry usable coordinates.
pub fn validate_endpoints(points: &[&Waypoint]) -> Result<(), RouteError> {
    let (first, last) = match points {
        [first, .., last] => (first, last),
        _ => return Err(RouteError::InsufficientWaypoints(points.len())),
    };
    if !first.is_resolved() {
        return Err(RouteError::UnresolvedEndpoint {
            role: EndpointRole::Departure,
            id: first.id.clone(),
        });
    }
    if !last.is_resolved() {
        return Err(RouteError::UnresolvedEndpoint {
            role: EndpointRole::Arrival,
            id: last.id.clone(),
        });
    }
    Ok(())
}

/// Sequences the route into legs and totals it up.
///
/// Departure and arrival must be resolved; unresolved interior waypoints are
/// skipped with a warning. Fuel is computed once on the total trip time.
pub fn build_navigation_log(
    input: &RouteInput<'_>,
    fuel_config: &FuelPolicyConfig,
    generated_at: DateTime<Utc>,
) -> Result<NavigationLog, RouteError> {
    validate_endpoints(&input.points)?;
    let first = input.points[0];
    let last = input.points[input.points.len() - 1];
    input.aircraft.validate()?;

    let mut warnings = Vec::new();
    let resolved: Vec<&Waypoint> = input
        .points
        .iter()
        .enumerate()
        .filter_map(|(i, wp)| {
            if wp.is_resolved() {
                Some(*wp)
            } else {
                // endpoints are resolved here, so `i - 1` is the interior index
                let index = i.saturating_sub(1);
                warn!("Skipping unresolved waypoint — id={} index={}", wp.id, index);
                warnings.push(LegWarning::SkippedWaypoint {
                    id: wp.id.clone(),
                    index,
                });
                None
            }
        })
        .collect();

    let ctx = LegContext {
        aircraft: input.aircraft,
        default_altitude_ft: input.cruise_altitude_ft,
    };

    let mut legs = Vec::with_capacity(resolved.len() - 1);
    let mut clock = input.departure_time;
    let mut total_distance_nm = 0.0;
    let mut total_duration_min = 0.0;

    for pair in resolved.windows(2) {
        let (from, to) = (pair[0], pair[1]);
        let observation = input.weather_at(from);
        if let Some(obs) = observation.filter(|o| o.wind().is_none()) {
            warn!("Variable wind, leg computed calm — station={}", obs.station_id);
            warnings.push(LegWarning::VariableWind {
                station: obs.station_id.clone(),
            });
        }
        let leg = build_leg(from, observation, to, &ctx, clock)?;
        if leg.is_degraded() {
            warnings.push(LegWarning::UnsolvableWind {
                from: from.display_name().to_string(),
                to: to.display_name().to_string(),
            });
        }
        total_distance_nm += leg.course.distance_nm;
        total_duration_min += leg.performance.duration_min;
        clock = leg.eta;
        legs.push(leg);
    }
    let arrival_time = clock;

    let alternate_leg = match input.alternate {
        Some(alt) if alt.is_resolved() => {
            let leg = build_leg(last, input.weather_at(last), alt, &ctx, arrival_time)?;
            if leg.is_degraded() {
                warnings.push(LegWarning::UnsolvableWind {
                    from: last.display_name().to_string(),
                    to: alt.display_name().to_string(),
                });
            }
            Some(leg)
        }
        Some(alt) => {
            warn!("Skipping unresolved alternate — id={}", alt.id);
            warnings.push(LegWarning::SkippedAlternate { id: alt.id.clone() });
            None
        }
        None => None,
    };

    let fuel = compute_fuel(
        &FuelRequest {
            trip_minutes: total_duration_min,
            alternate_minutes: alternate_leg
                .as_ref()
                .map(|l| l.performance.duration_min)
                .unwrap_or(0.0),
            burn_per_hour: input.aircraft.fuel_burn_per_hour,
            policy: input.reserve_policy,
        },
        fuel_config,
    )?;

    let fuel_on_board = match input.payload {
        Some(p) if p.fuel > 0.0 => p.fuel,
        _ => input.aircraft.usable_fuel,
    };
    let fuel_sufficient = fuel.total <= fuel_on_board;
    if !fuel_sufficient {
        warnings.push(LegWarning::InsufficientFuel {
            required: fuel.total,
            on_board: fuel_on_board,
        });
    }

    let mass_balance = input
        .payload
        .map(|p| MassBalance::compute(input.aircraft, p, fuel_on_board, fuel.trip));
    if mass_balance.as_ref().is_some_and(|mb| !mb.is_within_limits()) {
        warnings.push(LegWarning::OutsideMassBalance);
    }

    debug!(
        "Route aggregated — legs={} distance_nm={:.1} duration_min={:.1} warnings={}",
        legs.len(),
        total_distance_nm,
        total_duration_min,
        warnings.len()
    );
    info!(
        "Navigation log computed — from={} to={} total_fuel={:.1}{}",
        first.display_name(),
        last.display_name(),
        fuel.total,
        fuel.unit
    );

    Ok(NavigationLog {
        legs,
        alternate_leg,
        total_distance_nm,
        total_duration_min,
        total_trip_fuel: fuel.trip,
        endurance_min: endurance_minutes(fuel_on_board, input.aircraft.fuel_burn_per_hour),
        fuel,
        fuel_on_board,
        fuel_sufficient,
        mass_balance,
        departure_time: input.departure_time,
        arrival_time,
        generated_at,
        warnings,
    })
}

fn fmt_heading(deg: Option<f64>) -> String {
    match deg {
        Some(d) => format!("{:03.0}", d.round() % 360.0),
        None => "---".to_string(),
    }
}

fn fmt_minutes(min: f64) -> String {
    let total = min.round() as i64;
    format!("{}:{:02}", total / 60, total % 60)
}

impl RouteLeg {
    /// One fixed-width line of the printed log.
    pub fn to_log_line(&self) -> String {
        let p = &self.performance;
        format!(
            "{:<7} {:<7} {:>5} {:>3} {:>3} {:>3} {:>3} {:>5.1} {:>4.0} {:>6} {:>5.1} {:>5}",
            self.from.display_name(),
            self.to.display_name(),
            self.altitude_ft,
            fmt_heading(Some(self.course.true_track)),
            fmt_heading(Some(self.course.magnetic_track)),
            fmt_heading(p.true_heading),
            fmt_heading(p.magnetic_heading),
            self.course.distance_nm,
            p.groundspeed,
            fmt_minutes(p.duration_min),
            p.fuel,
            self.eta.format("%H:%M")
        )
    }
}

impl NavigationLog {
    pub fn leg_count(&self) -> usize {
        self.legs.len()
    }

    /// Printable navigation log: legs, totals, fuel block and warnings.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let unit = &self.fuel.unit;
        let _ = writeln!(
            out,
            "{:<7} {:<7} {:>5} {:>3} {:>3} {:>3} {:>3} {:>5} {:>4} {:>6} {:>5} {:>5}",
            "FROM", "TO", "ALT", "TT", "MT", "TH", "MH", "DIST", "GS", "TIME", "FUEL", "ETA"
        );
        for leg in &self.legs {
            let _ = writeln!(out, "{}", leg.to_log_line());
        }
        let _ = writeln!(
            out,
            "TOTAL {:>36.1} {:>11} {:>5.1}",
            self.total_distance_nm,
            fmt_minutes(self.total_duration_min),
            self.total_trip_fuel
        );
        if let Some(alt) = &self.alternate_leg {
            let _ = writeln!(out, "ALTERNATE");
            let _ = writeln!(out, "{}", alt.to_log_line());
        }

        let f = &self.fuel;
        let _ = writeln!(out);
        let _ = writeln!(out, "Fuel ({})", f.policy.label());
        let _ = writeln!(out, "  Trip         {:>7.1} {}", f.trip, unit);
        let _ = writeln!(out, "  Contingency  {:>7.1} {}", f.contingency, unit);
        if f.alternate > 0.0 {
            let _ = writeln!(out, "  Alternate    {:>7.1} {}", f.alternate, unit);
        }
        let _ = writeln!(
            out,
            "  Reserve      {:>7.1} {} ({:.0} min)",
            f.reserve, unit, f.reserve_minutes
        );
        let _ = writeln!(out, "  Taxi         {:>7.1} {}", f.taxi, unit);
        let _ = writeln!(out, "  Required     {:>7.1} {}", f.total, unit);
        let _ = writeln!(out, "  On board     {:>7.1} {}", self.fuel_on_board, unit);

        if let Some(mb) = &self.mass_balance {
            let _ = writeln!(out);
            let _ = writeln!(
                out,
                "Mass & balance: TOM {:.0} kg (max {:.0}), CG {:.3} m take-off / {:.3} m landing [{:.3}..{:.3}]",
                mb.takeoff.mass_kg,
                mb.max_takeoff_mass_kg,
                mb.takeoff.cg,
                mb.landing.cg,
                mb.cg_min,
                mb.cg_max
            );
        }

        if !self.warnings.is_empty() {
            let _ = writeln!(out);
            for w in &self.warnings {
                let _ = writeln!(out, "! {}", w);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use crate::leg::LegStatus;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 9, 0, 0).unwrap()
    }

    fn plan() -> FlightPlan {
        let mut plan = FlightPlan::new(AircraftProfile::default_trainer(), t0());
        plan.departure = Waypoint::airport("EHRD", "Rotterdam", 51.9525, 4.4347);
        plan.arrival = Waypoint::airport("EHAM", "Schiphol", 52.3086, 4.7639);
        plan
    }

    #[test]
    fn totals_are_sums_of_legs() {
        let mut p = plan();
        p.push_waypoint(Waypoint::user("GOUDA", 52.0167, 4.7083)).unwrap();
        p.push_waypoint(Waypoint::user("WOERDEN", 52.0853, 4.8833)).unwrap();
        let wx = HashMap::new();
        let log = build_navigation_log(&RouteInput::from_plan(&p, &wx), &FuelPolicyConfig::default(), t0()).unwrap();

        assert_eq!(log.legs.len(), 3);
        let dist: f64 = log.legs.iter().map(|l| l.course.distance_nm).sum();
        let dur: f64 = log.legs.iter().map(|l| l.performance.duration_min).sum();
        let fuel: f64 = log.legs.iter().map(|l| l.performance.fuel).sum();
        assert_relative_eq!(log.total_distance_nm, dist, max_relative = 1e-6);
        assert_relative_eq!(log.total_duration_min, dur, max_relative = 1e-6);
        assert_relative_eq!(log.total_trip_fuel, fuel, max_relative = 1e-6);
        assert_eq!(log.legs[0].from.id, "EHRD");
        assert_eq!(log.legs[2].to.id, "EHAM");
        // legs chain in time
        assert_eq!(log.legs[1].departs_at, log.legs[0].eta);
        assert_eq!(log.arrival_time, log.legs[2].eta);
    }

    #[test]
    fn unresolved_departure_is_rejected() {
        let mut p = plan();
        p.departure = Waypoint::unresolved("EHRD");
        let wx = HashMap::new();
        let err = build_navigation_log(&RouteInput::from_plan(&p, &wx), &FuelPolicyConfig::default(), t0())
            .unwrap_err();
        assert_eq!(
            err,
            RouteError::UnresolvedEndpoint {
                role: EndpointRole::Departure,
                id: "EHRD".to_string()
            }
        );
        assert!(err.is_incomplete_route());
    }

    #[test]
    fn unresolved_arrival_is_rejected() {
        let mut p = plan();
        p.arrival = Waypoint::unresolved("");
        let wx = HashMap::new();
        let err = build_navigation_log(&RouteInput::from_plan(&p, &wx), &FuelPolicyConfig::default(), t0())
            .unwrap_err();
        assert!(matches!(
            err,
            RouteError::UnresolvedEndpoint {
                role: EndpointRole::Arrival,
                ..
            }
        ));
    }

    #[test]
    fn single_point_is_insufficient() {
        let p = plan();
        let wx = HashMap::new();
        let mut input = RouteInput::from_plan(&p, &wx);
        input.points.truncate(1);
        assert_eq!(
            build_navigation_log(&input, &FuelPolicyConfig::default(), t0()).unwrap_err(),
            RouteError::InsufficientWaypoints(1)
        );
    }

    #[test]
    fn unresolved_interior_waypoint_is_skipped() {
        let mut p = plan();
        p.waypoints.push(Waypoint::unresolved("ZZZZZ"));
        let wx = HashMap::new();
        let log = build_navigation_log(&RouteInput::from_plan(&p, &wx), &FuelPolicyConfig::default(), t0()).unwrap();
        assert_eq!(log.legs.len(), 1);
        assert_eq!(
            log.warnings[0],
            LegWarning::SkippedWaypoint {
                id: "ZZZZZ".to_string(),
                index: 0
            }
        );
    }

    #[test]
    fn alternate_adds_fuel_not_distance() {
        let mut p = plan();
        let wx = HashMap::new();
        let without = build_navigation_log(&RouteInput::from_plan(&p, &wx), &FuelPolicyConfig::default(), t0()).unwrap();

        p.alternate = Some(Waypoint::airport("EHLE", "Lelystad", 52.4603, 5.5272));
        let with = build_navigation_log(&RouteInput::from_plan(&p, &wx), &FuelPolicyConfig::default(), t0()).unwrap();

        assert!(with.alternate_leg.is_some());
        assert_eq!(with.total_distance_nm, without.total_distance_nm);
        assert!(with.fuel.alternate > 0.0);
        assert!(with.fuel.total > without.fuel.total);
        assert_eq!(with.alternate_leg.as_ref().unwrap().departs_at, with.arrival_time);
    }

    #[test]
    fn unsolvable_leg_is_a_warning_not_an_error() {
        let mut p = plan();
        p.aircraft.cruise_speed_kt = 30.0;
        let mut wx = HashMap::new();
        wx.insert("EHRD".to_string(), WeatherObservation::new("EHRD", 120.0, 45.0));
        let log = build_navigation_log(&RouteInput::from_plan(&p, &wx), &FuelPolicyConfig::default(), t0()).unwrap();
        assert!(log.legs[0].is_degraded());
        assert!(log
            .warnings
            .iter()
            .any(|w| matches!(w, LegWarning::UnsolvableWind { .. })));
        assert!(log.total_duration_min.is_finite());
    }

    #[test]
    fn headwind_matching_airspeed_degrades_instead_of_panicking() {
        let mut p = plan();
        p.departure = Waypoint::user("SOUTH", 50.0, 5.0);
        p.arrival = Waypoint::user("NORTH", 51.0, 5.0);
        p.aircraft.cruise_speed_kt = 20.0;
        let mut wx = HashMap::new();
        wx.insert("SOUTH".to_string(), WeatherObservation::new("SOUTH", 0.0, 20.0 - 1e-13));
        let log = build_navigation_log(&RouteInput::from_plan(&p, &wx), &FuelPolicyConfig::default(), t0()).unwrap();

        assert!(log.legs[0].is_degraded());
        assert!(log.arrival_time > log.departure_time);
        assert!(log
            .warnings
            .iter()
            .any(|w| matches!(w, LegWarning::UnsolvableWind { .. })));
    }

    #[test]
    fn variable_wind_computes_calm_with_warning() {
        let p = plan();
        let mut wx = HashMap::new();
        let mut vrb = WeatherObservation::new("EHRD", 0.0, 8.0);
        vrb.wind_direction_deg = None;
        wx.insert("EHRD".to_string(), vrb);
        let log = build_navigation_log(&RouteInput::from_plan(&p, &wx), &FuelPolicyConfig::default(), t0()).unwrap();
        assert_eq!(log.legs[0].status, LegStatus::NoWind);
        assert_eq!(
            log.warnings,
            vec![LegWarning::VariableWind {
                station: "EHRD".to_string()
            }]
        );
    }

    #[test]
    fn fuel_shortage_is_flagged() {
        let mut p = plan();
        p.payload.fuel = 10.0;
        let wx = HashMap::new();
        let log = build_navigation_log(&RouteInput::from_plan(&p, &wx), &FuelPolicyConfig::default(), t0()).unwrap();
        assert!(!log.fuel_sufficient);
        assert_eq!(log.fuel_on_board, 10.0);

        p.payload.fuel = 0.0;
        let log = build_navigation_log(&RouteInput::from_plan(&p, &wx), &FuelPolicyConfig::default(), t0()).unwrap();
        assert_eq!(log.fuel_on_board, p.aircraft.usable_fuel);
        assert!(log.fuel_sufficient);
    }

    #[test]
    fn mass_balance_loads_the_fuel_reported_on_board() {
        let mut p = plan();
        p.payload.pilot_kg = 90.0;
        p.payload.passenger_kg = 250.0;
        p.payload.fuel = 0.0;
        let wx = HashMap::new();
        let log = build_navigation_log(&RouteInput::from_plan(&p, &wx), &FuelPolicyConfig::default(), t0()).unwrap();

        assert_eq!(log.fuel_on_board, 201.0);
        let mb = log.mass_balance.as_ref().unwrap();
        assert_relative_eq!(mb.takeoff.mass_kg, 767.0 + 90.0 + 250.0 + 201.0 * 0.72, epsilon = 1e-9);
        assert!(!mb.within_mass_limit());
        assert!(log.warnings.contains(&LegWarning::OutsideMassBalance));
    }

    #[test]
    fn invalid_aircraft_is_an_error() {
        let mut p = plan();
        p.aircraft.fuel_burn_per_hour = -1.0;
        let wx = HashMap::new();
        let err = build_navigation_log(&RouteInput::from_plan(&p, &wx), &FuelPolicyConfig::default(), t0())
            .unwrap_err();
        assert!(matches!(err, RouteError::Aircraft(_)));
        assert!(!err.is_incomplete_route());
    }

    #[test]
    fn text_rendering_lists_every_leg() {
        let mut p = plan();
        p.push_waypoint(Waypoint::user("GOUDA", 52.0167, 4.7083)).unwrap();
        let wx = HashMap::new();
        let log = build_navigation_log(&RouteInput::from_plan(&p, &wx), &FuelPolicyConfig::default(), t0()).unwrap();
        let text = log.to_text();
        assert!(text.contains("EHRD"));
        assert!(text.contains("GOUDA"));
        assert!(text.contains("Reserve"));
        assert!(text.lines().count() > 5);
    }
}
