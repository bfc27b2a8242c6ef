// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

use crate::fuel::ReservePolicy;
use crate::geo::GeoPoint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Waypoint '{id}' has invalid coordinates ({lat}, {lon})")]
    InvalidCoordinate { id: String, lat: f64, lon: f64 },
    #[error("Invalid aircraft profile '{id}': {reason}")]
    InvalidAircraft { id: String, reason: String },
    #[error("Waypoint index {index} out of range (route has {len} waypoints)")]
    IndexOutOfRange { index: usize, len: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frequency {
    pub label: String,
    pub mhz: f64,
}

/// What a waypoint is, decided once when the waypoint is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WaypointKind {
    Airport {
        #[serde(default)]
        frequencies: Vec<Frequency>,
    },
    Navaid {
        #[serde(default)]
        frequency_mhz: Option<f64>,
    },
    Fix,
    #[default]
    User,
}

impl WaypointKind {
    /// Best guess from an identifier alone, used for directory imports that
    /// carry no type information: `EHAM` is an airport, `SPY` a navaid,
    /// `ARTIP` a fix, anything else a user point.
    pub fn infer(ident: &str) -> WaypointKind {
        let ident = ident.trim();
        let all_alpha = !ident.is_empty() && ident.chars().all(|c| c.is_ascii_alphabetic());
        match ident.len() {
            4 if ident.chars().all(|c| c.is_ascii_alphanumeric())
                && ident.chars().next().is_some_and(|c| c.is_ascii_alphabetic()) =>
            {
                WaypointKind::Airport {
                    frequencies: Vec::new(),
                }
            }
            2 | 3 if all_alpha => WaypointKind::Navaid {
                frequency_mhz: None,
            },
            5 if all_alpha => WaypointKind::Fix,
            _ => WaypointKind::User,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            WaypointKind::Airport { .. } => "APT",
            WaypointKind::Navaid { .. } => "NAV",
            WaypointKind::Fix => "FIX",
            WaypointKind::User => "USR",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub kind: WaypointKind,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub elevation_ft: Option<f64>,
    /// Degrees, east-positive.
    #[serde(default)]
    pub magnetic_variation: Option<f64>,
    /// Target altitude for the leg ending at this point.
    #[serde(default)]
    pub altitude_ft: Option<u32>,
}

impl Waypoint {
    pub fn new(id: &str, lat: f64, lon: f64, kind: WaypointKind) -> Self {
        Self {
            id: id.to_string(),
            name: String::new(),
            kind,
            lat,
            lon,
            elevation_ft: None,
            magnetic_variation: None,
            altitude_ft: None,
        }
    }

    pub fn airport(id: &str, name: &str, lat: f64, lon: f64) -> Self {
        Self {
            name: name.to_string(),
            ..Self::new(
                id,
                lat,
                lon,
                WaypointKind::Airport {
                    frequencies: Vec::new(),
                },
            )
        }
    }

    pub fn user(name: &str, lat: f64, lon: f64) -> Self {
        Self::new(name, lat, lon, WaypointKind::User)
    }

    /// A placeholder for a route endpoint whose lookup has not resolved.
    pub fn unresolved(id: &str) -> Self {
        Self::new(id, 0.0, 0.0, WaypointKind::infer(id))
    }

    pub fn with_altitude(mut self, altitude_ft: u32) -> Self {
        self.altitude_ft = Some(altitude_ft);
        self
    }

    pub fn with_variation(mut self, variation_east: f64) -> Self {
        self.magnetic_variation = Some(variation_east);
        self
    }

    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lon)
    }

    /// Usable for computation: in range and not the `(0, 0)` placeholder.
    pub fn is_resolved(&self) -> bool {
        let p = self.position();
        p.is_valid() && !p.is_null_island()
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.position().is_valid() {
            Ok(())
        } else {
            Err(ModelError::InvalidCoordinate {
                id: self.id.clone(),
                lat: self.lat,
                lon: self.lon,
            })
        }
    }

    pub fn display_name(&self) -> &str {
        if self.id.is_empty() {
            &self.name
        } else {
            &self.id
        }
    }
}

/// Lever arms from the aircraft datum, metres.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationArms {
    pub pilot: f64,
    pub passenger: f64,
    pub baggage: f64,
    pub fuel: f64,
}

impl Default for StationArms {
    fn default() -> Self {
        Self {
            pilot: 0.94,
            passenger: 1.85,
            baggage: 2.41,
            fuel: 1.22,
        }
    }
}

fn default_fuel_density() -> f64 {
    0.72
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AircraftProfile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub registration: String,
    /// True airspeed at cruise, knots.
    pub cruise_speed_kt: f64,
    /// Fuel volume per hour, in the fuel policy unit.
    pub fuel_burn_per_hour: f64,
    pub usable_fuel: f64,
    pub empty_weight_kg: f64,
    #[serde(default)]
    pub empty_arm: f64,
    pub max_takeoff_mass_kg: f64,
    pub cg_min: f64,
    pub cg_max: f64,
    #[serde(default)]
    pub arms: StationArms,
    /// Mass of one fuel unit, kg.
    #[serde(default = "default_fuel_density")]
    pub fuel_density: f64,
}

impl AircraftProfile {
    /// Four-seat piston trainer used when no fleet entry is available.
    pub fn default_trainer() -> Self {
        Self {
            id: "default-c172".to_string(),
            name: "Cessna 172S".to_string(),
            registration: String::new(),
            cruise_speed_kt: 110.0,
            fuel_burn_per_hour: 35.0,
            usable_fuel: 201.0,
            empty_weight_kg: 767.0,
            empty_arm: 1.0,
            max_takeoff_mass_kg: 1157.0,
            cg_min: 0.89,
            cg_max: 1.20,
            arms: StationArms::default(),
            fuel_density: default_fuel_density(),
        }
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        let fail = |reason: &str| -> Result<(), ModelError> {
            Err(ModelError::InvalidAircraft {
                id: self.id.clone(),
                reason: reason.to_string(),
            })
        };

        if !self.cruise_speed_kt.is_finite() || self.cruise_speed_kt <= 0.0 {
            return fail("cruise speed must be positive");
        }
        let non_negative = [
            ("fuel burn", self.fuel_burn_per_hour),
            ("usable fuel", self.usable_fuel),
            ("empty weight", self.empty_weight_kg),
            ("empty arm", self.empty_arm),
            ("max takeoff mass", self.max_takeoff_mass_kg),
            ("pilot arm", self.arms.pilot),
            ("passenger arm", self.arms.passenger),
            ("baggage arm", self.arms.baggage),
            ("fuel arm", self.arms.fuel),
            ("fuel density", self.fuel_density),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return fail(&format!("{} must be non-negative", name));
            }
        }
        if self.cg_min >= self.cg_max {
            return fail("cg_min must be below cg_max");
        }
        Ok(())
    }

    /// Every number the log is computed from, as bit patterns.
    fn performance_bits(&self) -> [u64; 13] {
        [
            self.cruise_speed_kt,
            self.fuel_burn_per_hour,
            self.usable_fuel,
            self.empty_weight_kg,
            self.empty_arm,
            self.max_takeoff_mass_kg,
            self.cg_min,
            self.cg_max,
            self.arms.pilot,
            self.arms.passenger,
            self.arms.baggage,
            self.arms.fuel,
            self.fuel_density,
        ]
        .map(f64::to_bits)
    }
}

/// Loaded masses in kg, fuel in the fuel policy unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Payload {
    pub pilot_kg: f64,
    pub passenger_kg: f64,
    pub baggage_kg: f64,
    pub fuel: f64,
}

impl Payload {
    fn bits(&self) -> [u64; 4] {
        [self.pilot_kg, self.passenger_kg, self.baggage_kg, self.fuel].map(f64::to_bits)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightPlan {
    pub departure: Waypoint,
    pub arrival: Waypoint,
    #[serde(default)]
    pub alternate: Option<Waypoint>,
    pub cruise_altitude_ft: u32,
    /// Interior route points; index is sequence position.
    #[serde(default)]
    pub waypoints: Vec<Waypoint>,
    pub departure_time: DateTime<Utc>,
    #[serde(default)]
    pub payload: Payload,
    #[serde(default)]
    pub reserve_policy: ReservePolicy,
    pub aircraft: AircraftProfile,
}

impl FlightPlan {
    /// An empty plan: endpoints present but unresolved.
    pub fn new(aircraft: AircraftProfile, departure_time: DateTime<Utc>) -> Self {
        Self {
            departure: Waypoint::unresolved(""),
            arrival: Waypoint::unresolved(""),
            alternate: None,
            cruise_altitude_ft: 3500,
            waypoints: Vec::new(),
            departure_time,
            payload: Payload::default(),
            reserve_policy: ReservePolicy::VfrDay,
            aircraft,
        }
    }

    /// Departure, interior waypoints, arrival. The alternate is not included.
    pub fn route_points(&self) -> Vec<&Waypoint> {
        let mut points = Vec::with_capacity(self.waypoints.len() + 2);
        points.push(&self.departure);
        points.extend(self.waypoints.iter());
        points.push(&self.arrival);
        points
    }

    pub fn insert_waypoint(&mut self, index: usize, waypoint: Waypoint) -> Result<(), ModelError> {
        if index > self.waypoints.len() {
            return Err(ModelError::IndexOutOfRange {
                index,
                len: self.waypoints.len(),
            });
        }
        waypoint.validate()?;
        self.waypoints.insert(index, waypoint);
        Ok(())
    }

    pub fn push_waypoint(&mut self, waypoint: Waypoint) -> Result<(), ModelError> {
        self.insert_waypoint(self.waypoints.len(), waypoint)
    }

    pub fn move_waypoint(&mut self, from: usize, to: usize) -> Result<(), ModelError> {
        let len = self.waypoints.len();
        for index in [from, to] {
            if index >= len {
                return Err(ModelError::IndexOutOfRange { index, len });
            }
        }
        let wp = self.waypoints.remove(from);
        self.waypoints.insert(to, wp);
        Ok(())
    }

    pub fn remove_waypoint(&mut self, index: usize) -> Result<Waypoint, ModelError> {
        if index >= self.waypoints.len() {
            return Err(ModelError::IndexOutOfRange {
                index,
                len: self.waypoints.len(),
            });
        }
        Ok(self.waypoints.remove(index))
    }

    /// Snapshot of every field whose change invalidates the navigation log.
    pub fn recompute_key(&self) -> RecomputeKey {
        RecomputeKey {
            departure: PointKey::from(&self.departure),
            arrival: PointKey::from(&self.arrival),
            alternate: self.alternate.as_ref().map(PointKey::from),
            waypoints: self.waypoints.iter().map(PointKey::from).collect(),
            aircraft_id: self.aircraft.id.clone(),
            aircraft_bits: self.aircraft.performance_bits(),
            payload_bits: self.payload.bits(),
            cruise_altitude_ft: self.cruise_altitude_ft,
            departure_time: self.departure_time,
            reserve_policy: self.reserve_policy,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PointKey {
    pub id: String,
    lat_bits: u64,
    lon_bits: u64,
    altitude_ft: Option<u32>,
    variation_bits: Option<u64>,
}

impl From<&Waypoint> for PointKey {
    fn from(wp: &Waypoint) -> Self {
        Self {
            id: wp.id.clone(),
            lat_bits: wp.lat.to_bits(),
            lon_bits: wp.lon.to_bits(),
            altitude_ft: wp.altitude_ft,
            variation_bits: wp.magnetic_variation.map(f64::to_bits),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecomputeKey {
    departure: PointKey,
    arrival: PointKey,
    alternate: Option<PointKey>,
    waypoints: Vec<PointKey>,
    aircraft_id: String,
    aircraft_bits: [u64; 13],
    payload_bits: [u64; 4],
    cruise_altitude_ft: u32,
    departure_time: DateTime<Utc>,
    reserve_policy: ReservePolicy,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn plan() -> FlightPlan {
        let mut plan = FlightPlan::new(
            AircraftProfile::default_trainer(),
            Utc.with_ymd_and_hms(2026, 6, 1, 9, 0, 0).unwrap(),
        );
        plan.departure = Waypoint::airport("EHRD", "Rotterdam", 51.9525, 4.4347);
        plan.arrival = Waypoint::airport("EHAM", "Schiphol", 52.3086, 4.7639);
        plan
    }

    #[test]
    fn infer_kind_from_ident() {
        assert_eq!(WaypointKind::infer("EHAM").label(), "APT");
        assert_eq!(WaypointKind::infer("K1G4").label(), "APT");
        assert_eq!(WaypointKind::infer("SPY").label(), "NAV");
        assert_eq!(WaypointKind::infer("ARTIP").label(), "FIX");
        assert_eq!(WaypointKind::infer("Lake Turn").label(), "USR");
        assert_eq!(WaypointKind::infer("").label(), "USR");
    }

    #[test]
    fn unresolved_endpoint_is_not_resolved() {
        let wp = Waypoint::unresolved("EHRD");
        assert_eq!(wp.id, "EHRD");
        assert!(!wp.is_resolved());
        assert!(Waypoint::airport("EHAM", "", 52.3086, 4.7639).is_resolved());
    }

    #[test]
    fn route_points_keep_order() {
        let mut p = plan();
        p.push_waypoint(Waypoint::user("A", 52.0, 4.5)).unwrap();
        p.push_waypoint(Waypoint::user("B", 52.1, 4.6)).unwrap();
        let ids: Vec<&str> = p.route_points().iter().map(|w| w.id.as_str()).collect();
        assert_eq!(ids, vec!["EHRD", "A", "B", "EHAM"]);
    }

    #[test]
    fn waypoint_editing() {
        let mut p = plan();
        p.push_waypoint(Waypoint::user("A", 52.0, 4.5)).unwrap();
        p.push_waypoint(Waypoint::user("B", 52.1, 4.6)).unwrap();
        p.insert_waypoint(0, Waypoint::user("C", 52.2, 4.7)).unwrap();
        p.move_waypoint(0, 2).unwrap();
        let ids: Vec<&str> = p.waypoints.iter().map(|w| w.id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B", "C"]);

        let removed = p.remove_waypoint(1).unwrap();
        assert_eq!(removed.id, "B");

        assert_eq!(
            p.remove_waypoint(5),
            Err(ModelError::IndexOutOfRange { index: 5, len: 2 })
        );
        assert!(p.move_waypoint(0, 9).is_err());
        assert!(p.insert_waypoint(0, Waypoint::user("X", 95.0, 0.0)).is_err());
    }

    #[test]
    fn recompute_key_tracks_relevant_fields() {
        let p = plan();
        let base = p.recompute_key();

        let mut renamed = p.clone();
        renamed.arrival.name = "Amsterdam".to_string();
        renamed.aircraft.name = "Skyhawk".to_string();
        assert_eq!(renamed.recompute_key(), base);

        let mut baggage = p.clone();
        baggage.payload.baggage_kg = 20.0;
        assert_ne!(baggage.recompute_key(), base);

        let mut fuel = p.clone();
        fuel.payload.fuel = 150.0;
        assert_ne!(fuel.recompute_key(), base);

        let mut envelope = p.clone();
        envelope.aircraft.max_takeoff_mass_kg = 1100.0;
        assert_ne!(envelope.recompute_key(), base);

        let mut altitude = p.clone();
        altitude.cruise_altitude_ft = 4500;
        assert_ne!(altitude.recompute_key(), base);

        let mut moved = p.clone();
        moved.arrival.lat += 0.01;
        assert_ne!(moved.recompute_key(), base);

        let mut aircraft = p.clone();
        aircraft.aircraft.id = "other".to_string();
        assert_ne!(aircraft.recompute_key(), base);
    }

    #[test]
    fn aircraft_validation() {
        assert!(AircraftProfile::default_trainer().validate().is_ok());

        let mut bad_cg = AircraftProfile::default_trainer();
        bad_cg.cg_min = 1.3;
        assert!(bad_cg.validate().is_err());

        let mut bad_speed = AircraftProfile::default_trainer();
        bad_speed.cruise_speed_kt = 0.0;
        assert!(bad_speed.validate().is_err());

        let mut bad_arm = AircraftProfile::default_trainer();
        bad_arm.arms.baggage = -1.0;
        assert!(bad_arm.validate().is_err());
    }

    #[test]
    fn kind_serializes_with_discriminant() {
        let wp = Waypoint::new("SPY", 52.54, 4.85, WaypointKind::Navaid { frequency_mhz: Some(113.55) });
        let json = serde_json::to_value(&wp).unwrap();
        assert_eq!(json["kind"]["type"], "navaid");
        let back: Waypoint = serde_json::from_value(json).unwrap();
        assert_eq!(back, wp);
    }
}
