// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

//! VFR navigation log engine: great-circle legs, wind triangle, fuel policy,
//! mass and balance, and a debounced recompute service around them.

pub mod calculator;
pub mod config;
pub mod directory;
pub mod fuel;
pub mod geo;
pub mod leg;
pub mod mass_balance;
pub mod model;
pub mod route;
pub mod service;
pub mod store;
pub mod weather;
pub mod wind;

use std::path::PathBuf;

pub use calculator::{CalcError, LocalCalculator, NavLogCalculator, RemoteCalculator};
pub use config::AppConfig;
pub use fuel::{FuelBreakdown, FuelPolicyConfig, ReservePolicy};
pub use geo::GeoPoint;
pub use leg::{LegStatus, RouteLeg};
pub use model::{AircraftProfile, FlightPlan, Payload, Waypoint, WaypointKind};
pub use route::{build_navigation_log, LegWarning, NavigationLog, RouteError, RouteInput};
pub use service::{NavLogService, NavLogState, NavLogStatus, Sleeper, TokioSleeper};
pub use weather::{WeatherObservation, WeatherSource};

/// Per-user directory holding config, plan autosave, fleet and caches.
pub fn get_config_root() -> PathBuf {
    directories::ProjectDirs::from("org", "vfrnav", "vfrnav")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".vfrnav"))
}
