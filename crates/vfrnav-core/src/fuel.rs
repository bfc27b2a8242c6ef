// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FuelError {
    #[error("Trip duration must be non-negative and finite, got {0} min")]
    InvalidDuration(f64),
    #[error("Fuel burn rate must be non-negative and finite, got {0}/h")]
    InvalidBurnRate(f64),
    #[error("Fuel policy value '{0}' must be non-negative and finite")]
    InvalidPolicy(&'static str),
}

/// Final reserve rule applied on top of trip fuel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservePolicy {
    #[default]
    VfrDay,
    VfrNight,
    Ifr,
}

impl ReservePolicy {
    pub fn label(&self) -> &'static str {
        match self {
            ReservePolicy::VfrDay => "VFR day",
            ReservePolicy::VfrNight => "VFR night",
            ReservePolicy::Ifr => "IFR",
        }
    }
}

/// Regulatory constants. Kept as data so operators can load their own rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FuelPolicyConfig {
    pub vfr_day_reserve_min: f64,
    pub vfr_night_reserve_min: f64,
    pub ifr_reserve_min: f64,
    /// Fraction of trip fuel carried as contingency, rounded up to a whole unit.
    pub contingency_fraction: f64,
    /// Fixed start-up and taxi allowance, in `unit`.
    pub taxi_allowance: f64,
    /// Volume unit shared by burn rates and every fuel quantity, e.g. "L" or "USG".
    pub unit: String,
}

impl Default for FuelPolicyConfig {
    fn default() -> Self {
        Self {
            vfr_day_reserve_min: 30.0,
            vfr_night_reserve_min: 45.0,
            ifr_reserve_min: 45.0,
            contingency_fraction: 0.05,
            taxi_allowance: 4.0,
            unit: "L".to_string(),
        }
    }
}

impl FuelPolicyConfig {
    pub fn reserve_minutes(&self, policy: ReservePolicy) -> f64 {
        match policy {
            ReservePolicy::VfrDay => self.vfr_day_reserve_min,
            ReservePolicy::VfrNight => self.vfr_night_reserve_min,
            ReservePolicy::Ifr => self.ifr_reserve_min,
        }
    }

    pub fn validate(&self) -> Result<(), FuelError> {
        let checks: [(&'static str, f64); 5] = [
            ("vfr_day_reserve_min", self.vfr_day_reserve_min),
            ("vfr_night_reserve_min", self.vfr_night_reserve_min),
            ("ifr_reserve_min", self.ifr_reserve_min),
            ("contingency_fraction", self.contingency_fraction),
            ("taxi_allowance", self.taxi_allowance),
        ];
        for (name, value) in checks {
            if !value.is_finite() || value < 0.0 {
                return Err(FuelError::InvalidPolicy(name));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FuelRequest {
    pub trip_minutes: f64,
    /// Arrival to alternate, zero when no alternate is planned.
    pub alternate_minutes: f64,
    pub burn_per_hour: f64,
    pub policy: ReservePolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuelBreakdown {
    pub trip: f64,
    pub contingency: f64,
    pub alternate: f64,
    pub reserve: f64,
    pub taxi: f64,
    pub total: f64,
    pub policy: ReservePolicy,
    pub reserve_minutes: f64,
    pub unit: String,
}

pub fn fuel_for_minutes(minutes: f64, burn_per_hour: f64) -> f64 {
    minutes / 60.0 * burn_per_hour
}

/// Computes the whole-trip fuel requirement. Contingency covers trip fuel only.
pub fn compute_fuel(req: &FuelRequest, config: &FuelPolicyConfig) -> Result<FuelBreakdown, FuelError> {
    if !req.trip_minutes.is_finite() || req.trip_minutes < 0.0 {
        return Err(FuelError::InvalidDuration(req.trip_minutes));
    }
    if !req.alternate_minutes.is_finite() || req.alternate_minutes < 0.0 {
        return Err(FuelError::InvalidDuration(req.alternate_minutes));
    }
    if !req.burn_per_hour.is_finite() || req.burn_per_hour < 0.0 {
        return Err(FuelError::InvalidBurnRate(req.burn_per_hour));
    }
    config.validate()?;

    let trip = fuel_for_minutes(req.trip_minutes, req.burn_per_hour);
    let contingency = (trip * config.contingency_fraction).ceil();
    let alternate = fuel_for_minutes(req.alternate_minutes, req.burn_per_hour);
    let reserve_minutes = config.reserve_minutes(req.policy);
    let reserve = fuel_for_minutes(reserve_minutes, req.burn_per_hour);
    let taxi = config.taxi_allowance;

    Ok(FuelBreakdown {
        trip,
        contingency,
        alternate,
        reserve,
        taxi,
        total: trip + contingency + reserve + taxi + alternate,
        policy: req.policy,
        reserve_minutes,
        unit: config.unit.clone(),
    })
}

/// Minutes of flight the given quantity supports at `burn_per_hour`.
pub fn endurance_minutes(fuel: f64, burn_per_hour: f64) -> Option<f64> {
    if burn_per_hour > 0.0 && fuel.is_finite() {
        Some(fuel / burn_per_hour * 60.0)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(minutes: f64, burn: f64, policy: ReservePolicy) -> FuelRequest {
        FuelRequest {
            trip_minutes: minutes,
            alternate_minutes: 0.0,
            burn_per_hour: burn,
            policy,
        }
    }

    #[test]
    fn night_reserve_exceeds_day_reserve() {
        let cfg = FuelPolicyConfig::default();
        let day = compute_fuel(&request(60.0, 35.0, ReservePolicy::VfrDay), &cfg).unwrap();
        let night = compute_fuel(&request(60.0, 35.0, ReservePolicy::VfrNight), &cfg).unwrap();

        assert_eq!(day.reserve, 17.5);
        assert_eq!(night.reserve, 26.25);
        assert_eq!(night.reserve - day.reserve, 8.75);
        assert!(night.total > day.total);
    }

    #[test]
    fn total_is_sum_of_parts() {
        let cfg = FuelPolicyConfig::default();
        for minutes in [0.0, 12.5, 60.0, 137.0] {
            for burn in [0.0, 21.0, 35.0, 80.5] {
                for policy in [ReservePolicy::VfrDay, ReservePolicy::VfrNight, ReservePolicy::Ifr] {
                    let f = compute_fuel(&request(minutes, burn, policy), &cfg).unwrap();
                    assert_eq!(f.total, f.trip + f.contingency + f.reserve + f.taxi);
                }
            }
        }
    }

    #[test]
    fn contingency_rounds_up() {
        let cfg = FuelPolicyConfig::default();
        // 60 min at 35/h -> 35 trip, 5% = 1.75 -> 2
        let f = compute_fuel(&request(60.0, 35.0, ReservePolicy::VfrDay), &cfg).unwrap();
        assert_eq!(f.trip, 35.0);
        assert_eq!(f.contingency, 2.0);
        assert_eq!(f.taxi, 4.0);
        assert_eq!(f.total, 35.0 + 2.0 + 17.5 + 4.0);
    }

    #[test]
    fn alternate_fuel_is_added() {
        let cfg = FuelPolicyConfig::default();
        let mut req = request(60.0, 30.0, ReservePolicy::VfrDay);
        req.alternate_minutes = 20.0;
        let f = compute_fuel(&req, &cfg).unwrap();
        assert_eq!(f.alternate, 10.0);
        assert_eq!(f.total, f.trip + f.contingency + f.reserve + f.taxi + f.alternate);
    }

    #[test]
    fn policy_constants_are_configurable() {
        let cfg = FuelPolicyConfig {
            vfr_day_reserve_min: 45.0,
            taxi_allowance: 1.5,
            unit: "USG".to_string(),
            ..FuelPolicyConfig::default()
        };
        let f = compute_fuel(&request(60.0, 10.0, ReservePolicy::VfrDay), &cfg).unwrap();
        assert_eq!(f.reserve, 7.5);
        assert_eq!(f.taxi, 1.5);
        assert_eq!(f.unit, "USG");
    }

    #[test]
    fn negative_inputs_are_rejected() {
        let cfg = FuelPolicyConfig::default();
        assert_eq!(
            compute_fuel(&request(-1.0, 35.0, ReservePolicy::VfrDay), &cfg),
            Err(FuelError::InvalidDuration(-1.0))
        );
        assert_eq!(
            compute_fuel(&request(10.0, -2.0, ReservePolicy::VfrDay), &cfg),
            Err(FuelError::InvalidBurnRate(-2.0))
        );
        let bad = FuelPolicyConfig {
            taxi_allowance: -4.0,
            ..FuelPolicyConfig::default()
        };
        assert_eq!(
            compute_fuel(&request(10.0, 20.0, ReservePolicy::VfrDay), &bad),
            Err(FuelError::InvalidPolicy("taxi_allowance"))
        );
    }

    #[test]
    fn endurance_from_usable_fuel() {
        assert_eq!(endurance_minutes(140.0, 35.0), Some(240.0));
        assert_eq!(endurance_minutes(140.0, 0.0), None);
    }
}
