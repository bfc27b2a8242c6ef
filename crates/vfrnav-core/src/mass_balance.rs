// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

//! Weight and balance from the aircraft arms and the plan payload.
//! Masses in kg, arms in metres aft of datum, moments in kg·m.

use crate::model::{AircraftProfile, Payload};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadItem {
    pub name: String,
    pub mass_kg: f64,
    pub arm: f64,
    pub moment: f64,
}

impl LoadItem {
    fn new(name: &str, mass_kg: f64, arm: f64) -> Self {
        Self {
            name: name.to_string(),
            mass_kg,
            arm,
            moment: mass_kg * arm,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoadCondition {
    pub mass_kg: f64,
    pub moment: f64,
    pub cg: f64,
}

impl LoadCondition {
    fn from_items<'a>(items: impl Iterator<Item = &'a LoadItem>) -> Self {
        let (mass_kg, moment) = items.fold((0.0, 0.0), |(m, mo), i| (m + i.mass_kg, mo + i.moment));
        let cg = if mass_kg > 0.0 { moment / mass_kg } else { 0.0 };
        Self { mass_kg, moment, cg }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MassBalance {
    pub items: Vec<LoadItem>,
    pub takeoff: LoadCondition,
    pub landing: LoadCondition,
    pub max_takeoff_mass_kg: f64,
    pub cg_min: f64,
    pub cg_max: f64,
}

impl MassBalance {
    /// `fuel_on_board` is loaded at take-off and `trip_fuel` is burned before
    /// landing, both in fuel units. `payload.fuel` is not read.
    pub fn compute(
        aircraft: &AircraftProfile,
        payload: &Payload,
        fuel_on_board: f64,
        trip_fuel: f64,
    ) -> Self {
        let density = aircraft.fuel_density;
        let items = vec![
            LoadItem::new("Empty aircraft", aircraft.empty_weight_kg, aircraft.empty_arm),
            LoadItem::new("Pilot", payload.pilot_kg, aircraft.arms.pilot),
            LoadItem::new("Passengers", payload.passenger_kg, aircraft.arms.passenger),
            LoadItem::new("Baggage", payload.baggage_kg, aircraft.arms.baggage),
            LoadItem::new("Fuel", fuel_on_board * density, aircraft.arms.fuel),
        ];

        let takeoff = LoadCondition::from_items(items.iter());

        let landing_fuel = (fuel_on_board - trip_fuel).max(0.0);
        let landing_fuel_item = LoadItem::new("Fuel", landing_fuel * density, aircraft.arms.fuel);
        let landing = LoadCondition::from_items(
            items
                .iter()
                .filter(|i| i.name != "Fuel")
                .chain(std::iter::once(&landing_fuel_item)),
        );

        Self {
            items,
            takeoff,
            landing,
            max_takeoff_mass_kg: aircraft.max_takeoff_mass_kg,
            cg_min: aircraft.cg_min,
            cg_max: aircraft.cg_max,
        }
    }

    pub fn within_mass_limit(&self) -> bool {
        self.takeoff.mass_kg <= self.max_takeoff_mass_kg
    }

    pub fn cg_within_limits(&self) -> bool {
        [self.takeoff.cg, self.landing.cg]
            .iter()
            .all(|cg| (self.cg_min..=self.cg_max).contains(cg))
    }

    pub fn is_within_limits(&self) -> bool {
        self.within_mass_limit() && self.cg_within_limits()
    }
}
