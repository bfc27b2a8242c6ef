// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

use crate::model::{AircraftProfile, FlightPlan, ModelError};
use chrono::{DurationRound, TimeDelta, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Invalid(#[from] ModelError),
}

/// Plan used when nothing usable is stored: default aircraft, unresolved
/// endpoints, departing at the next full hour.
pub fn default_plan() -> FlightPlan {
    let now = Utc::now();
    let departure = now
        .duration_trunc(TimeDelta::hours(1))
        .map(|t| t + TimeDelta::hours(1))
        .unwrap_or(now);
    FlightPlan::new(AircraftProfile::default_trainer(), departure)
}

/// Autosave slot for the plan being edited.
pub trait PlanStore: Send + Sync {
    /// Never fails on content: an absent or unreadable plan yields
    /// [`default_plan`]. Only IO failures are errors.
    fn load(&self) -> Result<FlightPlan, StoreError>;

    fn save(&self, plan: &FlightPlan) -> Result<(), StoreError>;
}

/// Parses a stored plan. Plans written by older versions that lack
/// aircraft performance fields, or that are otherwise partial, are dropped.
pub fn parse_plan(content: &str) -> Option<FlightPlan> {
    match serde_json::from_str::<FlightPlan>(content) {
        Ok(plan) if plan.aircraft.validate().is_ok() => Some(plan),
        Ok(plan) => {
            log::warn!(
                "Stored plan has an invalid aircraft profile; using default plan — aircraft={}",
                plan.aircraft.id
            );
            None
        }
        Err(e) => {
            log::warn!("Stored plan is incomplete; using default plan — error={}", e);
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct JsonPlanStore {
    path: PathBuf,
}

impl JsonPlanStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// `<config root>/flight_plan.json`
    pub fn in_config_root() -> Self {
        Self::new(crate::get_config_root().join("flight_plan.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PlanStore for JsonPlanStore {
    fn load(&self) -> Result<FlightPlan, StoreError> {
        if !self.path.exists() {
            return Ok(default_plan());
        }
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                log::warn!(
                    "Stored plan is not UTF-8 text; using default plan — path={} error={}",
                    self.path.display(),
                    e
                );
                return Ok(default_plan());
            }
            Err(e) => return Err(e.into()),
        };
        Ok(parse_plan(&content).unwrap_or_else(default_plan))
    }

    fn save(&self, plan: &FlightPlan) -> Result<(), StoreError> {
        write_json(&self.path, plan)
    }
}

fn write_json<T: serde::Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    let content = serde_json::to_string_pretty(value)?;
    fs::write(path, content)?;
    Ok(())
}

#[derive(Debug, Default)]
pub struct MemoryPlanStore {
    plan: Mutex<Option<FlightPlan>>,
}

impl MemoryPlanStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn saved(&self) -> Option<FlightPlan> {
        self.plan.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl PlanStore for MemoryPlanStore {
    fn load(&self) -> Result<FlightPlan, StoreError> {
        Ok(self.saved().unwrap_or_else(default_plan))
    }

    fn save(&self, plan: &FlightPlan) -> Result<(), StoreError> {
        *self.plan.lock().unwrap_or_else(PoisonError::into_inner) = Some(plan.clone());
        Ok(())
    }
}

/// The pilot's fleet of aircraft profiles.
pub trait AircraftRegistry: Send + Sync {
    fn list(&self) -> Result<Vec<AircraftProfile>, StoreError>;

    /// Inserts or replaces by id.
    fn save(&self, profile: &AircraftProfile) -> Result<(), StoreError>;

    /// Returns `false` when no profile had that id.
    fn delete(&self, id: &str) -> Result<bool, StoreError>;

    fn get(&self, id: &str) -> Result<Option<AircraftProfile>, StoreError> {
        Ok(self.list()?.into_iter().find(|p| p.id == id))
    }
}

/// Fleet kept as a JSON array of profiles.
#[derive(Debug, Clone)]
pub struct JsonFleetStore {
    path: PathBuf,
}

impl JsonFleetStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// `<config root>/fleet.json`
    pub fn in_config_root() -> Self {
        Self::new(crate::get_config_root().join("fleet.json"))
    }

    fn write(&self, fleet: &[AircraftProfile]) -> Result<(), StoreError> {
        write_json(&self.path, fleet)
    }
}

impl AircraftRegistry for JsonFleetStore {
    fn list(&self) -> Result<Vec<AircraftProfile>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn save(&self, profile: &AircraftProfile) -> Result<(), StoreError> {
        profile.validate()?;
        let mut fleet = self.list()?;
        match fleet.iter_mut().find(|p| p.id == profile.id) {
            Some(existing) => *existing = profile.clone(),
            None => fleet.push(profile.clone()),
        }
        log::info!("Saving aircraft profile — id={} fleet_size={}", profile.id, fleet.len());
        self.write(&fleet)
    }

    fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let mut fleet = self.list()?;
        let before = fleet.len();
        fleet.retain(|p| p.id != id);
        if fleet.len() == before {
            return Ok(false);
        }
        self.write(&fleet)?;
        Ok(true)
    }
}
