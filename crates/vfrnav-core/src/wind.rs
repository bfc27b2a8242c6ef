// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

//! Wind-triangle solver.
//!
//! Conventions:
//! - wind direction is where the wind blows FROM, degrees true;
//! - `headwind` is positive when the wind opposes the course (negative = tailwind);
//! - `crosswind` is positive when the wind comes from the right of the course;
//! - a positive wind-correction angle turns the nose right;
//! - magnetic variation is east-positive, so magnetic = true - variation.

use crate::geo::{normalize_degrees, normalize_signed};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum WindError {
    #[error("True airspeed must be positive and finite, got {0}")]
    InvalidAirspeed(f64),
    #[error("Wind speed must be non-negative and finite, got {0}")]
    InvalidWindSpeed(f64),
    #[error("Angle must be finite, got {0}")]
    InvalidAngle(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindInput {
    pub direction_deg: f64,
    pub speed_kt: f64,
    #[serde(default)]
    pub gust_kt: Option<f64>,
}

impl WindInput {
    pub fn new(direction_deg: f64, speed_kt: f64) -> Self {
        Self {
            direction_deg,
            speed_kt,
            gust_kt: None,
        }
    }

    pub fn calm() -> Self {
        Self::new(0.0, 0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindComponents {
    pub headwind: f64,
    pub crosswind: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeadingSolution {
    pub wca: f64,
    pub true_heading: f64,
    pub groundspeed: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WindSolution {
    Solved {
        components: WindComponents,
        heading: HeadingSolution,
    },
    /// The aircraft cannot hold the course: the crosswind is at least the
    /// airspeed, or the headwind leaves no forward groundspeed.
    Unsolvable { components: WindComponents },
}

impl WindSolution {
    pub fn components(&self) -> WindComponents {
        match self {
            WindSolution::Solved { components, .. } => *components,
            WindSolution::Unsolvable { components } => *components,
        }
    }

    pub fn heading(&self) -> Option<HeadingSolution> {
        match self {
            WindSolution::Solved { heading, .. } => Some(*heading),
            WindSolution::Unsolvable { .. } => None,
        }
    }
}

/// Splits the wind into components relative to `true_course`.
pub fn wind_components(true_course: f64, wind: &WindInput) -> WindComponents {
    let angle = normalize_signed(wind.direction_deg - true_course).to_radians();
    WindComponents {
        headwind: wind.speed_kt * angle.cos(),
        crosswind: wind.speed_kt * angle.sin(),
    }
}

/// Below this groundspeed a leg takes too long to be worth flying and is
/// treated like a headwind stronger than the airspeed.
pub const MIN_GROUNDSPEED_KT: f64 = 1.0;

pub fn solve_wind_triangle(
    true_course: f64,
    true_airspeed: f64,
    wind: &WindInput,
) -> Result<WindSolution, WindError> {
    if !true_airspeed.is_finite() || true_airspeed <= 0.0 {
        return Err(WindError::InvalidAirspeed(true_airspeed));
    }
    if !wind.speed_kt.is_finite() || wind.speed_kt < 0.0 {
        return Err(WindError::InvalidWindSpeed(wind.speed_kt));
    }
    if !true_course.is_finite() {
        return Err(WindError::InvalidAngle(true_course));
    }
    if !wind.direction_deg.is_finite() {
        return Err(WindError::InvalidAngle(wind.direction_deg));
    }

    let components = wind_components(true_course, wind);

    if components.crosswind.abs() >= true_airspeed {
        return Ok(WindSolution::Unsolvable { components });
    }

    let wca_rad = (components.crosswind / true_airspeed).asin();
    let groundspeed = true_airspeed * wca_rad.cos() - components.headwind;
    if groundspeed < MIN_GROUNDSPEED_KT.min(true_airspeed) {
        return Ok(WindSolution::Unsolvable { components });
    }

    let wca = wca_rad.to_degrees();
    Ok(WindSolution::Solved {
        components,
        heading: HeadingSolution {
            wca,
            true_heading: normalize_degrees(true_course + wca),
            groundspeed,
        },
    })
}

/// Converts a true direction to magnetic using an east-positive variation.
pub fn magnetic_from_true(true_deg: f64, variation_east: f64) -> f64 {
    normalize_degrees(true_deg - variation_east)
}
