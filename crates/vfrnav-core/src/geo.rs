// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

//! Spherical-earth geodesy used for leg courses.
//!
//! Distances are great-circle (haversine) in nautical miles, bearings are the
//! initial true bearing in degrees `[0, 360)`. The bearing between two
//! identical points is defined as `0.0`.

use serde::{Deserialize, Serialize};

/// Mean earth radius in nautical miles.
pub const EARTH_RADIUS_NM: f64 = 3440.065;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// True when both components are finite and inside WGS84 degree ranges.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }

    /// The `(0, 0)` placeholder used by plans whose lookup has not resolved yet.
    pub fn is_null_island(&self) -> bool {
        self.lat == 0.0 && self.lon == 0.0
    }

    pub fn distance_nm(&self, other: &GeoPoint) -> f64 {
        distance_nm(self, other)
    }

    pub fn bearing_to(&self, other: &GeoPoint) -> f64 {
        initial_bearing(self, other)
    }
}

/// Great-circle distance between `a` and `b` in nautical miles.
pub fn distance_nm(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lon = (b.lon - a.lon).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    // clamp guards sqrt of a value nudged past 1.0 by rounding near antipodes
    let c = 2.0 * h.sqrt().min(1.0).asin();
    EARTH_RADIUS_NM * c
}

/// Initial true bearing from `a` towards `b` along the great circle, `[0, 360)`.
pub fn initial_bearing(a: &GeoPoint, b: &GeoPoint) -> f64 {
    if a == b {
        return 0.0;
    }
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let d_lon = (b.lon - a.lon).to_radians();

    let y = d_lon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * d_lon.cos();
    normalize_degrees(y.atan2(x).to_degrees())
}

/// Wraps any angle into `[0, 360)`.
pub fn normalize_degrees(deg: f64) -> f64 {
    let wrapped = deg.rem_euclid(360.0);
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Wraps any angle into `(-180, 180]`.
pub fn normalize_signed(deg: f64) -> f64 {
    let wrapped = normalize_degrees(deg);
    if wrapped > 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn rotterdam() -> GeoPoint {
        GeoPoint::new(51.9525, 4.4347)
    }

    fn schiphol() -> GeoPoint {
        GeoPoint::new(52.3086, 4.7639)
    }

    #[test]
    fn distance_to_self_is_zero() {
        let p = rotterdam();
        assert_eq!(distance_nm(&p, &p), 0.0);
    }

    #[test]
    fn distance_is_symmetric() {
        let a = rotterdam();
        let b = schiphol();
        assert_abs_diff_eq!(distance_nm(&a, &b), distance_nm(&b, &a), epsilon = 1e-9);
    }

    #[test]
    fn one_degree_of_latitude_is_sixty_nm() {
        let a = GeoPoint::new(0.0, 0.0);
        let b = GeoPoint::new(1.0, 0.0);
        assert_abs_diff_eq!(distance_nm(&a, &b), 60.04, epsilon = 0.05);
    }

    #[test]
    fn triangle_inequality_holds() {
        let a = rotterdam();
        let b = schiphol();
        let c = GeoPoint::new(51.4469, 5.3746); // Eindhoven
        let ab = distance_nm(&a, &b);
        let bc = distance_nm(&b, &c);
        let ac = distance_nm(&a, &c);
        assert!(ac <= ab + bc + 1e-9);
        assert!(ab <= ac + bc + 1e-9);
        assert!(bc <= ab + ac + 1e-9);
    }

    #[test]
    fn cardinal_bearings() {
        let origin = GeoPoint::new(0.0, 0.0);
        assert_abs_diff_eq!(initial_bearing(&origin, &GeoPoint::new(1.0, 0.0)), 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(initial_bearing(&origin, &GeoPoint::new(0.0, 1.0)), 90.0, epsilon = 1e-9);
        assert_abs_diff_eq!(initial_bearing(&origin, &GeoPoint::new(-1.0, 0.0)), 180.0, epsilon = 1e-9);
        assert_abs_diff_eq!(initial_bearing(&origin, &GeoPoint::new(0.0, -1.0)), 270.0, epsilon = 1e-9);
    }

    #[test]
    fn bearing_of_identical_points_is_zero() {
        let p = schiphol();
        assert_eq!(initial_bearing(&p, &p), 0.0);
    }

    #[test]
    fn reverse_bearing_differs_by_180() {
        let a = rotterdam();
        let b = schiphol();
        let forward = initial_bearing(&a, &b);
        let back = initial_bearing(&b, &a);
        let diff = normalize_degrees(back - forward);
        // short leg: convergence of meridians stays well under half a degree
        assert_abs_diff_eq!(diff, 180.0, epsilon = 0.5);
    }

    #[test]
    fn normalization_wraps() {
        assert_eq!(normalize_degrees(360.0), 0.0);
        assert_eq!(normalize_degrees(-90.0), 270.0);
        assert_eq!(normalize_degrees(725.0), 5.0);
        assert_eq!(normalize_signed(190.0), -170.0);
        assert_eq!(normalize_signed(-180.0), 180.0);
        assert_eq!(normalize_signed(180.0), 180.0);
    }

    #[test]
    fn validity_checks_ranges() {
        assert!(rotterdam().is_valid());
        assert!(!GeoPoint::new(91.0, 0.0).is_valid());
        assert!(!GeoPoint::new(0.0, 180.5).is_valid());
        assert!(!GeoPoint::new(f64::NAN, 0.0).is_valid());
        assert!(GeoPoint::new(0.0, 0.0).is_null_island());
    }
}
