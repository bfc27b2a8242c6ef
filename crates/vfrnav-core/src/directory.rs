// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

//! Waypoint resolution by identifier, backed by X-Plane `apt.dat` airports.

use crate::model::{Frequency, Waypoint, WaypointKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use thiserror::Error;

/// Prefix length below which `search` returns nothing.
pub const MIN_SEARCH_LEN: usize = 2;

#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error on line {line}: {reason}")]
    Parse { line: usize, reason: String },
}

/// Navigation-point lookup used while editing a plan.
pub trait WaypointDirectory: Send + Sync {
    fn lookup(&self, identifier: &str) -> Option<Waypoint>;

    /// Matches by identifier prefix, then by name substring. Queries shorter
    /// than [`MIN_SEARCH_LEN`] return nothing.
    fn search(&self, query: &str) -> Vec<Waypoint>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AirportType {
    Land,
    Seaplane,
    Heliport,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Airport {
    pub id: String,
    pub name: String,
    pub airport_type: AirportType,
    pub elevation_ft: Option<f64>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub frequencies: Vec<Frequency>,
}

impl Airport {
    /// `None` for airports without any positioned runway, helipad or datum.
    pub fn to_waypoint(&self) -> Option<Waypoint> {
        let (lat, lon) = (self.lat?, self.lon?);
        let mut wp = Waypoint::new(
            &self.id,
            lat,
            lon,
            WaypointKind::Airport {
                frequencies: self.frequencies.clone(),
            },
        );
        wp.name = self.name.clone();
        wp.elevation_ft = self.elevation_ft;
        Some(wp)
    }
}

pub struct AptDatParser;

impl AptDatParser {
    /// Parses an apt.dat file and returns a list of airports.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Vec<Airport>, DirectoryError> {
        let file = File::open(path)?;
        Self::parse(BufReader::new(file))
    }

    pub fn parse<R: BufRead>(mut reader: R) -> Result<Vec<Airport>, DirectoryError> {
        let mut airports = Vec::new();
        let mut line_buf = String::with_capacity(256);
        let mut current: Option<AirportBuilder> = None;
        let mut line_no = 0;

        loop {
            line_buf.clear();
            if reader.read_line(&mut line_buf)? == 0 {
                break;
            }
            line_no += 1;

            let line = line_buf.trim();
            let Some(code) = line.split_whitespace().next() else {
                continue;
            };
            match code {
                "1" | "16" | "17" => {
                    if let Some(builder) = current.take() {
                        airports.push(builder.build());
                    }
                    let apt_type = match code {
                        "16" => AirportType::Seaplane,
                        "17" => AirportType::Heliport,
                        _ => AirportType::Land,
                    };
                    current = Some(parse_airport_header(line, apt_type).ok_or_else(|| {
                        DirectoryError::Parse {
                            line: line_no,
                            reason: "airport header needs elevation and identifier".to_string(),
                        }
                    })?);
                }
                "100" | "101" => {
                    if let Some(ref mut builder) = current {
                        parse_runway(line, code == "101", builder);
                    }
                }
                "102" => {
                    if let Some(ref mut builder) = current {
                        parse_helipad(line, builder);
                    }
                }
                "1302" => {
                    if let Some(ref mut builder) = current {
                        parse_metadata(line, builder);
                    }
                }
                "50" | "51" | "52" | "53" | "54" | "55" | "56" | "1050" | "1051" | "1052"
                | "1053" | "1054" | "1055" | "1056" => {
                    if let Some(ref mut builder) = current {
                        parse_frequency(line, builder);
                    }
                }
                "99" => break,
                _ => {}
            }
        }

        if let Some(builder) = current.take() {
            airports.push(builder.build());
        }
        log::debug!("Parsed apt.dat — airports={}", airports.len());
        Ok(airports)
    }
}

struct AirportBuilder {
    id: String,
    name: String,
    airport_type: AirportType,
    elevation_ft: Option<f64>,
    points: Vec<(f64, f64)>,
    datum: (Option<f64>, Option<f64>),
    frequencies: Vec<Frequency>,
}

impl AirportBuilder {
    fn build(self) -> Airport {
        let (lat, lon) = match self.datum {
            (Some(lat), Some(lon)) => (Some(lat), Some(lon)),
            _ if !self.points.is_empty() => {
                let n = self.points.len() as f64;
                let (sum_lat, sum_lon) = self
                    .points
                    .iter()
                    .fold((0.0, 0.0), |(a, b), (lat, lon)| (a + lat, b + lon));
                (Some(sum_lat / n), Some(sum_lon / n))
            }
            _ => (None, None),
        };

        Airport {
            id: self.id,
            name: self.name,
            airport_type: self.airport_type,
            elevation_ft: self.elevation_ft,
            lat,
            lon,
            frequencies: self.frequencies,
        }
    }
}

// 1 <elev_ft> <deprecated> <deprecated> <icao> <name...>
fn parse_airport_header(line: &str, airport_type: AirportType) -> Option<AirportBuilder> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 5 {
        return None;
    }
    Some(AirportBuilder {
        id: parts[4].to_uppercase(),
        name: parts[5..].join(" "),
        airport_type,
        elevation_ft: parts[1].parse().ok(),
        points: Vec::with_capacity(4),
        datum: (None, None),
        frequencies: Vec::new(),
    })
}

fn parse_lat_lon(lat: Option<&str>, lon: Option<&str>) -> Option<(f64, f64)> {
    let lat = lat?.parse::<f64>().ok()?;
    let lon = lon?.parse::<f64>().ok()?;
    Some((lat, lon))
}

// Land runway ends sit at fields 9/10 and 18/19; water runway ends at 4/5 and 7/8.
fn parse_runway(line: &str, water: bool, builder: &mut AirportBuilder) {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let ends: [(usize, usize); 2] = if water { [(4, 5), (7, 8)] } else { [(9, 10), (18, 19)] };
    for (lat_idx, lon_idx) in ends {
        if let Some(p) = parse_lat_lon(parts.get(lat_idx).copied(), parts.get(lon_idx).copied()) {
            builder.points.push(p);
        }
    }
}

fn parse_helipad(line: &str, builder: &mut AirportBuilder) {
    let mut parts = line.split_whitespace().skip(2);
    if let Some(p) = parse_lat_lon(parts.next(), parts.next()) {
        builder.points.push(p);
    }
}

fn parse_metadata(line: &str, builder: &mut AirportBuilder) {
    let mut parts = line.split_whitespace().skip(1);
    let key = parts.next();
    let value = parts.next().and_then(|v| v.parse::<f64>().ok());
    match key {
        Some("datum_lat") => builder.datum.0 = value,
        Some("datum_lon") => builder.datum.1 = value,
        _ => {}
    }
}

// 5x rows carry the frequency in 10 kHz units, 105x rows in kHz.
fn parse_frequency(line: &str, builder: &mut AirportBuilder) {
    let mut parts = line.split_whitespace();
    let Some(code) = parts.next() else {
        return;
    };
    let Some(raw) = parts.next().and_then(|v| v.parse::<f64>().ok()) else {
        return;
    };
    let mhz = if code.len() == 4 { raw / 1000.0 } else { raw / 100.0 };
    let label = parts.collect::<Vec<_>>().join(" ");
    let label = if label.is_empty() {
        match code.trim_start_matches("10") {
            "50" => "ATIS",
            "51" => "UNICOM",
            "52" => "DEL",
            "53" => "GND",
            "54" => "TWR",
            "55" => "APP",
            _ => "DEP",
        }
        .to_string()
    } else {
        label
    };
    builder.frequencies.push(Frequency { label, mhz });
}

/// In-memory airport index keyed by upper-case identifier.
#[derive(Debug, Clone, Default)]
pub struct AirportDirectory {
    airports: BTreeMap<String, Waypoint>,
}

impl AirportDirectory {
    pub fn new(airports: impl IntoIterator<Item = Airport>) -> Self {
        let mut index = BTreeMap::new();
        let mut unpositioned = 0;
        for airport in airports {
            match airport.to_waypoint() {
                Some(wp) => {
                    index.insert(wp.id.clone(), wp);
                }
                None => unpositioned += 1,
            }
        }
        if unpositioned > 0 {
            log::debug!("Airports without position left out of index — count={}", unpositioned);
        }
        Self { airports: index }
    }

    pub fn from_apt_dat<P: AsRef<Path>>(path: P) -> Result<Self, DirectoryError> {
        Ok(Self::new(AptDatParser::parse_file(path)?))
    }

    pub fn len(&self) -> usize {
        self.airports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.airports.is_empty()
    }
}

impl WaypointDirectory for AirportDirectory {
    fn lookup(&self, identifier: &str) -> Option<Waypoint> {
        self.airports.get(&identifier.trim().to_uppercase()).cloned()
    }

    fn search(&self, query: &str) -> Vec<Waypoint> {
        let query = query.trim();
        if query.chars().count() < MIN_SEARCH_LEN {
            return Vec::new();
        }
        let upper = query.to_uppercase();
        let lower = query.to_lowercase();

        let mut results: Vec<Waypoint> = self
            .airports
            .range(upper.clone()..)
            .take_while(|(id, _)| id.starts_with(&upper))
            .map(|(_, wp)| wp.clone())
            .collect();
        results.extend(
            self.airports
                .values()
                .filter(|wp| !wp.id.starts_with(&upper) && wp.name.to_lowercase().contains(&lower))
                .cloned(),
        );
        results
    }
}
