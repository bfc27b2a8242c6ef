// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

use crate::wind::WindInput;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

pub const METAR_URL: &str = "https://aviationweather.gov/data/cache/metars.cache.csv.gz";
pub const CACHE_TTL_SECS: u64 = 900; // 15 minutes

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FlightCategory {
    Vfr,
    Mvfr,
    Ifr,
    Lifr,
}

impl FlightCategory {
    pub fn parse(s: &str) -> Option<FlightCategory> {
        match s.trim().to_uppercase().as_str() {
            "VFR" => Some(FlightCategory::Vfr),
            "MVFR" => Some(FlightCategory::Mvfr),
            "IFR" => Some(FlightCategory::Ifr),
            "LIFR" => Some(FlightCategory::Lifr),
            _ => None,
        }
    }

    pub fn is_vfr(&self) -> bool {
        matches!(self, FlightCategory::Vfr | FlightCategory::Mvfr)
    }
}

/// A station report already decoded into structured fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherObservation {
    pub station_id: String,
    /// Degrees true the wind blows from; `None` for variable wind.
    pub wind_direction_deg: Option<f64>,
    pub wind_speed_kt: f64,
    #[serde(default)]
    pub wind_gust_kt: Option<f64>,
    #[serde(default)]
    pub flight_category: Option<FlightCategory>,
    #[serde(default)]
    pub raw_text: String,
    #[serde(default)]
    pub observed_at: Option<DateTime<Utc>>,
}

impl WeatherObservation {
    pub fn new(station_id: &str, wind_direction_deg: f64, wind_speed_kt: f64) -> Self {
        Self {
            station_id: station_id.to_uppercase(),
            wind_direction_deg: Some(wind_direction_deg),
            wind_speed_kt,
            wind_gust_kt: None,
            flight_category: None,
            raw_text: String::new(),
            observed_at: None,
        }
    }

    /// Wind usable by the solver. Variable wind with a non-zero speed has no
    /// direction to correct for and yields `None`.
    pub fn wind(&self) -> Option<WindInput> {
        match self.wind_direction_deg {
            Some(direction_deg) => Some(WindInput {
                direction_deg,
                speed_kt: self.wind_speed_kt,
                gust_kt: self.wind_gust_kt,
            }),
            None if self.wind_speed_kt == 0.0 => Some(WindInput::calm()),
            None => None,
        }
    }
}

/// Anything that can answer "what is the weather at this station".
pub trait WeatherSource: Send + Sync {
    fn observation(&self, station_id: &str) -> Option<WeatherObservation>;

    fn observations(&self, station_ids: &[&str]) -> HashMap<String, WeatherObservation> {
        station_ids
            .iter()
            .filter_map(|id| self.observation(id).map(|o| (id.trim().to_uppercase(), o)))
            .collect()
    }
}

/// Fixed set of observations, keyed by upper-case station id.
#[derive(Debug, Clone, Default)]
pub struct StaticWeather {
    stations: HashMap<String, WeatherObservation>,
}

impl StaticWeather {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, obs: WeatherObservation) {
        self.stations.insert(obs.station_id.trim().to_uppercase(), obs);
    }

    pub fn with(mut self, obs: WeatherObservation) -> Self {
        self.insert(obs);
        self
    }
}

impl WeatherSource for StaticWeather {
    fn observation(&self, station_id: &str) -> Option<WeatherObservation> {
        self.stations.get(&station_id.trim().to_uppercase()).cloned()
    }
}

/// Local copy of the NOAA aviationweather.gov METAR cache.
pub struct MetarCache {
    cache_path: PathBuf,
    url: String,
    ttl: Duration,
}

impl Default for MetarCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MetarCache {
    pub fn new() -> Self {
        let cache_path = crate::get_config_root().join("metars.cache.csv");
        Self::with_path(cache_path)
    }

    pub fn with_path(cache_path: PathBuf) -> Self {
        Self {
            cache_path,
            url: METAR_URL.to_string(),
            ttl: Duration::from_secs(CACHE_TTL_SECS),
        }
    }

    pub fn from_config(config: &crate::config::AppConfig) -> Self {
        Self {
            cache_path: config.metar_cache_path(),
            url: config.metar_url.clone(),
            ttl: Duration::from_secs(config.metar_cache_ttl_secs),
        }
    }

    pub fn cache_path(&self) -> &PathBuf {
        &self.cache_path
    }

    pub fn is_fresh(&self) -> bool {
        fs::metadata(&self.cache_path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| modified.elapsed().ok())
            .is_some_and(|elapsed| elapsed < self.ttl)
    }

    /// Downloads the gzipped cache when the local copy is missing or expired.
    /// Returns `true` when a download happened.
    pub async fn refresh(&self) -> Result<bool> {
        if self.is_fresh() {
            debug!("Using valid cached METAR data — cache_path={}", self.cache_path.display());
            return Ok(false);
        }

        info!(
            "METAR cache expired or missing; fetching live data — cache_path={} url={}",
            self.cache_path.display(),
            self.url
        );
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        let response = client.get(&self.url).send().await?.error_for_status()?;
        let bytes = response.bytes().await?;

        debug!("Downloaded gzipped METAR data — compressed_bytes={}", bytes.len());

        let mut decoder = GzDecoder::new(&bytes[..]);
        let mut csv_data = String::new();
        decoder
            .read_to_string(&mut csv_data)
            .context("Failed to decompress METAR cache")?;

        if let Some(parent) = self.cache_path.parent() {
            fs::create_dir_all(parent).context("Failed to create METAR cache directory")?;
        }
        fs::write(&self.cache_path, &csv_data).context("Failed to write METAR cache")?;
        info!(
            "METAR cache updated — cache_path={} uncompressed_bytes={}",
            self.cache_path.display(),
            csv_data.len()
        );
        Ok(true)
    }

    /// Reads the requested stations (or all stations when `ids` is `None`).
    pub fn load(&self, ids: Option<&[&str]>) -> HashMap<String, WeatherObservation> {
        let file = match fs::File::open(&self.cache_path) {
            Ok(f) => f,
            Err(_) => {
                warn!(
                    "METAR cache file not found; legs will use zero wind — cache_path={}",
                    self.cache_path.display()
                );
                return HashMap::new();
            }
        };
        let targets: Option<HashSet<String>> =
            ids.map(|ids| ids.iter().map(|s| s.trim().to_uppercase()).collect());
        parse_metar_csv(file, targets.as_ref())
    }
}

impl WeatherSource for MetarCache {
    fn observation(&self, station_id: &str) -> Option<WeatherObservation> {
        let key = station_id.trim().to_uppercase();
        let ids = [key.as_str()];
        self.load(Some(&ids[..])).remove(&key)
    }

    fn observations(&self, station_ids: &[&str]) -> HashMap<String, WeatherObservation> {
        self.load(Some(station_ids))
    }
}

#[derive(Default)]
struct Columns {
    raw_text: Option<usize>,
    station: Option<usize>,
    observed: Option<usize>,
    wind_dir: Option<usize>,
    wind_speed: Option<usize>,
    wind_gust: Option<usize>,
    flight_category: Option<usize>,
}

/// Parses the NOAA METAR CSV layout. Comment lines before the `raw_text,...`
/// header are skipped; malformed rows are logged and ignored.
pub fn parse_metar_csv<R: Read>(
    reader: R,
    targets: Option<&HashSet<String>>,
) -> HashMap<String, WeatherObservation> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .has_headers(false)
        .from_reader(reader);

    let mut map = HashMap::new();
    let mut cols: Option<Columns> = None;

    for result in rdr.records() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                error!("CSV parsing error: {}", e);
                continue;
            }
        };

        let Some(c) = cols.as_ref() else {
            if record.get(0).is_some_and(|f| f.starts_with("raw_text")) {
                let mut found = Columns::default();
                for (i, field) in record.iter().enumerate() {
                    match field {
                        "raw_text" => found.raw_text = Some(i),
                        "station_id" => found.station = Some(i),
                        "observation_time" => found.observed = Some(i),
                        "wind_dir_degrees" => found.wind_dir = Some(i),
                        "wind_speed_kt" => found.wind_speed = Some(i),
                        "wind_gust_kt" => found.wind_gust = Some(i),
                        "flight_category" => found.flight_category = Some(i),
                        _ => {}
                    }
                }
                cols = Some(found);
            }
            continue;
        };

        let field = |idx: Option<usize>| {
            idx.and_then(|i| record.get(i))
                .map(str::trim)
                .filter(|s| !s.is_empty())
        };

        let Some(station_id) = field(c.station).map(str::to_uppercase) else {
            continue;
        };
        if targets.is_some_and(|t| !t.contains(&station_id)) {
            continue;
        }

        let obs = WeatherObservation {
            wind_direction_deg: field(c.wind_dir).and_then(|s| s.parse::<f64>().ok()),
            wind_speed_kt: field(c.wind_speed)
                .and_then(|s| s.parse::<f64>().ok())
                .unwrap_or(0.0),
            wind_gust_kt: field(c.wind_gust).and_then(|s| s.parse::<f64>().ok()),
            flight_category: field(c.flight_category).and_then(FlightCategory::parse),
            raw_text: field(c.raw_text).unwrap_or_default().to_string(),
            observed_at: field(c.observed)
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|d| d.with_timezone(&Utc)),
            station_id: station_id.clone(),
        };
        map.insert(station_id, obs);
    }

    debug!("Parsed METAR observations — found={}", map.len());
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const SAMPLE: &str = "\
No errors
No warnings
3 ms
data source=metars
3 results
raw_text,station_id,observation_time,latitude,longitude,temp_c,dewpoint_c,wind_dir_degrees,wind_speed_kt,wind_gust_kt,visibility_statute_mi,flight_category
EHRD 011125Z 21015KT 9999 FEW030 18/10 Q1015,EHRD,2026-06-01T11:25:00Z,51.95,4.43,18,10,210,15,,6.21,VFR
EHAM 011125Z VRB03KT CAVOK 19/09 Q1015,EHAM,2026-06-01T11:25:00Z,52.31,4.76,19,9,VRB,3,,6.21,VFR
EGLL 011120Z 24022G35KT 4000 BKN008 12/11 Q1002,EGLL,2026-06-01T11:20:00Z,51.48,-0.45,12,11,240,22,35,2.49,IFR
";

    #[test]
    fn parses_structured_fields() {
        let map = parse_metar_csv(Cursor::new(SAMPLE), None);
        assert_eq!(map.len(), 3);

        let ehrd = &map["EHRD"];
        assert_eq!(ehrd.wind_direction_deg, Some(210.0));
        assert_eq!(ehrd.wind_speed_kt, 15.0);
        assert_eq!(ehrd.flight_category, Some(FlightCategory::Vfr));
        assert!(ehrd.raw_text.starts_with("EHRD 011125Z"));
        assert!(ehrd.observed_at.is_some());

        let egll = &map["EGLL"];
        assert_eq!(egll.wind_gust_kt, Some(35.0));
        assert_eq!(egll.flight_category, Some(FlightCategory::Ifr));
        assert!(!egll.flight_category.unwrap().is_vfr());
    }

    #[test]
    fn variable_wind_has_no_direction() {
        let map = parse_metar_csv(Cursor::new(SAMPLE), None);
        let eham = &map["EHAM"];
        assert_eq!(eham.wind_direction_deg, None);
        assert_eq!(eham.wind(), None);

        let calm = WeatherObservation {
            wind_direction_deg: None,
            wind_speed_kt: 0.0,
            ..eham.clone()
        };
        assert_eq!(calm.wind(), Some(WindInput::calm()));
    }

    #[test]
    fn filters_by_target_ids() {
        let targets: HashSet<String> = ["EHAM".to_string()].into_iter().collect();
        let map = parse_metar_csv(Cursor::new(SAMPLE), Some(&targets));
        assert_eq!(map.len(), 1);
        assert!(map.contains_key("EHAM"));
    }

    #[test]
    fn cache_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metars.cache.csv");
        fs::write(&path, SAMPLE).unwrap();

        let cache = MetarCache::with_path(path);
        assert!(cache.is_fresh());
        let obs = cache.observation("ehrd").unwrap();
        assert_eq!(obs.station_id, "EHRD");
        assert_eq!(cache.observations(&["EHAM", "LFPG"]).len(), 1);
    }

    #[test]
    fn missing_cache_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let cache = MetarCache::with_path(dir.path().join("absent.csv"));
        assert!(!cache.is_fresh());
        assert!(cache.observation("EHAM").is_none());
    }

    #[test]
    fn static_weather_lookup_is_case_insensitive() {
        let wx = StaticWeather::new().with(WeatherObservation::new("ehrd", 210.0, 15.0));
        assert!(wx.observation("EHRD").is_some());
        assert_eq!(wx.observations(&["ehrd", "eham"]).len(), 1);
    }
}
