// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use vfrnav_core::directory::{AirportDirectory, WaypointDirectory};
use vfrnav_core::store::{default_plan, parse_plan, AircraftRegistry, JsonFleetStore, JsonPlanStore, PlanStore};
use vfrnav_core::weather::MetarCache;
use vfrnav_core::{
    AircraftProfile, AppConfig, FlightPlan, LocalCalculator, NavLogCalculator, NavLogService,
    NavLogStatus, NavigationLog, RemoteCalculator, TokioSleeper, Waypoint,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config.json (defaults to the per-user config directory)
    #[arg(short, long, env = "VFRNAV_CONFIG")]
    config: Option<PathBuf>,

    /// Increase log output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the navigation log for a plan file
    Compute {
        plan: PathBuf,
        /// Delegate to a remote navlog service at this base URL
        #[arg(long)]
        remote: Option<String>,
        /// Use winds from the cached METAR data
        #[arg(long)]
        weather: bool,
        /// Print the log as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Recompute whenever the plan file changes
    Watch {
        plan: PathBuf,
        #[arg(long)]
        weather: bool,
    },
    /// Write an empty plan with the default aircraft
    InitPlan {
        path: PathBuf,
        /// Take the aircraft from the fleet instead of the default trainer
        #[arg(long)]
        aircraft: Option<String>,
    },
    /// Manage the aircraft fleet
    Fleet {
        #[command(subcommand)]
        action: FleetAction,
    },
    /// Manage the METAR cache
    Weather {
        #[command(subcommand)]
        action: WeatherAction,
    },
    /// Query an X-Plane apt.dat file
    Airports {
        apt_dat: PathBuf,
        #[command(subcommand)]
        action: AirportAction,
    },
}

#[derive(Subcommand)]
enum FleetAction {
    List,
    /// Add or replace a profile from a JSON file
    Add { file: PathBuf },
    Remove { id: String },
}

#[derive(Subcommand)]
enum WeatherAction {
    /// Download fresh METAR data if the cache has expired
    Refresh,
    /// Show cached observations for stations
    Show { ids: Vec<String> },
}

#[derive(Subcommand)]
enum AirportAction {
    Lookup { id: String },
    Search { prefix: String },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    // A logger may already be installed when embedded; that is fine.
    let _ = TermLogger::init(level, Config::default(), TerminalMode::Stderr, ColorChoice::Auto);
}

fn read_plan(path: &Path) -> Result<FlightPlan> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read plan {}", path.display()))?;
    match parse_plan(&content) {
        Some(plan) => Ok(plan),
        None => bail!(
            "Plan {} is incomplete or has an invalid aircraft; run `vfrnav init-plan` to start over",
            path.display()
        ),
    }
}

fn local_calculator(config: &AppConfig, weather: bool) -> LocalCalculator {
    let calculator = LocalCalculator::new(config.fuel.clone());
    if weather {
        calculator.with_weather(Arc::new(MetarCache::from_config(config)))
    } else {
        calculator
    }
}

fn print_log(log: &NavigationLog, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(log)?);
    } else {
        print!("{}", log.to_text());
    }
    Ok(())
}

fn print_waypoint(wp: &Waypoint) {
    println!(
        "{:<6} {:<3} {:>9.4} {:>10.4} {:>6} {}",
        wp.id,
        wp.kind.label(),
        wp.lat,
        wp.lon,
        wp.elevation_ft
            .map(|e| format!("{:.0}ft", e))
            .unwrap_or_default(),
        wp.name
    );
}

async fn watch_plan(path: &Path, service: &NavLogService) -> Result<()> {
    let mut updates = service.subscribe();
    let mut last_seen: Option<SystemTime> = None;
    let mut ticker = tokio::time::interval(Duration::from_millis(500));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    println!("Watching {} (Ctrl-C to stop)", path.display());

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let modified = fs::metadata(path).and_then(|m| m.modified()).ok();
                if modified.is_some() && modified != last_seen {
                    last_seen = modified;
                    match read_plan(path) {
                        Ok(plan) => {
                            service.on_plan_changed(&plan);
                        }
                        Err(e) => log::warn!("Ignoring unreadable plan — error={:#}", e),
                    }
                }
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = updates.borrow_and_update().clone();
                match state.status {
                    NavLogStatus::Ready => {
                        if let Some(log) = &state.log {
                            println!();
                            print!("{}", log.to_text());
                        }
                    }
                    NavLogStatus::Error => {
                        println!();
                        println!(
                            "{}{}",
                            state.error.as_deref().unwrap_or("Cannot calculate"),
                            if state.is_stale { " (showing previous log)" } else { "" }
                        );
                    }
                    NavLogStatus::Computing | NavLogStatus::Idle => {}
                }
            }
            _ = &mut ctrl_c => break,
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = cli.config.clone().unwrap_or_else(AppConfig::default_path);
    let config = AppConfig::load(&config_path)?;

    match cli.command {
        Commands::Compute {
            plan,
            remote,
            weather,
            json,
        } => {
            let plan = read_plan(&plan)?;
            let calculator: Box<dyn NavLogCalculator> =
                match remote.or_else(|| config.remote_endpoint.clone()) {
                    Some(endpoint) => {
                        Box::new(RemoteCalculator::new(&endpoint, config.remote_timeout())?)
                    }
                    None => Box::new(local_calculator(&config, weather)),
                };
            match calculator.compute(&plan).await {
                Ok(log) => print_log(&log, json)?,
                Err(e) => bail!(e.user_message()),
            }
        }
        Commands::Watch { plan, weather } => {
            let calculator: Arc<dyn NavLogCalculator> = match &config.remote_endpoint {
                Some(endpoint) => Arc::new(RemoteCalculator::new(endpoint, config.remote_timeout())?),
                None => Arc::new(local_calculator(&config, weather)),
            };
            let service = NavLogService::new(calculator, Arc::new(TokioSleeper), config.debounce())
                .with_store(Arc::new(JsonPlanStore::in_config_root()));
            watch_plan(&plan, &service).await?;
        }
        Commands::InitPlan { path, aircraft } => {
            let mut plan = default_plan();
            if let Some(id) = aircraft {
                plan.aircraft = JsonFleetStore::in_config_root()
                    .get(&id)?
                    .with_context(|| format!("No aircraft '{}' in the fleet", id))?;
            }
            JsonPlanStore::new(path.clone()).save(&plan)?;
            println!("Wrote empty plan to {}", path.display());
        }
        Commands::Fleet { action } => {
            let fleet = JsonFleetStore::in_config_root();
            match action {
                FleetAction::List => {
                    let profiles = fleet.list()?;
                    if profiles.is_empty() {
                        println!("Fleet is empty; plans use the default {}", AircraftProfile::default_trainer().name);
                    }
                    for p in profiles {
                        println!(
                            "{:<16} {:<20} {:>4.0} kt {:>5.1}/h usable {:.0}",
                            p.id, p.name, p.cruise_speed_kt, p.fuel_burn_per_hour, p.usable_fuel
                        );
                    }
                }
                FleetAction::Add { file } => {
                    let content = fs::read_to_string(&file)
                        .with_context(|| format!("Failed to read {}", file.display()))?;
                    let profile: AircraftProfile =
                        serde_json::from_str(&content).context("Failed to parse aircraft profile")?;
                    fleet.save(&profile)?;
                    println!("Saved aircraft '{}'", profile.id);
                }
                FleetAction::Remove { id } => {
                    if fleet.delete(&id)? {
                        println!("Removed aircraft '{}'", id);
                    } else {
                        println!("No aircraft '{}' in the fleet", id);
                    }
                }
            }
        }
        Commands::Weather { action } => {
            let cache = MetarCache::from_config(&config);
            match action {
                WeatherAction::Refresh => {
                    if cache.refresh().await? {
                        println!("METAR cache updated: {}", cache.cache_path().display());
                    } else {
                        println!("METAR cache is fresh: {}", cache.cache_path().display());
                    }
                }
                WeatherAction::Show { ids } => {
                    let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
                    let observations = cache.load(Some(refs.as_slice()));
                    for id in &ids {
                        match observations.get(&id.to_uppercase()) {
                            Some(obs) if !obs.raw_text.is_empty() => println!("{}", obs.raw_text),
                            Some(obs) => println!(
                                "{} wind {}@{:.0}kt",
                                obs.station_id,
                                obs.wind_direction_deg
                                    .map(|d| format!("{:03.0}", d))
                                    .unwrap_or_else(|| "VRB".to_string()),
                                obs.wind_speed_kt
                            ),
                            None => println!("{}: no observation", id.to_uppercase()),
                        }
                    }
                }
            }
        }
        Commands::Airports { apt_dat, action } => {
            let directory = AirportDirectory::from_apt_dat(&apt_dat)
                .with_context(|| format!("Failed to load {}", apt_dat.display()))?;
            match action {
                AirportAction::Lookup { id } => match directory.lookup(&id) {
                    Some(wp) => print_waypoint(&wp),
                    None => println!("No airport '{}'", id),
                },
                AirportAction::Search { prefix } => {
                    let results = directory.search(&prefix);
                    if results.is_empty() {
                        println!("No matches (queries need at least 2 characters)");
                    }
                    for wp in results.iter().take(50) {
                        print_waypoint(wp);
                    }
                }
            }
        }
    }

    Ok(())
}
