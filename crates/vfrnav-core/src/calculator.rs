// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

use crate::fuel::FuelPolicyConfig;
use crate::model::FlightPlan;
use crate::route::{build_navigation_log, validate_endpoints, NavigationLog, RouteError, RouteInput};
use crate::weather::{WeatherObservation, WeatherSource};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalcError {
    #[error(transparent)]
    Route(#[from] RouteError),
    #[error("Remote navlog service failed: {0}")]
    Remote(String),
    #[error("Remote navlog service timed out")]
    Timeout,
    #[error("Weather lookup task failed: {0}")]
    Weather(String),
}

impl CalcError {
    /// Text shown to the pilot in place of the log.
    pub fn user_message(&self) -> String {
        match self {
            CalcError::Route(e) if e.is_incomplete_route() => {
                "Cannot calculate: need departure and arrival".to_string()
            }
            CalcError::Route(e) => format!("Cannot calculate: {}", e),
            CalcError::Remote(msg) => format!("Navigation log service unavailable: {}", msg),
            CalcError::Timeout => "Navigation log service did not respond in time".to_string(),
            CalcError::Weather(msg) => format!("Cannot calculate: weather lookup failed: {}", msg),
        }
    }

    /// Upstream failures may succeed on a later attempt; invalid input never does.
    pub fn is_upstream(&self) -> bool {
        matches!(self, CalcError::Remote(_) | CalcError::Timeout)
    }
}

/// Computes a navigation log for a plan. Local and remote implementations
/// share this contract.
#[async_trait]
pub trait NavLogCalculator: Send + Sync {
    async fn compute(&self, plan: &FlightPlan) -> Result<NavigationLog, CalcError>;
}

/// Runs the aggregator in-process, with weather from an optional source.
#[derive(Clone)]
pub struct LocalCalculator {
    fuel: FuelPolicyConfig,
    weather: Option<Arc<dyn WeatherSource>>,
}

impl LocalCalculator {
    pub fn new(fuel: FuelPolicyConfig) -> Self {
        Self { fuel, weather: None }
    }

    pub fn with_weather(mut self, weather: Arc<dyn WeatherSource>) -> Self {
        self.weather = Some(weather);
        self
    }

    /// Synchronous form of [`NavLogCalculator::compute`]. Weather sources may
    /// read from disk, so keep this off async executor threads.
    pub fn compute_now(&self, plan: &FlightPlan) -> Result<NavigationLog, RouteError> {
        let weather = match &self.weather {
            Some(source) => lookup_weather(source.as_ref(), &station_ids(plan)),
            None => HashMap::new(),
        };
        self.aggregate(plan, &weather)
    }

    fn aggregate(
        &self,
        plan: &FlightPlan,
        weather: &HashMap<String, WeatherObservation>,
    ) -> Result<NavigationLog, RouteError> {
        let input = RouteInput::from_plan(plan, weather);
        build_navigation_log(&input, &self.fuel, Utc::now())
    }
}

fn station_ids(plan: &FlightPlan) -> Vec<String> {
    plan.route_points()
        .into_iter()
        .map(|wp| wp.id.trim())
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

fn lookup_weather(source: &dyn WeatherSource, ids: &[String]) -> HashMap<String, WeatherObservation> {
    let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
    source.observations(&refs)
}

#[async_trait]
impl NavLogCalculator for LocalCalculator {
    async fn compute(&self, plan: &FlightPlan) -> Result<NavigationLog, CalcError> {
        let weather = match &self.weather {
            Some(source) => {
                let source = Arc::clone(source);
                let ids = station_ids(plan);
                tokio::task::spawn_blocking(move || lookup_weather(source.as_ref(), &ids))
                    .await
                    .map_err(|e| CalcError::Weather(e.to_string()))?
            }
            None => HashMap::new(),
        };
        Ok(self.aggregate(plan, &weather)?)
    }
}

/// Delegates to a service exposing `POST {endpoint}/navlog`, which takes a
/// flight plan and answers with a navigation log, both as JSON.
#[derive(Clone)]
pub struct RemoteCalculator {
    endpoint: String,
    client: reqwest::Client,
}

impl RemoteCalculator {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, CalcError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CalcError::Remote(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn url(&self) -> String {
        format!("{}/navlog", self.endpoint)
    }
}

fn map_reqwest_error(e: reqwest::Error) -> CalcError {
    if e.is_timeout() {
        CalcError::Timeout
    } else {
        CalcError::Remote(e.to_string())
    }
}

#[async_trait]
impl NavLogCalculator for RemoteCalculator {
    async fn compute(&self, plan: &FlightPlan) -> Result<NavigationLog, CalcError> {
        // Invalid input is refused locally, without a round trip.
        validate_endpoints(&plan.route_points())?;

        let url = self.url();
        log::debug!("Requesting remote navigation log — url={}", url);
        let response = self
            .client
            .post(&url)
            .json(plan)
            .send()
            .await
            .map_err(|e| {
                log::error!("Remote navlog request failed — url={} error={}", url, e);
                map_reqwest_error(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::error!(
                "Remote navlog service returned an error — url={} status={}",
                url,
                status.as_u16()
            );
            let detail = body.trim();
            return Err(CalcError::Remote(if detail.is_empty() {
                format!("HTTP {}", status.as_u16())
            } else {
                format!("HTTP {}: {}", status.as_u16(), detail)
            }));
        }

        response
            .json::<NavigationLog>()
            .await
            .map_err(map_reqwest_error)
    }
}
