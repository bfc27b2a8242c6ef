// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

//! Keeps the navigation log in step with an edited flight plan.
//!
//! Edits are debounced through a [`Sleeper`], every recompute gets a request id
//! from a [`RequestGuard`], and only the result of the newest request is
//! committed. The published [`NavLogState`] is replaced as a whole.

use crate::calculator::{CalcError, NavLogCalculator};
use crate::model::{FlightPlan, RecomputeKey};
use crate::route::{LegWarning, NavigationLog};
use crate::store::PlanStore;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Delay source for debouncing. Tests drive it by hand.
pub trait Sleeper: Send + Sync + 'static {
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            tokio::time::sleep(duration).await;
        })
    }
}

/// Monotonic request ids. A result may be committed only while its id is
/// still the latest one issued.
#[derive(Debug, Default)]
pub struct RequestGuard {
    latest: AtomicU64,
}

impl RequestGuard {
    pub fn issue(&self) -> u64 {
        self.latest.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn latest(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }

    pub fn is_current(&self, id: u64) -> bool {
        self.latest() == id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NavLogStatus {
    #[default]
    Idle,
    Computing,
    Ready,
    Error,
}

/// What the UI renders: the last good log, whether it is current, and why not.
#[derive(Debug, Clone, Default)]
pub struct NavLogState {
    pub log: Option<Arc<NavigationLog>>,
    pub status: NavLogStatus,
    /// User-facing message while `status` is `Error`.
    pub error: Option<String>,
    /// The log belongs to an earlier plan revision.
    pub is_stale: bool,
    pub last_updated: Option<DateTime<Utc>>,
    pub request_id: u64,
}

impl NavLogState {
    pub fn is_loading(&self) -> bool {
        self.status == NavLogStatus::Computing
    }

    pub fn warnings(&self) -> &[LegWarning] {
        self.log.as_deref().map(|l| l.warnings.as_slice()).unwrap_or(&[])
    }
}

struct Inner {
    calculator: Arc<dyn NavLogCalculator>,
    sleeper: Arc<dyn Sleeper>,
    guard: RequestGuard,
    state: watch::Sender<NavLogState>,
}

impl Inner {
    /// Applies a finished request. Returns `false` when it was superseded.
    fn commit(&self, id: u64, result: Result<NavigationLog, CalcError>) -> bool {
        // The guard is checked under the state lock so an older result can
        // never overwrite a newer one.
        self.state.send_if_modified(|state| {
            if !self.guard.is_current(id) {
                debug!(
                    "Discarding stale navigation log — request_id={} latest={}",
                    id,
                    self.guard.latest()
                );
                return false;
            }
            match result {
                Ok(log) => {
                    info!(
                        "Navigation log ready — request_id={} legs={} warnings={}",
                        id,
                        log.legs.len(),
                        log.warnings.len()
                    );
                    *state = NavLogState {
                        log: Some(Arc::new(log)),
                        status: NavLogStatus::Ready,
                        error: None,
                        is_stale: false,
                        last_updated: Some(Utc::now()),
                        request_id: id,
                    };
                }
                Err(e) => {
                    if e.is_upstream() {
                        error!("Navigation log computation failed — request_id={} error={}", id, e);
                    } else {
                        warn!("Navigation log not computed — request_id={} reason={}", id, e);
                    }
                    *state = NavLogState {
                        is_stale: state.log.is_some(),
                        log: state.log.take(),
                        status: NavLogStatus::Error,
                        error: Some(e.user_message()),
                        last_updated: state.last_updated,
                        request_id: id,
                    };
                }
            }
            true
        })
    }
}

pub struct NavLogService {
    inner: Arc<Inner>,
    store: Option<Arc<dyn PlanStore>>,
    debounce: Duration,
    last_key: Mutex<Option<RecomputeKey>>,
}

impl NavLogService {
    pub fn new(
        calculator: Arc<dyn NavLogCalculator>,
        sleeper: Arc<dyn Sleeper>,
        debounce: Duration,
    ) -> Self {
        let (state, _) = watch::channel(NavLogState::default());
        Self {
            inner: Arc::new(Inner {
                calculator,
                sleeper,
                guard: RequestGuard::default(),
                state,
            }),
            store: None,
            debounce,
            last_key: Mutex::new(None),
        }
    }

    /// Every plan passed to [`Self::on_plan_changed`] is saved here.
    pub fn with_store(mut self, store: Arc<dyn PlanStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn snapshot(&self) -> NavLogState {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<NavLogState> {
        self.inner.state.subscribe()
    }

    /// Saves the plan and, when a field that affects the log changed,
    /// schedules a debounced recompute. Returns the task handle if one was
    /// scheduled.
    pub fn on_plan_changed(&self, plan: &FlightPlan) -> Option<JoinHandle<()>> {
        if let Some(store) = &self.store {
            if let Err(e) = store.save(plan) {
                warn!("Could not persist flight plan — error={}", e);
            }
        }

        let key = plan.recompute_key();
        {
            let mut last = self.last_key.lock().unwrap_or_else(PoisonError::into_inner);
            if last.as_ref() == Some(&key) {
                debug!("Plan edit does not affect the navigation log; skipping recompute");
                return None;
            }
            *last = Some(key);
        }
        Some(self.schedule(plan.clone(), Some(self.debounce)))
    }

    /// Recomputes immediately, superseding anything in flight.
    pub fn refresh(&self, plan: &FlightPlan) -> JoinHandle<()> {
        *self.last_key.lock().unwrap_or_else(PoisonError::into_inner) = Some(plan.recompute_key());
        self.schedule(plan.clone(), None)
    }

    fn schedule(&self, plan: FlightPlan, delay: Option<Duration>) -> JoinHandle<()> {
        let id = self.inner.guard.issue();
        self.inner.state.send_modify(|state| {
            state.status = NavLogStatus::Computing;
            state.request_id = id;
        });
        debug!(
            "Scheduling navigation log recompute — request_id={} delay_ms={}",
            id,
            delay.map(|d| d.as_millis()).unwrap_or(0)
        );

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            if let Some(delay) = delay {
                inner.sleeper.sleep(delay).await;
                if !inner.guard.is_current(id) {
                    debug!("Recompute superseded during debounce — request_id={}", id);
                    return;
                }
            }
            let result = inner.calculator.compute(&plan).await;
            inner.commit(id, result);
        })
    }
}
