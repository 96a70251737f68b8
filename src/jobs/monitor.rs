//! Job monitor: the local job list, its polling loop and job actions.
//!
//! State machine:
//! - per job: submitted (`done = false`) → terminal (`done = true`)
//! - monitor: idle → polling → idle
//!
//! A poll tick re-lists jobs and merges the listing into the local list. A
//! `response` fetched earlier through [`JobMonitor::fetch_job_detail`] is kept
//! when the listed entry lacks one. Polling ends on its own once every job is
//! terminal.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::AppError;
use crate::gemini::batch::BatchOps;
use crate::gemini::client::redact_id;
use crate::gemini::types::Job;

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Default interval between poll ticks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Default display window in days.
pub const DEFAULT_FILTER_DAYS: u32 = 7;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

// ─────────────────────────────────────────────────────────────────────────────
// State
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct MonitorState {
    jobs: Vec<Job>,
    is_loading: bool,
    error: Option<String>,
    filter_days: Option<u32>,
    /// Locally deleted names, tagged with the listing pass they happened in.
    removed: HashMap<String, u64>,
    pass: u64,
}

impl MonitorState {
    /// Opens a listing pass. Deletions recorded from now on are held back
    /// from the listing this pass returns.
    fn begin_listing(&mut self) -> u64 {
        self.pass += 1;
        self.pass
    }

    /// Drops locally deleted jobs from `listing`, then forgets deletions
    /// that happened before `pass` started.
    fn settle_listing(&mut self, pass: u64, listing: &mut Vec<Job>) {
        listing.retain(|j| !self.removed.contains_key(&j.name));
        self.removed.retain(|_, deleted_in| *deleted_in >= pass);
    }

    fn remove_job(&mut self, name: &str) {
        self.jobs.retain(|j| j.name != name);
        self.removed.insert(name.to_string(), self.pass);
    }
}

/// Observable monitor state for the UI.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorSnapshot {
    /// Jobs inside the display window.
    pub jobs: Vec<Job>,
    pub is_loading: bool,
    pub error: Option<String>,
    pub filter_days: Option<u32>,
    pub polling: bool,
}

struct Poller {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Whether a job created at `created` falls inside a `days`-day window
/// around `now`. The distance is rounded up to whole days.
pub fn within_days(created: DateTime<Utc>, now: DateTime<Utc>, days: u32) -> bool {
    let diff_ms = (now - created).num_milliseconds().abs();
    let diff_days = (diff_ms + DAY_MS - 1) / DAY_MS;
    diff_days <= i64::from(days)
}

fn is_visible(job: &Job, now: DateTime<Utc>, filter_days: Option<u32>) -> bool {
    match (filter_days, job.created_at()) {
        (Some(days), Some(created)) => within_days(created, now, days),
        _ => true,
    }
}

/// Merges a fresh listing into `jobs`.
///
/// Same-name entries are overwritten but keep their previous `response` if the
/// listed one has none; unknown names are appended. Returns whether every job
/// is terminal afterwards.
fn merge_listing(jobs: &mut Vec<Job>, listing: Vec<Job>) -> bool {
    for mut updated in listing {
        match jobs.iter_mut().find(|j| j.name == updated.name) {
            Some(existing) => {
                if updated.response.is_none() {
                    updated.response = existing.response.take();
                }
                *existing = updated;
            }
            None => jobs.push(updated),
        }
    }
    jobs.iter().all(Job::is_terminal)
}

/// Runs one poll tick. Returns `true` when polling should stop.
async fn poll_tick<B: BatchOps>(api: &B, state: &RwLock<MonitorState>) -> bool {
    let pass = state.write().await.begin_listing();
    match api.list().await {
        Ok(mut listing) => {
            let mut guard = state.write().await;
            guard.settle_listing(pass, &mut listing);
            merge_listing(&mut guard.jobs, listing)
        }
        Err(e) => {
            warn!("[JOBS] Failed to poll for job updates: {}", e);
            false
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// JobMonitor
// ─────────────────────────────────────────────────────────────────────────────

/// Owns the local job list and the single background poll task.
pub struct JobMonitor<B: BatchOps + 'static> {
    api: Arc<B>,
    state: Arc<RwLock<MonitorState>>,
    poller: Mutex<Option<Poller>>,
    poll_interval: Duration,
}

impl<B: BatchOps + 'static> JobMonitor<B> {
    pub fn new(api: Arc<B>, poll_interval: Duration, filter_days: Option<u32>) -> Self {
        Self {
            api,
            state: Arc::new(RwLock::new(MonitorState {
                filter_days,
                ..MonitorState::default()
            })),
            poller: Mutex::new(None),
            poll_interval,
        }
    }

    async fn set_error(&self, error: &AppError) {
        let mut guard = self.state.write().await;
        guard.error = Some(error.to_presentation().message);
    }

    /// Replaces the job list with the remote listing and starts or stops
    /// polling depending on whether anything is still running.
    ///
    /// Failures are recorded in the error slot and returned.
    pub async fn fetch_jobs(&self) -> Result<(), AppError> {
        let pass = {
            let mut guard = self.state.write().await;
            guard.is_loading = true;
            guard.error = None;
            guard.begin_listing()
        };

        let result = self.api.list().await;

        let outcome = match result {
            Ok(mut jobs) => {
                let mut guard = self.state.write().await;
                guard.settle_listing(pass, &mut jobs);
                let running = jobs.iter().filter(|j| !j.is_terminal()).count();
                info!("[JOBS] Loaded {} jobs ({} running)", jobs.len(), running);
                guard.jobs = jobs;
                drop(guard);
                if running > 0 {
                    self.start_polling().await;
                } else {
                    self.stop_polling().await;
                }
                Ok(())
            }
            Err(e) => {
                self.set_error(&e).await;
                Err(e)
            }
        };

        self.state.write().await.is_loading = false;
        outcome
    }

    /// Fetches one job in full and stores it locally.
    pub async fn fetch_job_detail(&self, name: &str) -> Result<Job, AppError> {
        let job = match self.api.get(name).await {
            Ok(job) => job,
            Err(e) => {
                self.set_error(&e).await;
                return Err(e);
            }
        };

        let mut guard = self.state.write().await;
        match guard.jobs.iter_mut().find(|j| j.name == job.name) {
            Some(existing) => *existing = job.clone(),
            None => guard.jobs.push(job.clone()),
        }
        Ok(job)
    }

    /// Starts the poll loop, replacing any loop already running.
    pub async fn start_polling(&self) {
        let mut poller = self.poller.lock().await;
        if let Some(previous) = poller.take() {
            previous.cancel.cancel();
        }

        let api = Arc::clone(&self.api);
        let state = Arc::clone(&self.state);
        let cancel = CancellationToken::new();
        let child = cancel.clone();
        let period = self.poll_interval;

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    _ = ticker.tick() => {
                        if poll_tick(api.as_ref(), &state).await {
                            info!("[JOBS] All jobs finished, polling stopped");
                            break;
                        }
                    }
                }
            }
        });

        info!("[JOBS] Polling every {}s", period.as_secs());
        *poller = Some(Poller { cancel, handle });
    }

    pub async fn stop_polling(&self) {
        if let Some(poller) = self.poller.lock().await.take() {
            poller.cancel.cancel();
        }
    }

    pub async fn is_polling(&self) -> bool {
        self.poller
            .lock()
            .await
            .as_ref()
            .is_some_and(|p| !p.cancel.is_cancelled() && !p.handle.is_finished())
    }

    /// Best-effort remote cancel, then delete.
    ///
    /// A failed cancel is only logged; the job is deleted either way.
    pub async fn cancel_job(&self, name: &str) -> Result<(), AppError> {
        if let Err(e) = self.api.cancel(name).await {
            warn!("[JOBS] Cancel of {} failed: {}", redact_id(name), e);
        }
        self.delete_job(name).await
    }

    /// Deletes a job remotely and drops it from the local list.
    pub async fn delete_job(&self, name: &str) -> Result<(), AppError> {
        if let Err(e) = self.api.delete(name).await {
            self.set_error(&e).await;
            return Err(e);
        }
        self.state.write().await.remove_job(name);
        Ok(())
    }

    pub async fn set_filter_days(&self, days: Option<u32>) {
        self.state.write().await.filter_days = days;
    }

    /// Jobs inside the display window at `now`; jobs without a readable
    /// creation time are always included.
    pub async fn visible_jobs(&self, now: DateTime<Utc>) -> Vec<Job> {
        let guard = self.state.read().await;
        guard
            .jobs
            .iter()
            .filter(|j| is_visible(j, now, guard.filter_days))
            .cloned()
            .collect()
    }

    /// Every locally known job, unfiltered.
    pub async fn jobs(&self) -> Vec<Job> {
        self.state.read().await.jobs.clone()
    }

    pub async fn snapshot(&self) -> MonitorSnapshot {
        let polling = self.is_polling().await;
        let jobs = self.visible_jobs(Utc::now()).await;
        let guard = self.state.read().await;
        MonitorSnapshot {
            jobs,
            is_loading: guard.is_loading,
            error: guard.error.clone(),
            filter_days: guard.filter_days,
            polling,
        }
    }
}

impl<B: BatchOps + 'static> Drop for JobMonitor<B> {
    fn drop(&mut self) {
        if let Some(poller) = self.poller.get_mut().take() {
            poller.cancel.cancel();
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
