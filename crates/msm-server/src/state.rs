//! Shared application state (C2-fronting), handed to every route as an axum
//! `State` extractor — grounded on the teacher's `DeploymentImpl` pattern
//! (one struct owning every service, cloned cheaply via `Arc` fields) seen
//! at `crates/local-deployment/src/lib.rs`.

use std::sync::Arc;
use std::time::Instant;

use msm_services::{ReconcilerHandle, SchedulerHandle};
use msm_supervisor::Supervisor;

#[derive(Clone)]
pub struct AppState {
    pub supervisor: Arc<Supervisor>,
    pub scheduler: SchedulerHandle,
    pub reconciler: ReconcilerHandle,
    pub http: reqwest::Client,
    started_at: Instant,
}

impl AppState {
    pub fn new(
        supervisor: Arc<Supervisor>,
        scheduler: SchedulerHandle,
        reconciler: ReconcilerHandle,
    ) -> Self {
        Self {
            supervisor,
            scheduler,
            reconciler,
            http: reqwest::Client::new(),
            started_at: Instant::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
