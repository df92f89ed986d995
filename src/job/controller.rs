//! Single-flight job controller.
//!
//! The job slot is guarded by one `RwLock`; `start` checks and claims
//! the slot under a single write acquisition, so two racing starts
//! resolve to exactly one running job and one rejection. The worker
//! reports progress through a `JobTicket` carrying the generation it
//! was issued for; a ticket from a superseded job can no longer touch
//! the slot.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{JobKind, JobSnapshot, JobStatus};
use crate::error::ScannerError;
use crate::scan::ScanResult;

#[derive(Debug)]
struct ControllerInner {
    snapshot: JobSnapshot,
    /// Bumped on every successful `start`; tickets must match to write.
    generation: u64,
    /// Last successful scan, kept until the next one replaces it.
    last_result: Option<Arc<ScanResult>>,
}

/// Coordinates the one background job the service may run at a time
/// and caches the most recent successful scan result.
#[derive(Clone)]
pub struct JobController {
    inner: Arc<RwLock<ControllerInner>>,
}

impl JobController {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(ControllerInner {
                snapshot: JobSnapshot::idle(),
                generation: 0,
                last_result: None,
            })),
        }
    }

    /// Claim the job slot.
    ///
    /// Fails with `AlreadyRunning` if a job is in flight; otherwise
    /// transitions to `running` with progress 0 and returns the ticket
    /// the worker reports through. The check and the transition happen
    /// under one write lock, so concurrent starts cannot both succeed.
    pub async fn start(
        &self,
        kind: JobKind,
        message: impl Into<String>,
    ) -> Result<JobTicket, ScannerError> {
        let mut inner = self.inner.write().await;
        if inner.snapshot.status == JobStatus::Running {
            return Err(ScannerError::AlreadyRunning);
        }

        let job_id = Uuid::new_v4();
        inner.generation += 1;
        inner.snapshot = JobSnapshot {
            job_id: Some(job_id),
            kind: Some(kind),
            status: JobStatus::Running,
            progress: 0,
            message: message.into(),
            started_at: Some(Utc::now()),
        };

        info!(job_id = %job_id, kind = %kind, "Job started");
        Ok(JobTicket {
            inner: self.inner.clone(),
            generation: inner.generation,
            job_id,
        })
    }

    /// Point-in-time view of the job slot.
    pub async fn status(&self) -> JobSnapshot {
        self.inner.read().await.snapshot.clone()
    }

    /// Whether a job is currently in flight.
    pub async fn is_running(&self) -> bool {
        self.inner.read().await.snapshot.status == JobStatus::Running
    }

    /// Last successful scan result.
    ///
    /// Fails with `NoResultAvailable` when no scan has ever completed
    /// or the most recent job ended in `error`. The cached result
    /// itself survives failures; only the next successful scan
    /// replaces it.
    pub async fn result(&self) -> Result<Arc<ScanResult>, ScannerError> {
        let inner = self.inner.read().await;
        if inner.snapshot.status == JobStatus::Error {
            return Err(ScannerError::NoResultAvailable);
        }
        inner
            .last_result
            .clone()
            .ok_or(ScannerError::NoResultAvailable)
    }
}

impl Default for JobController {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Job Ticket
// ============================================================================

/// Write handle for the in-flight job.
///
/// Issued by `start` and bound to that job's generation; once another
/// job has claimed the slot, writes through an old ticket are dropped.
#[derive(Debug)]
pub struct JobTicket {
    inner: Arc<RwLock<ControllerInner>>,
    generation: u64,
    job_id: Uuid,
}

impl JobTicket {
    /// Identifier of the job this ticket belongs to.
    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    /// Update progress and the step message.
    pub async fn progress(&self, percent: u8, message: impl Into<String>) {
        let mut inner = self.inner.write().await;
        if !self.owns(&inner) {
            return;
        }
        inner.snapshot.progress = percent.min(100);
        inner.snapshot.message = message.into();
        debug!(job_id = %self.job_id, percent, "Job progress");
    }

    /// Terminal success for a refresh. Leaves the result cache alone.
    pub async fn complete_refresh(self, message: impl Into<String>) {
        let mut inner = self.inner.write().await;
        if !self.owns(&inner) {
            return;
        }
        inner.snapshot.status = JobStatus::Completed;
        inner.snapshot.progress = 100;
        inner.snapshot.message = message.into();
        info!(job_id = %self.job_id, "Refresh complete");
    }

    /// Terminal success for a scan. Replaces the cached result.
    pub async fn complete_scan(self, result: ScanResult) {
        let summary = result.summary();
        let mut inner = self.inner.write().await;
        if !self.owns(&inner) {
            return;
        }
        inner.snapshot.status = JobStatus::Completed;
        inner.snapshot.progress = 100;
        inner.snapshot.message = summary;
        inner.last_result = Some(Arc::new(result));
        info!(job_id = %self.job_id, "Scan complete");
    }

    /// Terminal failure. The previous good result stays cached.
    pub async fn fail(self, message: impl Into<String>) {
        let message = message.into();
        let mut inner = self.inner.write().await;
        if !self.owns(&inner) {
            return;
        }
        inner.snapshot.status = JobStatus::Error;
        inner.snapshot.message = message.clone();
        warn!(job_id = %self.job_id, message = %message, "Job failed");
    }

    fn owns(&self, inner: &ControllerInner) -> bool {
        inner.generation == self.generation && inner.snapshot.status == JobStatus::Running
    }
}
