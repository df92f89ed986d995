//! Background job coordination.
//!
//! One refresh or scan runs at a time, off the request path; callers
//! poll a status snapshot and fetch the cached result of the last
//! successful scan. The controller owns the only shared mutable state
//! in the service.

mod controller;

pub use controller::{JobController, JobTicket};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Job Types
// ============================================================================

/// What a background job does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    /// Repopulate the snapshot cache from the upstream API
    Refresh,
    /// Run the scoring funnel over the cached universe
    Scan,
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Refresh => write!(f, "refresh"),
            Self::Scan => write!(f, "scan"),
        }
    }
}

/// Lifecycle state of the job slot.
///
/// `completed` and `error` are terminal for the job that set them and
/// reset to `running` implicitly when the next job starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// No job has run yet
    Idle,
    /// A job is in flight
    Running,
    /// The most recent job finished successfully
    Completed,
    /// The most recent job failed
    Error,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Consistent point-in-time view of the job slot, cloned out under one
/// lock so pollers never see a torn status/progress/message tuple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    /// Identifier of the current or most recent job
    pub job_id: Option<Uuid>,
    /// Kind of the current or most recent job
    pub kind: Option<JobKind>,
    /// Lifecycle state
    pub status: JobStatus,
    /// Completion percentage, 0-100
    pub progress: u8,
    /// Human-readable step or outcome description
    pub message: String,
    /// When the current or most recent job started
    pub started_at: Option<DateTime<Utc>>,
}

impl JobSnapshot {
    /// State before any job has ever run.
    pub fn idle() -> Self {
        Self {
            job_id: None,
            kind: None,
            status: JobStatus::Idle,
            progress: 0,
            message: String::new(),
            started_at: None,
        }
    }
}
