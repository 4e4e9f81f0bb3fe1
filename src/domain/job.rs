use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The enqueue request handed over by the webhook receiver. `event_id` is
/// the provider-assigned identifier and doubles as the job identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookJobData {
    pub event_type: String,
    pub event_data: serde_json::Value,
    pub event_id: String,
    pub webhook_db_id: i64,
    pub raw_payload: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Waiting,
    Delayed,
    Active,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub data: WebhookJobData,
    pub priority: i64,
    pub state: JobState,
    pub attempts_made: u32,
    pub stall_count: u32,
    pub enqueued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
}

impl JobRecord {
    pub fn new(data: WebhookJobData, priority: i64, now: DateTime<Utc>) -> Self {
        Self {
            data,
            priority,
            state: JobState::Waiting,
            attempts_made: 0,
            stall_count: 0,
            enqueued_at: now,
            started_at: None,
            finished_at: None,
            failure_reason: None,
        }
    }
}

/// Diagnostic view of a terminally failed job, as returned to admin tooling.
#[derive(Debug, Clone, Serialize)]
pub struct FailedJob {
    pub event_id: String,
    pub event_type: String,
    pub failure_reason: Option<String>,
    pub attempts_made: u32,
    pub stall_count: u32,
    pub enqueued_at: DateTime<Utc>,
    pub failed_at: Option<DateTime<Utc>>,
}

impl FailedJob {
    pub fn from_record(record: &JobRecord) -> Self {
        Self {
            event_id: record.data.event_id.clone(),
            event_type: record.data.event_type.clone(),
            failure_reason: record.failure_reason.clone(),
            attempts_made: record.attempts_made,
            stall_count: record.stall_count,
            enqueued_at: record.enqueued_at,
            failed_at: record.finished_at,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct JobCounts {
    pub waiting: u64,
    pub active: u64,
    pub delayed: u64,
    pub completed: u64,
    pub failed: u64,
}

/// Point-in-time snapshot, computed on demand. Never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct QueueHealth {
    pub healthy: bool,
    pub paused: bool,
    pub error: Option<String>,
    pub counts: JobCounts,
}

impl QueueHealth {
    pub fn unhealthy(error: impl Into<String>) -> Self {
        Self {
            healthy: false,
            paused: false,
            error: Some(error.into()),
            counts: JobCounts::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum EnqueueOutcome {
    Created(JobRecord),
    Duplicate(JobRecord),
}

impl EnqueueOutcome {
    pub fn job(&self) -> &JobRecord {
        match self {
            EnqueueOutcome::Created(job) | EnqueueOutcome::Duplicate(job) => job,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, EnqueueOutcome::Duplicate(_))
    }
}
