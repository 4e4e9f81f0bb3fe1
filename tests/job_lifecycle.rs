use chrono::Utc;
use serde_json::json;
use webhook_queue::domain::job::{EnqueueOutcome, FailedJob, JobRecord, JobState, QueueHealth, WebhookJobData};
use webhook_queue::queue::policy::{event_priority, waiting_score};

fn job_data(event_type: &str, event_id: &str) -> WebhookJobData {
    WebhookJobData {
        event_type: event_type.to_string(),
        event_data: json!({"payment_id": "pay_001", "amount": 4200}),
        event_id: event_id.to_string(),
        webhook_db_id: 17,
        raw_payload: None,
    }
}

#[test]
fn new_jobs_start_waiting_with_a_fresh_budget() {
    let record = JobRecord::new(job_data("payment.paid", "evt_123"), 1, Utc::now());
    assert_eq!(record.state, JobState::Waiting);
    assert_eq!(record.attempts_made, 0);
    assert_eq!(record.stall_count, 0);
    assert!(record.started_at.is_none());
    assert!(record.failure_reason.is_none());
}

#[test]
fn waiting_scores_drain_in_priority_order() {
    // three events enqueued in reverse priority order; sequence numbers
    // reflect arrival
    let refund = waiting_score(event_priority("refund.updated"), 1);
    let failed = waiting_score(event_priority("payment.failed"), 2);
    let paid = waiting_score(event_priority("payment.paid"), 3);

    assert!(paid < failed, "settled payment must drain before failure");
    assert!(failed < refund, "failure must drain before refund");
}

#[test]
fn equal_priority_drains_fifo() {
    let first = waiting_score(1, 100);
    let second = waiting_score(1, 101);
    assert!(first < second);
}

#[test]
fn later_sequence_never_overtakes_a_better_priority() {
    // a very late high-priority arrival still beats an early default-tier job
    let late_paid = waiting_score(1, 9_000_000);
    let early_unknown = waiting_score(10, 1);
    assert!(late_paid < early_unknown);
}

#[test]
fn failed_job_view_carries_the_diagnostics() {
    let mut record = JobRecord::new(job_data("refund.updated", "evt_456"), 3, Utc::now());
    record.state = JobState::Failed;
    record.attempts_made = 3;
    record.failure_reason = Some("processor endpoint returned HTTP 500".to_string());
    record.finished_at = Some(Utc::now());

    let view = FailedJob::from_record(&record);
    assert_eq!(view.event_id, "evt_456");
    assert_eq!(view.event_type, "refund.updated");
    assert_eq!(view.attempts_made, 3);
    assert!(view.failure_reason.is_some());
    assert!(view.failed_at.is_some());
}

#[test]
fn enqueue_outcome_exposes_the_job_either_way() {
    let record = JobRecord::new(job_data("payment.paid", "evt_123"), 1, Utc::now());

    let created = EnqueueOutcome::Created(record.clone());
    assert!(!created.is_duplicate());
    assert_eq!(created.job().data.event_id, "evt_123");

    let duplicate = EnqueueOutcome::Duplicate(record);
    assert!(duplicate.is_duplicate());
    assert_eq!(duplicate.job().data.event_id, "evt_123");
}

#[test]
fn unhealthy_snapshot_reports_the_cause_and_no_counts() {
    let health = QueueHealth::unhealthy("broker connection failed");
    assert!(!health.healthy);
    assert_eq!(health.error.as_deref(), Some("broker connection failed"));
    assert_eq!(health.counts.waiting, 0);
    assert_eq!(health.counts.failed, 0);
}

#[test]
fn job_record_survives_the_broker_round_trip() {
    let mut record = JobRecord::new(job_data("payment.captured", "evt_789"), 1, Utc::now());
    record.attempts_made = 2;
    record.failure_reason = Some("mock transient failure".to_string());

    let payload = serde_json::to_string(&record).expect("serialize");
    let parsed: JobRecord = serde_json::from_str(&payload).expect("deserialize");
    assert_eq!(parsed.data.event_id, "evt_789");
    assert_eq!(parsed.attempts_made, 2);
    assert_eq!(parsed.state, JobState::Waiting);
    assert_eq!(parsed.failure_reason.as_deref(), Some("mock transient failure"));
}
