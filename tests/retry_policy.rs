use webhook_queue::queue::policy::{
    backoff_delay_ms, event_priority, on_processing_failure, on_stall, FailureDisposition,
    RetryPolicy, StallDisposition,
};

fn defaults() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        backoff_base_ms: 5_000,
        backoff_cap_ms: 300_000,
        max_stalls: 2,
    }
}

#[test]
fn settled_payments_outrank_everything() {
    assert_eq!(event_priority("payment.paid"), 1);
    assert_eq!(event_priority("payment.captured"), 1);
    assert_eq!(event_priority("order.paid"), 1);
    assert!(event_priority("payment.failed") > event_priority("payment.paid"));
    assert!(event_priority("refund.updated") > event_priority("payment.failed"));
}

#[test]
fn unknown_event_types_get_the_default_tier() {
    assert_eq!(event_priority("invoice.generated"), 10);
    assert_eq!(event_priority(""), 10);
    assert!(event_priority("invoice.generated") > event_priority("refund.failed"));
}

#[test]
fn backoff_schedule_is_exponential_from_five_seconds() {
    let p = defaults();
    assert_eq!(backoff_delay_ms(&p, 1), 5_000);
    assert_eq!(backoff_delay_ms(&p, 2), 10_000);
    assert_eq!(backoff_delay_ms(&p, 3), 20_000);
    assert_eq!(backoff_delay_ms(&p, 7), 300_000);
}

#[test]
fn failing_processor_gets_exactly_three_attempts() {
    let p = defaults();
    let mut delays = Vec::new();
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        match on_processing_failure(attempts, &p) {
            FailureDisposition::Retry { delay_ms } => delays.push(delay_ms),
            FailureDisposition::Discard => break,
        }
    }

    assert_eq!(attempts, 3);
    assert_eq!(delays, vec![5_000, 10_000]);
}

#[test]
fn stall_restarts_consume_the_attempt_budget() {
    let p = defaults();

    // first and second reclaim of a young job go back on the queue
    assert_eq!(on_stall(1, 1, &p), StallDisposition::Requeue);
    assert_eq!(on_stall(2, 2, &p), StallDisposition::Requeue);

    // third reclaim exceeds the stall bound
    assert_eq!(on_stall(2, 3, &p), StallDisposition::Discard);

    // a job on its final attempt is done regardless of the stall count
    assert_eq!(on_stall(3, 1, &p), StallDisposition::Discard);
}
