#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_cap_ms: u64,
    pub max_stalls: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureDisposition {
    Retry { delay_ms: u64 },
    Discard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StallDisposition {
    Requeue,
    Discard,
}

/// Numeric priority for a provider event tag. Lower runs first.
/// Settled payments outrank failures, failures outrank refunds, anything
/// unrecognized drops to the default tier.
pub fn event_priority(event_type: &str) -> i64 {
    match event_type {
        "payment.paid" | "payment.captured" | "order.paid" => 1,
        "payment.failed" => 2,
        "refund.created" | "refund.processed" | "refund.updated" | "refund.failed" => 3,
        _ => 10,
    }
}

/// Score for the waiting set: priority-major, enqueue-sequence-minor, so
/// equal-priority jobs drain in FIFO order.
pub fn waiting_score(priority: i64, seq: u64) -> f64 {
    priority as f64 * 1e12 + seq as f64
}

/// Exponential backoff before attempt N+1: base * 2^(N-1), capped.
pub fn backoff_delay_ms(policy: &RetryPolicy, attempts_made: u32) -> u64 {
    let shift = attempts_made.saturating_sub(1).min(16);
    policy
        .backoff_base_ms
        .saturating_mul(1u64 << shift)
        .min(policy.backoff_cap_ms)
}

pub fn on_processing_failure(attempts_made: u32, policy: &RetryPolicy) -> FailureDisposition {
    if attempts_made >= policy.max_attempts {
        FailureDisposition::Discard
    } else {
        FailureDisposition::Retry {
            delay_ms: backoff_delay_ms(policy, attempts_made),
        }
    }
}

/// A reclaimed lease consumes the same attempt budget as a thrown error,
/// and is additionally bounded by `max_stalls` restarts.
pub fn on_stall(attempts_made: u32, stall_count: u32, policy: &RetryPolicy) -> StallDisposition {
    if stall_count > policy.max_stalls || attempts_made >= policy.max_attempts {
        StallDisposition::Discard
    } else {
        StallDisposition::Requeue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            backoff_base_ms: 5_000,
            backoff_cap_ms: 300_000,
            max_stalls: 2,
        }
    }

    #[test]
    fn backoff_doubles_from_base() {
        let p = policy();
        assert_eq!(backoff_delay_ms(&p, 1), 5_000);
        assert_eq!(backoff_delay_ms(&p, 2), 10_000);
        assert_eq!(backoff_delay_ms(&p, 3), 20_000);
    }

    #[test]
    fn backoff_respects_cap() {
        let p = RetryPolicy {
            backoff_cap_ms: 12_000,
            ..policy()
        };
        assert_eq!(backoff_delay_ms(&p, 3), 12_000);
    }

    #[test]
    fn third_failure_is_terminal() {
        let p = policy();
        assert_eq!(
            on_processing_failure(2, &p),
            FailureDisposition::Retry { delay_ms: 10_000 }
        );
        assert_eq!(on_processing_failure(3, &p), FailureDisposition::Discard);
    }
}
