use crate::domain::job::WebhookJobData;
use crate::processor::WebhookProcessor;
use anyhow::Result;
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};

/// Behavior-driven stand-in used by local runs and tests.
pub struct MockProcessor {
    pub behavior: String,
    calls: AtomicU32,
}

impl MockProcessor {
    pub fn new(behavior: &str) -> Self {
        Self {
            behavior: behavior.to_string(),
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait::async_trait]
impl WebhookProcessor for MockProcessor {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn process(&self, job: &WebhookJobData) -> Result<serde_json::Value> {
        let call = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
        match self.behavior.as_str() {
            "ALWAYS_FAILURE" => anyhow::bail!("mock decline for {}", job.event_id),
            "FAIL_TWICE" if call <= 2 => {
                anyhow::bail!("mock transient failure {} for {}", call, job.event_id)
            }
            _ => Ok(json!({
                "processed": true,
                "event_id": job.event_id,
                "call": call,
            })),
        }
    }
}
