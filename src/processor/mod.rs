use crate::domain::job::WebhookJobData;
use anyhow::Result;

pub mod http_forward;
pub mod mock;

/// The business-logic callback invoked once per dequeued job. Any `Err`
/// counts as a processing failure and goes through the retry policy.
#[async_trait::async_trait]
pub trait WebhookProcessor: Send + Sync {
    fn name(&self) -> &'static str;

    async fn process(&self, job: &WebhookJobData) -> Result<serde_json::Value>;
}
