use crate::domain::job::WebhookJobData;
use crate::processor::WebhookProcessor;
use anyhow::Result;
use serde_json::json;

/// Hands the event to the order service over HTTP. The receiving endpoint
/// owns the payment/order mutations; a non-2xx response is a processing
/// failure and the job is retried.
pub struct HttpForwardProcessor {
    pub endpoint: String,
    pub timeout_ms: u64,
    pub client: reqwest::Client,
}

#[async_trait::async_trait]
impl WebhookProcessor for HttpForwardProcessor {
    fn name(&self) -> &'static str {
        "http_forward"
    }

    async fn process(&self, job: &WebhookJobData) -> Result<serde_json::Value> {
        let body = json!({
            "event_type": job.event_type,
            "event_id": job.event_id,
            "event_data": job.event_data,
            "webhook_db_id": job.webhook_db_id,
        });

        let resp = self
            .client
            .post(&self.endpoint)
            .header("X-Event-Type", &job.event_type)
            .header("X-Event-Id", &job.event_id)
            .json(&body)
            .timeout(std::time::Duration::from_millis(self.timeout_ms))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let detail: String = resp.text().await.unwrap_or_default().chars().take(200).collect();
            anyhow::bail!("processor endpoint returned HTTP {}: {}", status.as_u16(), detail);
        }

        let result: serde_json::Value = resp.json().await.unwrap_or_else(|_| json!({"ok": true}));
        Ok(result)
    }
}
