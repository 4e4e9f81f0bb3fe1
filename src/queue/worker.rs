use crate::processor::WebhookProcessor;
use crate::queue::policy::{
    on_processing_failure, on_stall, FailureDisposition, RetryPolicy, StallDisposition,
};
use crate::queue::store_redis::JobStoreRedis;
use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::watch;

/// One member of the worker pool. Pops jobs in priority order, runs the
/// processor, records the outcome. The lease taken at pop time doubles as
/// the stalled-job detection window.
pub struct Worker {
    pub name: String,
    pub store: JobStoreRedis,
    pub processor: Arc<dyn WebhookProcessor>,
    pub policy: RetryPolicy,
    pub lease_ms: u64,
    pub idle_sleep_ms: u64,
    pub shutdown: watch::Receiver<bool>,
}

impl Worker {
    pub async fn run(self) {
        loop {
            if *self.shutdown.borrow() {
                break;
            }
            match self.tick().await {
                Ok(true) => {}
                Ok(false) => {
                    tokio::time::sleep(std::time::Duration::from_millis(self.idle_sleep_ms)).await
                }
                Err(err) => {
                    tracing::error!(worker = %self.name, "queue worker error: {err:#}");
                    tokio::time::sleep(std::time::Duration::from_millis(self.idle_sleep_ms)).await;
                }
            }
        }
        tracing::debug!(worker = %self.name, "queue worker stopped");
    }

    /// Returns true when a job was taken, false when the queue was empty
    /// or paused.
    async fn tick(&self) -> Result<bool> {
        if self.store.is_paused().await? {
            return Ok(false);
        }

        let Some(mut record) = self.store.pop_next(Utc::now(), self.lease_ms).await? else {
            return Ok(false);
        };

        let event_id = record.data.event_id.clone();
        let event_type = record.data.event_type.clone();
        tracing::info!(
            worker = %self.name,
            event_id = %event_id,
            event_type = %event_type,
            attempt = record.attempts_made,
            "processing webhook job"
        );

        match self.processor.process(&record.data).await {
            Ok(_) => {
                self.store.mark_completed(&mut record, Utc::now()).await?;
                tracing::info!(event_id = %event_id, attempt = record.attempts_made, "webhook job completed");
            }
            Err(err) => {
                let reason = format!("{err:#}");
                match on_processing_failure(record.attempts_made, &self.policy) {
                    FailureDisposition::Retry { delay_ms } => {
                        self.store
                            .retry_later(&mut record, delay_ms, &reason, Utc::now())
                            .await?;
                        tracing::warn!(
                            event_id = %event_id,
                            event_type = %event_type,
                            attempt = record.attempts_made,
                            delay_ms,
                            "webhook job failed, retry scheduled: {reason}"
                        );
                    }
                    FailureDisposition::Discard => {
                        self.store.mark_failed(&mut record, &reason, Utc::now()).await?;
                        tracing::error!(
                            event_id = %event_id,
                            event_type = %event_type,
                            attempts = record.attempts_made,
                            "webhook job failed permanently: {reason}"
                        );
                    }
                }
            }
        }
        Ok(true)
    }
}

/// Periodic sweep: promotes delayed jobs whose backoff has elapsed and
/// reclaims leases whose worker stopped reporting.
pub struct Sweeper {
    pub store: JobStoreRedis,
    pub policy: RetryPolicy,
    pub interval_ms: u64,
    pub shutdown: watch::Receiver<bool>,
}

impl Sweeper {
    pub async fn run(self) {
        let mut shutdown = self.shutdown.clone();
        let mut ticker = tokio::time::interval(std::time::Duration::from_millis(self.interval_ms));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(err) = self.tick().await {
                        tracing::error!("queue sweeper error: {err:#}");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::debug!("queue sweeper stopped");
    }

    async fn tick(&self) -> Result<()> {
        let now = Utc::now();

        let promoted = self.store.promote_due(now, 100).await?;
        if promoted > 0 {
            tracing::debug!(promoted, "promoted delayed webhook jobs");
        }

        for event_id in self.store.expired_leases(now).await? {
            let Some(mut record) = self.store.load_record(&event_id).await? else {
                self.store.drop_active(&event_id).await?;
                continue;
            };
            record.stall_count += 1;
            match on_stall(record.attempts_made, record.stall_count, &self.policy) {
                StallDisposition::Requeue => {
                    self.store.requeue_stalled(&mut record).await?;
                    tracing::warn!(
                        event_id = %event_id,
                        stalls = record.stall_count,
                        attempt = record.attempts_made,
                        "stalled webhook job requeued"
                    );
                }
                StallDisposition::Discard => {
                    self.store
                        .mark_failed(&mut record, "stalled: worker stopped reporting before completion", now)
                        .await?;
                    tracing::error!(
                        event_id = %event_id,
                        stalls = record.stall_count,
                        attempts = record.attempts_made,
                        "stalled webhook job moved to failed"
                    );
                }
            }
        }
        Ok(())
    }
}
