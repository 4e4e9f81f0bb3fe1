use crate::config::QueueConfig;
use crate::domain::job::{EnqueueOutcome, FailedJob, JobRecord, QueueHealth, WebhookJobData};
use crate::processor::WebhookProcessor;
use crate::queue::policy::{backoff_delay_ms, event_priority, RetryPolicy};
use crate::queue::store_redis::JobStoreRedis;
use crate::queue::worker::{Sweeper, Worker};
use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{watch, Mutex, RwLock};

/// Owns the broker connection, the worker pool, and the job lifecycle.
/// Constructed once by the composition root; nothing here is global.
pub struct QueueManager {
    pub config: QueueConfig,
    processor: Arc<dyn WebhookProcessor>,
    store: RwLock<Option<JobStoreRedis>>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Mutex<Vec<tokio::task::JoinHandle<()>>>,
}

impl QueueManager {
    pub fn new(config: QueueConfig, processor: Arc<dyn WebhookProcessor>) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            config,
            processor,
            store: RwLock::new(None),
            shutdown_tx,
            tasks: Mutex::new(Vec::new()),
        }
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.config.max_attempts,
            backoff_base_ms: self.config.backoff_base_ms,
            backoff_cap_ms: self.config.backoff_cap_ms,
            max_stalls: self.config.max_stalls,
        }
    }

    /// Connect to the broker and start the worker pool. Calling again on
    /// an initialized manager is a no-op.
    pub async fn initialize(&self) -> Result<()> {
        {
            let read = self.store.read().await;
            if read.is_some() {
                tracing::debug!("queue manager already initialized");
                return Ok(());
            }
        }

        let client = redis::Client::open(self.config.redis_url.clone())
            .context("invalid broker url")?;
        let store = JobStoreRedis::new(
            client,
            &self.config.key_prefix,
            self.config.completed_history,
            self.config.failed_history,
        );

        if self.config.ready_check {
            self.wait_until_reachable(&store).await?;
        }

        let mut write = self.store.write().await;
        if write.is_some() {
            return Ok(());
        }

        let _ = self.shutdown_tx.send(false);
        let policy = self.retry_policy();
        let instance = uuid::Uuid::new_v4().simple().to_string();
        let mut tasks = self.tasks.lock().await;
        for i in 0..self.config.concurrency {
            let worker = Worker {
                name: format!("webhook-worker-{}-{}", &instance[..8], i + 1),
                store: store.clone(),
                processor: Arc::clone(&self.processor),
                policy,
                lease_ms: self.config.stall_interval_ms,
                idle_sleep_ms: 250,
                shutdown: self.shutdown_tx.subscribe(),
            };
            tasks.push(tokio::spawn(worker.run()));
        }
        let sweeper = Sweeper {
            store: store.clone(),
            policy,
            interval_ms: self.config.stall_interval_ms,
            shutdown: self.shutdown_tx.subscribe(),
        };
        tasks.push(tokio::spawn(sweeper.run()));

        *write = Some(store);
        tracing::info!(
            workers = self.config.concurrency,
            processor = self.processor.name(),
            prefix = %self.config.key_prefix,
            "webhook queue initialized"
        );
        Ok(())
    }

    async fn wait_until_reachable(&self, store: &JobStoreRedis) -> Result<()> {
        let mut attempt = 0u32;
        loop {
            match store.ping().await {
                Ok(()) => return Ok(()),
                Err(err) if attempt < self.config.connect_max_retries => {
                    attempt += 1;
                    let delay = backoff_delay_ms(&self.retry_policy(), attempt);
                    tracing::warn!(attempt, delay_ms = delay, "broker not reachable yet: {err:#}");
                    tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
                }
                Err(err) => {
                    return Err(err.context("broker connection failed"));
                }
            }
        }
    }

    /// Enqueue a webhook event. Duplicate event ids return the existing
    /// job instead of creating a second one.
    pub async fn enqueue(&self, data: WebhookJobData) -> Result<EnqueueOutcome> {
        let guard = self.store.read().await;
        let Some(store) = guard.as_ref() else {
            anyhow::bail!("queue manager not initialized");
        };

        let priority = event_priority(&data.event_type);
        let outcome = store.enqueue(data, priority, Utc::now()).await?;
        let job = outcome.job();
        if outcome.is_duplicate() {
            tracing::info!(
                event_id = %job.data.event_id,
                event_type = %job.data.event_type,
                "duplicate webhook event ignored"
            );
        } else {
            tracing::info!(
                event_id = %job.data.event_id,
                event_type = %job.data.event_type,
                priority,
                "webhook job enqueued"
            );
        }
        Ok(outcome)
    }

    /// Point-in-time health snapshot. Broker trouble is reported in the
    /// snapshot, never as an error.
    pub async fn get_health(&self) -> QueueHealth {
        let guard = self.store.read().await;
        let Some(store) = guard.as_ref() else {
            return QueueHealth::unhealthy("queue manager not initialized");
        };

        let counts = match store.counts().await {
            Ok(counts) => counts,
            Err(err) => return QueueHealth::unhealthy(format!("{err:#}")),
        };
        let paused = store.is_paused().await.unwrap_or(false);
        QueueHealth {
            healthy: true,
            paused,
            error: None,
            counts,
        }
    }

    /// Most recent terminal failures. Empty when uninitialized or when
    /// the broker cannot be read; diagnostics must not take the caller
    /// down.
    pub async fn get_failed_jobs(&self, limit: usize) -> Vec<FailedJob> {
        let guard = self.store.read().await;
        let Some(store) = guard.as_ref() else {
            return Vec::new();
        };
        match store.failed_jobs(limit).await {
            Ok(jobs) => jobs,
            Err(err) => {
                tracing::warn!("failed-job listing unavailable: {err:#}");
                Vec::new()
            }
        }
    }

    /// Put a terminally failed job back on the queue. Errors when the job
    /// is unknown or not in the failed state.
    pub async fn retry_failed_job(&self, event_id: &str) -> Result<JobRecord> {
        let guard = self.store.read().await;
        let Some(store) = guard.as_ref() else {
            anyhow::bail!("queue manager not initialized");
        };
        let record = store.retry_failed(event_id, Utc::now()).await?;
        tracing::info!(event_id = %event_id, "failed webhook job requeued by operator");
        Ok(record)
    }

    pub async fn pause(&self) -> Result<()> {
        let guard = self.store.read().await;
        let Some(store) = guard.as_ref() else {
            anyhow::bail!("queue manager not initialized");
        };
        store.set_paused(true).await?;
        tracing::info!("webhook queue paused");
        Ok(())
    }

    pub async fn resume(&self) -> Result<()> {
        let guard = self.store.read().await;
        let Some(store) = guard.as_ref() else {
            anyhow::bail!("queue manager not initialized");
        };
        store.set_paused(false).await?;
        tracing::info!("webhook queue resumed");
        Ok(())
    }

    /// Signal the pool, wait out the drain window, abort stragglers.
    /// No-op when never initialized.
    pub async fn shutdown(&self) {
        let mut write = self.store.write().await;
        if write.is_none() {
            return;
        }

        let _ = self.shutdown_tx.send(true);
        let deadline =
            tokio::time::Instant::now() + std::time::Duration::from_millis(self.config.drain_timeout_ms);
        let mut tasks = self.tasks.lock().await;
        let mut aborted = 0usize;
        for mut handle in tasks.drain(..) {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if tokio::time::timeout(remaining, &mut handle).await.is_err() {
                handle.abort();
                aborted += 1;
            }
        }
        if aborted > 0 {
            tracing::warn!(aborted, "drain timeout elapsed, aborted in-flight workers");
        }
        *write = None;
        tracing::info!("webhook queue shut down");
    }
}
