use crate::domain::job::{EnqueueOutcome, FailedJob, JobCounts, JobRecord, JobState, WebhookJobData};
use crate::queue::policy::waiting_score;
use anyhow::Result;
use chrono::{DateTime, Utc};
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

/// Redis-backed job store. Every job lives in exactly one of the state
/// sets (waiting/delayed/active/completed/failed); the job body itself is
/// a JSON blob keyed by event id. All mutation relies on per-command
/// atomicity of the broker; the store holds no locks of its own.
#[derive(Clone)]
pub struct JobStoreRedis {
    pub client: redis::Client,
    pub prefix: String,
    pub completed_history: usize,
    pub failed_history: usize,
}

impl JobStoreRedis {
    pub fn new(client: redis::Client, prefix: &str, completed_history: usize, failed_history: usize) -> Self {
        Self {
            client,
            prefix: prefix.to_string(),
            completed_history,
            failed_history,
        }
    }

    fn job_key(&self, event_id: &str) -> String {
        format!("{}:job:{}", self.prefix, event_id)
    }

    fn ids_key(&self) -> String {
        format!("{}:ids", self.prefix)
    }

    fn seq_key(&self) -> String {
        format!("{}:seq", self.prefix)
    }

    fn waiting_key(&self) -> String {
        format!("{}:waiting", self.prefix)
    }

    fn delayed_key(&self) -> String {
        format!("{}:delayed", self.prefix)
    }

    fn active_key(&self) -> String {
        format!("{}:active", self.prefix)
    }

    fn completed_key(&self) -> String {
        format!("{}:completed", self.prefix)
    }

    fn failed_key(&self) -> String {
        format!("{}:failed", self.prefix)
    }

    fn paused_key(&self) -> String {
        format!("{}:paused", self.prefix)
    }

    async fn conn(&self) -> Result<MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.conn().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    async fn save_record(&self, conn: &mut MultiplexedConnection, record: &JobRecord) -> Result<()> {
        let payload = serde_json::to_string(record)?;
        let _: () = conn.set(self.job_key(&record.data.event_id), payload).await?;
        Ok(())
    }

    pub async fn load_record(&self, event_id: &str) -> Result<Option<JobRecord>> {
        let mut conn = self.conn().await?;
        let payload: Option<String> = conn.get(self.job_key(event_id)).await?;
        match payload {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    /// Idempotent enqueue: the id registry is the dedup gate. A second
    /// submission of a known event id returns the existing job untouched.
    pub async fn enqueue(
        &self,
        data: WebhookJobData,
        priority: i64,
        now: DateTime<Utc>,
    ) -> Result<EnqueueOutcome> {
        let mut conn = self.conn().await?;

        let added: i64 = conn.sadd(self.ids_key(), &data.event_id).await?;
        if added == 0 {
            if let Some(existing) = self.load_record(&data.event_id).await? {
                return Ok(EnqueueOutcome::Duplicate(existing));
            }
            // registry entry without a body: a previous eviction was cut
            // short, so recreate the job from scratch
        }

        let record = JobRecord::new(data, priority, now);
        self.save_record(&mut conn, &record).await?;
        let seq: u64 = conn.incr(self.seq_key(), 1).await?;
        let _: () = conn
            .zadd(
                self.waiting_key(),
                &record.data.event_id,
                waiting_score(priority, seq),
            )
            .await?;
        Ok(EnqueueOutcome::Created(record))
    }

    /// Pop the best waiting job and lease it until `now + lease_ms`.
    /// The attempt counter increments here; a lease that expires without a
    /// recorded outcome is what the stalled sweep looks for.
    pub async fn pop_next(&self, now: DateTime<Utc>, lease_ms: u64) -> Result<Option<JobRecord>> {
        let mut conn = self.conn().await?;
        let popped: Vec<(String, f64)> = redis::cmd("ZPOPMIN")
            .arg(self.waiting_key())
            .arg(1)
            .query_async(&mut conn)
            .await?;
        let Some((event_id, _score)) = popped.into_iter().next() else {
            return Ok(None);
        };

        let Some(mut record) = self.load_record(&event_id).await? else {
            tracing::warn!(event_id = %event_id, "waiting entry without job body, dropping");
            let _: i64 = conn.srem(self.ids_key(), &event_id).await?;
            return Ok(None);
        };

        record.state = JobState::Active;
        record.attempts_made += 1;
        record.started_at = Some(now);
        self.save_record(&mut conn, &record).await?;

        let deadline = now.timestamp_millis() + lease_ms as i64;
        let _: () = conn.zadd(self.active_key(), &event_id, deadline).await?;
        Ok(Some(record))
    }

    pub async fn mark_completed(&self, record: &mut JobRecord, now: DateTime<Utc>) -> Result<()> {
        let mut conn = self.conn().await?;
        self.clear_membership(&mut conn, &record.data.event_id).await?;
        record.state = JobState::Completed;
        record.finished_at = Some(now);
        record.failure_reason = None;
        self.save_record(&mut conn, record).await?;
        let _: () = conn
            .zadd(self.completed_key(), &record.data.event_id, now.timestamp_millis())
            .await?;
        self.trim_history(&mut conn, &self.completed_key(), self.completed_history)
            .await?;
        Ok(())
    }

    /// Park a failed attempt in the delayed set until its backoff elapses.
    pub async fn retry_later(
        &self,
        record: &mut JobRecord,
        delay_ms: u64,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let mut conn = self.conn().await?;
        self.clear_membership(&mut conn, &record.data.event_id).await?;
        record.state = JobState::Delayed;
        record.failure_reason = Some(reason.to_string());
        self.save_record(&mut conn, record).await?;
        let due = now.timestamp_millis() + delay_ms as i64;
        let _: () = conn.zadd(self.delayed_key(), &record.data.event_id, due).await?;
        Ok(())
    }

    pub async fn mark_failed(&self, record: &mut JobRecord, reason: &str, now: DateTime<Utc>) -> Result<()> {
        let mut conn = self.conn().await?;
        self.clear_membership(&mut conn, &record.data.event_id).await?;
        record.state = JobState::Failed;
        record.finished_at = Some(now);
        record.failure_reason = Some(reason.to_string());
        self.save_record(&mut conn, record).await?;
        let _: () = conn
            .zadd(self.failed_key(), &record.data.event_id, now.timestamp_millis())
            .await?;
        self.trim_history(&mut conn, &self.failed_key(), self.failed_history)
            .await?;
        Ok(())
    }

    /// Move delayed jobs whose due time has passed back into the waiting
    /// set. Returns how many were promoted.
    pub async fn promote_due(&self, now: DateTime<Utc>, limit: usize) -> Result<u64> {
        let mut conn = self.conn().await?;
        let due: Vec<String> = conn
            .zrangebyscore_limit(
                self.delayed_key(),
                "-inf",
                now.timestamp_millis(),
                0,
                limit as isize,
            )
            .await?;

        let mut promoted = 0u64;
        for event_id in due {
            let removed: i64 = conn.zrem(self.delayed_key(), &event_id).await?;
            if removed == 0 {
                continue;
            }
            let Some(mut record) = self.load_record(&event_id).await? else {
                continue;
            };
            record.state = JobState::Waiting;
            self.save_record(&mut conn, &record).await?;
            let seq: u64 = conn.incr(self.seq_key(), 1).await?;
            let _: () = conn
                .zadd(self.waiting_key(), &event_id, waiting_score(record.priority, seq))
                .await?;
            promoted += 1;
        }
        Ok(promoted)
    }

    /// Event ids whose active lease deadline has passed.
    pub async fn expired_leases(&self, now: DateTime<Utc>) -> Result<Vec<String>> {
        let mut conn = self.conn().await?;
        let expired: Vec<String> = conn
            .zrangebyscore_limit(self.active_key(), "-inf", now.timestamp_millis(), 0, 100)
            .await?;
        Ok(expired)
    }

    pub async fn requeue_stalled(&self, record: &mut JobRecord) -> Result<()> {
        let mut conn = self.conn().await?;
        self.clear_membership(&mut conn, &record.data.event_id).await?;
        record.state = JobState::Waiting;
        record.started_at = None;
        self.save_record(&mut conn, record).await?;
        let seq: u64 = conn.incr(self.seq_key(), 1).await?;
        let _: () = conn
            .zadd(
                self.waiting_key(),
                &record.data.event_id,
                waiting_score(record.priority, seq),
            )
            .await?;
        Ok(())
    }

    pub async fn drop_active(&self, event_id: &str) -> Result<()> {
        let mut conn = self.conn().await?;
        let _: i64 = conn.zrem(self.active_key(), event_id).await?;
        Ok(())
    }

    /// Operator-triggered retry of a terminally failed job. The attempt
    /// budget starts over.
    pub async fn retry_failed(&self, event_id: &str, now: DateTime<Utc>) -> Result<JobRecord> {
        let Some(mut record) = self.load_record(event_id).await? else {
            anyhow::bail!("webhook job {} not found", event_id);
        };
        if record.state != JobState::Failed {
            anyhow::bail!("webhook job {} is not in the failed state", event_id);
        }

        let mut conn = self.conn().await?;
        let _: i64 = conn.zrem(self.failed_key(), event_id).await?;
        record.state = JobState::Waiting;
        record.attempts_made = 0;
        record.stall_count = 0;
        record.started_at = None;
        record.finished_at = None;
        record.enqueued_at = now;
        self.save_record(&mut conn, &record).await?;
        let seq: u64 = conn.incr(self.seq_key(), 1).await?;
        let _: () = conn
            .zadd(self.waiting_key(), event_id, waiting_score(record.priority, seq))
            .await?;
        Ok(record)
    }

    /// Most recent terminal failures, newest first.
    pub async fn failed_jobs(&self, limit: usize) -> Result<Vec<FailedJob>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut conn = self.conn().await?;
        let ids: Vec<String> = conn
            .zrevrange(self.failed_key(), 0, limit.saturating_sub(1) as isize)
            .await?;

        let mut out = Vec::with_capacity(ids.len());
        for event_id in ids {
            if let Some(record) = self.load_record(&event_id).await? {
                out.push(FailedJob::from_record(&record));
            }
        }
        Ok(out)
    }

    pub async fn counts(&self) -> Result<JobCounts> {
        let mut conn = self.conn().await?;
        let waiting: u64 = conn.zcard(self.waiting_key()).await?;
        let active: u64 = conn.zcard(self.active_key()).await?;
        let delayed: u64 = conn.zcard(self.delayed_key()).await?;
        let completed: u64 = conn.zcard(self.completed_key()).await?;
        let failed: u64 = conn.zcard(self.failed_key()).await?;
        Ok(JobCounts {
            waiting,
            active,
            delayed,
            completed,
            failed,
        })
    }

    pub async fn is_paused(&self) -> Result<bool> {
        let mut conn = self.conn().await?;
        let flag: Option<String> = conn.get(self.paused_key()).await?;
        Ok(flag.as_deref() == Some("1"))
    }

    pub async fn set_paused(&self, paused: bool) -> Result<()> {
        let mut conn = self.conn().await?;
        if paused {
            let _: () = conn.set(self.paused_key(), "1").await?;
        } else {
            let _: i64 = conn.del(self.paused_key()).await?;
        }
        Ok(())
    }

    async fn clear_membership(&self, conn: &mut MultiplexedConnection, event_id: &str) -> Result<()> {
        let _: i64 = conn.zrem(self.waiting_key(), event_id).await?;
        let _: i64 = conn.zrem(self.delayed_key(), event_id).await?;
        let _: i64 = conn.zrem(self.active_key(), event_id).await?;
        Ok(())
    }

    /// Bound a history set, deleting evicted job bodies and freeing their
    /// ids for re-enqueue.
    async fn trim_history(
        &self,
        conn: &mut MultiplexedConnection,
        history_key: &str,
        bound: usize,
    ) -> Result<()> {
        let size: u64 = conn.zcard(history_key).await?;
        if size <= bound as u64 {
            return Ok(());
        }
        let excess = (size - bound as u64) as isize;
        let evicted: Vec<String> = conn.zrange(history_key, 0, excess - 1).await?;
        for event_id in evicted {
            let _: i64 = conn.zrem(history_key, &event_id).await?;
            let _: i64 = conn.del(self.job_key(&event_id)).await?;
            let _: i64 = conn.srem(self.ids_key(), &event_id).await?;
        }
        Ok(())
    }
}
