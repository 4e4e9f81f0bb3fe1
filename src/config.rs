fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse::<T>().ok())
        .unwrap_or(default)
}

#[derive(Clone)]
pub struct QueueConfig {
    pub redis_url: String,
    pub key_prefix: String,
    pub concurrency: usize,
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_cap_ms: u64,
    pub stall_interval_ms: u64,
    pub max_stalls: u32,
    pub completed_history: usize,
    pub failed_history: usize,
    pub drain_timeout_ms: u64,
    pub ready_check: bool,
    pub connect_max_retries: u32,
    pub bind_addr: String,
    pub internal_api_key: String,
    pub processor_mode: String,
    pub processor_url: String,
}

impl QueueConfig {
    pub fn from_env() -> Self {
        Self {
            redis_url: redis_url_from_env(),
            key_prefix: env_or("QUEUE_KEY_PREFIX", "webhooks:queue:v1"),
            concurrency: env_parse("QUEUE_CONCURRENCY", 4),
            max_attempts: env_parse("QUEUE_MAX_ATTEMPTS", 3),
            backoff_base_ms: env_parse("QUEUE_BACKOFF_BASE_MS", 5_000),
            backoff_cap_ms: env_parse("QUEUE_BACKOFF_CAP_MS", 300_000),
            stall_interval_ms: env_parse("QUEUE_STALL_INTERVAL_MS", 30_000),
            max_stalls: env_parse("QUEUE_MAX_STALLS", 2),
            completed_history: env_parse("QUEUE_COMPLETED_HISTORY", 1_000),
            failed_history: env_parse("QUEUE_FAILED_HISTORY", 5_000),
            drain_timeout_ms: env_parse("QUEUE_DRAIN_TIMEOUT_MS", 30_000),
            ready_check: env_parse("QUEUE_READY_CHECK", true),
            connect_max_retries: env_parse("QUEUE_CONNECT_MAX_RETRIES", 5),
            bind_addr: env_or("BIND_ADDR", "0.0.0.0:3001"),
            internal_api_key: env_or("INTERNAL_API_KEY", "dev-internal-key"),
            processor_mode: env_or("PROCESSOR_MODE", "http"),
            processor_url: env_or("PROCESSOR_URL", "http://127.0.0.1:3000/internal/webhooks/process"),
        }
    }
}

// REDIS_URL wins when set; otherwise the URL is assembled from the
// individual host/port/password/db variables the deploy environment exposes.
fn redis_url_from_env() -> String {
    if let Ok(url) = std::env::var("REDIS_URL") {
        return url;
    }
    let host = env_or("REDIS_HOST", "127.0.0.1");
    let port = env_or("REDIS_PORT", "6379");
    let db = env_or("REDIS_DB", "0");
    match std::env::var("REDIS_PASSWORD") {
        Ok(password) if !password.is_empty() => {
            format!("redis://:{}@{}:{}/{}", password, host, port, db)
        }
        _ => format!("redis://{}:{}/{}", host, port, db),
    }
}
