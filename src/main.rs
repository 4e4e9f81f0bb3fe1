use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use webhook_queue::config::QueueConfig;
use webhook_queue::processor::http_forward::HttpForwardProcessor;
use webhook_queue::processor::mock::MockProcessor;
use webhook_queue::processor::WebhookProcessor;
use webhook_queue::queue::manager::QueueManager;
use webhook_queue::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = QueueConfig::from_env();

    let processor: Arc<dyn WebhookProcessor> = match cfg.processor_mode.as_str() {
        "mock" => Arc::new(MockProcessor::new(
            &std::env::var("PROCESSOR_MOCK_BEHAVIOR").unwrap_or_default(),
        )),
        _ => Arc::new(HttpForwardProcessor {
            endpoint: cfg.processor_url.clone(),
            timeout_ms: std::env::var("PROCESSOR_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(10_000),
            client: reqwest::Client::new(),
        }),
    };

    let queue = Arc::new(QueueManager::new(cfg.clone(), processor));
    queue.initialize().await?;

    let state = AppState {
        queue: Arc::clone(&queue),
    };

    let admin_key = cfg.internal_api_key.clone();
    let admin_routes = Router::new()
        .route(
            "/queue/jobs",
            post(webhook_queue::http::handlers::queue_admin::enqueue_job),
        )
        .route(
            "/queue/failed/:event_id/retry",
            post(webhook_queue::http::handlers::queue_admin::retry_failed),
        )
        .route("/queue/pause", post(webhook_queue::http::handlers::queue_admin::pause))
        .route("/queue/resume", post(webhook_queue::http::handlers::queue_admin::resume))
        .layer(from_fn_with_state(
            admin_key,
            webhook_queue::http::middleware::admin_auth::require_internal_api_key,
        ));

    let app = Router::new()
        .route("/queue/health", get(webhook_queue::http::handlers::queue_admin::queue_health))
        .route("/queue/failed", get(webhook_queue::http::handlers::queue_admin::list_failed))
        .route("/ops/readiness", get(webhook_queue::http::handlers::ops::readiness))
        .route("/ops/liveness", get(webhook_queue::http::handlers::ops::liveness))
        .merge(admin_routes)
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    tracing::info!("listening on {}", cfg.bind_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await?;

    queue.shutdown().await;
    Ok(())
}
