mod api_client;
mod circuit_breaker;
mod config;
mod errors;
mod fields;
mod intake;
mod models;
mod payload;
mod pipeline;
mod queue;
mod router;
mod token;
mod transform;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::queue::{RelayQueue, RetryPolicy};
use crate::router::SubmissionRouter;
use crate::token::{MokaTokenStore, TokenManager};

/// Main entry point for the relay service.
///
/// Initializes tracing and configuration, wires the token manager and API
/// client into the submission router, starts the queue worker, and serves
/// the intake endpoint.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "intake_relay=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    // Token store is process-wide; swap for a shared store when workers are
    // distributed across processes.
    let token_store = Arc::new(MokaTokenStore::new());
    let tokens = Arc::new(TokenManager::new(token_store, &config)?);
    tracing::info!("Token manager initialized");

    let api = api_client::ApiClient::new(&config, tokens)?;
    tracing::info!("Remote API client initialized: {}", config.api_base_url);

    let submission_router = Arc::new(SubmissionRouter::new(api));

    // Relay queue with one worker loop; each task still runs concurrently.
    let (relay_queue, task_rx) = RelayQueue::channel(1024);
    let retry_policy = RetryPolicy {
        max_attempts: config.max_attempts,
        base_delay: Duration::from_secs(config.retry_base_secs),
    };
    queue::spawn_worker(task_rx, relay_queue.clone(), submission_router, retry_policy);
    tracing::info!(
        "Relay queue worker started (max {} attempts, {}s base backoff)",
        config.max_attempts,
        config.retry_base_secs
    );

    // Build application state
    let app_state = Arc::new(intake::AppState {
        config: config.clone(),
        queue: relay_queue,
    });

    // Configure rate limiter: 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .unwrap(),
    );

    // Build protected routes with security layers
    let protected_routes = Router::new()
        .route("/api/v1/intake", post(intake::intake_submission))
        .layer(
            ServiceBuilder::new()
                // Request size limit: 2MB max payload (form submissions are small)
                .layer(RequestBodyLimitLayer::new(2 * 1024 * 1024))
                // Rate limiting: 10 req/sec per IP, burst of 20
                .layer(GovernorLayer {
                    config: governor_conf,
                }),
        );

    // Build final app with health check (bypasses rate limiting)
    let app = Router::new()
        .route("/health", get(intake::health))
        .merge(protected_routes)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
