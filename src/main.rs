//! Mailguard - support-email classification with PII masking.
//!
//! Standalone HTTP server; see `handlers::classify` for the wire contract.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower::limit::ConcurrencyLimitLayer;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::timeout::TimeoutLayer;
use tracing::info;

use mailguard::classifier::{ClassifierConfig, OnnxTicketClassifier};
use mailguard::config::ServerConfig;
use mailguard::handlers::{build_api_routes, build_public_routes, ServiceState};
use mailguard::masking::MaskingEngine;
use mailguard::metrics;
use mailguard::middleware;
use mailguard::ner::{BertNameRecognizer, NerConfig};
#[cfg(feature = "telemetry")]
use mailguard::tracing_setup;

#[tokio::main]
async fn main() -> Result<()> {
    #[cfg(feature = "telemetry")]
    {
        tracing_setup::init_tracing().expect("Failed to initialize tracing");
    }
    #[cfg(not(feature = "telemetry"))]
    {
        tracing_subscriber::fmt::init();
        info!("Console logging initialized (telemetry disabled)");
    }

    metrics::register_metrics().expect("Failed to register metrics");
    info!("Metrics registered at /metrics");

    info!("Starting mailguard server...");

    let server_config = ServerConfig::from_env();
    server_config.log();

    // The recognizer is a hard dependency: serving without name redaction
    // would hand out incompletely masked emails.
    let recognizer = BertNameRecognizer::load(NerConfig::from_env())
        .context("name recognizer failed to load; refusing to start")?;
    let engine = MaskingEngine::new(Arc::new(recognizer));

    let classifier = OnnxTicketClassifier::new(ClassifierConfig::from_env());
    if !classifier.model_files_present() {
        tracing::warn!(
            "Classifier model files not found yet; /classify will fail until they appear"
        );
    }

    let state = Arc::new(ServiceState::new(
        engine,
        Arc::new(classifier),
        server_config.clone(),
    ));

    // Rate limiting from config
    let governor_conf = GovernorConfigBuilder::default()
        .per_second(server_config.rate_limit_per_second)
        .burst_size(server_config.rate_limit_burst)
        .finish()
        .expect("Failed to build governor rate limiter configuration");
    let governor_layer = GovernorLayer::new(governor_conf);

    info!(
        "Rate limiting enabled: {} req/sec, burst of {}",
        server_config.rate_limit_per_second, server_config.rate_limit_burst
    );

    let cors = server_config.cors.to_layer();

    // API routes get the timeout and rate limiter; health and metrics stay
    // reachable for probes and scrapers regardless of load.
    let api_routes = build_api_routes(state.clone())
        .layer(TimeoutLayer::new(std::time::Duration::from_secs(
            server_config.request_timeout_secs,
        )))
        .layer(governor_layer);

    let public_routes = build_public_routes(state.clone());

    let app = axum::Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(axum::middleware::from_fn(middleware::track_metrics))
        .layer(ConcurrencyLimitLayer::new(
            server_config.max_concurrent_requests,
        ))
        .layer(cors);

    let addr = format!("{}:{}", server_config.host, server_config.port);
    info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    #[cfg(feature = "telemetry")]
    tracing_setup::shutdown_tracing();

    info!("Server shutdown complete");

    Ok(())
}

/// Handle graceful shutdown
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}
