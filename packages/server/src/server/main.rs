// Main entry point for API server

use std::sync::Arc;

use anyhow::{Context, Result};
use server_core::{
    server::{build_app, AppState},
    Config,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url_features::{pacer_for, FeatureExtractor, LogisticModel};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,url_features=debug,server_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting URL risk scoring API");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!("Configuration loaded");

    // Load the model once; handlers share it read-only
    let model = LogisticModel::load(&config.model_path)
        .with_context(|| format!("Failed to load model from {}", config.model_path.display()))?;
    tracing::info!(path = %config.model_path.display(), "Model loaded");

    let extractor_config = config.extractor_config();
    // Extractor and scheduler share one pacer so the rate cap is global
    let pacer = pacer_for(&extractor_config.pacing);
    let extractor = FeatureExtractor::builder(extractor_config)
        .pacer(pacer.clone())
        .build()
        .context("Failed to build feature extractor")?;

    // Build application
    let state = AppState::new(
        Arc::new(extractor),
        pacer,
        config.batch_config(),
        Arc::new(model),
    );
    let app = build_app(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", addr);
    tracing::info!("Health check: http://localhost:{}/health", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await
        .context("Server error")?;

    Ok(())
}
