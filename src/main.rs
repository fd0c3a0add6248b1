// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Social-Tracker API Server
//!
//! Polls subscribed social media accounts on a schedule and serves the
//! stored posts, with on-demand refresh.

use social_tracker::{
    config::Config,
    db::FirestoreDb,
    services::{scheduler, RateLimitedSource, Reconciler, SocialApiClient},
    AppState,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Requests allowed back to back before the per-minute rate applies.
const SOURCE_BURST: u32 = 5;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Social-Tracker API");

    // Initialize Firestore database
    let db = Arc::new(FirestoreDb::new(&config.gcp_project_id).await?);

    // Post source: one client, one shared outbound quota
    let client = SocialApiClient::new(
        &config.social_api_base_url,
        config.social_api_bearer_token.clone(),
        Duration::from_secs(config.fetch_timeout_secs),
    )?;
    let source = RateLimitedSource::per_minute(
        client,
        config.source_requests_per_minute,
        SOURCE_BURST,
    );
    tracing::info!(
        base_url = %config.social_api_base_url,
        requests_per_minute = config.source_requests_per_minute,
        "Post source initialized"
    );

    let reconciler = Arc::new(Reconciler::new(
        Arc::new(source),
        db.clone(),
        db.clone(),
        config.reconcile_settings(),
    ));

    // Scheduled sweep over all eligible users
    let sweep = scheduler::spawn_sweep(reconciler.clone(), config.sweep_interval());
    tracing::info!(
        interval_minutes = config.sweep_interval_minutes,
        "Polling sweep scheduled"
    );

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        posts: db.clone(),
        subscriptions: db,
        reconciler,
    });

    // Build router
    let app = social_tracker::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    let result = axum::serve(listener, app).await;
    sweep.abort();
    result?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("social_tracker=debug,info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(format)
        .init();
}
