// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HTTP route handlers.

pub mod api;

use crate::middleware::require_auth;
use crate::AppState;
use axum::extract::State;
use axum::http::{header, request::Parts, HeaderValue, Method};
use axum::{middleware, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub build_id: &'static str,
    pub sweep_interval_minutes: u64,
}

/// Liveness probe; also reports how often the polling sweep runs.
async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        build_id: option_env!("BUILD_ID").unwrap_or("unknown"),
        sweep_interval_minutes: state.config.sweep_interval_minutes,
    })
}

/// Allow the configured frontend plus local dev servers.
fn cors_layer(frontend_url: String) -> CorsLayer {
    let allowed = move |origin: &HeaderValue, _parts: &Parts| {
        origin.to_str().is_ok_and(|origin| {
            origin == frontend_url
                || origin.starts_with("http://localhost")
                || origin.starts_with("http://127.0.0.1")
        })
    };

    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(allowed))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
}

/// Build the complete router: `/health` is public, everything under `/api`
/// needs a bearer token.
pub fn create_router(state: Arc<AppState>) -> Router {
    let authenticated =
        api::routes().route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/health", get(health_check))
        .merge(authenticated)
        .layer(cors_layer(state.config.frontend_url.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}
