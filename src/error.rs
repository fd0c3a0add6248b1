// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::time::Duration;

use crate::models::SubscriptionStateError;

/// Persistence errors shared by every store implementation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// A record with the same unique key already exists.
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Database error: {0}")]
    Database(String),
}

/// Failures of a single reconciliation.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Rate limited by post source (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Post source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Invalid subscription state: {0}")]
    InvalidSubscriptionState(#[from] SubscriptionStateError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateKey(key) => AppError::Conflict(key),
            StoreError::Database(msg) => AppError::Database(msg),
        }
    }
}

impl From<SubscriptionStateError> for AppError {
    fn from(err: SubscriptionStateError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut retry_after = None;

        let (status, error, details) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", Some(msg.clone())),
            AppError::Reconcile(err) => match err {
                ReconcileError::AccountNotFound(target) => (
                    StatusCode::NOT_FOUND,
                    "account_not_found",
                    Some(target.clone()),
                ),
                ReconcileError::RateLimited { retry_after: after } => {
                    retry_after = *after;
                    (StatusCode::TOO_MANY_REQUESTS, "rate_limited", None)
                }
                ReconcileError::SourceUnavailable(msg) => (
                    StatusCode::BAD_GATEWAY,
                    "source_unavailable",
                    Some(msg.clone()),
                ),
                ReconcileError::InvalidSubscriptionState(e) => (
                    StatusCode::BAD_REQUEST,
                    "invalid_subscription",
                    Some(e.to_string()),
                ),
                ReconcileError::Store(e) => {
                    tracing::error!(error = %e, "Store error during reconciliation");
                    (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
                }
            },
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(after) = retry_after {
            if let Ok(value) = HeaderValue::from_str(&after.as_secs().max(1).to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
