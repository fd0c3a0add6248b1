// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated users.

use crate::db::PostQuery;
use crate::error::{AppError, Result, StoreError};
use crate::middleware::auth::AuthUser;
use crate::models::subscription::DEFAULT_CHECK_INTERVAL_MINUTES;
use crate::models::{Post, Subscription, SubscriptionFilters};
use crate::services::BatchSummary;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

const DEFAULT_POST_LIMIT: u32 = 50;
const MAX_POST_LIMIT: u32 = 200;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/subscriptions",
            get(list_subscriptions).post(create_subscription),
        )
        .route("/api/subscriptions/{id}", delete(delete_subscription))
        .route("/api/subscriptions/{id}/refresh", post(refresh_subscription))
        .route("/api/refresh", post(refresh_all))
        .route("/api/posts", get(list_posts))
        .route("/api/posts/{id}/read", post(mark_post_read))
}

/// Load a subscription and check it belongs to the caller.
async fn owned_subscription(state: &AppState, user: &AuthUser, id: &str) -> Result<Subscription> {
    state
        .subscriptions
        .get_subscription(id)
        .await?
        .filter(|s| s.user_id == user.user_id)
        .ok_or_else(|| AppError::NotFound(format!("Subscription {}", id)))
}

// ─── Subscriptions ───────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSubscriptionRequest {
    #[validate(length(min = 1, max = 50))]
    pub target_username: String,
    #[validate(range(min = 15, max = 1440))]
    pub check_interval_minutes: Option<u32>,
    #[validate(length(max = 20))]
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub include_replies: bool,
    #[serde(default)]
    pub include_retweets: bool,
}

impl CreateSubscriptionRequest {
    fn filters(&self) -> SubscriptionFilters {
        SubscriptionFilters {
            check_interval_minutes: self
                .check_interval_minutes
                .unwrap_or(DEFAULT_CHECK_INTERVAL_MINUTES),
            keywords: self.keywords.clone(),
            include_replies: self.include_replies,
            include_retweets: self.include_retweets,
        }
    }
}

async fn list_subscriptions(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<Subscription>>> {
    let subscriptions = state
        .subscriptions
        .list_active_subscriptions(&user.user_id)
        .await?;
    Ok(Json(subscriptions))
}

/// Create a subscription, or reactivate a soft-deleted one for the same target.
async fn create_subscription(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<CreateSubscriptionRequest>,
) -> Result<(StatusCode, Json<Subscription>)> {
    request
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let now = chrono::Utc::now();
    let subscription =
        Subscription::new(&user.user_id, &request.target_username, request.filters(), now)?;

    match state.subscriptions.create_subscription(&subscription).await {
        Ok(()) => {
            tracing::info!(
                user_id = %user.user_id,
                target = %subscription.target_username,
                "Subscription created"
            );
            return Ok((StatusCode::CREATED, Json(subscription)));
        }
        Err(StoreError::DuplicateKey(_)) => {}
        Err(e) => return Err(e.into()),
    }

    let mut existing = owned_subscription(&state, &user, &subscription.id).await?;
    if existing.active {
        return Err(AppError::Conflict(format!(
            "Already subscribed to {}",
            existing.target_username
        )));
    }

    existing.reactivate(request.filters(), now)?;
    state.subscriptions.save_subscription(&existing).await?;

    tracing::info!(
        user_id = %user.user_id,
        target = %existing.target_username,
        "Subscription reactivated"
    );
    Ok((StatusCode::OK, Json(existing)))
}

/// Soft delete: the subscription and its posts are kept.
async fn delete_subscription(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let mut subscription = owned_subscription(&state, &user, &id).await?;
    if subscription.active {
        subscription.deactivate(chrono::Utc::now());
        state.subscriptions.save_subscription(&subscription).await?;
        tracing::info!(user_id = %user.user_id, subscription_id = %id, "Subscription deactivated");
    }
    Ok(StatusCode::NO_CONTENT)
}

// ─── Refresh ─────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub new_posts: usize,
}

#[derive(Debug, Serialize)]
pub struct RefreshFailure {
    pub target: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct RefreshAllResponse {
    pub processed: usize,
    pub new_posts: usize,
    pub errors: Vec<RefreshFailure>,
}

impl From<BatchSummary> for RefreshAllResponse {
    fn from(summary: BatchSummary) -> Self {
        Self {
            processed: summary.processed,
            new_posts: summary.new_posts,
            errors: summary
                .failures
                .into_iter()
                .map(|f| RefreshFailure {
                    target: f.target,
                    error: f.message,
                })
                .collect(),
        }
    }
}

/// Reconcile one subscription now, regardless of its interval.
async fn refresh_subscription(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<RefreshResponse>> {
    let subscription = owned_subscription(&state, &user, &id).await?;
    if !subscription.active {
        return Err(AppError::BadRequest(format!(
            "Subscription {} is inactive",
            id
        )));
    }

    let outcome = state.reconciler.reconcile_one(&subscription).await?;
    Ok(Json(RefreshResponse {
        new_posts: outcome.new_posts,
    }))
}

/// Reconcile every due subscription of the caller.
async fn refresh_all(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<RefreshAllResponse>> {
    let summary = state
        .reconciler
        .reconcile_all_for_user(&user.user_id)
        .await?;
    Ok(Json(summary.into()))
}

// ─── Posts ───────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct PostsQuery {
    subscription_id: Option<String>,
    #[serde(default)]
    unread_only: bool,
    limit: Option<u32>,
}

async fn list_posts(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<PostsQuery>,
) -> Result<Json<Vec<Post>>> {
    let query = PostQuery {
        subscription_id: params.subscription_id,
        unread_only: params.unread_only,
        limit: params
            .limit
            .unwrap_or(DEFAULT_POST_LIMIT)
            .clamp(1, MAX_POST_LIMIT),
    };

    let posts = state
        .posts
        .list_posts_for_user(&user.user_id, &query)
        .await?;
    Ok(Json(posts))
}

async fn mark_post_read(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    if state.posts.mark_post_read(&user.user_id, &id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Post {}", id)))
    }
}
