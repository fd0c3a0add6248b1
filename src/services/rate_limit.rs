// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Token-bucket throttling for outbound post source calls.
//!
//! Permits come from one shared limiter, so the scheduled sweep and manual
//! refreshes draw from the same budget. The wait happens in
//! `acquire_permit`, never inside a remote call, so time spent queued for a
//! permit does not count against a call's timeout.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

use crate::error::ReconcileError;
use crate::services::source::{AccountIdentity, FetchOptions, PostSource, RemotePost};

type DefaultRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// A post source wrapper that enforces a request quota.
pub struct RateLimitedSource<S: PostSource> {
    inner: S,
    limiter: Arc<DefaultRateLimiter>,
}

impl<S: PostSource> RateLimitedSource<S> {
    /// Allow `requests_per_minute` sustained, with bursts up to `burst`.
    /// Zero values are raised to one.
    pub fn per_minute(inner: S, requests_per_minute: u32, burst: u32) -> Self {
        let rate = NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN);
        Self::with_quota(inner, Quota::per_minute(rate).allow_burst(burst))
    }

    /// Create with a custom quota.
    pub fn with_quota(inner: S, quota: Quota) -> Self {
        Self {
            inner,
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }
}

#[async_trait]
impl<S: PostSource> PostSource for RateLimitedSource<S> {
    async fn acquire_permit(&self) {
        self.limiter.until_ready().await;
        self.inner.acquire_permit().await;
    }

    async fn resolve_account(&self, username: &str) -> Result<AccountIdentity, ReconcileError> {
        self.inner.resolve_account(username).await
    }

    async fn fetch_posts_since(
        &self,
        account_id: &str,
        since: DateTime<Utc>,
        options: FetchOptions,
    ) -> Result<Vec<RemotePost>, ReconcileError> {
        self.inner
            .fetch_posts_since(account_id, since, options)
            .await
    }
}
