// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::Serialize;
use social_tracker::config::Config;
use social_tracker::db::{FirestoreDb, MemoryStore};
use social_tracker::error::ReconcileError;
use social_tracker::models::{Subscription, SubscriptionFilters, User};
use social_tracker::routes::create_router;
use social_tracker::services::source::{AccountIdentity, FetchOptions, RemotePost};
use social_tracker::services::{PostSource, ReconcileSettings, Reconciler};
use social_tracker::AppState;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Unique suffix for test isolation against a shared emulator.
#[allow(dead_code)]
pub fn unique_suffix() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos()
        .to_string()
}

// ─── Fake post source ────────────────────────────────────────

/// How a scripted target misbehaves.
#[allow(dead_code)]
#[derive(Debug, Clone, Copy)]
pub enum Failure {
    /// Handle no longer resolves
    AccountGone,
    /// Timeline fetch answers 429
    RateLimited,
    /// Timeline fetch fails outright
    Unavailable,
    /// Timeline fetch never answers in time
    Hang,
}

/// In-memory post source keyed by target handle.
///
/// The account ID for handle `h` is `id-h`. Fetches honour `since` the way
/// the remote API's `start_time` does but apply no other filtering.
#[derive(Default)]
pub struct FakeSource {
    timelines: DashMap<String, Vec<RemotePost>>,
    failures: DashMap<String, Failure>,
    fetch_delay: Option<Duration>,
    resolve_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
}

#[allow(dead_code)]
impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every fetch, so concurrent reconciliations overlap.
    pub fn with_fetch_delay(delay: Duration) -> Self {
        Self {
            fetch_delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn set_timeline(&self, target: &str, posts: Vec<RemotePost>) {
        self.timelines.insert(target.to_string(), posts);
    }

    pub fn push_post(&self, target: &str, post: RemotePost) {
        self.timelines
            .entry(target.to_string())
            .or_default()
            .push(post);
    }

    pub fn fail(&self, target: &str, failure: Failure) {
        self.failures.insert(target.to_string(), failure);
    }

    pub fn recover(&self, target: &str) {
        self.failures.remove(target);
    }

    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    fn failure_for(&self, target: &str) -> Option<Failure> {
        self.failures.get(target).map(|f| *f)
    }
}

#[async_trait]
impl PostSource for FakeSource {
    async fn resolve_account(&self, username: &str) -> Result<AccountIdentity, ReconcileError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(Failure::AccountGone) = self.failure_for(username) {
            return Err(ReconcileError::AccountNotFound(username.to_string()));
        }
        Ok(AccountIdentity {
            id: format!("id-{}", username),
            username: username.to_string(),
            name: None,
        })
    }

    async fn fetch_posts_since(
        &self,
        account_id: &str,
        since: DateTime<Utc>,
        _options: FetchOptions,
    ) -> Result<Vec<RemotePost>, ReconcileError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let target = account_id.trim_start_matches("id-");

        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }

        match self.failure_for(target) {
            Some(Failure::RateLimited) => {
                return Err(ReconcileError::RateLimited {
                    retry_after: Some(Duration::from_secs(30)),
                })
            }
            Some(Failure::Unavailable) => {
                return Err(ReconcileError::SourceUnavailable(
                    "HTTP 503 Service Unavailable".to_string(),
                ))
            }
            Some(Failure::Hang) => {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            _ => {}
        }

        Ok(self
            .timelines
            .get(target)
            .map(|posts| {
                posts
                    .iter()
                    .filter(|p| p.created_at >= since)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

// ─── Fixtures ────────────────────────────────────────────────

/// Reference time two hours in the past, truncated to whole seconds.
#[allow(dead_code)]
pub fn t0() -> DateTime<Utc> {
    let two_hours_ago = Utc::now() - ChronoDuration::hours(2);
    DateTime::from_timestamp(two_hours_ago.timestamp(), 0).unwrap()
}

#[allow(dead_code)]
pub fn remote_post(id: &str, text: &str, created_at: DateTime<Utc>) -> RemotePost {
    RemotePost {
        id: id.to_string(),
        text: text.to_string(),
        author_id: "42".to_string(),
        created_at,
        ..Default::default()
    }
}

#[allow(dead_code)]
pub fn eligible_user(user_id: &str) -> User {
    User {
        user_id: user_id.to_string(),
        display_name: format!("User {}", user_id),
        active: true,
        source_account_linked: true,
        linked_at: Some(Utc::now()),
    }
}

/// A subscription whose checkpoint is `last_checked`.
#[allow(dead_code)]
pub fn subscription_at(
    user_id: &str,
    target: &str,
    filters: SubscriptionFilters,
    last_checked: DateTime<Utc>,
) -> Subscription {
    Subscription::new(user_id, target, filters, last_checked).unwrap()
}

#[allow(dead_code)]
pub fn test_settings() -> ReconcileSettings {
    ReconcileSettings {
        max_results: 20,
        fetch_timeout: Duration::from_millis(200),
    }
}

#[allow(dead_code)]
pub fn test_reconciler(source: Arc<FakeSource>, store: Arc<MemoryStore>) -> Reconciler {
    Reconciler::new(source, store.clone(), store, test_settings())
}

// ─── HTTP ────────────────────────────────────────────────────

/// Handles into a test app backed by the memory store and a fake source.
#[allow(dead_code)]
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub store: Arc<MemoryStore>,
    pub source: Arc<FakeSource>,
}

/// Create a test app with offline dependencies.
#[allow(dead_code)]
pub fn create_test_app() -> TestApp {
    let config = Config::default();
    let store = Arc::new(MemoryStore::new());
    let source = Arc::new(FakeSource::new());
    let reconciler = Arc::new(test_reconciler(source.clone(), store.clone()));

    let state = Arc::new(AppState {
        config,
        posts: store.clone(),
        subscriptions: store.clone(),
        reconciler,
    });

    TestApp {
        router: create_router(state.clone()),
        state,
        store,
        source,
    }
}

/// Create a test JWT for `user_id`.
#[allow(dead_code)]
pub fn create_test_jwt(user_id: &str, signing_key: &[u8]) -> String {
    #[derive(Serialize)]
    struct Claims {
        sub: String,
        exp: usize,
        iat: usize,
    }

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as usize;

    let claims = Claims {
        sub: user_id.to_string(),
        exp: now + 86400,
        iat: now,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )
    .unwrap()
}
