// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Subscription reconciliation.
//!
//! Handles the core workflow:
//! 1. Resolve the target account and fetch posts since the checkpoint
//! 2. Apply reply/retweet exclusion and keyword filters
//! 3. Skip posts already stored (by remote ID)
//! 4. Store new posts; a uniqueness rejection counts as "already stored"
//! 5. Advance the checkpoint to the current time
//!
//! Errors before step 5 leave the checkpoint untouched, so the next run
//! re-fetches the same window and dedupes.

use chrono::{DateTime, Utc};
use futures_util::{stream, StreamExt};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::db::{PostStore, SubscriptionStore};
use crate::error::{ReconcileError, StoreError};
use crate::models::{Post, Subscription};
use crate::services::source::{FetchOptions, PostSource, ReferenceKind, RemotePost};

/// Link URLs containing one of these are treated as media.
const MEDIA_HOST_MARKERS: &[&str] = &[
    "pbs.twimg.com",
    "video.twimg.com",
    "pic.twitter.com",
    "/photo/",
    "/video/",
];

/// Users reconciled at once during a sweep. Source calls still share one
/// rate limiter.
const MAX_CONCURRENT_USERS: usize = 4;

/// Tunables for a reconciler.
#[derive(Debug, Clone, Copy)]
pub struct ReconcileSettings {
    /// Page size requested from the source
    pub max_results: u32,
    /// Upper bound for each remote call
    pub fetch_timeout: Duration,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            max_results: 20,
            fetch_timeout: Duration::from_secs(15),
        }
    }
}

/// Result of reconciling one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub new_posts: usize,
}

/// One subscription that failed within a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionFailure {
    pub target: String,
    pub message: String,
}

/// Result of reconciling all due subscriptions of one user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub processed: usize,
    pub new_posts: usize,
    pub failures: Vec<SubscriptionFailure>,
}

/// Result of a system-wide sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub users: usize,
    pub users_failed: usize,
    pub subscriptions_processed: usize,
    pub subscriptions_failed: usize,
    pub new_posts: usize,
}

/// Reconciliation engine. Collaborators are injected; nothing is global.
pub struct Reconciler {
    source: Arc<dyn PostSource>,
    posts: Arc<dyn PostStore>,
    subscriptions: Arc<dyn SubscriptionStore>,
    settings: ReconcileSettings,
}

impl Reconciler {
    pub fn new(
        source: Arc<dyn PostSource>,
        posts: Arc<dyn PostStore>,
        subscriptions: Arc<dyn SubscriptionStore>,
        settings: ReconcileSettings,
    ) -> Self {
        Self {
            source,
            posts,
            subscriptions,
            settings,
        }
    }

    /// Fetch, filter, dedupe and store new posts for one subscription, then
    /// advance its checkpoint. The caller decides whether an inactive
    /// subscription should be reconciled.
    pub async fn reconcile_one(
        &self,
        subscription: &Subscription,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        subscription.validate()?;

        tracing::info!(
            subscription_id = %subscription.id,
            target = %subscription.target_username,
            since = %subscription.last_checked,
            "Reconciling subscription"
        );

        let account = self
            .call_source(self.source.resolve_account(&subscription.target_username))
            .await?;

        let options = FetchOptions {
            max_results: self.settings.max_results,
            exclude_replies: !subscription.include_replies,
            exclude_retweets: !subscription.include_retweets,
        };
        let fetched = self
            .call_source(self.source.fetch_posts_since(
                &account.id,
                subscription.last_checked,
                options,
            ))
            .await?;

        let fetched_count = fetched.len();
        let candidates: Vec<RemotePost> = fetched
            .into_iter()
            .filter(|post| passes_filters(subscription, post))
            .collect();

        let mut new_posts = 0;
        for remote in &candidates {
            if self.posts.find_post_by_remote_id(&remote.id).await?.is_some() {
                continue;
            }

            let post = build_post(subscription, &account.username, remote, Utc::now());
            match self.posts.insert_post(&post).await {
                Ok(()) => new_posts += 1,
                Err(StoreError::DuplicateKey(_)) => {
                    tracing::debug!(
                        subscription_id = %subscription.id,
                        remote_id = %remote.id,
                        "Post stored concurrently (idempotent skip)"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        // Never move the watermark backwards, even if the clock does.
        let checkpoint = Utc::now().max(subscription.last_checked);
        self.subscriptions
            .update_subscription_checkpoint(&subscription.id, checkpoint)
            .await?;

        tracing::info!(
            subscription_id = %subscription.id,
            fetched = fetched_count,
            candidates = candidates.len(),
            new_posts,
            "Subscription reconciled"
        );

        Ok(ReconcileOutcome { new_posts })
    }

    /// Reconcile every active subscription of a user that is due. One
    /// failing subscription never stops the rest.
    pub async fn reconcile_all_for_user(
        &self,
        user_id: &str,
    ) -> Result<BatchSummary, ReconcileError> {
        let subscriptions = self.subscriptions.list_active_subscriptions(user_id).await?;
        let mut summary = BatchSummary::default();

        for subscription in &subscriptions {
            if !subscription.is_due(Utc::now()) {
                continue;
            }

            match self.reconcile_one(subscription).await {
                Ok(outcome) => {
                    summary.processed += 1;
                    summary.new_posts += outcome.new_posts;
                }
                Err(e) => {
                    tracing::warn!(
                        user_id,
                        subscription_id = %subscription.id,
                        target = %subscription.target_username,
                        error = %e,
                        "Subscription reconciliation failed"
                    );
                    summary.failures.push(SubscriptionFailure {
                        target: subscription.target_username.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            user_id,
            processed = summary.processed,
            new_posts = summary.new_posts,
            failed = summary.failures.len(),
            "User reconciliation finished"
        );

        Ok(summary)
    }

    /// Reconcile all eligible users, a few at a time. Failures are logged,
    /// never returned.
    pub async fn reconcile_all_eligible(&self) -> SweepSummary {
        let mut summary = SweepSummary::default();

        let users = match self.subscriptions.list_eligible_users().await {
            Ok(users) => users,
            Err(e) => {
                tracing::error!(error = %e, "Failed to list eligible users, skipping sweep");
                return summary;
            }
        };

        summary.users = users.len();
        let results: Vec<(String, Result<BatchSummary, ReconcileError>)> = stream::iter(users)
            .map(|user_id| async move {
                let result = self.reconcile_all_for_user(&user_id).await;
                (user_id, result)
            })
            .buffer_unordered(MAX_CONCURRENT_USERS)
            .collect()
            .await;

        for (user_id, result) in results {
            match result {
                Ok(batch) => {
                    summary.subscriptions_processed += batch.processed;
                    summary.subscriptions_failed += batch.failures.len();
                    summary.new_posts += batch.new_posts;
                }
                Err(e) => {
                    summary.users_failed += 1;
                    tracing::error!(user_id = %user_id, error = %e, "User reconciliation failed");
                }
            }
        }

        tracing::info!(
            users = summary.users,
            users_failed = summary.users_failed,
            subscriptions = summary.subscriptions_processed,
            subscriptions_failed = summary.subscriptions_failed,
            new_posts = summary.new_posts,
            "Sweep finished"
        );

        summary
    }

    /// Take a source permit, then bound the remote call itself; elapsed
    /// counts as the source being unavailable. Futures are lazy, so `call`
    /// has not started before the permit is granted.
    async fn call_source<T>(
        &self,
        call: impl Future<Output = Result<T, ReconcileError>>,
    ) -> Result<T, ReconcileError> {
        self.source.acquire_permit().await;
        tokio::time::timeout(self.settings.fetch_timeout, call)
            .await
            .map_err(|_| {
                ReconcileError::SourceUnavailable(format!(
                    "Timed out after {:?}",
                    self.settings.fetch_timeout
                ))
            })?
    }
}

/// Filters applied after fetching. The source is asked to exclude replies
/// and retweets already; this drops any it returns anyway.
fn passes_filters(subscription: &Subscription, post: &RemotePost) -> bool {
    if post.created_at < subscription.last_checked {
        return false;
    }
    if !subscription.include_replies && is_reply(post) {
        return false;
    }
    if !subscription.include_retweets && retweet_of(post).is_some() {
        return false;
    }
    matches_keywords(&subscription.keywords, &post.text)
}

/// Case-insensitive "contains any" match. No keywords matches everything.
fn matches_keywords(keywords: &[String], text: &str) -> bool {
    if keywords.is_empty() {
        return true;
    }
    let text = text.to_lowercase();
    keywords
        .iter()
        .any(|keyword| text.contains(&keyword.to_lowercase()))
}

fn is_reply(post: &RemotePost) -> bool {
    post.referenced
        .iter()
        .any(|r| r.kind == ReferenceKind::RepliedTo)
}

/// ID of the retweeted post, if this is a retweet.
fn retweet_of(post: &RemotePost) -> Option<&str> {
    post.referenced
        .iter()
        .find(|r| r.kind == ReferenceKind::Retweeted)
        .map(|r| r.id.as_str())
}

/// Attached media plus link entities pointing at a known media host, in
/// first-seen order without duplicates.
fn extract_media_urls(post: &RemotePost) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();
    let links = post
        .link_urls
        .iter()
        .filter(|url| MEDIA_HOST_MARKERS.iter().any(|marker| url.contains(marker)));

    for url in post.media_urls.iter().chain(links) {
        if !urls.contains(url) {
            urls.push(url.clone());
        }
    }
    urls
}

fn build_post(
    subscription: &Subscription,
    account_username: &str,
    remote: &RemotePost,
    now: DateTime<Utc>,
) -> Post {
    let author_username = remote
        .author_username
        .clone()
        .unwrap_or_else(|| account_username.to_string());
    let original_post_id = retweet_of(remote).map(str::to_string);

    Post {
        remote_id: remote.id.clone(),
        subscription_id: subscription.id.clone(),
        user_id: subscription.user_id.clone(),
        text: remote.text.clone(),
        author_id: remote.author_id.clone(),
        permalink: format!("https://x.com/{}/status/{}", author_username, remote.id),
        author_username,
        author_name: remote.author_name.clone(),
        likes: remote.metrics.likes,
        reshares: remote.metrics.reshares,
        replies: remote.metrics.replies,
        quotes: remote.metrics.quotes,
        media_urls: extract_media_urls(remote),
        is_read: false,
        remote_created_at: remote.created_at,
        fetched_at: now,
        is_reply: is_reply(remote),
        is_retweet: original_post_id.is_some(),
        original_post_id,
        hashtags: remote.hashtags.clone(),
        mentions: remote.mentions.clone(),
    }
}
