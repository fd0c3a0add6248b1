// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Subscription model: one user's standing watch on one remote account.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Lower bound for `check_interval_minutes`.
pub const MIN_CHECK_INTERVAL_MINUTES: u32 = 15;
/// Upper bound for `check_interval_minutes` (one day).
pub const MAX_CHECK_INTERVAL_MINUTES: u32 = 1440;
/// Interval used when the caller does not pick one.
pub const DEFAULT_CHECK_INTERVAL_MINUTES: u32 = 60;

/// Stored subscription record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    /// Document ID, derived from (user_id, target_username)
    pub id: String,
    /// Owning local user
    pub user_id: String,
    /// Remote account handle, lower-cased without a leading '@'
    pub target_username: String,
    /// Soft-delete flag
    pub active: bool,
    /// Minutes between polls
    pub check_interval_minutes: u32,
    /// Reconciliation watermark
    pub last_checked: DateTime<Utc>,
    /// Keep only posts containing one of these (case-insensitive)
    #[serde(default)]
    pub keywords: Vec<String>,
    pub include_replies: bool,
    pub include_retweets: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Per-subscription filters, supplied on creation and on reactivation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionFilters {
    pub check_interval_minutes: u32,
    pub keywords: Vec<String>,
    pub include_replies: bool,
    pub include_retweets: bool,
}

impl Default for SubscriptionFilters {
    fn default() -> Self {
        Self {
            check_interval_minutes: DEFAULT_CHECK_INTERVAL_MINUTES,
            keywords: Vec::new(),
            include_replies: false,
            include_retweets: false,
        }
    }
}

/// Reasons a subscription cannot be created or reconciled.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubscriptionStateError {
    #[error("target account handle is empty")]
    EmptyTarget,

    #[error("check interval {0} is outside 15..=1440 minutes")]
    IntervalOutOfBounds(u32),

    #[error("keyword filter contains a blank entry")]
    BlankKeyword,
}

impl Subscription {
    /// Build a new active subscription. The checkpoint starts at `now`, so
    /// only posts published after subscribing are picked up.
    pub fn new(
        user_id: &str,
        target: &str,
        filters: SubscriptionFilters,
        now: DateTime<Utc>,
    ) -> Result<Self, SubscriptionStateError> {
        let target_username = normalize_target(target);
        let subscription = Self {
            id: subscription_doc_id(user_id, &target_username),
            user_id: user_id.to_string(),
            target_username,
            active: true,
            check_interval_minutes: filters.check_interval_minutes,
            last_checked: now,
            keywords: normalize_keywords(filters.keywords),
            include_replies: filters.include_replies,
            include_retweets: filters.include_retweets,
            created_at: now,
            updated_at: now,
        };
        subscription.validate()?;
        Ok(subscription)
    }

    /// Check the invariants the reconciliation engine relies on.
    pub fn validate(&self) -> Result<(), SubscriptionStateError> {
        if self.target_username.is_empty() {
            return Err(SubscriptionStateError::EmptyTarget);
        }
        if !(MIN_CHECK_INTERVAL_MINUTES..=MAX_CHECK_INTERVAL_MINUTES)
            .contains(&self.check_interval_minutes)
        {
            return Err(SubscriptionStateError::IntervalOutOfBounds(
                self.check_interval_minutes,
            ));
        }
        if self.keywords.iter().any(|k| k.trim().is_empty()) {
            return Err(SubscriptionStateError::BlankKeyword);
        }
        Ok(())
    }

    /// Whether enough time has passed since the last check to poll again.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now - self.last_checked >= Duration::minutes(i64::from(self.check_interval_minutes))
    }

    /// Soft delete.
    pub fn deactivate(&mut self, now: DateTime<Utc>) {
        self.active = false;
        self.updated_at = now;
    }

    /// Flip an inactive subscription back on with fresh filters and checkpoint.
    pub fn reactivate(
        &mut self,
        filters: SubscriptionFilters,
        now: DateTime<Utc>,
    ) -> Result<(), SubscriptionStateError> {
        let mut updated = self.clone();
        updated.active = true;
        updated.check_interval_minutes = filters.check_interval_minutes;
        updated.keywords = normalize_keywords(filters.keywords);
        updated.include_replies = filters.include_replies;
        updated.include_retweets = filters.include_retweets;
        updated.last_checked = now;
        updated.updated_at = now;
        updated.validate()?;
        *self = updated;
        Ok(())
    }
}

/// Normalize a remote handle: trim, drop a leading '@', lower-case.
pub fn normalize_target(target: &str) -> String {
    target.trim().trim_start_matches('@').to_lowercase()
}

/// Document ID for the (user, target) pair. Two subscriptions for the same
/// pair always map to the same document.
pub fn subscription_doc_id(user_id: &str, target_username: &str) -> String {
    format!(
        "{}_{}",
        urlencoding::encode(user_id),
        urlencoding::encode(target_username)
    )
}

fn normalize_keywords(keywords: Vec<String>) -> Vec<String> {
    keywords.into_iter().map(|k| k.trim().to_string()).collect()
}
