// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Locally cached copy of a fetched remote post.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored post record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    /// Remote post ID (also used as document ID, globally unique)
    pub remote_id: String,
    /// Subscription that fetched this post
    pub subscription_id: String,
    /// Owning user (denormalized for per-user queries)
    pub user_id: String,
    pub text: String,
    pub author_id: String,
    pub author_username: String,
    pub author_name: Option<String>,
    pub likes: u64,
    pub reshares: u64,
    pub replies: u64,
    pub quotes: u64,
    #[serde(default)]
    pub media_urls: Vec<String>,
    pub is_read: bool,
    /// When the post was published remotely
    pub remote_created_at: DateTime<Utc>,
    /// When this copy was stored
    pub fetched_at: DateTime<Utc>,
    pub permalink: String,
    pub is_reply: bool,
    pub is_retweet: bool,
    /// Remote ID of the retweeted post (retweets only)
    pub original_post_id: Option<String>,
    #[serde(default)]
    pub hashtags: Vec<String>,
    #[serde(default)]
    pub mentions: Vec<String>,
}
