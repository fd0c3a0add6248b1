// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Post source: the remote social media API.
//!
//! Handles:
//! - Resolving a handle to the remote account identity
//! - Fetching an account's posts since a timestamp
//! - Rate limit detection (429 with retry hint)
//! - Mapping 404 to a missing account

use crate::error::ReconcileError;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// The remote API accepts page sizes in this range only.
const MIN_PAGE_SIZE: u32 = 5;
const MAX_PAGE_SIZE: u32 = 100;

/// Remote account a handle currently points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountIdentity {
    pub id: String,
    pub username: String,
    pub name: Option<String>,
}

/// Options for `fetch_posts_since`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    pub max_results: u32,
    pub exclude_replies: bool,
    pub exclude_retweets: bool,
}

/// Engagement counters as reported by the source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct EngagementCounts {
    #[serde(default, rename = "like_count")]
    pub likes: u64,
    #[serde(default, rename = "retweet_count")]
    pub reshares: u64,
    #[serde(default, rename = "reply_count")]
    pub replies: u64,
    #[serde(default, rename = "quote_count")]
    pub quotes: u64,
}

/// How a post refers to another post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    RepliedTo,
    Retweeted,
    Quoted,
    #[serde(other)]
    Other,
}

/// One entry of a post's referenced-post list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReferencedPost {
    #[serde(rename = "type")]
    pub kind: ReferenceKind,
    pub id: String,
}

/// A post as returned by the source, flattened from the API envelope.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RemotePost {
    pub id: String,
    pub text: String,
    pub author_id: String,
    pub author_username: Option<String>,
    pub author_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub metrics: EngagementCounts,
    /// Direct URLs of attached media
    pub media_urls: Vec<String>,
    pub hashtags: Vec<String>,
    pub mentions: Vec<String>,
    /// Expanded URLs of embedded links
    pub link_urls: Vec<String>,
    pub referenced: Vec<ReferencedPost>,
}

/// External API providing remote account and post data.
#[async_trait]
pub trait PostSource: Send + Sync {
    /// Wait until the source will take another request. Callers await this
    /// before each remote call and bound only the call itself with a
    /// timeout. Unthrottled sources return immediately.
    async fn acquire_permit(&self) {}

    /// Resolve a handle; fails with `AccountNotFound` if it no longer exists.
    async fn resolve_account(&self, username: &str) -> Result<AccountIdentity, ReconcileError>;

    /// Posts authored by `account_id` created at or after `since`.
    async fn fetch_posts_since(
        &self,
        account_id: &str,
        since: DateTime<Utc>,
        options: FetchOptions,
    ) -> Result<Vec<RemotePost>, ReconcileError>;
}

/// Social media API client (v2 REST shape, app bearer token).
#[derive(Clone)]
pub struct SocialApiClient {
    http: reqwest::Client,
    base_url: String,
    bearer_token: String,
}

impl SocialApiClient {
    /// Create a client. `timeout` bounds every request end to end.
    pub fn new(base_url: &str, bearer_token: String, timeout: Duration) -> Result<Self, ReconcileError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ReconcileError::SourceUnavailable(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            bearer_token,
        })
    }

    /// GET a JSON resource. A 404 yields `Ok(None)` so each caller can say
    /// what is missing.
    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<Option<T>, ReconcileError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.bearer_token)
            .query(query)
            .send()
            .await
            .map_err(|e| ReconcileError::SourceUnavailable(e.to_string()))?;

        self.check_response_json(response).await
    }

    /// Map the response status, then parse the JSON body.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<Option<T>, ReconcileError> {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = retry_after_hint(response.headers(), Utc::now());
            tracing::warn!(?retry_after, "Post source rate limit hit (429)");
            return Err(ReconcileError::RateLimited { retry_after });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReconcileError::SourceUnavailable(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        response
            .json()
            .await
            .map(Some)
            .map_err(|e| ReconcileError::SourceUnavailable(format!("JSON parse error: {}", e)))
    }
}

#[async_trait]
impl PostSource for SocialApiClient {
    async fn resolve_account(&self, username: &str) -> Result<AccountIdentity, ReconcileError> {
        let url = format!(
            "{}/users/by/username/{}",
            self.base_url,
            urlencoding::encode(username)
        );

        let envelope: Option<UserEnvelope> = self.get_json(&url, &[]).await?;

        envelope
            .and_then(|envelope| envelope.data)
            .map(|user| AccountIdentity {
                id: user.id,
                username: user.username,
                name: user.name,
            })
            .ok_or_else(|| ReconcileError::AccountNotFound(username.to_string()))
    }

    async fn fetch_posts_since(
        &self,
        account_id: &str,
        since: DateTime<Utc>,
        options: FetchOptions,
    ) -> Result<Vec<RemotePost>, ReconcileError> {
        let url = format!(
            "{}/users/{}/tweets",
            self.base_url,
            urlencoding::encode(account_id)
        );

        let mut query = vec![
            (
                "start_time",
                since.to_rfc3339_opts(SecondsFormat::Secs, true),
            ),
            (
                "max_results",
                options
                    .max_results
                    .clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE)
                    .to_string(),
            ),
            (
                "tweet.fields",
                "created_at,author_id,public_metrics,entities,referenced_tweets,attachments"
                    .to_string(),
            ),
            (
                "expansions",
                "author_id,attachments.media_keys".to_string(),
            ),
            ("media.fields", "url,preview_image_url".to_string()),
            ("user.fields", "name,username".to_string()),
        ];

        let mut exclude = Vec::new();
        if options.exclude_replies {
            exclude.push("replies");
        }
        if options.exclude_retweets {
            exclude.push("retweets");
        }
        if !exclude.is_empty() {
            query.push(("exclude", exclude.join(",")));
        }

        let page: TimelinePage = self
            .get_json(&url, &query)
            .await?
            .ok_or_else(|| ReconcileError::AccountNotFound(account_id.to_string()))?;
        let posts = page.into_remote_posts();

        tracing::debug!(account_id, count = posts.len(), "Fetched remote posts");
        Ok(posts)
    }
}

/// Work out how long to wait after a 429 from `retry-after` (seconds) or
/// `x-rate-limit-reset` (epoch seconds).
pub fn retry_after_hint(
    headers: &reqwest::header::HeaderMap,
    now: DateTime<Utc>,
) -> Option<Duration> {
    let header_u64 = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
    };

    if let Some(secs) = header_u64("retry-after") {
        return Some(Duration::from_secs(secs));
    }

    header_u64("x-rate-limit-reset").map(|reset| {
        let now = u64::try_from(now.timestamp()).unwrap_or(0);
        Duration::from_secs(reset.saturating_sub(now))
    })
}

// ─── Wire format ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct UserEnvelope {
    data: Option<ApiUser>,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiUser {
    id: String,
    username: String,
    name: Option<String>,
}

/// One page of an account's timeline.
#[derive(Debug, Default, Deserialize)]
struct TimelinePage {
    #[serde(default)]
    data: Vec<ApiPost>,
    #[serde(default)]
    includes: Includes,
}

#[derive(Debug, Default, Deserialize)]
struct Includes {
    #[serde(default)]
    users: Vec<ApiUser>,
    #[serde(default)]
    media: Vec<ApiMedia>,
}

#[derive(Debug, Deserialize)]
struct ApiMedia {
    media_key: String,
    url: Option<String>,
    preview_image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiPost {
    id: String,
    text: String,
    author_id: String,
    created_at: DateTime<Utc>,
    #[serde(default)]
    public_metrics: EngagementCounts,
    #[serde(default)]
    entities: Option<ApiEntities>,
    #[serde(default)]
    referenced_tweets: Vec<ReferencedPost>,
    #[serde(default)]
    attachments: Option<ApiAttachments>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiEntities {
    #[serde(default)]
    hashtags: Vec<TagEntity>,
    #[serde(default)]
    mentions: Vec<MentionEntity>,
    #[serde(default)]
    urls: Vec<UrlEntity>,
}

#[derive(Debug, Deserialize)]
struct TagEntity {
    tag: String,
}

#[derive(Debug, Deserialize)]
struct MentionEntity {
    username: String,
}

#[derive(Debug, Deserialize)]
struct UrlEntity {
    url: String,
    expanded_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiAttachments {
    #[serde(default)]
    media_keys: Vec<String>,
}

impl TimelinePage {
    /// Join posts with their expanded authors and media.
    fn into_remote_posts(self) -> Vec<RemotePost> {
        let users: HashMap<String, ApiUser> = self
            .includes
            .users
            .into_iter()
            .map(|u| (u.id.clone(), u))
            .collect();
        let media: HashMap<String, String> = self
            .includes
            .media
            .into_iter()
            .filter_map(|m| m.url.or(m.preview_image_url).map(|url| (m.media_key, url)))
            .collect();

        self.data
            .into_iter()
            .map(|post| {
                let author = users.get(&post.author_id);
                let entities = post.entities.unwrap_or_default();
                let media_urls = post
                    .attachments
                    .unwrap_or_default()
                    .media_keys
                    .iter()
                    .filter_map(|key| media.get(key).cloned())
                    .collect();

                RemotePost {
                    id: post.id,
                    text: post.text,
                    author_username: author.map(|a| a.username.clone()),
                    author_name: author.and_then(|a| a.name.clone()),
                    author_id: post.author_id,
                    created_at: post.created_at,
                    metrics: post.public_metrics,
                    media_urls,
                    hashtags: entities.hashtags.into_iter().map(|h| h.tag).collect(),
                    mentions: entities.mentions.into_iter().map(|m| m.username).collect(),
                    link_urls: entities
                        .urls
                        .into_iter()
                        .map(|u| u.expanded_url.unwrap_or(u.url))
                        .collect(),
                    referenced: post.referenced_tweets,
                }
            })
            .collect()
    }
}
