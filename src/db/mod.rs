//! Database layer: store traits plus Firestore and in-memory backends.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::models::{Post, Subscription};

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    pub const SUBSCRIPTIONS: &str = "subscriptions";
    pub const POSTS: &str = "posts";
}

/// Filter for listing a user's stored posts.
#[derive(Debug, Clone, Default)]
pub struct PostQuery {
    pub subscription_id: Option<String>,
    pub unread_only: bool,
    pub limit: u32,
}

/// Stored posts. `remote_id` is a hard unique key.
#[async_trait]
pub trait PostStore: Send + Sync {
    async fn find_post_by_remote_id(&self, remote_id: &str) -> Result<Option<Post>, StoreError>;

    /// Insert a new post; fails with `StoreError::DuplicateKey` if one with the
    /// same `remote_id` already exists.
    async fn insert_post(&self, post: &Post) -> Result<(), StoreError>;

    /// Newest first.
    async fn list_posts_for_user(
        &self,
        user_id: &str,
        query: &PostQuery,
    ) -> Result<Vec<Post>, StoreError>;

    /// Mark a post read. Returns `false` if the user has no such post.
    async fn mark_post_read(&self, user_id: &str, remote_id: &str) -> Result<bool, StoreError>;
}

/// Subscriptions and the user eligibility the sweep depends on.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn get_subscription(&self, id: &str) -> Result<Option<Subscription>, StoreError>;

    /// Fails with `StoreError::DuplicateKey` if the (user, target) pair exists.
    async fn create_subscription(&self, subscription: &Subscription) -> Result<(), StoreError>;

    /// Overwrite an existing subscription (deactivate / reactivate).
    async fn save_subscription(&self, subscription: &Subscription) -> Result<(), StoreError>;

    /// Single-field update of `last_checked`.
    async fn update_subscription_checkpoint(
        &self,
        id: &str,
        last_checked: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn list_active_subscriptions(&self, user_id: &str)
        -> Result<Vec<Subscription>, StoreError>;

    /// Users that are active and have a linked remote credential.
    async fn list_eligible_users(&self) -> Result<Vec<String>, StoreError>;
}
