// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process store backed by `DashMap`.
//!
//! Uniqueness is enforced through the map's entry API, so two concurrent
//! inserts of the same key cannot both succeed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

use crate::db::{PostQuery, PostStore, SubscriptionStore};
use crate::error::StoreError;
use crate::models::{Post, Subscription, User};

/// Memory store. Cloning shares the underlying maps.
#[derive(Clone, Default)]
pub struct MemoryStore {
    users: Arc<DashMap<String, User>>,
    subscriptions: Arc<DashMap<String, Subscription>>,
    posts: Arc<DashMap<String, Post>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or update a user.
    pub fn upsert_user(&self, user: User) {
        self.users.insert(user.user_id.clone(), user);
    }

    /// Number of stored posts.
    pub fn post_count(&self) -> usize {
        self.posts.len()
    }
}

#[async_trait]
impl PostStore for MemoryStore {
    async fn find_post_by_remote_id(&self, remote_id: &str) -> Result<Option<Post>, StoreError> {
        Ok(self.posts.get(remote_id).map(|p| p.clone()))
    }

    async fn insert_post(&self, post: &Post) -> Result<(), StoreError> {
        match self.posts.entry(post.remote_id.clone()) {
            Entry::Occupied(_) => Err(StoreError::DuplicateKey(post.remote_id.clone())),
            Entry::Vacant(slot) => {
                slot.insert(post.clone());
                Ok(())
            }
        }
    }

    async fn list_posts_for_user(
        &self,
        user_id: &str,
        query: &PostQuery,
    ) -> Result<Vec<Post>, StoreError> {
        let mut posts: Vec<Post> = self
            .posts
            .iter()
            .filter(|p| p.user_id == user_id)
            .filter(|p| {
                query
                    .subscription_id
                    .as_deref()
                    .map_or(true, |id| p.subscription_id == id)
            })
            .filter(|p| !query.unread_only || !p.is_read)
            .map(|p| p.clone())
            .collect();

        posts.sort_by(|a, b| b.remote_created_at.cmp(&a.remote_created_at));
        posts.truncate(query.limit as usize);
        Ok(posts)
    }

    async fn mark_post_read(&self, user_id: &str, remote_id: &str) -> Result<bool, StoreError> {
        match self.posts.get_mut(remote_id) {
            Some(mut post) if post.user_id == user_id => {
                post.is_read = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl SubscriptionStore for MemoryStore {
    async fn get_subscription(&self, id: &str) -> Result<Option<Subscription>, StoreError> {
        Ok(self.subscriptions.get(id).map(|s| s.clone()))
    }

    async fn create_subscription(&self, subscription: &Subscription) -> Result<(), StoreError> {
        match self.subscriptions.entry(subscription.id.clone()) {
            Entry::Occupied(_) => Err(StoreError::DuplicateKey(subscription.id.clone())),
            Entry::Vacant(slot) => {
                slot.insert(subscription.clone());
                Ok(())
            }
        }
    }

    async fn save_subscription(&self, subscription: &Subscription) -> Result<(), StoreError> {
        self.subscriptions
            .insert(subscription.id.clone(), subscription.clone());
        Ok(())
    }

    async fn update_subscription_checkpoint(
        &self,
        id: &str,
        last_checked: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut subscription = self
            .subscriptions
            .get_mut(id)
            .ok_or_else(|| StoreError::Database(format!("Subscription {} not found", id)))?;
        subscription.last_checked = last_checked;
        Ok(())
    }

    async fn list_active_subscriptions(
        &self,
        user_id: &str,
    ) -> Result<Vec<Subscription>, StoreError> {
        let mut subscriptions: Vec<Subscription> = self
            .subscriptions
            .iter()
            .filter(|s| s.user_id == user_id && s.active)
            .map(|s| s.clone())
            .collect();
        subscriptions.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(subscriptions)
    }

    async fn list_eligible_users(&self) -> Result<Vec<String>, StoreError> {
        let mut users: Vec<String> = self
            .users
            .iter()
            .filter(|u| u.is_eligible())
            .map(|u| u.user_id.clone())
            .collect();
        users.sort();
        Ok(users)
    }
}
