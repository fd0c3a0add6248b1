// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (eligibility for the polling sweep)
//! - Subscriptions (one document per user/target pair)
//! - Posts (keyed by remote post ID)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use firestore::errors::FirestoreError;
use serde::{Deserialize, Serialize};

use crate::db::{collections, PostQuery, PostStore, SubscriptionStore};
use crate::error::StoreError;
use crate::models::{Post, Subscription, User};

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: firestore::FirestoreDb,
}

/// Partial document used for single-field checkpoint updates.
#[derive(Serialize, Deserialize)]
struct CheckpointUpdate {
    last_checked: DateTime<Utc>,
}

/// Partial document used to flip the read flag.
#[derive(Serialize, Deserialize)]
struct ReadFlagUpdate {
    is_read: bool,
}

/// Map a Firestore error, turning create-on-existing into `DuplicateKey`.
fn map_create_error(key: &str, err: FirestoreError) -> StoreError {
    match err {
        FirestoreError::DataConflictError(_) => StoreError::DuplicateKey(key.to_string()),
        other => StoreError::Database(other.to_string()),
    }
}

fn db_error(err: FirestoreError) -> StoreError {
    StoreError::Database(err.to_string())
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, StoreError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id).await.map_err(|e| {
            StoreError::Database(format!("Failed to connect to Firestore: {}", e))
        })?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self { client })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, StoreError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            StoreError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self { client })
    }

    // ─── User Operations ─────────────────────────────────────────

    /// Get a user by ID.
    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>, StoreError> {
        self.client
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(user_id)
            .await
            .map_err(db_error)
    }

    /// Create or update a user.
    pub async fn upsert_user(&self, user: &User) -> Result<(), StoreError> {
        let _: () = self
            .client
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&user.user_id)
            .object(user)
            .execute()
            .await
            .map_err(db_error)?;
        Ok(())
    }
}

#[async_trait]
impl PostStore for FirestoreDb {
    async fn find_post_by_remote_id(&self, remote_id: &str) -> Result<Option<Post>, StoreError> {
        self.client
            .fluent()
            .select()
            .by_id_in(collections::POSTS)
            .obj()
            .one(remote_id)
            .await
            .map_err(db_error)
    }

    /// Uses a create (not an upsert) so Firestore rejects a second document
    /// with the same ID.
    async fn insert_post(&self, post: &Post) -> Result<(), StoreError> {
        let _: () = self
            .client
            .fluent()
            .insert()
            .into(collections::POSTS)
            .document_id(&post.remote_id)
            .object(post)
            .execute()
            .await
            .map_err(|e| map_create_error(&post.remote_id, e))?;
        Ok(())
    }

    async fn list_posts_for_user(
        &self,
        user_id: &str,
        query: &PostQuery,
    ) -> Result<Vec<Post>, StoreError> {
        let user_id = user_id.to_string();
        let subscription_id = query.subscription_id.clone();
        let unread_only = query.unread_only;

        self.client
            .fluent()
            .select()
            .from(collections::POSTS)
            .filter(move |q| {
                q.for_all([
                    q.field("user_id").eq(user_id.clone()),
                    subscription_id
                        .clone()
                        .and_then(|id| q.field("subscription_id").eq(id)),
                    unread_only.then(|| q.field("is_read").eq(false)).flatten(),
                ])
            })
            .order_by([(
                "remote_created_at",
                firestore::FirestoreQueryDirection::Descending,
            )])
            .limit(query.limit)
            .obj()
            .query()
            .await
            .map_err(db_error)
    }

    async fn mark_post_read(&self, user_id: &str, remote_id: &str) -> Result<bool, StoreError> {
        match self.find_post_by_remote_id(remote_id).await? {
            Some(post) if post.user_id == user_id => {}
            _ => return Ok(false),
        }

        let _: () = self
            .client
            .fluent()
            .update()
            .fields(["is_read"])
            .in_col(collections::POSTS)
            .document_id(remote_id)
            .object(&ReadFlagUpdate { is_read: true })
            .execute()
            .await
            .map_err(db_error)?;
        Ok(true)
    }
}

#[async_trait]
impl SubscriptionStore for FirestoreDb {
    async fn get_subscription(&self, id: &str) -> Result<Option<Subscription>, StoreError> {
        self.client
            .fluent()
            .select()
            .by_id_in(collections::SUBSCRIPTIONS)
            .obj()
            .one(id)
            .await
            .map_err(db_error)
    }

    async fn create_subscription(&self, subscription: &Subscription) -> Result<(), StoreError> {
        let _: () = self
            .client
            .fluent()
            .insert()
            .into(collections::SUBSCRIPTIONS)
            .document_id(&subscription.id)
            .object(subscription)
            .execute()
            .await
            .map_err(|e| map_create_error(&subscription.id, e))?;
        Ok(())
    }

    async fn save_subscription(&self, subscription: &Subscription) -> Result<(), StoreError> {
        let _: () = self
            .client
            .fluent()
            .update()
            .in_col(collections::SUBSCRIPTIONS)
            .document_id(&subscription.id)
            .object(subscription)
            .execute()
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn update_subscription_checkpoint(
        &self,
        id: &str,
        last_checked: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let _: () = self
            .client
            .fluent()
            .update()
            .fields(["last_checked"])
            .in_col(collections::SUBSCRIPTIONS)
            .document_id(id)
            .object(&CheckpointUpdate { last_checked })
            .execute()
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn list_active_subscriptions(
        &self,
        user_id: &str,
    ) -> Result<Vec<Subscription>, StoreError> {
        let user_id = user_id.to_string();
        self.client
            .fluent()
            .select()
            .from(collections::SUBSCRIPTIONS)
            .filter(move |q| {
                q.for_all([
                    q.field("user_id").eq(user_id.clone()),
                    q.field("active").eq(true),
                ])
            })
            .order_by([("created_at", firestore::FirestoreQueryDirection::Ascending)])
            .obj()
            .query()
            .await
            .map_err(db_error)
    }

    async fn list_eligible_users(&self) -> Result<Vec<String>, StoreError> {
        let users: Vec<User> = self
            .client
            .fluent()
            .select()
            .from(collections::USERS)
            .filter(|q| {
                q.for_all([
                    q.field("active").eq(true),
                    q.field("source_account_linked").eq(true),
                ])
            })
            .obj()
            .query()
            .await
            .map_err(db_error)?;

        Ok(users.into_iter().map(|u| u.user_id).collect())
    }
}
