// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Social-Tracker: watch remote social media accounts on behalf of users
//!
//! This crate provides the backend that polls subscribed accounts, stores
//! new posts exactly once, and advances each subscription's checkpoint.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use db::{PostStore, SubscriptionStore};
use services::Reconciler;
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub posts: Arc<dyn PostStore>,
    pub subscriptions: Arc<dyn SubscriptionStore>,
    pub reconciler: Arc<Reconciler>,
}
