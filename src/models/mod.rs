// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod post;
pub mod subscription;
pub mod user;

pub use post::Post;
pub use subscription::{Subscription, SubscriptionFilters, SubscriptionStateError};
pub use user::User;
