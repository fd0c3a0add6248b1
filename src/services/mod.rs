// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod rate_limit;
pub mod reconcile;
pub mod scheduler;
pub mod source;

pub use rate_limit::RateLimitedSource;
pub use reconcile::{BatchSummary, ReconcileOutcome, ReconcileSettings, Reconciler, SweepSummary};
pub use source::{PostSource, SocialApiClient};
