// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Periodic polling sweep.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::services::Reconciler;

/// Run `reconcile_all_eligible` every `interval` until the handle is aborted.
///
/// The first sweep starts immediately. A sweep that overruns the interval
/// delays the next one instead of stacking them.
pub fn spawn_sweep(reconciler: Arc<Reconciler>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            tracing::info!("Starting scheduled sweep");
            let summary = reconciler.reconcile_all_eligible().await;
            tracing::debug!(?summary, "Scheduled sweep complete");
        }
    })
}
