//! Periodic pass trigger.
//!
//! One pass at a time: the loop awaits the in-flight pass before asking
//! the ticker again, and missed ticks are skipped rather than queued, so
//! two passes can never mutate cluster membership concurrently. A failed
//! pass is logged and the next tick retries from scratch.

use std::time::Duration;

use tokio::time::{self, MissedTickBehavior};
use tracing::error;

use crate::etcd::MembershipClient;
use crate::fleet::FleetProvider;
use crate::reconcile::Reconciler;

/// Run reconciliation passes forever at a fixed interval. The first pass
/// starts immediately.
pub async fn watch<F, M>(reconciler: &Reconciler<F, M>, interval: Duration)
where
    F: FleetProvider,
    M: MembershipClient,
{
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        if let Err(err) = reconciler.run().await {
            error!(%err, "reconciliation pass failed");
        }
    }
}
