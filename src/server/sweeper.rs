use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::{SharedPasteStore, StoreError};

use super::time::current_timestamp;

/// Physically removes expired pastes on a fixed interval.
///
/// Reads never rely on this: the lifecycle engine re-checks expiry on every
/// retrieval, the sweep only reclaims space.
pub fn spawn_expiry_sweeper(store: SharedPasteStore, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(err) = sweep_once(&store, current_timestamp()).await {
                log::warn!("expiry sweep failed: {err}");
            }
        }
    })
}

pub async fn sweep_once(store: &SharedPasteStore, now: i64) -> Result<usize, StoreError> {
    let removed = store.purge_expired(now).await?;
    if removed > 0 {
        log::info!("expiry sweep removed {removed} paste(s)");
    }
    Ok(removed)
}
