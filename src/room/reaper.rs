//! Background eviction of rooms idle past their lifetime.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::manager::RoomManager;

/// Spawn the periodic sweep. The first tick fires immediately, so a restart
/// clears accumulated backlog without waiting a full period. A failed sweep
/// is logged and retried on the next tick.
pub fn spawn(manager: Arc<RoomManager>, period: Duration, ttl: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            match manager.sweep_idle(ttl).await {
                Ok(0) => {}
                Ok(evicted) => debug!(evicted, "idle rooms swept"),
                Err(err) => warn!(error = %err, "idle room sweep failed"),
            }
        }
    })
}
