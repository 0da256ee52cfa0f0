//! TTL Sweep Task
//!
//! Background task standing in for the table's own TTL process: it
//! periodically deletes records whose expiry instant has passed. The cache
//! never deletes expired records itself, so until a sweep runs they remain
//! listable by `keys` while reads treat them as absent.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::current_timestamp_ms;
use crate::provider::MemoryTable;

/// Spawns a background task that sweeps expired records every `interval_secs`.
///
/// The returned handle is aborted during graceful shutdown.
///
/// # Example
/// ```ignore
/// let table = Arc::new(MemoryTable::for_config(&config.store));
/// let sweep_handle = spawn_sweep_task(table.clone(), 5);
/// // Later, during shutdown:
/// sweep_handle.abort();
/// ```
pub fn spawn_sweep_task(table: Arc<MemoryTable>, interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(interval_secs.max(1));

    tokio::spawn(async move {
        info!(interval_secs = interval.as_secs(), "Starting TTL sweep task");

        loop {
            tokio::time::sleep(interval).await;

            let removed = table.sweep_expired(current_timestamp_ms()).await;
            if removed > 0 {
                info!(removed, "TTL sweep: deleted expired records");
            } else {
                debug!("TTL sweep: no expired records found");
            }
        }
    })
}
