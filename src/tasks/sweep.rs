//! Expiry Sweep Task
//!
//! Lazy expiry only removes entries that are read again. This task
//! periodically removes the rest so a long-lived process does not
//! accumulate dead records. It is optional and sits outside the cache
//! contract.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::{FileCache, MemoryCache};
use crate::error::Result;

// == Sweep ==
/// A backend able to delete all of its expired entries in one pass.
pub trait Sweep: Send + Sync {
    /// Removes expired entries, returning how many were deleted.
    fn sweep_expired(&self) -> Result<usize>;
}

impl Sweep for FileCache {
    fn sweep_expired(&self) -> Result<usize> {
        self.remove_expired()
    }
}

impl Sweep for MemoryCache {
    fn sweep_expired(&self) -> Result<usize> {
        self.remove_expired()
    }
}

/// Spawns a background task that periodically sweeps expired entries.
///
/// Each pass runs on the blocking pool since sweeping does storage I/O.
/// Failed passes are logged and retried on the next tick.
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
///
/// # Example
/// ```ignore
/// let cache = Arc::new(FileCache::new("app", "/var/cache/app"));
/// let sweep_handle = spawn_sweep_task(cache.clone(), 60);
/// // Later, during shutdown:
/// sweep_handle.abort();
/// ```
pub fn spawn_sweep_task(cache: Arc<dyn Sweep>, sweep_interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(sweep_interval_secs);

    tokio::spawn(async move {
        info!(
            "Starting expiry sweep task with interval of {} seconds",
            sweep_interval_secs
        );

        loop {
            // Sleep for the configured interval
            tokio::time::sleep(interval).await;

            let cache = Arc::clone(&cache);
            match tokio::task::spawn_blocking(move || cache.sweep_expired()).await {
                Ok(Ok(removed)) if removed > 0 => {
                    info!("Expiry sweep: removed {} expired entries", removed);
                }
                Ok(Ok(_)) => debug!("Expiry sweep: no expired entries found"),
                Ok(Err(e)) => warn!(error = %e, "Expiry sweep failed"),
                Err(e) => warn!(error = %e, "Expiry sweep task panicked"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{Cache, Value};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_sweep_task_removes_expired_entries() {
        let cache = Arc::new(MemoryCache::new("test"));
        cache
            .put("expire_soon", Value::from("value"), Duration::from_millis(100))
            .unwrap();

        let handle = spawn_sweep_task(cache.clone(), 1);

        // Wait for entry to expire and the sweep to run
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert!(cache.is_empty(), "Expired entry should have been swept");

        handle.abort();
    }

    #[tokio::test]
    async fn test_sweep_task_preserves_valid_entries() {
        let dir = TempDir::new().unwrap();
        let cache = Arc::new(FileCache::new("test", dir.path()));
        cache
            .put("long_lived", Value::from("value"), Duration::from_secs(3600))
            .unwrap();

        let handle = spawn_sweep_task(cache.clone(), 1);

        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(
            cache.get("long_lived").unwrap(),
            Some(Value::from("value")),
            "Valid entry should not be removed"
        );

        handle.abort();
    }

    #[tokio::test]
    async fn test_sweep_task_can_be_aborted() {
        let cache = Arc::new(MemoryCache::new("test"));

        let handle = spawn_sweep_task(cache, 1);

        // Abort immediately
        handle.abort();

        // Wait a bit and verify task is finished
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
