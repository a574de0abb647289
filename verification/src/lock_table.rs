//! Per-product locks.
//!
//! Maps product ids to async mutexes, created on first use and dropped once
//! nobody holds or waits on them. The map is split into shards so unrelated
//! products rarely touch the same std mutex.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use authentimed_types::ProductId;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

const SHARD_COUNT: usize = 16;

type Shard = HashMap<ProductId, Arc<AsyncMutex<()>>>;

pub struct LockTable {
    shards: Vec<Mutex<Shard>>,
}

impl LockTable {
    pub fn new() -> Self {
        Self {
            shards: (0..SHARD_COUNT).map(|_| Mutex::new(HashMap::new())).collect(),
        }
    }

    /// Wait up to `timeout` for exclusive access to one product. `None` on
    /// timeout.
    pub async fn acquire(&self, product_id: &ProductId, timeout: Duration) -> Option<ProductGuard<'_>> {
        let mutex = {
            let mut shard = self.shard(product_id);
            shard.entry(product_id.clone()).or_default().clone()
        };

        match tokio::time::timeout(timeout, mutex.lock_owned()).await {
            Ok(guard) => Some(ProductGuard {
                table: self,
                product_id: product_id.clone(),
                guard: Some(guard),
            }),
            Err(_) => {
                self.prune(product_id);
                None
            }
        }
    }

    /// Number of products with a live lock entry.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| lock_shard(s).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn shard(&self, product_id: &ProductId) -> MutexGuard<'_, Shard> {
        let mut hasher = DefaultHasher::new();
        product_id.hash(&mut hasher);
        let index = (hasher.finish() as usize) % self.shards.len();
        lock_shard(&self.shards[index])
    }

    /// Drop the entry if the map holds the only reference. Clones are only
    /// taken under the shard lock, so nobody can be racing for it.
    fn prune(&self, product_id: &ProductId) {
        let mut shard = self.shard(product_id);
        if let Some(mutex) = shard.get(product_id) {
            if Arc::strong_count(mutex) == 1 {
                shard.remove(product_id);
            }
        }
    }
}

impl Default for LockTable {
    fn default() -> Self {
        Self::new()
    }
}

// Shard maps stay consistent even if a holder panicked: every mutation is a
// single insert or remove.
fn lock_shard(shard: &Mutex<Shard>) -> MutexGuard<'_, Shard> {
    shard.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Exclusive access to one product until dropped.
pub struct ProductGuard<'a> {
    table: &'a LockTable,
    product_id: ProductId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for ProductGuard<'_> {
    fn drop(&mut self) {
        // Release first so the guard's own reference is gone before pruning.
        drop(self.guard.take());
        self.table.prune(&self.product_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use authentimed_types::CodeFormat;

    fn pid(s: &str) -> ProductId {
        ProductId::parse(s, CodeFormat::Permissive).unwrap()
    }

    #[tokio::test]
    async fn second_acquire_times_out_while_held() {
        let table = LockTable::new();
        let held = table.acquire(&pid("Q1"), Duration::from_millis(50)).await;
        assert!(held.is_some());
        assert!(table
            .acquire(&pid("Q1"), Duration::from_millis(20))
            .await
            .is_none());
        // Other products are unaffected.
        assert!(table
            .acquire(&pid("Q2"), Duration::from_millis(20))
            .await
            .is_some());
    }

    #[tokio::test]
    async fn entries_are_pruned_on_release() {
        let table = LockTable::new();
        {
            let _a = table.acquire(&pid("Q1"), Duration::from_millis(50)).await.unwrap();
            let _b = table.acquire(&pid("Q2"), Duration::from_millis(50)).await.unwrap();
            assert_eq!(table.len(), 2);
        }
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn waiter_gets_lock_after_release() {
        let table = Arc::new(LockTable::new());
        let guard = table.acquire(&pid("Q1"), Duration::from_millis(50)).await.unwrap();

        let waiter = {
            let table = table.clone();
            tokio::spawn(async move {
                table
                    .acquire(&pid("Q1"), Duration::from_secs(5))
                    .await
                    .is_some()
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(guard);
        assert!(waiter.await.unwrap());
        assert!(table.is_empty());
    }
}
