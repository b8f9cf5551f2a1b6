//! Per-key mutual exclusion
//!
//! The registry hands out one async mutex per key string. Holding the guard
//! makes the caller's check-then-write sequence a critical section for that
//! key; distinct keys never serialize each other.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Entries with no current holder are swept once the registry grows past this
const SWEEP_THRESHOLD: usize = 64;

/// Registry of per-key async locks
#[derive(Default)]
pub struct KeyLocks {
    inner: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyLocks {
    /// Acquire the lock for `key`, waiting if another task holds it
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let entry = {
            let mut map = self.inner.lock().await;
            if map.len() > SWEEP_THRESHOLD {
                map.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            Arc::clone(map.entry(key.to_string()).or_default())
        };
        entry.lock_owned().await
    }

    /// Acquire the locks for two keys
    ///
    /// Acquisition order is canonical (lexicographic), so two tasks taking
    /// the same pair from opposite directions cannot deadlock. Equal keys
    /// take a single guard.
    pub async fn lock_pair(
        &self,
        a: &str,
        b: &str,
    ) -> (OwnedMutexGuard<()>, Option<OwnedMutexGuard<()>>) {
        if a == b {
            return (self.lock(a).await, None);
        }
        let (first, second) = if a < b { (a, b) } else { (b, a) };
        let g1 = self.lock(first).await;
        let g2 = self.lock(second).await;
        (g1, Some(g2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn same_key_serializes() {
        let locks = Arc::new(KeyLocks::default());
        let running = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = Arc::clone(&locks);
            let running = Arc::clone(&running);
            handles.push(tokio::spawn(async move {
                let _guard = locks.lock("same").await;
                let now = running.fetch_add(1, Ordering::SeqCst);
                assert_eq!(now, 0, "two tasks inside the critical section");
                tokio::task::yield_now().await;
                running.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn distinct_keys_do_not_block() {
        let locks = KeyLocks::default();
        let _a = locks.lock("a").await;
        // must not deadlock
        let _b = locks.lock("b").await;
    }

    #[tokio::test]
    async fn pair_with_equal_keys_takes_one_guard() {
        let locks = KeyLocks::default();
        let (_guard, second) = locks.lock_pair("same", "same").await;
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn pair_excludes_waiters_on_either_key() {
        let locks = Arc::new(KeyLocks::default());
        let (g1, g2) = locks.lock_pair("a", "b").await;

        let waiter = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _a = locks.lock("a").await;
                let _b = locks.lock("b").await;
            })
        };
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert!(!waiter.is_finished(), "waiter got in while the pair was held");

        drop(g1);
        drop(g2);
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn opposite_direction_pairs_do_not_deadlock() {
        let locks = Arc::new(KeyLocks::default());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let forward = Arc::clone(&locks);
            handles.push(tokio::spawn(async move {
                let _guards = forward.lock_pair("a", "b").await;
            }));
            let backward = Arc::clone(&locks);
            handles.push(tokio::spawn(async move {
                let _guards = backward.lock_pair("b", "a").await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
    }
}
