use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;

use crate::error::StoreError;
use crate::store::Committed;
use crate::store::TimestampStore;
use crate::store::Transaction;
use crate::store::WindowOp;

#[derive(Debug, Default)]
struct Window {
    /// member -> score
    members: HashMap<String, f64>,
    expires_at: Option<Instant>,
}

impl Window {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }

    fn sorted_scores(&self) -> Vec<f64> {
        let mut entries: Vec<(&String, f64)> = self
            .members
            .iter()
            .map(|(member, score)| (member, *score))
            .collect();
        entries.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(b.0)));
        entries.into_iter().map(|(_, score)| score).collect()
    }
}

/// An in-process [`TimestampStore`].
///
/// Each key lives in its own map shard entry; a transaction holds that entry
/// for its whole duration, which serialises commits per key while leaving other
/// keys untouched. Expiry follows the tokio clock. An expired window is reset
/// on its next access, and every `cleanup_interval` a commit also sweeps all
/// expired windows out of the map.
///
/// Only suitable when every caller shares the same process.
#[derive(Debug)]
pub struct MemoryStore {
    windows: DashMap<String, Window>,
    cleanup_interval: Duration,
    next_cleanup: Mutex<Instant>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_cleanup_interval(DEFAULT_CLEANUP_INTERVAL)
    }
}

const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sweep expired windows at most once per `cleanup_interval`.
    pub fn with_cleanup_interval(cleanup_interval: Duration) -> Self {
        Self {
            windows: DashMap::new(),
            cleanup_interval,
            next_cleanup: Mutex::new(Instant::now() + cleanup_interval),
        }
    }

    /// Number of live elements stored for `key`.
    pub fn len(&self, key: &str) -> usize {
        let now = Instant::now();
        self.windows
            .get(key)
            .filter(|window| !window.is_expired(now))
            .map_or(0, |window| window.members.len())
    }

    fn clean_expired(&self, now: Instant) {
        self.windows.retain(|_, window| !window.is_expired(now));
    }

    // A sweep already in progress on another task is left to finish alone.
    fn maybe_clean_expired(&self, now: Instant) {
        let Ok(mut next_cleanup) = self.next_cleanup.try_lock() else {
            return;
        };
        if now >= *next_cleanup {
            self.clean_expired(now);
            *next_cleanup = now + self.cleanup_interval;
        }
    }
}

#[async_trait]
impl TimestampStore for MemoryStore {
    async fn commit(&self, tx: Transaction) -> Result<Committed, StoreError> {
        let now = Instant::now();
        // Must run before the entry lock below is taken.
        self.maybe_clean_expired(now);
        let mut reads = Vec::new();

        let emptied = {
            let mut window = self.windows.entry(tx.key().to_string()).or_default();
            if window.is_expired(now) {
                *window = Window::default();
            }

            for op in tx.ops() {
                match op {
                    WindowOp::RemoveRange { min, max } => {
                        window
                            .members
                            .retain(|_, score| *score < *min || *score > *max);
                    }
                    WindowOp::ReadAll => reads.push(window.sorted_scores()),
                    WindowOp::Insert { score, member } => {
                        window.members.insert(member.clone(), *score);
                    }
                    WindowOp::SetExpiry(ttl) => {
                        // Expiring a key that holds nothing is a no-op.
                        if !window.members.is_empty() {
                            window.expires_at = Some(now + *ttl);
                        }
                    }
                }
            }

            window.members.is_empty()
        };

        // An empty sorted set does not exist.
        if emptied {
            self.windows
                .remove_if(tx.key(), |_, window| window.members.is_empty());
        }

        Ok(Committed::new(reads))
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let now = Instant::now();
        Ok(self
            .windows
            .remove(key)
            .is_some_and(|(_, window)| !window.is_expired(now)))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn it_reads_in_score_order() {
        let store = MemoryStore::new();
        for score in [30.0, 10.0, 20.0] {
            store
                .commit(Transaction::new("k").insert(score))
                .await
                .unwrap();
        }

        let committed = store
            .commit(Transaction::new("k").read_all())
            .await
            .unwrap();
        assert_eq!(committed.read(0).unwrap(), &[10.0, 20.0, 30.0]);
    }

    #[tokio::test]
    async fn it_removes_an_inclusive_range() {
        let store = MemoryStore::new();
        let tx = Transaction::new("k")
            .insert(1.0)
            .insert(2.0)
            .insert(3.0)
            .remove_range(0.0, 2.0)
            .read_all();

        let committed = store.commit(tx).await.unwrap();
        assert_eq!(committed.read(0).unwrap(), &[3.0]);
    }

    #[tokio::test]
    async fn equal_members_collapse() {
        let store = MemoryStore::new();
        store
            .commit(Transaction::new("k").insert(5.0).insert(5.0))
            .await
            .unwrap();
        assert_eq!(store.len("k"), 1);
    }

    #[tokio::test]
    async fn reads_happen_at_their_position_in_the_transaction() {
        let store = MemoryStore::new();
        let tx = Transaction::new("k").read_all().insert(7.0).read_all();

        let committed = store.commit(tx).await.unwrap();
        assert!(committed.read(0).unwrap().is_empty());
        assert_eq!(committed.read(1).unwrap(), &[7.0]);
    }

    #[tokio::test]
    async fn test_keys_expire_after_ttl() {
        tokio::time::pause();

        let store = MemoryStore::new();
        store
            .commit(
                Transaction::new("k")
                    .insert(1.0)
                    .set_expiry(Duration::from_secs(60)),
            )
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(store.len("k"), 1);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(store.len("k"), 0);

        let committed = store
            .commit(Transaction::new("k").read_all())
            .await
            .unwrap();
        assert!(committed.read(0).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_expiry_is_refreshed_by_later_writes() {
        tokio::time::pause();

        let store = MemoryStore::new();
        let ttl = Duration::from_secs(10);
        store
            .commit(Transaction::new("k").insert(1.0).set_expiry(ttl))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(8)).await;
        store
            .commit(Transaction::new("k").insert(2.0).set_expiry(ttl))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(8)).await;
        assert_eq!(store.len("k"), 2);
    }

    #[tokio::test]
    async fn it_deletes_windows() {
        let store = MemoryStore::new();
        store
            .commit(Transaction::new("k").insert(1.0))
            .await
            .unwrap();

        assert!(store.delete("k").await.unwrap());
        assert!(!store.delete("k").await.unwrap());
        assert_eq!(store.len("k"), 0);
    }

    #[tokio::test]
    async fn emptied_windows_are_dropped() {
        let store = MemoryStore::new();
        store
            .commit(Transaction::new("k").insert(1.0))
            .await
            .unwrap();
        store
            .commit(Transaction::new("k").remove_range(0.0, 10.0))
            .await
            .unwrap();

        assert!(store.windows.get("k").is_none());
    }

    #[tokio::test]
    async fn test_idle_keys_are_swept_from_the_map() {
        tokio::time::pause();

        let store = MemoryStore::new();
        let ttl = Duration::from_secs(60);
        for i in 0..1000 {
            store
                .commit(
                    Transaction::new(format!("client-{i}"))
                        .insert(1.0)
                        .set_expiry(ttl),
                )
                .await
                .unwrap();
        }
        assert_eq!(store.windows.len(), 1000);

        tokio::time::advance(Duration::from_secs(3600)).await;
        store
            .commit(Transaction::new("other").insert(2.0).set_expiry(ttl))
            .await
            .unwrap();

        assert_eq!(store.windows.len(), 1);
        assert!(store.windows.get("other").is_some());
    }

    #[tokio::test]
    async fn test_live_keys_survive_a_sweep() {
        tokio::time::pause();

        let store = MemoryStore::with_cleanup_interval(Duration::from_secs(1));
        store
            .commit(
                Transaction::new("short")
                    .insert(1.0)
                    .set_expiry(Duration::from_secs(5)),
            )
            .await
            .unwrap();
        store
            .commit(
                Transaction::new("long")
                    .insert(1.0)
                    .set_expiry(Duration::from_secs(60)),
            )
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(10)).await;
        store
            .commit(Transaction::new("long").read_all())
            .await
            .unwrap();

        assert!(store.windows.get("short").is_none());
        assert_eq!(store.len("long"), 1);
    }
}
