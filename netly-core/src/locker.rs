//! §4.1 Key locker — a process-local registry mapping a string key to a
//! mutex, generalizing the teacher's `DashMap<String, _>` registries
//! (`state.rs`) from "one entry per connection" to "one mutex per
//! resource key".
//!
//! Keys used: `node:<id>`, `nodeip:<ip>`, `tunnel:<a>:<b>` (with `a<b`),
//! `service:<id>`, `setting:<key>`.
//!
//! Contract: any call-site that needs to lock several resources together
//! must pass all keys to a single [`KeyLocker::lock`] call. Separate
//! sequential calls are a deadlock hazard and are forbidden by
//! convention — there is no way to express "lock A, then later lock B"
//! safely through this API, by design.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Held locks are released when this guard drops. Release order doesn't
/// matter for deadlock freedom — only the sorted acquisition order does.
pub struct LockGuard {
    _guards: Vec<OwnedMutexGuard<()>>,
}

#[derive(Clone)]
pub struct KeyLocker {
    mutexes: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl KeyLocker {
    pub fn new() -> Self {
        Self {
            mutexes: Arc::new(DashMap::new()),
        }
    }

    pub fn node_key(id: i64) -> String {
        format!("node:{id}")
    }

    pub fn node_ip_key(ip: &str) -> String {
        format!("nodeip:{ip}")
    }

    pub fn tunnel_key(a: i64, b: i64) -> String {
        let (lo, hi) = if a < b { (a, b) } else { (b, a) };
        format!("tunnel:{lo}:{hi}")
    }

    pub fn service_key(id: i64) -> String {
        format!("service:{id}")
    }

    pub fn setting_key(key: &str) -> String {
        format!("setting:{key}")
    }

    /// Sorts `keys`, briefly acquires the registry map to ensure a mutex
    /// exists per key, then acquires each key-mutex in sorted order.
    pub async fn lock(&self, keys: impl IntoIterator<Item = String>) -> LockGuard {
        let mut sorted: Vec<String> = keys.into_iter().collect();
        sorted.sort();
        sorted.dedup();

        let owned_mutexes: Vec<Arc<Mutex<()>>> = sorted
            .iter()
            .map(|k| {
                self.mutexes
                    .entry(k.clone())
                    .or_insert_with(|| Arc::new(Mutex::new(())))
                    .clone()
            })
            .collect();

        let mut guards = Vec::with_capacity(owned_mutexes.len());
        for m in owned_mutexes {
            guards.push(m.lock_owned().await);
        }
        LockGuard { _guards: guards }
    }
}

impl Default for KeyLocker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn tunnel_key_is_order_independent() {
        assert_eq!(KeyLocker::tunnel_key(1, 2), KeyLocker::tunnel_key(2, 1));
        assert_eq!(KeyLocker::tunnel_key(1, 2), "tunnel:1:2");
    }

    #[tokio::test]
    async fn concurrent_locks_on_disjoint_keys_do_not_block() {
        let locker = KeyLocker::new();
        let a = locker.lock([KeyLocker::node_key(1)]).await;
        let b = tokio::time::timeout(
            Duration::from_millis(200),
            locker.lock([KeyLocker::node_key(2)]),
        )
        .await;
        assert!(b.is_ok());
        drop(a);
    }

    #[tokio::test]
    async fn second_lock_on_same_key_waits_for_first_to_drop() {
        let locker = KeyLocker::new();
        let guard = locker.lock([KeyLocker::node_key(9)]).await;

        let locker2 = locker.clone();
        let handle = tokio::spawn(async move {
            let _g = locker2.lock([KeyLocker::node_key(9)]).await;
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_finished());
        drop(guard);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn multi_key_lock_acquires_all_keys_at_once() {
        let locker = KeyLocker::new();
        let _guard = locker
            .lock([KeyLocker::node_key(1), KeyLocker::tunnel_key(1, 2)])
            .await;
        // A subsequent attempt to take just `node:1` must block until the
        // combined guard above is dropped.
        let locker2 = locker.clone();
        let handle = tokio::spawn(async move {
            let _g = locker2.lock([KeyLocker::node_key(1)]).await;
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_finished());
        drop(_guard);
        handle.await.unwrap();
    }
}
