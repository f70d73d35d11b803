//! Bounded in-process cache with per-entry expiry, backed by moka.

use std::hash::Hash;
use std::time::Duration;

use moka::sync::Cache;

/// Holds at most `capacity` entries, each for at most `ttl` after insertion.
///
/// Cheap to clone; clones share the same entries.
#[derive(Clone)]
pub struct TtlCache<K, V> {
  inner: Cache<K, V>,
}

impl<K, V> TtlCache<K, V>
where
  K: Eq + Hash + Send + Sync + 'static,
  V: Clone + Send + Sync + 'static,
{
  pub fn new(capacity: usize, ttl: Duration) -> Self {
    let inner = Cache::builder()
      .max_capacity(capacity.max(1) as u64)
      .time_to_live(ttl)
      .build();
    Self { inner }
  }

  pub fn get(&self, key: &K) -> Option<V> {
    self.inner.get(key)
  }

  pub fn insert(&self, key: K, value: V) {
    self.inner.insert(key, value);
  }

  /// Live entries, after pending expiry and eviction work has run
  pub fn len(&self) -> usize {
    self.inner.run_pending_tasks();
    self.inner.entry_count() as usize
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}
