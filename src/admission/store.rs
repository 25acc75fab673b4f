use super::bucket::BucketState;
use dashmap::DashMap;

/// Keyed store with an atomic read-modify-write primitive.
///
/// `get_and_update` must run `update` while no other caller can observe or
/// modify the same key. Implementations may use an in-process lock, a
/// distributed cache with compare-and-swap, or an actor.
pub trait BucketStore: Send + Sync {
    fn get_and_update<R>(
        &self,
        key: &str,
        init: impl FnOnce() -> BucketState,
        update: impl FnOnce(&mut BucketState) -> R,
    ) -> R;

    fn get(&self, key: &str) -> Option<BucketState>;

    /// Keeps only the buckets for which `keep` returns `true`.
    fn retain(&self, keep: impl FnMut(&str, &mut BucketState) -> bool);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory store; the shard write lock held by `entry` serializes updates
/// per key.
#[derive(Debug, Default)]
pub struct DashMapBucketStore {
    buckets: DashMap<String, BucketState>,
}

impl DashMapBucketStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BucketStore for DashMapBucketStore {
    fn get_and_update<R>(
        &self,
        key: &str,
        init: impl FnOnce() -> BucketState,
        update: impl FnOnce(&mut BucketState) -> R,
    ) -> R {
        let mut entry = self.buckets.entry(key.to_string()).or_insert_with(init);
        update(entry.value_mut())
    }

    fn get(&self, key: &str) -> Option<BucketState> {
        self.buckets.get(key).map(|entry| entry.value().clone())
    }

    fn retain(&self, mut keep: impl FnMut(&str, &mut BucketState) -> bool) {
        self.buckets.retain(|key, state| keep(key, state));
    }

    fn len(&self) -> usize {
        self.buckets.len()
    }
}
