use crate::table::tuple::{Rid, Tuple};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Interface the executors use against an index. Key tuples are the
/// projection of full tuples onto the index's key attributes.
pub trait Index: Send + Sync {
    fn insert_entry(&self, key: &Tuple, rid: Rid);
    fn delete_entry(&self, key: &Tuple, rid: Rid);
    /// Appends every rid stored under `key` to `out`.
    fn scan_key(&self, key: &Tuple, out: &mut Vec<Rid>);
}

/// In-memory hash index over encoded key tuples. Non-unique: one key
/// maps to any number of rids.
#[derive(Default)]
pub struct HashIndex {
    buckets: Mutex<HashMap<Vec<u8>, Vec<Rid>>>,
}

impl HashIndex {
    #[inline]
    pub fn new() -> Self {
        HashIndex::default()
    }
}

impl Index for HashIndex {
    fn insert_entry(&self, key: &Tuple, rid: Rid) {
        let mut buckets = self.buckets.lock();
        let bucket = buckets.entry(key.data().to_vec()).or_default();
        if !bucket.contains(&rid) {
            bucket.push(rid);
        }
    }

    fn delete_entry(&self, key: &Tuple, rid: Rid) {
        let mut buckets = self.buckets.lock();
        if let Some(bucket) = buckets.get_mut(key.data()) {
            bucket.retain(|&r| r != rid);
            if bucket.is_empty() {
                buckets.remove(key.data());
            }
        }
    }

    fn scan_key(&self, key: &Tuple, out: &mut Vec<Rid>) {
        let buckets = self.buckets.lock();
        if let Some(bucket) = buckets.get(key.data()) {
            out.extend_from_slice(bucket);
        }
    }
}
