use crate::buffer::page::FrameId;
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::OnceLock;
use std::time::Instant;

/// Returns nanoseconds since the first call, from the OS monotonic
/// clock. Ties between concurrent callers are permitted.
#[inline]
fn mono_nanos() -> u64 {
    static ANCHOR: OnceLock<Instant> = OnceLock::new();
    ANCHOR.get_or_init(Instant::now).elapsed().as_nanos() as u64
}

/// LRU-K replacement policy.
///
/// The victim is the evictable frame with the largest backward
/// k-distance, the time since its k-th most recent access. Frames with
/// fewer than `k` recorded accesses have infinite distance and are
/// evicted first; ties among them break by earliest recorded timestamp.
pub struct LruKReplacer {
    inner: Mutex<ReplacerInner>,
}

struct ReplacerInner {
    node_store: HashMap<FrameId, LruKNode>,
    curr_size: usize,
    replacer_size: usize,
    k: usize,
}

/// Access history of a single frame, newest at the back.
struct LruKNode {
    history: VecDeque<u64>,
    is_evictable: bool,
}

impl LruKNode {
    #[inline]
    fn new() -> Self {
        LruKNode {
            history: VecDeque::new(),
            is_evictable: false,
        }
    }
}

impl LruKReplacer {
    pub fn new(num_frames: usize, k: usize) -> Self {
        assert!(k > 0, "lru-k requires k > 0");
        LruKReplacer {
            inner: Mutex::new(ReplacerInner {
                node_store: HashMap::with_capacity(num_frames),
                curr_size: 0,
                replacer_size: num_frames,
                k,
            }),
        }
    }

    /// Records an access to `frame_id` at the current timestamp,
    /// keeping at most `k` entries of history.
    pub fn record_access(&self, frame_id: FrameId) -> Result<()> {
        let mut inner = self.inner.lock();
        if frame_id >= inner.replacer_size {
            return Err(Error::InvalidFrameId);
        }
        let k = inner.k;
        let now = mono_nanos();
        let node = inner.node_store.entry(frame_id).or_insert_with(LruKNode::new);
        node.history.push_back(now);
        if node.history.len() > k {
            node.history.pop_front();
        }
        Ok(())
    }

    /// Toggles evictability of `frame_id`, adjusting the evictable
    /// count.
    pub fn set_evictable(&self, frame_id: FrameId, evictable: bool) -> Result<()> {
        let inner = &mut *self.inner.lock();
        if frame_id >= inner.replacer_size {
            return Err(Error::InvalidFrameId);
        }
        let node = match inner.node_store.get_mut(&frame_id) {
            Some(node) => node,
            None => return Err(Error::InvalidFrameId),
        };
        let was_evictable = node.is_evictable;
        node.is_evictable = evictable;
        if was_evictable && !evictable {
            inner.curr_size -= 1;
        } else if !was_evictable && evictable {
            inner.curr_size += 1;
        }
        Ok(())
    }

    /// Chooses and removes the eviction victim among evictable frames.
    pub fn evict(&self) -> Option<FrameId> {
        let now = mono_nanos();
        let mut inner = self.inner.lock();
        let k = inner.k;

        // (frame, k-distance) among frames with full history.
        let mut best: Option<(FrameId, u64)> = None;
        // (frame, earliest access) among frames with infinite distance.
        let mut best_inf: Option<(FrameId, u64)> = None;

        for (&frame_id, node) in &inner.node_store {
            if !node.is_evictable {
                continue;
            }
            if node.history.len() >= k {
                let dist = now - node.history[node.history.len() - k];
                match best {
                    Some((_, d)) if d >= dist => {}
                    _ => best = Some((frame_id, dist)),
                }
            } else {
                let oldest = node.history.front().copied().unwrap_or(u64::MAX);
                match best_inf {
                    Some((_, o)) if o <= oldest => {}
                    _ => best_inf = Some((frame_id, oldest)),
                }
            }
        }

        let victim = best_inf.or(best).map(|(frame_id, _)| frame_id)?;
        inner.node_store.remove(&victim);
        inner.curr_size -= 1;
        Some(victim)
    }

    /// Removes a specific evictable frame and its history. No-op when
    /// the frame is not tracked; panics when the frame is tracked but
    /// not evictable.
    pub fn remove(&self, frame_id: FrameId) {
        let mut inner = self.inner.lock();
        let Some(node) = inner.node_store.get(&frame_id) else {
            return;
        };
        assert!(node.is_evictable, "remove of non-evictable frame {frame_id}");
        inner.node_store.remove(&frame_id);
        inner.curr_size -= 1;
    }

    /// Returns the current count of evictable frames.
    pub fn size(&self) -> usize {
        self.inner.lock().curr_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infinite_distance_evicts_first() {
        // Accesses 1,2,3,1,2 with k=2: frame 3 is the sole holder of an
        // infinite backward k-distance and must be the victim.
        let replacer = LruKReplacer::new(4, 2);
        for frame in [1, 2, 3, 1, 2] {
            replacer.record_access(frame).unwrap();
        }
        for frame in [1, 2, 3] {
            replacer.set_evictable(frame, true).unwrap();
        }
        assert_eq!(replacer.size(), 3);
        assert_eq!(replacer.evict(), Some(3));
        // Among full-history frames the oldest second-most-recent access
        // loses: frame 1.
        assert_eq!(replacer.evict(), Some(1));
        assert_eq!(replacer.evict(), Some(2));
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_lru_k_sequence() {
        let replacer = LruKReplacer::new(7, 2);
        for frame in [1, 2, 3, 4, 5, 6] {
            replacer.record_access(frame).unwrap();
        }
        for frame in [1, 2, 3, 4, 5] {
            replacer.set_evictable(frame, true).unwrap();
        }
        replacer.set_evictable(6, false).unwrap();
        assert_eq!(replacer.size(), 5);

        replacer.record_access(1).unwrap();

        // 2..5 all have infinite distance; oldest first access wins.
        assert_eq!(replacer.evict(), Some(2));
        assert_eq!(replacer.evict(), Some(3));
        assert_eq!(replacer.evict(), Some(4));
        assert_eq!(replacer.size(), 2);

        for frame in [3, 4, 5, 4] {
            replacer.record_access(frame).unwrap();
        }
        replacer.set_evictable(3, true).unwrap();
        replacer.set_evictable(4, true).unwrap();
        assert_eq!(replacer.size(), 4);

        // 3 has a single access; 5 and 4 now have two, 1 has two.
        assert_eq!(replacer.evict(), Some(3));

        replacer.set_evictable(6, true).unwrap();
        assert_eq!(replacer.size(), 4);
        assert_eq!(replacer.evict(), Some(6));

        replacer.set_evictable(1, false).unwrap();
        assert_eq!(replacer.size(), 2);
        assert_eq!(replacer.evict(), Some(5));

        replacer.record_access(1).unwrap();
        replacer.record_access(1).unwrap();
        replacer.set_evictable(1, true).unwrap();
        assert_eq!(replacer.size(), 2);

        assert_eq!(replacer.evict(), Some(4));
        assert_eq!(replacer.evict(), Some(1));
        assert_eq!(replacer.size(), 0);
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_invalid_frame_id() {
        let replacer = LruKReplacer::new(2, 2);
        assert!(replacer.record_access(2).is_err());
        assert!(replacer.set_evictable(5, true).is_err());
    }

    #[test]
    fn test_remove_untracked_is_noop() {
        let replacer = LruKReplacer::new(2, 2);
        replacer.remove(1);
        assert_eq!(replacer.size(), 0);
    }

    #[test]
    #[should_panic(expected = "non-evictable")]
    fn test_remove_pinned_panics() {
        let replacer = LruKReplacer::new(2, 2);
        replacer.record_access(0).unwrap();
        replacer.remove(0);
    }
}
