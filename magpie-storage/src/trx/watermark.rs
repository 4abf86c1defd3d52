use crate::trx::Timestamp;
use std::collections::BTreeMap;

/// Tracks the read timestamps of running transactions and exposes the
/// watermark: the oldest read timestamp still in use, or the latest
/// commit timestamp when no reader is active.
///
/// Undo logs older than the watermark are unreachable by any current or
/// future reader and may be garbage-collected.
pub struct Watermark {
    commit_ts: Timestamp,
    watermark: Timestamp,
    /// Multiset of active read timestamps, sorted.
    current_reads: BTreeMap<Timestamp, usize>,
}

impl Watermark {
    #[inline]
    pub fn new(commit_ts: Timestamp) -> Self {
        Watermark {
            commit_ts,
            watermark: commit_ts,
            current_reads: BTreeMap::new(),
        }
    }

    #[inline]
    pub fn commit_ts(&self) -> Timestamp {
        self.commit_ts
    }

    /// Registers a reader. A read timestamp below the commit clock
    /// breaks the snapshot invariant and is fatal.
    pub fn add_txn(&mut self, read_ts: Timestamp) {
        assert!(
            read_ts >= self.commit_ts,
            "read ts {read_ts} < commit ts {}",
            self.commit_ts
        );
        *self.current_reads.entry(read_ts).or_insert(0) += 1;
        let smallest = *self.current_reads.keys().next().unwrap();
        self.watermark = smallest;
    }

    /// Deregisters a reader, advancing the watermark when the oldest
    /// bucket empties.
    pub fn remove_txn(&mut self, read_ts: Timestamp) {
        if let Some(count) = self.current_reads.get_mut(&read_ts) {
            *count -= 1;
            if *count == 0 {
                self.current_reads.remove(&read_ts);
                match self.current_reads.keys().next() {
                    None => self.watermark = self.commit_ts,
                    Some(&smallest) => self.watermark = smallest,
                }
            }
        }
    }

    /// Advances the commit clock. The watermark itself only moves when
    /// the committing reader is removed afterwards.
    pub fn update_commit_ts(&mut self, commit_ts: Timestamp) {
        assert!(
            commit_ts > self.commit_ts,
            "commit ts regression: {commit_ts} <= {}",
            self.commit_ts
        );
        self.commit_ts = commit_ts;
    }

    #[inline]
    pub fn watermark(&self) -> Timestamp {
        if self.current_reads.is_empty() {
            self.commit_ts
        } else {
            self.watermark
        }
    }
}
