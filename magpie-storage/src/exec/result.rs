use crate::table::tuple::{Rid, Tuple};

/// Materialized result buffer of a blocking operator, with a cursor
/// that can be rewound so re-`init` restarts output without
/// recomputation.
#[derive(Default)]
pub struct ExecutorResult {
    rows: Vec<(Tuple, Rid)>,
    cursor: usize,
    materialized: bool,
}

impl ExecutorResult {
    #[inline]
    pub fn new() -> Self {
        ExecutorResult::default()
    }

    /// Whether the producing operator has filled the buffer.
    #[inline]
    pub fn is_materialized(&self) -> bool {
        self.materialized
    }

    #[inline]
    pub fn set_materialized(&mut self) {
        self.materialized = true;
    }

    #[inline]
    pub fn push(&mut self, tuple: Tuple, rid: Rid) {
        debug_assert!(!self.materialized);
        self.rows.push((tuple, rid));
    }

    /// Rewinds the cursor to the first row.
    #[inline]
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// Drops the buffered rows entirely.
    pub fn clear(&mut self) {
        self.rows.clear();
        self.cursor = 0;
        self.materialized = false;
    }

    pub fn next(&mut self) -> Option<(Tuple, Rid)> {
        let row = self.rows.get(self.cursor).cloned()?;
        self.cursor += 1;
        Some(row)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::page::INVALID_PAGE_ID;

    #[test]
    fn test_reset_restarts_output() {
        let mut result = ExecutorResult::new();
        let rid = Rid::new(INVALID_PAGE_ID, 0);
        result.push(Tuple::from_bytes(vec![1]), rid);
        result.push(Tuple::from_bytes(vec![2]), rid);
        result.set_materialized();

        assert_eq!(result.next().unwrap().0.data(), &[1]);
        assert_eq!(result.next().unwrap().0.data(), &[2]);
        assert!(result.next().is_none());

        result.reset();
        assert_eq!(result.next().unwrap().0.data(), &[1]);
    }
}
