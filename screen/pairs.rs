// ========================================================================================
//
//                     CANONICAL ENUMERATION OF FEATURE PAIRS
//
// ========================================================================================
//
// Pairs (i, j) with i < j are numbered lexicographically: (0,1), (0,2), ..., (0,n-1),
// (1,2), ... . Batches are contiguous runs of that numbering. A cursor carries the
// running (i, j) position from one batch to the next, so no batch re-walks the pairs
// that came before it.

use crate::types::{PairIndex, ScreenError};

/// The set of all unordered pairs over `n_features` columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairSpace {
    n_features: usize,
}

impl PairSpace {
    pub fn new(n_features: usize) -> Self {
        Self { n_features }
    }

    #[inline]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// `C(n, 2)`, which is zero for fewer than two features.
    #[inline]
    pub fn total_pairs(&self) -> usize {
        let n = self.n_features;
        if n < 2 { 0 } else { n * (n - 1) / 2 }
    }

    /// `ceil(total_pairs / batch_size)`.
    pub fn num_chunks(&self, batch_size: usize) -> Result<usize, ScreenError> {
        if batch_size == 0 {
            return Err(ScreenError::InvalidBatchSize(batch_size));
        }
        Ok(self.total_pairs().div_ceil(batch_size))
    }

    /// Linear index of the first pair whose first column is `row`.
    #[inline]
    fn row_start(&self, row: usize) -> usize {
        row * (2 * self.n_features - row - 1) / 2
    }

    /// Maps a linear pair index back to its `(i, j)` by inverting the triangular numbering.
    ///
    /// The floating-point estimate is corrected with integer arithmetic, so the result is
    /// exact for every `k < total_pairs`.
    pub fn pair_at(&self, k: usize) -> Option<PairIndex> {
        if k >= self.total_pairs() {
            return None;
        }

        let b = 2.0 * self.n_features as f64 - 1.0;
        let discriminant = (b * b - 8.0 * k as f64).max(0.0);
        let estimate = ((b - discriminant.sqrt()) / 2.0).floor().max(0.0);

        let last_row = self.n_features - 2;
        let mut row = (estimate as usize).min(last_row);
        while row > 0 && self.row_start(row) > k {
            row -= 1;
        }
        while row < last_row && self.row_start(row + 1) <= k {
            row += 1;
        }

        let second = k - self.row_start(row) + row + 1;
        Some(PairIndex::new(row, second))
    }

    /// A cursor positioned at the first pair.
    pub fn cursor(&self) -> PairCursor {
        self.cursor_at(0)
    }

    /// A cursor positioned at linear index `position` (clamped to the end).
    pub fn cursor_at(&self, position: usize) -> PairCursor {
        let total = self.total_pairs();
        let position = position.min(total);
        let (first, second) = match self.pair_at(position) {
            Some(pair) => (pair.first, pair.second),
            None => (self.n_features, self.n_features),
        };
        PairCursor {
            n_features: self.n_features,
            first,
            second,
            position,
            total,
        }
    }

    /// Splits the whole space into contiguous batches of at most `batch_size` pairs.
    pub fn batches(&self, batch_size: usize) -> Result<PairBatches, ScreenError> {
        if batch_size == 0 {
            return Err(ScreenError::InvalidBatchSize(batch_size));
        }
        Ok(PairBatches {
            cursor: self.cursor(),
            batch_size,
            next_index: 0,
        })
    }
}

/// Walks the canonical pair order from some position onward.
#[derive(Debug, Clone)]
pub struct PairCursor {
    n_features: usize,
    first: usize,
    second: usize,
    position: usize,
    total: usize,
}

impl PairCursor {
    /// Linear index of the next pair to be produced.
    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.total - self.position
    }

    /// Takes up to `batch_size` pairs, continuing where the previous call stopped.
    pub fn next_batch(&mut self, batch_size: usize) -> Vec<PairIndex> {
        let mut pairs = Vec::with_capacity(batch_size.min(self.remaining()));
        pairs.extend(self.by_ref().take(batch_size));
        pairs
    }
}

impl Iterator for PairCursor {
    type Item = PairIndex;

    fn next(&mut self) -> Option<PairIndex> {
        if self.position >= self.total {
            return None;
        }

        let pair = PairIndex::new(self.first, self.second);
        self.position += 1;
        self.second += 1;
        if self.second == self.n_features {
            self.first += 1;
            self.second = self.first + 1;
        }
        Some(pair)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining();
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for PairCursor {}

/// One contiguous slice of the pair enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairBatch {
    /// Zero-based chunk number.
    pub index: usize,
    /// Linear index of `pairs[0]` in the full enumeration.
    pub start: usize,
    pub pairs: Vec<PairIndex>,
}

/// Iterator over the batches of a [`PairSpace`].
#[derive(Debug, Clone)]
pub struct PairBatches {
    cursor: PairCursor,
    batch_size: usize,
    next_index: usize,
}

impl Iterator for PairBatches {
    type Item = PairBatch;

    fn next(&mut self) -> Option<PairBatch> {
        if self.cursor.remaining() == 0 {
            return None;
        }

        let start = self.cursor.position();
        let pairs = self.cursor.next_batch(self.batch_size);
        let index = self.next_index;
        self.next_index += 1;
        Some(PairBatch {
            index,
            start,
            pairs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nested_loop_pairs(n: usize) -> Vec<PairIndex> {
        let mut pairs = Vec::new();
        for i in 0..n {
            for j in (i + 1)..n {
                pairs.push(PairIndex::new(i, j));
            }
        }
        pairs
    }

    #[test]
    fn fewer_than_two_features_have_no_pairs_or_chunks() {
        for n in [0, 1] {
            let space = PairSpace::new(n);
            assert_eq!(space.total_pairs(), 0);
            assert_eq!(space.num_chunks(5), Ok(0));
            assert_eq!(space.batches(5).unwrap().count(), 0);
            assert_eq!(space.cursor().next(), None);
            assert_eq!(space.pair_at(0), None);
        }
    }

    #[test]
    fn cursor_reproduces_lexicographic_order() {
        for n in 2..12 {
            let pairs: Vec<PairIndex> = PairSpace::new(n).cursor().collect();
            assert_eq!(pairs, nested_loop_pairs(n));
        }
    }

    #[test]
    fn pair_at_inverts_triangular_numbering() {
        for n in [2, 3, 7, 64, 301] {
            let space = PairSpace::new(n);
            for (k, expected) in nested_loop_pairs(n).into_iter().enumerate() {
                assert_eq!(space.pair_at(k), Some(expected), "n={n}, k={k}");
            }
            assert_eq!(space.pair_at(space.total_pairs()), None);
        }
    }

    #[test]
    fn pair_at_is_exact_for_large_spaces() {
        let space = PairSpace::new(200_000);
        let total = space.total_pairs();
        assert_eq!(space.pair_at(0), Some(PairIndex::new(0, 1)));
        assert_eq!(space.pair_at(total - 1), Some(PairIndex::new(199_998, 199_999)));
        assert_eq!(space.pair_at(199_998), Some(PairIndex::new(0, 199_999)));
        assert_eq!(space.pair_at(199_999), Some(PairIndex::new(1, 2)));
    }

    #[test]
    fn batches_partition_the_space_without_gaps_or_repeats() {
        let space = PairSpace::new(23);
        for batch_size in [1, 7, 50, 253, 1000] {
            let batches: Vec<PairBatch> = space.batches(batch_size).unwrap().collect();
            assert_eq!(Ok(batches.len()), space.num_chunks(batch_size));

            let mut expected_start = 0;
            for (index, batch) in batches.iter().enumerate() {
                assert_eq!(batch.index, index);
                assert_eq!(batch.start, expected_start);
                assert!(!batch.pairs.is_empty() && batch.pairs.len() <= batch_size);
                assert_eq!(space.pair_at(batch.start), Some(batch.pairs[0]));
                expected_start += batch.pairs.len();
            }

            let flattened: Vec<PairIndex> =
                batches.into_iter().flat_map(|batch| batch.pairs).collect();
            assert_eq!(flattened, nested_loop_pairs(23));
        }
    }

    #[test]
    fn three_features_with_unit_batches_give_three_chunks() {
        let space = PairSpace::new(3);
        let batches: Vec<PairBatch> = space.batches(1).unwrap().collect();
        assert_eq!(batches.len(), 3);
        assert!(batches.iter().all(|batch| batch.pairs.len() == 1));

        let single: Vec<PairBatch> = space.batches(10).unwrap().collect();
        assert_eq!(single.len(), 1);
        assert_eq!(single[0].pairs.len(), 3);
    }

    #[test]
    fn zero_batch_size_is_an_error_not_a_panic() {
        let space = PairSpace::new(4);
        assert_eq!(space.num_chunks(0), Err(ScreenError::InvalidBatchSize(0)));
        assert!(matches!(
            space.batches(0),
            Err(ScreenError::InvalidBatchSize(0))
        ));
    }

    #[test]
    fn cursor_at_resumes_mid_space() {
        let space = PairSpace::new(9);
        let mut cursor = space.cursor_at(20);
        assert_eq!(cursor.remaining(), 16);
        assert_eq!(cursor.next(), space.pair_at(20));

        let tail: Vec<PairIndex> = space.cursor_at(21).collect();
        assert_eq!(tail, nested_loop_pairs(9)[21..].to_vec());
        assert_eq!(space.cursor_at(1_000).remaining(), 0);
    }
}
