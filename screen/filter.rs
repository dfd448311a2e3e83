use crate::types::{PairIndex, ResultRecord, ScreenTable};
use crossbeam_queue::SegQueue;
use ndarray::parallel::prelude::*;
use ndarray::{ArrayView2, Axis};

/// Append-only, lock-free collection shared by every filter worker across all batches.
///
/// Records arrive in no particular order; `into_table` sorts them once at the end.
#[derive(Debug, Default)]
pub struct ResultSink {
    queue: SegQueue<ResultRecord>,
}

impl ResultSink {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn push(&self, record: ResultRecord) {
        self.queue.push(record);
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Drains the sink into a table sorted by `(feature1, feature2, group)`.
    pub fn into_table(self) -> ScreenTable {
        let mut records = Vec::with_capacity(self.queue.len());
        while let Some(record) = self.queue.pop() {
            records.push(record);
        }
        ScreenTable::from_records(records)
    }
}

/// Appends every `(pair, group)` cell of `auc` strictly above `threshold` to `sink`.
///
/// Row `p` of `auc` belongs to `pairs[p]`. Returns how many records this call added.
pub fn filter_above_threshold(
    auc: ArrayView2<f64>,
    pairs: &[PairIndex],
    threshold: f64,
    sink: &ResultSink,
) -> usize {
    debug_assert_eq!(auc.nrows(), pairs.len());

    auc.axis_iter(Axis(0))
        .into_par_iter()
        .zip(pairs.par_iter())
        .map(|(row, &pair)| {
            let mut kept = 0usize;
            for (group, &value) in row.iter().enumerate() {
                if value > threshold {
                    sink.push(ResultRecord::from_cell(pair, group, value));
                    kept += 1;
                }
            }
            kept
        })
        .sum()
}
