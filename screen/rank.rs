// ========================================================================================
//
//                      RANK-SUM AUC FOR A SINGLE SCORE COLUMN
//
// ========================================================================================
//
// One-vs-rest AUC computed with a single descending scan. Each negative adds the
// fraction of positives already seen above it; the total is averaged over negatives.
// This equals the probability that a random positive outranks a random negative.
//
// Tied scores are not split evenly. They keep the order produced by a stable sort
// over the input rows, so earlier rows are scanned first. Fixtures with
// duplicate scores depend on this exact order.

use crate::types::GroupLabels;
use ndarray::{ArrayView1, ArrayViewMut1};

/// Reusable buffers for ranking one column. One instance per worker thread avoids
/// reallocating the permutation for every column of a batch.
#[derive(Debug, Default)]
pub struct RankScratch {
    order: Vec<usize>,
    ranked_groups: Vec<usize>,
}

impl RankScratch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Orders rows by score, highest first, and returns their group indices in that order.
    ///
    /// The ordering is `f64::total_cmp`, so a positive NaN ranks above `+inf` and a
    /// negative NaN below `-inf`. Equal scores keep ascending row order.
    pub fn rank(&mut self, scores: ArrayView1<f64>, groups: &[usize]) -> &[usize] {
        debug_assert_eq!(scores.len(), groups.len());

        self.order.clear();
        self.order.extend(0..scores.len());
        self.order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

        self.ranked_groups.clear();
        self.ranked_groups
            .extend(self.order.iter().map(|&row| groups[row]));
        &self.ranked_groups
    }
}

/// AUC of `target` against every other group over an already ranked column.
///
/// Returns exactly 0 when either class is empty.
#[inline]
pub fn auc_for_group(
    ranked_groups: &[usize],
    target: usize,
    positives: usize,
    negatives: usize,
) -> f64 {
    if positives == 0 || negatives == 0 {
        return 0.0;
    }

    let positives = positives as f64;
    let mut cumulative_positives = 0.0;
    let mut auc = 0.0;
    for &group in ranked_groups {
        if group == target {
            cumulative_positives += 1.0;
        } else {
            auc += cumulative_positives / positives;
        }
    }
    auc / negatives as f64
}

/// Fills `out[g]` with the AUC of `scores` for every group `g`.
///
/// The column is sorted once and scanned once per group.
pub fn column_auc_into(
    scores: ArrayView1<f64>,
    labels: &GroupLabels,
    scratch: &mut RankScratch,
    mut out: ArrayViewMut1<f64>,
) {
    debug_assert_eq!(out.len(), labels.num_groups());

    let ranked = scratch.rank(scores, labels.as_slice());
    for (group, cell) in out.iter_mut().enumerate() {
        let (positives, negatives) = labels.class_sizes(group);
        *cell = auc_for_group(ranked, group, positives, negatives);
    }
}

/// AUC of a single score column for one zero-based target group.
pub fn rank_auc(scores: ArrayView1<f64>, labels: &GroupLabels, target: usize) -> f64 {
    let (positives, negatives) = labels.class_sizes(target);
    let mut scratch = RankScratch::new();
    let ranked = scratch.rank(scores, labels.as_slice());
    auc_for_group(ranked, target, positives, negatives)
}
