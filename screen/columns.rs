use crate::rank::{self, RankScratch};
use crate::types::{GroupLabels, ScreenError};
use ndarray::parallel::prelude::*;
use ndarray::{Array2, ArrayView2, Axis};

/// Computes the `columns x groups` AUC table for already normalized labels.
///
/// Columns are independent; each rayon worker keeps its own ranking scratch and
/// writes a disjoint output row.
pub fn column_group_auc(matrix: ArrayView2<f64>, labels: &GroupLabels) -> Array2<f64> {
    debug_assert_eq!(matrix.nrows(), labels.len());

    let mut auc = Array2::zeros((matrix.ncols(), labels.num_groups()));
    auc.axis_iter_mut(Axis(0))
        .into_par_iter()
        .zip(matrix.axis_iter(Axis(1)).into_par_iter())
        .for_each_init(RankScratch::new, |scratch, (out_row, column)| {
            rank::column_auc_into(column, labels, scratch, out_row);
        });
    auc
}

/// One-vs-rest AUC of every feature column against every group.
///
/// Raw labels are zero-based against their minimum, so row `c`, column `g` of the
/// result is the AUC of feature `c` for the `g`-th consecutive label value.
pub fn compute_column_group_auc(
    matrix: ArrayView2<f64>,
    group_labels: &[i64],
) -> Result<Array2<f64>, ScreenError> {
    if matrix.nrows() != group_labels.len() {
        return Err(ScreenError::LabelCountMismatch {
            rows: matrix.nrows(),
            labels: group_labels.len(),
        });
    }
    let labels = GroupLabels::normalize(group_labels)?;

    log::debug!(
        "Computing column AUC for {} features x {} groups over {} samples",
        matrix.ncols(),
        labels.num_groups(),
        labels.len()
    );
    Ok(column_group_auc(matrix, &labels))
}
