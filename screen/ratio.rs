use crate::types::PairIndex;
use ndarray::parallel::prelude::*;
use ndarray::{Array2, ArrayView2, Axis, ShapeBuilder, Zip};

/// Builds the `samples x pairs` matrix of `matrix[:, first] / matrix[:, second]`.
///
/// Denominators are not guarded. Zero and sign changes follow IEEE-754 and yield
/// `inf`, `-inf` or `NaN`, which flow unchanged into ranking. The output is
/// column-major so every pair's ratios are contiguous for the sort that follows.
pub fn pair_ratio_matrix(matrix: ArrayView2<f64>, pairs: &[PairIndex]) -> Array2<f64> {
    let mut ratios = Array2::zeros((matrix.nrows(), pairs.len()).f());
    ratios
        .axis_iter_mut(Axis(1))
        .into_par_iter()
        .zip(pairs.par_iter())
        .for_each(|(mut out, pair)| {
            debug_assert!(pair.second < matrix.ncols());
            Zip::from(&mut out)
                .and(matrix.column(pair.first))
                .and(matrix.column(pair.second))
                .for_each(|ratio, &numerator, &denominator| *ratio = numerator / denominator);
        });
    ratios
}

/// Number of `NaN` or infinite cells in a ratio matrix.
pub fn count_non_finite(ratios: ArrayView2<f64>) -> usize {
    ratios.into_par_iter().filter(|value| !value.is_finite()).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn ratios_follow_pair_order() {
        let matrix = array![[1.0, 2.0, 4.0], [3.0, 6.0, 1.5]];
        let pairs = [PairIndex::new(0, 1), PairIndex::new(1, 2), PairIndex::new(0, 2)];
        let ratios = pair_ratio_matrix(matrix.view(), &pairs);

        assert_eq!(ratios, array![[0.5, 0.5, 0.25], [0.5, 4.0, 2.0]]);
    }

    #[test]
    fn zero_denominators_propagate_as_non_finite() {
        let matrix = array![[1.0, 0.0], [0.0, 0.0], [-2.0, 0.0], [3.0, -1.0]];
        let ratios = pair_ratio_matrix(matrix.view(), &[PairIndex::new(0, 1)]);

        assert_eq!(ratios[[0, 0]], f64::INFINITY);
        assert!(ratios[[1, 0]].is_nan());
        assert_eq!(ratios[[2, 0]], f64::NEG_INFINITY);
        assert_eq!(ratios[[3, 0]], -3.0);
        assert_eq!(count_non_finite(ratios.view()), 3);
    }

    #[test]
    fn empty_pair_list_yields_no_columns() {
        let matrix = array![[1.0, 2.0]];
        let ratios = pair_ratio_matrix(matrix.view(), &[]);
        assert_eq!(ratios.dim(), (1, 0));
        assert_eq!(count_non_finite(ratios.view()), 0);
    }

    #[test]
    fn non_finite_count_covers_strided_views() {
        let ratios = array![
            [f64::NAN, 1.0, f64::INFINITY],
            [2.0, f64::NEG_INFINITY, 3.0],
            [f64::NAN, 4.0, 5.0]
        ];
        assert_eq!(count_non_finite(ratios.view()), 4);
        assert_eq!(count_non_finite(ratios.t()), 4);
        assert_eq!(count_non_finite(ratios.slice(ndarray::s![.., 1..])), 2);
    }
}
