// ========================================================================================
//
//                    THE PAIR BATCH SCHEDULER: RATIO -> AUC -> FILTER
//
// ========================================================================================
//
// This module owns the only cross-batch state of a screening run: the pair cursor and
// the shared result sink. Every batch passes through three fork-join stages on the
// rayon pool, and each stage finishes before the next one reads its output:
//
//   1. ratio:  samples x batch matrix of feature quotients
//   2. AUC:    batch x groups table, one rank scan per (pair, group)
//   3. filter: cells strictly above the threshold are pushed into the sink
//
// Batches run one after another, so peak memory is a single batch's ratio matrix and
// AUC table regardless of how many features are screened.

use crate::columns;
use crate::filter::{self, ResultSink};
use crate::pairs::PairSpace;
use crate::progress::{NoopScreenProgress, ScreenProgressObserver};
use crate::ratio;
use crate::types::{GroupLabels, PairIndex, ScreenError, ScreenTable};
use ndarray::ArrayView2;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Number of pairs per batch when the caller does not choose one.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Bookkeeping for a finished screening run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenSummary {
    pub total_pairs: usize,
    pub chunks: usize,
    pub records_kept: usize,
    /// Size of the rayon pool the batches ran on.
    pub threads: usize,
    /// Ratio cells that were `NaN` or infinite. They were ranked, not dropped.
    pub non_finite_ratios: usize,
    pub elapsed: Duration,
}

/// Bytes held by one batch's ratio matrix, AUC table and pair list.
pub fn estimated_batch_bytes(n_samples: usize, n_groups: usize, batch_size: usize) -> usize {
    let per_pair = (n_samples + n_groups) * size_of::<f64>() + size_of::<PairIndex>();
    per_pair.saturating_mul(batch_size)
}

/// The largest batch size whose temporaries fit in `budget_bytes`, never less than 1.
pub fn batch_size_for_budget(n_samples: usize, n_groups: usize, budget_bytes: usize) -> usize {
    let per_pair = estimated_batch_bytes(n_samples, n_groups, 1);
    (budget_bytes / per_pair).max(1)
}

/// Configurable pairwise ratio screen.
///
/// ```ignore
/// let table = PairScreen::new(0.8).batch_size(500).run(matrix.view(), &labels)?;
/// ```
#[derive(Debug, Clone)]
pub struct PairScreen {
    threshold: f64,
    batch_size: usize,
    threads: Option<usize>,
    cancel: Option<Arc<AtomicBool>>,
}

impl PairScreen {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            batch_size: DEFAULT_BATCH_SIZE,
            threads: None,
            cancel: None,
        }
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Runs on a dedicated pool of this many threads instead of the global rayon pool.
    pub fn threads(mut self, threads: Option<usize>) -> Self {
        self.threads = threads;
        self
    }

    /// A flag checked before every batch. Once set, the run stops with `Cancelled`.
    pub fn cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn run(
        &self,
        matrix: ArrayView2<f64>,
        group_labels: &[i64],
    ) -> Result<ScreenTable, ScreenError> {
        self.run_with_summary(matrix, group_labels, &mut NoopScreenProgress)
            .map(|(table, _)| table)
    }

    pub fn run_with_summary<P>(
        &self,
        matrix: ArrayView2<f64>,
        group_labels: &[i64],
        progress: &mut P,
    ) -> Result<(ScreenTable, ScreenSummary), ScreenError>
    where
        P: ScreenProgressObserver + Send,
    {
        self.validate(matrix, group_labels)?;
        let labels = GroupLabels::normalize(group_labels)?;

        match self.threads {
            Some(threads) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .map_err(|e| ScreenError::ThreadPool(e.to_string()))?;
                pool.install(|| self.schedule(matrix, &labels, progress))
            }
            None => self.schedule(matrix, &labels, progress),
        }
    }

    fn validate(&self, matrix: ArrayView2<f64>, group_labels: &[i64]) -> Result<(), ScreenError> {
        if self.batch_size == 0 {
            return Err(ScreenError::InvalidBatchSize(self.batch_size));
        }
        if self.threshold.is_nan() {
            return Err(ScreenError::InvalidThreshold);
        }
        if self.threads == Some(0) {
            return Err(ScreenError::InvalidThreadCount);
        }
        if matrix.nrows() != group_labels.len() {
            return Err(ScreenError::LabelCountMismatch {
                rows: matrix.nrows(),
                labels: group_labels.len(),
            });
        }
        if matrix.ncols() < 2 {
            return Err(ScreenError::TooFewFeatures(matrix.ncols()));
        }
        Ok(())
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    fn schedule<P: ScreenProgressObserver>(
        &self,
        matrix: ArrayView2<f64>,
        labels: &GroupLabels,
        progress: &mut P,
    ) -> Result<(ScreenTable, ScreenSummary), ScreenError> {
        let started = Instant::now();
        let space = PairSpace::new(matrix.ncols());
        let total_batches = space.num_chunks(self.batch_size)?;
        let threads = rayon::current_num_threads();

        log::info!(
            "Screening {} pairs of {} features over {} samples and {} groups in {} batches of up to {} pairs (~{} MiB per batch) on {} threads",
            space.total_pairs(),
            space.n_features(),
            labels.len(),
            labels.num_groups(),
            total_batches,
            self.batch_size,
            estimated_batch_bytes(labels.len(), labels.num_groups(), self.batch_size) >> 20,
            threads
        );
        for group in labels.empty_groups() {
            log::warn!(
                "Group {} (raw label {}) has no samples; its AUC is 0 for every pair.",
                group + 1,
                labels.min_label() + group as i64
            );
        }

        let sink = ResultSink::new();
        let mut non_finite_ratios = 0usize;

        progress.on_start(total_batches);
        for batch in space.batches(self.batch_size)? {
            if self.is_cancelled() {
                log::warn!(
                    "Screening cancelled before batch {} of {}",
                    batch.index + 1,
                    total_batches
                );
                return Err(ScreenError::Cancelled {
                    completed: batch.index,
                    total: total_batches,
                });
            }

            let auc = {
                let ratios = ratio::pair_ratio_matrix(matrix, &batch.pairs);
                let batch_non_finite = ratio::count_non_finite(ratios.view());
                non_finite_ratios += batch_non_finite;
                if batch_non_finite > 0 {
                    log::debug!(
                        "Batch {} produced {} non-finite ratio cells",
                        batch.index + 1,
                        batch_non_finite
                    );
                }
                columns::column_group_auc(ratios.view(), labels)
            };
            let kept =
                filter::filter_above_threshold(auc.view(), &batch.pairs, self.threshold, &sink);

            log::debug!(
                "Batch {}/{}: pairs {}..{}, kept {} records",
                batch.index + 1,
                total_batches,
                batch.start,
                batch.start + batch.pairs.len(),
                kept
            );
            progress.on_batch_finished(batch.index + 1, sink.len());
        }
        progress.on_finish();

        let records_kept = sink.len();
        let table = sink.into_table();
        let summary = ScreenSummary {
            total_pairs: space.total_pairs(),
            chunks: total_batches,
            records_kept,
            threads,
            non_finite_ratios,
            elapsed: started.elapsed(),
        };

        log::info!(
            "Screening complete: {} of {} pair/group cells exceed AUC {} ({:.2?})",
            records_kept,
            summary.total_pairs * labels.num_groups(),
            self.threshold,
            summary.elapsed
        );
        if non_finite_ratios > 0 {
            log::warn!(
                "{non_finite_ratios} ratio cells were NaN or infinite (zero or non-finite denominators); they were ranked as-is."
            );
        }

        Ok((table, summary))
    }
}

/// Screens every feature pair's ratio for one-vs-rest AUC above `threshold`.
///
/// Rows of the result carry 1-based feature indices and 1-based group indices, where
/// the group index is the position of the label after zero-basing, plus one.
pub fn screen_paired_feature_auc(
    matrix: ArrayView2<f64>,
    group_labels: &[i64],
    threshold: f64,
    batch_size: usize,
) -> Result<ScreenTable, ScreenError> {
    PairScreen::new(threshold)
        .batch_size(batch_size)
        .run(matrix, group_labels)
}
