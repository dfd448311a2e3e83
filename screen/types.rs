// ========================================================================================
//                             High-Level Data Contracts
// ========================================================================================

// Types passed between the screening stages. Stage-local types stay in their own modules.

use std::fmt;
use thiserror::Error;

/// The widest label range (max - min + 1) accepted when zero-basing group labels.
/// Each group costs one AUC column per screened pair, so the span is bounded well
/// below anything that would exhaust memory on the per-batch AUC tables.
pub const MAX_GROUP_SPAN: usize = 1 << 16;

/// Errors raised while validating inputs or driving a screening run.
///
/// Every variant describes a caller mistake detected before parallel work starts,
/// except `Cancelled`, which reports a cooperative stop between batches.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScreenError {
    #[error("The feature matrix has {rows} rows, but {labels} group labels were provided.")]
    LabelCountMismatch { rows: usize, labels: usize },
    #[error("At least one labeled sample is required, but the label vector is empty.")]
    NoSamples,
    #[error("Batch size must be at least 1, but was {0}.")]
    InvalidBatchSize(usize),
    #[error("Pair screening requires at least 2 feature columns, but the matrix has {0}.")]
    TooFewFeatures(usize),
    #[error("The AUC threshold must be a number, but NaN was given.")]
    InvalidThreshold,
    #[error(
        "Group labels range from {min} to {max}; at most 65536 consecutive groups are supported."
    )]
    LabelSpanTooWide { min: i64, max: i64 },
    #[error("Thread count must be at least 1.")]
    InvalidThreadCount,
    #[error("Failed to build the screening thread pool: {0}")]
    ThreadPool(String),
    #[error("Screening was cancelled after {completed} of {total} batches.")]
    Cancelled { completed: usize, total: usize },
}

/// Group labels zero-based against the smallest observed raw label.
///
/// `num_groups` is `max - min + 1`, so a label vector such as `[2, 5]` yields four
/// groups, two of which are empty. Group indices exposed to callers are these
/// zero-based positions (plus one in result tables), never the raw label values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupLabels {
    groups: Vec<usize>,
    group_sizes: Vec<usize>,
    min_label: i64,
}

impl GroupLabels {
    pub fn normalize(raw: &[i64]) -> Result<Self, ScreenError> {
        let (min, max) = match (raw.iter().min(), raw.iter().max()) {
            (Some(&min), Some(&max)) => (min, max),
            _ => return Err(ScreenError::NoSamples),
        };

        let num_groups = max
            .checked_sub(min)
            .and_then(|span| usize::try_from(span).ok())
            .and_then(|span| span.checked_add(1))
            .filter(|&count| count <= MAX_GROUP_SPAN)
            .ok_or(ScreenError::LabelSpanTooWide { min, max })?;

        let mut group_sizes = vec![0usize; num_groups];
        let groups: Vec<usize> = raw
            .iter()
            .map(|&label| {
                // Bounded by the span check above.
                let group = (label - min) as usize;
                group_sizes[group] += 1;
                group
            })
            .collect();

        Ok(Self {
            groups,
            group_sizes,
            min_label: min,
        })
    }

    #[inline]
    pub fn as_slice(&self) -> &[usize] {
        &self.groups
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    #[inline]
    pub fn num_groups(&self) -> usize {
        self.group_sizes.len()
    }

    /// The raw label that maps to group index 0.
    pub fn min_label(&self) -> i64 {
        self.min_label
    }

    /// Number of samples in `group` (positives) and outside it (negatives).
    #[inline]
    pub fn class_sizes(&self, group: usize) -> (usize, usize) {
        let positives = self.group_sizes[group];
        (positives, self.groups.len() - positives)
    }

    /// Zero-based indices of groups that no sample belongs to.
    pub fn empty_groups(&self) -> Vec<usize> {
        self.group_sizes
            .iter()
            .enumerate()
            .filter(|(_, size)| **size == 0)
            .map(|(group, _)| group)
            .collect()
    }
}

/// Two zero-based feature columns with `first < second`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PairIndex {
    pub first: usize,
    pub second: usize,
}

impl PairIndex {
    #[inline]
    pub fn new(first: usize, second: usize) -> Self {
        debug_assert!(first < second, "pair ({first}, {second}) is not canonical");
        Self { first, second }
    }
}

impl fmt::Display for PairIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.first, self.second)
    }
}

/// One retained (pair, group) cell. Feature and group indices are 1-based.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResultRecord {
    pub feature1: usize,
    pub feature2: usize,
    pub group: usize,
    pub auc: f64,
}

impl ResultRecord {
    /// Builds the externally visible record from zero-based internal indices.
    #[inline]
    pub fn from_cell(pair: PairIndex, group: usize, auc: f64) -> Self {
        Self {
            feature1: pair.first + 1,
            feature2: pair.second + 1,
            group: group + 1,
            auc,
        }
    }

    #[inline]
    fn sort_key(&self) -> (usize, usize, usize) {
        (self.feature1, self.feature2, self.group)
    }
}

/// The flattened screening result: four column-aligned sequences sorted by
/// `(feature1, feature2, group)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScreenTable {
    pub feature1: Vec<usize>,
    pub feature2: Vec<usize>,
    pub group: Vec<usize>,
    pub auc: Vec<f64>,
}

impl ScreenTable {
    pub fn from_records(mut records: Vec<ResultRecord>) -> Self {
        // Keys are unique per (pair, group), so an unstable sort is deterministic.
        records.sort_unstable_by_key(ResultRecord::sort_key);

        let mut table = Self {
            feature1: Vec::with_capacity(records.len()),
            feature2: Vec::with_capacity(records.len()),
            group: Vec::with_capacity(records.len()),
            auc: Vec::with_capacity(records.len()),
        };
        for record in records {
            table.feature1.push(record.feature1);
            table.feature2.push(record.feature2);
            table.group.push(record.group);
            table.auc.push(record.auc);
        }
        table
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.auc.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.auc.is_empty()
    }

    /// Iterates the table row by row in its sorted order.
    pub fn records(&self) -> impl Iterator<Item = ResultRecord> + '_ {
        (0..self.len()).map(move |row| ResultRecord {
            feature1: self.feature1[row],
            feature2: self.feature2[row],
            group: self.group[row],
            auc: self.auc[row],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_zero_bases_against_minimum_label() {
        let labels = GroupLabels::normalize(&[3, 5, 3, 4]).unwrap();
        assert_eq!(labels.as_slice(), &[0, 2, 0, 1]);
        assert_eq!(labels.num_groups(), 3);
        assert_eq!(labels.min_label(), 3);
        assert_eq!(labels.class_sizes(0), (2, 2));
        assert_eq!(labels.class_sizes(2), (1, 3));
    }

    #[test]
    fn normalize_keeps_gaps_as_empty_groups() {
        let labels = GroupLabels::normalize(&[-1, 2]).unwrap();
        assert_eq!(labels.num_groups(), 4);
        assert_eq!(labels.empty_groups(), vec![1, 2]);
    }

    #[test]
    fn normalize_single_label_yields_one_group() {
        let labels = GroupLabels::normalize(&[7, 7, 7]).unwrap();
        assert_eq!(labels.num_groups(), 1);
        assert_eq!(labels.class_sizes(0), (3, 0));
    }

    #[test]
    fn normalize_rejects_empty_and_overwide_labels() {
        assert_eq!(GroupLabels::normalize(&[]), Err(ScreenError::NoSamples));
        assert_eq!(
            GroupLabels::normalize(&[i64::MIN, i64::MAX]),
            Err(ScreenError::LabelSpanTooWide {
                min: i64::MIN,
                max: i64::MAX
            })
        );
        assert!(matches!(
            GroupLabels::normalize(&[0, MAX_GROUP_SPAN as i64]),
            Err(ScreenError::LabelSpanTooWide { .. })
        ));
        assert!(GroupLabels::normalize(&[0, MAX_GROUP_SPAN as i64 - 1]).is_ok());
    }

    #[test]
    fn screen_table_sorts_records_and_uses_one_based_indices() {
        let records = vec![
            ResultRecord::from_cell(PairIndex::new(1, 2), 0, 0.9),
            ResultRecord::from_cell(PairIndex::new(0, 2), 1, 0.8),
            ResultRecord::from_cell(PairIndex::new(0, 2), 0, 0.7),
        ];
        let table = ScreenTable::from_records(records);

        assert_eq!(table.feature1, vec![1, 1, 2]);
        assert_eq!(table.feature2, vec![3, 3, 3]);
        assert_eq!(table.group, vec![1, 2, 1]);
        assert_eq!(table.auc, vec![0.7, 0.8, 0.9]);
        assert_eq!(table.records().count(), 3);
    }
}
