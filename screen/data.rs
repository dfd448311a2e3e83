//! # Data Loading and Result Output
//!
//! Reads a tab-separated sample table into the dense structures used by the
//! screening core, and writes screening results back out as TSV.
//!
//! - Input layout: one header row, one row per sample. A single integer column
//!   (default `group`) holds the group label; every other column is a numeric
//!   feature, in file order. Feature `k` in result tables is the `k`-th such column.
//! - Missing cells are rejected. Non-finite feature values (`NaN`, `inf`) are
//!   accepted and passed through untouched, because the core ranks them as-is.
//! - Output headers follow the `col1 col2 group AUC` convention, extended with
//!   the feature names for readability.

use crate::types::ScreenTable;
use ndarray::{Array2, ArrayView2, ShapeBuilder};
use polars::prelude::*;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

/// Validated input ready for screening.
#[derive(Debug)]
pub struct ScreenData {
    /// Shape: `[n_samples, n_features]`, column-major.
    pub features: Array2<f64>,
    /// Raw group label per sample.
    pub labels: Vec<i64>,
    /// Header name of each feature column, in matrix column order.
    pub feature_names: Vec<String>,
}

#[derive(Error, Debug)]
pub enum DataError {
    #[error("Error from the underlying Polars DataFrame library: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Feature matrix could not be assembled: {0}")]
    ShapeError(#[from] ndarray::ShapeError),
    #[error(
        "The group column '{0}' was not found in the input file. Please check spelling and case."
    )]
    ColumnNotFound(String),
    #[error(
        "The column '{column_name}' could not be converted to the expected type '{expected_type}'. (Found type: {found_type})"
    )]
    ColumnWrongType {
        column_name: String,
        expected_type: &'static str,
        found_type: String,
    },
    #[error(
        "Missing or null values were found in the column '{0}'. Screening requires complete data."
    )]
    MissingValuesFound(String),
    #[error("Group label {value} in row {row} of column '{column_name}' is not an integer.")]
    NonIntegerLabel {
        column_name: String,
        row: usize,
        value: f64,
    },
    #[error("The input file has no data rows.")]
    NoRows,
    #[error("The input file has no feature columns besides the group column '{0}'.")]
    NoFeatureColumns(String),
}

/// Loads a sample table, splitting it into the group label column and the features.
pub fn load_screen_data(path: &Path, group_column: &str) -> Result<ScreenData, DataError> {
    log::info!("Loading data from '{}'", path.display());

    let df = CsvReader::new(File::open(path)?)
        .with_options(
            CsvReadOptions::default()
                .with_has_header(true)
                .with_parse_options(CsvParseOptions::default().with_separator(b'\t')),
        )
        .finish()?;

    if df.height() == 0 {
        return Err(DataError::NoRows);
    }

    let column_names: Vec<String> = df
        .get_column_names()
        .into_iter()
        .map(|name| name.to_string())
        .collect();
    if !column_names.iter().any(|name| name == group_column) {
        return Err(DataError::ColumnNotFound(group_column.to_string()));
    }

    let feature_names: Vec<String> = column_names
        .into_iter()
        .filter(|name| name != group_column)
        .collect();
    if feature_names.is_empty() {
        return Err(DataError::NoFeatureColumns(group_column.to_string()));
    }

    let labels = extract_labels(&df, group_column)?;

    let n_rows = df.height();
    let mut buffer = Vec::with_capacity(n_rows * feature_names.len());
    for name in &feature_names {
        let mut column = extract_numeric_column(&df, name)?;
        buffer.append(&mut column);
    }
    let features = Array2::from_shape_vec((n_rows, feature_names.len()).f(), buffer)?;

    log::info!(
        "Loaded {} samples with {} feature columns",
        n_rows,
        feature_names.len()
    );

    Ok(ScreenData {
        features,
        labels,
        feature_names,
    })
}

fn extract_numeric_column(df: &DataFrame, column_name: &str) -> Result<Vec<f64>, DataError> {
    let series = df.column(column_name)?;
    if series.null_count() > 0 {
        return Err(DataError::MissingValuesFound(column_name.to_string()));
    }

    let wrong_type = || DataError::ColumnWrongType {
        column_name: column_name.to_string(),
        expected_type: "f64 (numeric)",
        found_type: format!("{:?}", series.dtype()),
    };
    let casted = series.cast(&DataType::Float64).map_err(|_| wrong_type())?;
    if casted.null_count() > 0 {
        return Err(wrong_type());
    }

    let chunked = casted.f64()?.rechunk();
    Ok(chunked.into_no_null_iter().collect())
}

/// Reads the group column as `i64`.
///
/// Integer-typed columns are cast directly so labels beyond 2^53 stay distinct. Float
/// columns must hold whole numbers inside the `i64` range.
fn extract_labels(df: &DataFrame, column_name: &str) -> Result<Vec<i64>, DataError> {
    let series = df.column(column_name)?;
    if series.dtype().is_integer() {
        if series.null_count() > 0 {
            return Err(DataError::MissingValuesFound(column_name.to_string()));
        }
        let wrong_type = || DataError::ColumnWrongType {
            column_name: column_name.to_string(),
            expected_type: "i64 (integer)",
            found_type: format!("{:?}", series.dtype()),
        };
        // Unsigned values above i64::MAX become null under the cast.
        let casted = series.cast(&DataType::Int64).map_err(|_| wrong_type())?;
        if casted.null_count() > 0 {
            return Err(wrong_type());
        }
        let chunked = casted.i64()?.rechunk();
        return Ok(chunked.into_no_null_iter().collect());
    }

    // i64::MIN as f64 is exactly -2^63; i64::MAX as f64 rounds up to 2^63.
    let lower = i64::MIN as f64;
    let upper = i64::MAX as f64;
    let values = extract_numeric_column(df, column_name)?;
    values
        .into_iter()
        .enumerate()
        .map(|(row, value)| {
            let in_range = value >= lower && value < upper;
            if !in_range || value.fract() != 0.0 {
                return Err(DataError::NonIntegerLabel {
                    column_name: column_name.to_string(),
                    row: row + 1,
                    value,
                });
            }
            Ok(value as i64)
        })
        .collect()
}

fn feature_name(feature_names: &[String], one_based: usize) -> &str {
    feature_names
        .get(one_based.wrapping_sub(1))
        .map_or("", String::as_str)
}

/// Writes a pair screening table as TSV with `col1 col2 group AUC name1 name2` columns.
pub fn write_screen_table(
    path: &Path,
    table: &ScreenTable,
    feature_names: &[String],
) -> Result<(), DataError> {
    let mut out = BufWriter::new(File::create(path)?);
    writeln!(out, "col1\tcol2\tgroup\tAUC\tname1\tname2")?;
    for record in table.records() {
        writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}\t{}",
            record.feature1,
            record.feature2,
            record.group,
            record.auc,
            feature_name(feature_names, record.feature1),
            feature_name(feature_names, record.feature2)
        )?;
    }
    out.flush()?;
    Ok(())
}

/// Writes a `features x groups` AUC table as TSV with `feature group1 .. groupK` columns.
pub fn write_auc_table(
    path: &Path,
    auc: ArrayView2<f64>,
    feature_names: &[String],
) -> Result<(), DataError> {
    let mut out = BufWriter::new(File::create(path)?);

    write!(out, "feature")?;
    for group in 1..=auc.ncols() {
        write!(out, "\tgroup{group}")?;
    }
    writeln!(out)?;

    for (index, row) in auc.rows().into_iter().enumerate() {
        write!(out, "{}", feature_name(feature_names, index + 1))?;
        for value in row {
            write!(out, "\t{value}")?;
        }
        writeln!(out)?;
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PairIndex, ResultRecord};
    use ndarray::array;
    use std::io;
    use tempfile::NamedTempFile;

    fn create_test_tsv(content: &str) -> io::Result<NamedTempFile> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "{}", content)?;
        file.flush()?;
        Ok(file)
    }

    #[test]
    fn loads_features_in_file_order_around_the_group_column() {
        let file =
            create_test_tsv("geneA\tgroup\tgeneB\n1.0\t2\t4.0\n2.5\t3\t0.5\n3.0\t2\tNaN").unwrap();
        let data = load_screen_data(file.path(), "group").unwrap();

        assert_eq!(data.feature_names, vec!["geneA", "geneB"]);
        assert_eq!(data.labels, vec![2, 3, 2]);
        assert_eq!(data.features.dim(), (3, 2));
        assert_eq!(data.features[[1, 0]], 2.5);
        assert_eq!(data.features[[0, 1]], 4.0);
        assert!(data.features[[2, 1]].is_nan());
    }

    #[test]
    fn integral_float_labels_are_accepted_and_fractional_ones_rejected() {
        let file = create_test_tsv("cohort\tx\ty\n1.0\t1\t2\n0.0\t3\t4").unwrap();
        let data = load_screen_data(file.path(), "cohort").unwrap();
        assert_eq!(data.labels, vec![1, 0]);

        let file = create_test_tsv("cohort\tx\ty\n1.5\t1\t2\n0.0\t3\t4").unwrap();
        match load_screen_data(file.path(), "cohort").unwrap_err() {
            DataError::NonIntegerLabel { row, value, .. } => {
                assert_eq!(row, 1);
                assert_eq!(value, 1.5);
            }
            other => panic!("Expected NonIntegerLabel, got {:?}", other),
        }
    }

    #[test]
    fn integer_labels_beyond_float_precision_stay_distinct() {
        let file =
            create_test_tsv("group\tx\ty\n9007199254740993\t1\t2\n9007199254740992\t3\t4")
                .unwrap();
        let data = load_screen_data(file.path(), "group").unwrap();

        assert_eq!(data.labels, vec![9_007_199_254_740_993, 9_007_199_254_740_992]);
        assert_ne!(data.labels[0], data.labels[1]);
    }

    #[test]
    fn float_labels_outside_the_integer_range_are_rejected() {
        let file = create_test_tsv("group\tx\ty\n9.3e18\t1\t2\n0.0\t3\t4").unwrap();
        match load_screen_data(file.path(), "group").unwrap_err() {
            DataError::NonIntegerLabel { row, .. } => assert_eq!(row, 1),
            other => panic!("Expected NonIntegerLabel, got {:?}", other),
        }
    }

    #[test]
    fn missing_group_column_and_missing_cells_are_reported() {
        let file = create_test_tsv("a\tb\n1\t2").unwrap();
        match load_screen_data(file.path(), "group").unwrap_err() {
            DataError::ColumnNotFound(name) => assert_eq!(name, "group"),
            other => panic!("Expected ColumnNotFound, got {:?}", other),
        }

        let file = create_test_tsv("group\ta\tb\n1\t\t2\n0\t3\t4").unwrap();
        match load_screen_data(file.path(), "group").unwrap_err() {
            DataError::MissingValuesFound(name) => assert_eq!(name, "a"),
            other => panic!("Expected MissingValuesFound(a), got {:?}", other),
        }
    }

    #[test]
    fn text_feature_columns_are_rejected() {
        let file = create_test_tsv("group\ta\tb\n1\tx\t2\n0\ty\t4").unwrap();
        match load_screen_data(file.path(), "group").unwrap_err() {
            DataError::ColumnWrongType { column_name, .. } => assert_eq!(column_name, "a"),
            other => panic!("Expected ColumnWrongType(a), got {:?}", other),
        }
    }

    #[test]
    fn group_column_alone_is_not_enough() {
        let file = create_test_tsv("group\n1\n0").unwrap();
        assert!(matches!(
            load_screen_data(file.path(), "group"),
            Err(DataError::NoFeatureColumns(_))
        ));
    }

    #[test]
    fn screen_table_is_written_with_names() {
        let table = ScreenTable::from_records(vec![
            ResultRecord::from_cell(PairIndex::new(0, 2), 1, 0.875),
            ResultRecord::from_cell(PairIndex::new(0, 1), 0, 0.75),
        ]);
        let names = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let file = NamedTempFile::new().unwrap();
        write_screen_table(file.path(), &table, &names).unwrap();

        let written = std::fs::read_to_string(file.path()).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines[0], "col1\tcol2\tgroup\tAUC\tname1\tname2");
        assert_eq!(lines[1], "1\t2\t1\t0.75\ta\tb");
        assert_eq!(lines[2], "1\t3\t2\t0.875\ta\tc");
    }

    #[test]
    fn auc_table_has_one_column_per_group() {
        let auc = array![[0.5, 0.25], [1.0, 0.0]];
        let names = vec!["x".to_string(), "y".to_string()];
        let file = NamedTempFile::new().unwrap();
        write_auc_table(file.path(), auc.view(), &names).unwrap();

        let written = std::fs::read_to_string(file.path()).unwrap();
        assert_eq!(written, "feature\tgroup1\tgroup2\nx\t0.5\t0.25\ny\t1\t0\n");
    }
}
