//! Checks that transformed results still account for every row.

use super::TransformError;
use crate::result::{CrosstabResult, GroupedStatsResult};

const TOLERANCE: f64 = 1e-6;

/// Verifies a grouped result against the dataset it was computed from.
///
/// Group counts must add up to the backend's `total_count`, and
/// `total_count + missing_count` must equal the dataset row count.
pub fn check_group_totals(
    result: &GroupedStatsResult,
    dataset_rows: u64,
) -> Result<(), TransformError> {
    let grouped: u64 = result.groups.iter().map(|group| group.count).sum();
    if grouped != result.total_count {
        return Err(TransformError::TotalsMismatch {
            what: "sum of group counts vs reported total".to_string(),
            expected: result.total_count as f64,
            actual: grouped as f64,
        });
    }

    let accounted = result.total_count + result.missing_count;
    if accounted != dataset_rows {
        return Err(TransformError::TotalsMismatch {
            what: "grouped plus missing rows vs dataset rows".to_string(),
            expected: dataset_rows as f64,
            actual: accounted as f64,
        });
    }
    Ok(())
}

/// Verifies that cells add up to the reported row, column and grand totals.
///
/// Only meaningful for additive aggregations (count, sum).
pub fn check_crosstab_totals(result: &CrosstabResult) -> Result<(), TransformError> {
    let columns = result.column_labels.len();

    for (row, label) in result.row_labels.iter().enumerate() {
        let sum: f64 = (0..columns).map(|column| result.cell(row, column)).sum();
        let reported = result.row_totals.get(row).copied().unwrap_or(0.0);
        compare(format!("row '{}' total", label), reported, sum)?;
    }

    for (column, label) in result.column_labels.iter().enumerate() {
        let sum: f64 = (0..result.row_labels.len())
            .map(|row| result.cell(row, column))
            .sum();
        let reported = result.column_totals.get(column).copied().unwrap_or(0.0);
        compare(format!("column '{}' total", label), reported, sum)?;
    }

    let sum: f64 = result.row_totals.iter().sum();
    compare("grand total".to_string(), result.grand_total, sum)
}

fn compare(what: String, expected: f64, actual: f64) -> Result<(), TransformError> {
    if (expected - actual).abs() > TOLERANCE {
        Err(TransformError::TotalsMismatch {
            what,
            expected,
            actual,
        })
    } else {
        Ok(())
    }
}
