use crate::config::Normalize;
use crate::result::{ChartDatum, CrosstabResult};

/// Cell values after normalization, `matrix[row][column]`.
///
/// `Row` divides each cell by the sum of its own row so every non-empty row
/// sums to 100; rows summing to zero stay at zero. `Total` divides by the
/// grand total, falling back to the sum of all cells when the reported total
/// is zero.
pub fn normalized_matrix(result: &CrosstabResult, normalize: Normalize) -> Vec<Vec<f64>> {
    let columns = result.column_labels.len();
    let rows = (0..result.row_labels.len()).map(|row| {
        (0..columns)
            .map(|column| result.cell(row, column))
            .collect::<Vec<f64>>()
    });

    match normalize {
        Normalize::None => rows.collect(),
        Normalize::Row => rows
            .map(|cells| {
                let sum: f64 = cells.iter().sum();
                cells.iter().map(|cell| percent(*cell, sum)).collect()
            })
            .collect(),
        Normalize::Total => {
            let matrix: Vec<Vec<f64>> = rows.collect();
            let total = if result.grand_total != 0.0 {
                result.grand_total
            } else {
                matrix.iter().flatten().sum()
            };
            matrix
                .into_iter()
                .map(|cells| cells.iter().map(|cell| percent(*cell, total)).collect())
                .collect()
        }
    }
}

fn percent(value: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        value / denominator * 100.0
    }
}

/// One record per row: `label`, one field per column label, and `total`.
pub fn crosstab_chart(result: &CrosstabResult, normalize: Normalize) -> Vec<ChartDatum> {
    let matrix = normalized_matrix(result, normalize);

    result
        .row_labels
        .iter()
        .zip(matrix)
        .enumerate()
        .map(|(row, (label, cells))| {
            let total = if normalize.is_set() {
                cells.iter().sum()
            } else {
                result.row_totals.get(row).copied().unwrap_or_else(|| cells.iter().sum())
            };
            let mut datum = ChartDatum::new().with("label", label.as_str());
            for (column, value) in result.column_labels.iter().zip(cells) {
                datum.insert(column.as_str(), value);
            }
            datum.insert("total", total);
            datum
        })
        .collect()
}
