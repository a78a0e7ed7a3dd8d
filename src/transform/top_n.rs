use crate::result::{ChartDatum, LabelValue};
use ordered_float::OrderedFloat;
use std::cmp::Reverse;

#[derive(Debug, Clone, PartialEq)]
pub struct RankedRow {
    /// 1-based, no gaps
    pub rank: usize,
    pub label: String,
    pub value: f64,
}

/// Sorts descending by value, keeps the first `n` rows and numbers them
/// from 1.
///
/// The sort is stable, so equal values keep their input order and the row
/// seen first gets the better rank. NaN values sort last.
pub fn rank_top_n(rows: &[LabelValue], n: usize) -> Vec<RankedRow> {
    let mut sorted: Vec<&LabelValue> = rows.iter().collect();
    sorted.sort_by_key(|row| {
        let value = if row.value.is_nan() {
            f64::NEG_INFINITY
        } else {
            row.value
        };
        Reverse(OrderedFloat(value))
    });

    sorted
        .into_iter()
        .take(n)
        .enumerate()
        .map(|(index, row)| RankedRow {
            rank: index + 1,
            label: row.label.clone(),
            value: row.value,
        })
        .collect()
}

pub fn top_n_chart(rows: &[RankedRow]) -> Vec<ChartDatum> {
    rows.iter()
        .map(|row| {
            ChartDatum::new()
                .with("rank", row.rank)
                .with("label", row.label.as_str())
                .with("value", row.value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(values: &[(&str, f64)]) -> Vec<LabelValue> {
        values
            .iter()
            .map(|(label, value)| LabelValue {
                label: label.to_string(),
                value: *value,
                count: None,
            })
            .collect()
    }

    #[test]
    fn test_sorted_descending_and_truncated() {
        let ranked = rank_top_n(
            &rows(&[("a", 3.0), ("b", 9.0), ("c", 1.0), ("d", 5.0)]),
            3,
        );
        let labels: Vec<&str> = ranked.iter().map(|row| row.label.as_str()).collect();
        assert_eq!(labels, vec!["b", "d", "a"]);
        let ranks: Vec<usize> = ranked.iter().map(|row| row.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
    }

    #[test]
    fn test_length_is_min_of_n_and_groups() {
        let input = rows(&[("a", 1.0), ("b", 2.0)]);
        assert_eq!(rank_top_n(&input, 10).len(), 2);
        assert!(rank_top_n(&input, 0).is_empty());
    }

    #[test]
    fn test_ties_keep_first_seen_order() {
        let ranked = rank_top_n(&rows(&[("x", 4.0), ("y", 7.0), ("z", 4.0), ("w", 4.0)]), 4);
        let labels: Vec<&str> = ranked.iter().map(|row| row.label.as_str()).collect();
        assert_eq!(labels, vec!["y", "x", "z", "w"]);
        assert_eq!(ranked[3].rank, 4);
    }

    #[test]
    fn test_nan_sorts_last() {
        let ranked = rank_top_n(&rows(&[("nan", f64::NAN), ("one", 1.0)]), 2);
        assert_eq!(ranked[0].label, "one");
        assert_eq!(ranked[1].label, "nan");
    }

    #[test]
    fn test_chart_records() {
        let data = top_n_chart(&rank_top_n(&rows(&[("a", 2.0)]), 5));
        assert_eq!(data[0].number("rank"), Some(1.0));
        assert_eq!(data[0].text("label"), Some("a"));
    }
}
