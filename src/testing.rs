#![allow(dead_code)]

use crate::dataset::{Column, ColumnType, Dataset, DatasetId};
use crate::result::{CrosstabResult, GroupStat, GroupedStatsResult, TrainingResult, FeatureImportance};
use std::collections::BTreeMap;

/// Test helper: the household survey used across unit tests.
pub(crate) fn survey_dataset() -> Dataset {
    Dataset::new(
        DatasetId::new("survey").unwrap(),
        vec![
            Column::new("province", ColumnType::Categorical),
            Column::new("poverty", ColumnType::Numeric),
            Column::new("Consumption", ColumnType::Numeric),
            Column::new("education", ColumnType::Categorical),
        ],
        40,
    )
}

/// Test helper: a second dataset sharing no columns with the survey.
pub(crate) fn other_dataset() -> Dataset {
    Dataset::new(
        DatasetId::new("sales").unwrap(),
        vec![
            Column::new("region", ColumnType::Categorical),
            Column::new("revenue", ColumnType::Numeric),
        ],
        12,
    )
}

pub(crate) fn group(label: &str, count: u64, mean: f64) -> GroupStat {
    GroupStat {
        label: label.to_string(),
        count,
        mean,
        min: 0.0,
        max: 1.0,
    }
}

/// Test helper: poverty rate by province, 40 rows total.
pub(crate) fn poverty_by_province() -> GroupedStatsResult {
    GroupedStatsResult {
        groups: vec![group("North", 10, 0.2), group("South", 30, 0.6)],
        total_count: 40,
        missing_count: 0,
    }
}

/// Test helper: 2x3 count crosstab with consistent totals.
pub(crate) fn province_by_education() -> CrosstabResult {
    CrosstabResult {
        row_labels: vec!["North".into(), "South".into()],
        column_labels: vec!["Primary".into(), "Secondary".into(), "Tertiary".into()],
        values: vec![vec![2.0, 5.0, 3.0], vec![10.0, 15.0, 5.0]],
        row_totals: vec![10.0, 30.0],
        column_totals: vec![12.0, 20.0, 8.0],
        grand_total: 40.0,
    }
}

pub(crate) fn training_result() -> TrainingResult {
    let mut metrics = BTreeMap::new();
    metrics.insert("accuracy".to_string(), 0.87);
    metrics.insert("f1".to_string(), 0.81);
    TrainingResult {
        metrics,
        feature_importance: vec![
            FeatureImportance {
                feature: "province".into(),
                importance: 0.15,
            },
            FeatureImportance {
                feature: "Consumption".into(),
                importance: 0.6,
            },
            FeatureImportance {
                feature: "education".into(),
                importance: 0.25,
            },
        ],
        training_history: None,
    }
}
