//! Pure post-processing of typed results into chart records.

pub mod comparison;
pub mod crosstab;
pub mod frequency;
pub mod grouped;
pub mod importance;
pub mod integrity;
pub mod regroup;
pub mod top_n;

pub use comparison::{comparison_chart, Trend};
pub use crosstab::{crosstab_chart, normalized_matrix};
pub use frequency::{frequency_table, FrequencyRow, FrequencyTable};
pub use grouped::grouped_stats_chart;
pub use importance::{importance_chart, relative_importance, ImportanceBar};
pub use integrity::{check_crosstab_totals, check_group_totals};
pub use regroup::{education_tiers, regroup, regroup_chart, TierGroup, TierTable};
pub use top_n::{rank_top_n, top_n_chart, RankedRow};

use crate::config::AnalysisConfig;
use crate::result::{AnalysisResult, ChartDatum};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum TransformError {
    /// Reported total disagrees with the sum of the parts
    TotalsMismatch {
        what: String,
        expected: f64,
        actual: f64,
    },
    /// Config and result are for different kinds
    KindMismatch { config: String, result: String },
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformError::TotalsMismatch {
                what,
                expected,
                actual,
            } => write!(f, "{}: expected {}, found {}", what, expected, actual),
            TransformError::KindMismatch { config, result } => {
                write!(f, "Cannot apply {} config to {} result", config, result)
            }
        }
    }
}

impl std::error::Error for TransformError {}

/// Converts a result into chart records according to the config that
/// produced it.
pub fn to_chart_data(
    config: &AnalysisConfig,
    result: &AnalysisResult,
) -> Result<Vec<ChartDatum>, TransformError> {
    match (config, result) {
        (AnalysisConfig::GroupedStats(_), AnalysisResult::GroupedStats(result)) => {
            Ok(grouped_stats_chart(result))
        }
        (AnalysisConfig::Crosstab(config), AnalysisResult::Crosstab(result)) => {
            Ok(crosstab_chart(result, config.normalize))
        }
        (AnalysisConfig::TopN(config), AnalysisResult::TopN(result)) => {
            Ok(top_n_chart(&rank_top_n(&result.rows, config.n)))
        }
        (AnalysisConfig::Comparison(_), AnalysisResult::Comparison(result)) => {
            Ok(comparison_chart(result))
        }
        (AnalysisConfig::MlModel(_), AnalysisResult::MlModel(result)) => {
            Ok(importance_chart(&relative_importance(&result.feature_importance)))
        }
        (config, result) => Err(TransformError::KindMismatch {
            config: config.kind().id().to_string(),
            result: result.kind().id().to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ComparisonConfig, TopNConfig, Aggregation};
    use crate::result::{LabelValue, TopNResult};

    #[test]
    fn test_top_n_uses_requested_n() {
        let config = AnalysisConfig::TopN(TopNConfig {
            group_column: "province".into(),
            value_column: "Consumption".into(),
            n: 2,
            aggregation: Aggregation::Mean,
        });
        let result = AnalysisResult::TopN(TopNResult {
            rows: ["a", "b", "c"]
                .iter()
                .enumerate()
                .map(|(i, label)| LabelValue {
                    label: label.to_string(),
                    value: i as f64,
                    count: None,
                })
                .collect(),
            total_groups: 3,
        });

        let data = to_chart_data(&config, &result).unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data[0].text("label"), Some("c"));
    }

    #[test]
    fn test_mismatched_kinds_are_rejected() {
        let config = AnalysisConfig::Comparison(ComparisonConfig {
            category_column: "province".into(),
            value_column: "poverty".into(),
        });
        let result = AnalysisResult::TopN(TopNResult {
            rows: Vec::new(),
            total_groups: 0,
        });
        let err = to_chart_data(&config, &result).unwrap_err();
        assert_eq!(
            err,
            TransformError::KindMismatch {
                config: "comparison".into(),
                result: "top-n".into()
            }
        );
    }
}
