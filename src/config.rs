//! Typed per-kind analysis configurations.

use crate::error::ConfigError;
use crate::registry::AnalysisKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Aggregation function the backend applies to a value column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    Mean,
    Sum,
    Count,
    Min,
    Max,
    Median,
}

impl Aggregation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Aggregation::Mean => "mean",
            Aggregation::Sum => "sum",
            Aggregation::Count => "count",
            Aggregation::Min => "min",
            Aggregation::Max => "max",
            Aggregation::Median => "median",
        }
    }
}

impl FromStr for Aggregation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mean" => Ok(Aggregation::Mean),
            "sum" => Ok(Aggregation::Sum),
            "count" => Ok(Aggregation::Count),
            "min" => Ok(Aggregation::Min),
            "max" => Ok(Aggregation::Max),
            "median" => Ok(Aggregation::Median),
            other => Err(format!("unknown aggregation '{}'", other)),
        }
    }
}

/// Crosstab cell normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Normalize {
    #[default]
    None,
    /// Percent of the cell's row total
    Row,
    /// Percent of the grand total
    Total,
}

impl Normalize {
    pub fn as_str(&self) -> &'static str {
        match self {
            Normalize::None => "none",
            Normalize::Row => "row",
            Normalize::Total => "total",
        }
    }

    pub fn is_set(&self) -> bool {
        !matches!(self, Normalize::None)
    }
}

impl FromStr for Normalize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" | "false" => Ok(Normalize::None),
            "row" | "true" => Ok(Normalize::Row),
            "total" => Ok(Normalize::Total),
            other => Err(format!("unknown normalize mode '{}'", other)),
        }
    }
}

/// Model-training algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    RandomForest,
    GradientBoosting,
    DecisionTree,
    LogisticRegression,
    LinearRegression,
}

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::RandomForest => "random_forest",
            Algorithm::GradientBoosting => "gradient_boosting",
            Algorithm::DecisionTree => "decision_tree",
            Algorithm::LogisticRegression => "logistic_regression",
            Algorithm::LinearRegression => "linear_regression",
        }
    }

    /// Hyperparameters seeded when the algorithm is chosen.
    pub fn default_hyperparameters(&self) -> Hyperparameters {
        let pairs: &[(&str, f64)] = match self {
            Algorithm::RandomForest => &[("n_estimators", 100.0), ("max_depth", 10.0)],
            Algorithm::GradientBoosting => &[
                ("n_estimators", 100.0),
                ("learning_rate", 0.1),
                ("max_depth", 3.0),
            ],
            Algorithm::DecisionTree => &[("max_depth", 10.0), ("min_samples_split", 2.0)],
            Algorithm::LogisticRegression => &[("C", 1.0), ("max_iter", 1000.0)],
            Algorithm::LinearRegression => &[],
        };
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), *value))
            .collect()
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "random_forest" => Ok(Algorithm::RandomForest),
            "gradient_boosting" => Ok(Algorithm::GradientBoosting),
            "decision_tree" => Ok(Algorithm::DecisionTree),
            "logistic_regression" => Ok(Algorithm::LogisticRegression),
            "linear_regression" => Ok(Algorithm::LinearRegression),
            other => Err(format!("unknown algorithm '{}'", other)),
        }
    }
}

pub type Hyperparameters = BTreeMap<String, f64>;

pub const DEFAULT_TEST_SIZE: f64 = 0.2;

/// A value entered for a configuration field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Single(String),
    Many(Vec<String>),
}

impl FieldValue {
    /// Empty strings and empty lists count as "not filled in".
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Single(value) => value.trim().is_empty(),
            FieldValue::Many(values) => values.iter().all(|value| value.trim().is_empty()),
        }
    }

    pub fn as_single(&self) -> Option<&str> {
        match self {
            FieldValue::Single(value) => Some(value.trim()),
            FieldValue::Many(_) => None,
        }
    }

    pub fn values(&self) -> Vec<&str> {
        match self {
            FieldValue::Single(value) => vec![value.trim()],
            FieldValue::Many(values) => values
                .iter()
                .map(|value| value.trim())
                .filter(|value| !value.is_empty())
                .collect(),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Single(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Single(value)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(values: Vec<String>) -> Self {
        FieldValue::Many(values)
    }
}

impl From<Vec<&str>> for FieldValue {
    fn from(values: Vec<&str>) -> Self {
        FieldValue::Many(values.into_iter().map(str::to_string).collect())
    }
}

impl From<usize> for FieldValue {
    fn from(value: usize) -> Self {
        FieldValue::Single(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupedStatsConfig {
    pub group_column: String,
    pub value_column: String,
    pub aggregation: Aggregation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrosstabConfig {
    pub row_column: String,
    /// `None` tabulates the row column alone
    pub column_column: Option<String>,
    pub value_column: Option<String>,
    pub aggregation: Aggregation,
    pub normalize: Normalize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopNConfig {
    pub group_column: String,
    pub value_column: String,
    pub n: usize,
    pub aggregation: Aggregation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonConfig {
    pub category_column: String,
    pub value_column: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub target_column: String,
    /// Empty means "every other column"
    pub feature_columns: Vec<String>,
    pub algorithm: Algorithm,
    pub test_size: f64,
    pub hyperparameters: Hyperparameters,
}

/// A complete configuration for one analysis kind.
///
/// Each variant holds exactly the fields its kind accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum AnalysisConfig {
    GroupedStats(GroupedStatsConfig),
    Crosstab(CrosstabConfig),
    TopN(TopNConfig),
    Comparison(ComparisonConfig),
    MlModel(ModelConfig),
}

impl AnalysisConfig {
    pub fn kind(&self) -> AnalysisKind {
        match self {
            AnalysisConfig::GroupedStats(_) => AnalysisKind::GroupedStats,
            AnalysisConfig::Crosstab(_) => AnalysisKind::Crosstab,
            AnalysisConfig::TopN(_) => AnalysisKind::TopN,
            AnalysisConfig::Comparison(_) => AnalysisKind::Comparison,
            AnalysisConfig::MlModel(_) => AnalysisKind::MlModel,
        }
    }

    /// Checks that no required field is empty and numeric fields are in range.
    ///
    /// Configs produced by the builder always pass; this guards configs
    /// constructed directly or deserialized from disk.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut missing = Vec::new();
        let mut require = |name: &str, value: &str| {
            if value.trim().is_empty() {
                missing.push(name.to_string());
            }
        };

        match self {
            AnalysisConfig::GroupedStats(config) => {
                require("group_column", &config.group_column);
                require("value_column", &config.value_column);
            }
            AnalysisConfig::Crosstab(config) => {
                require("row_column", &config.row_column);
                if config.aggregation != Aggregation::Count {
                    require("value_column", config.value_column.as_deref().unwrap_or(""));
                }
            }
            AnalysisConfig::TopN(config) => {
                require("group_column", &config.group_column);
                require("value_column", &config.value_column);
            }
            AnalysisConfig::Comparison(config) => {
                require("category_column", &config.category_column);
                require("value_column", &config.value_column);
            }
            AnalysisConfig::MlModel(config) => {
                require("target_column", &config.target_column);
            }
        }

        if !missing.is_empty() {
            return Err(ConfigError::MissingFields(missing));
        }

        match self {
            AnalysisConfig::TopN(config) if config.n == 0 => Err(ConfigError::InvalidValue {
                field: "n".to_string(),
                reason: "must be at least 1".to_string(),
            }),
            AnalysisConfig::MlModel(config)
                if !(config.test_size > 0.0 && config.test_size < 1.0) =>
            {
                Err(ConfigError::InvalidValue {
                    field: "test_size".to_string(),
                    reason: "must be between 0 and 1".to_string(),
                })
            }
            AnalysisConfig::MlModel(config)
                if config.feature_columns.contains(&config.target_column) =>
            {
                Err(ConfigError::InvalidValue {
                    field: "feature_columns".to_string(),
                    reason: "target column cannot also be a feature".to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    pub fn normalize(&self) -> Normalize {
        match self {
            AnalysisConfig::Crosstab(config) => config.normalize,
            _ => Normalize::None,
        }
    }
}
