//! Typed analysis results and the flat chart record they are turned into.

use crate::registry::AnalysisKind;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupStat {
    #[serde(alias = "group")]
    pub label: String,
    pub count: u64,
    pub mean: f64,
    #[serde(default)]
    pub min: f64,
    #[serde(default)]
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupedStatsResult {
    #[serde(rename = "data")]
    pub groups: Vec<GroupStat>,
    pub total_count: u64,
    /// Rows excluded because the group or value was missing
    #[serde(default)]
    pub missing_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrosstabResult {
    pub row_labels: Vec<String>,
    pub column_labels: Vec<String>,
    /// `values[row][column]`
    pub values: Vec<Vec<f64>>,
    pub row_totals: Vec<f64>,
    pub column_totals: Vec<f64>,
    pub grand_total: f64,
}

impl CrosstabResult {
    pub fn cell(&self, row: usize, column: usize) -> f64 {
        self.values
            .get(row)
            .and_then(|cells| cells.get(column))
            .copied()
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelValue {
    #[serde(alias = "group")]
    pub label: String,
    pub value: f64,
    #[serde(default)]
    pub count: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopNResult {
    #[serde(rename = "data")]
    pub rows: Vec<LabelValue>,
    /// Number of groups before truncation
    #[serde(default)]
    pub total_groups: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryMean {
    #[serde(alias = "category")]
    pub label: String,
    pub mean: f64,
    #[serde(default)]
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    #[serde(rename = "data")]
    pub categories: Vec<CategoryMean>,
    pub overall_mean: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingResult {
    pub metrics: BTreeMap<String, f64>,
    #[serde(default)]
    pub feature_importance: Vec<FeatureImportance>,
    /// Per-epoch metric values, when the algorithm reports them
    #[serde(default)]
    pub training_history: Option<Vec<BTreeMap<String, f64>>>,
}

/// Result of one analysis, mirroring [`crate::config::AnalysisConfig`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum AnalysisResult {
    GroupedStats(GroupedStatsResult),
    Crosstab(CrosstabResult),
    TopN(TopNResult),
    Comparison(ComparisonResult),
    MlModel(TrainingResult),
}

impl AnalysisResult {
    pub fn kind(&self) -> AnalysisKind {
        match self {
            AnalysisResult::GroupedStats(_) => AnalysisKind::GroupedStats,
            AnalysisResult::Crosstab(_) => AnalysisKind::Crosstab,
            AnalysisResult::TopN(_) => AnalysisKind::TopN,
            AnalysisResult::Comparison(_) => AnalysisKind::Comparison,
            AnalysisResult::MlModel(_) => AnalysisKind::MlModel,
        }
    }

    /// Number of rows the result would chart.
    pub fn row_count(&self) -> usize {
        match self {
            AnalysisResult::GroupedStats(result) => result.groups.len(),
            AnalysisResult::Crosstab(result) => result.row_labels.len(),
            AnalysisResult::TopN(result) => result.rows.len(),
            AnalysisResult::Comparison(result) => result.categories.len(),
            AnalysisResult::MlModel(result) => {
                result.feature_importance.len().max(result.metrics.len())
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }
}

/// A single value inside a [`ChartDatum`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ChartValue {
    Null,
    Bool(bool),
    Integer(i64),
    Number(f64),
    Text(String),
}

impl ChartValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ChartValue::Integer(value) => Some(*value as f64),
            ChartValue::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ChartValue::Text(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for ChartValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChartValue::Null => Ok(()),
            ChartValue::Bool(value) => write!(f, "{}", value),
            ChartValue::Integer(value) => write!(f, "{}", value),
            ChartValue::Number(value) => write!(f, "{}", value),
            ChartValue::Text(value) => write!(f, "{}", value),
        }
    }
}

impl From<f64> for ChartValue {
    fn from(value: f64) -> Self {
        ChartValue::Number(value)
    }
}

impl From<i64> for ChartValue {
    fn from(value: i64) -> Self {
        ChartValue::Integer(value)
    }
}

impl From<u64> for ChartValue {
    fn from(value: u64) -> Self {
        ChartValue::Integer(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<usize> for ChartValue {
    fn from(value: usize) -> Self {
        ChartValue::Integer(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<bool> for ChartValue {
    fn from(value: bool) -> Self {
        ChartValue::Bool(value)
    }
}

impl From<&str> for ChartValue {
    fn from(value: &str) -> Self {
        ChartValue::Text(value.to_string())
    }
}

impl From<String> for ChartValue {
    fn from(value: String) -> Self {
        ChartValue::Text(value)
    }
}

impl<T: Into<ChartValue>> From<Option<T>> for ChartValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(ChartValue::Null, Into::into)
    }
}

/// Flat field-name to value record, the common currency between the
/// transformer, the renderer and the export encoder.
///
/// Keeps insertion order so exported columns follow the order fields were
/// produced in.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChartDatum {
    fields: Vec<(String, ChartValue)>,
}

impl ChartDatum {
    pub fn new() -> Self {
        ChartDatum { fields: Vec::new() }
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ChartValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Inserts or replaces a field, keeping the original position on replace.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ChartValue>) {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&ChartValue> {
        self.fields
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value)
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(ChartValue::as_f64)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(ChartValue::as_str)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(key, _)| key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ChartValue)> {
        self.fields.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for ChartDatum {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}
