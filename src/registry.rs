//! Closed registry of analysis kinds.
//!
//! Each kind carries the schema of fields it accepts, the endpoint that
//! computes it and the shape of the payload it returns. Every consumer
//! matches on [`AnalysisKind`] exhaustively, so adding a kind forces each
//! match to be revisited.

use crate::error::RegistryError;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// The analysis kinds the client knows how to configure and present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AnalysisKind {
    GroupedStats,
    Crosstab,
    TopN,
    Comparison,
    MlModel,
}

impl AnalysisKind {
    pub const ALL: [AnalysisKind; 5] = [
        AnalysisKind::GroupedStats,
        AnalysisKind::Crosstab,
        AnalysisKind::TopN,
        AnalysisKind::Comparison,
        AnalysisKind::MlModel,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            AnalysisKind::GroupedStats => "grouped-stats",
            AnalysisKind::Crosstab => "crosstab",
            AnalysisKind::TopN => "top-n",
            AnalysisKind::Comparison => "comparison",
            AnalysisKind::MlModel => "ml-model",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            AnalysisKind::GroupedStats => "Grouped statistics",
            AnalysisKind::Crosstab => "Crosstab",
            AnalysisKind::TopN => "Top N",
            AnalysisKind::Comparison => "Comparison",
            AnalysisKind::MlModel => "Model training",
        }
    }

    pub fn from_id(id: &str) -> Result<Self, RegistryError> {
        AnalysisKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.id() == id)
            .ok_or_else(|| RegistryError::UnknownAnalysisKind(id.to_string()))
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

impl FromStr for AnalysisKind {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AnalysisKind::from_id(s)
    }
}

/// Value domain of a configuration field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldKind {
    /// Column name, grouped on
    CategoricalColumn,
    /// Column name of a numeric column
    NumericColumn,
    /// Column name of any type
    AnyColumn,
    /// Several column names
    ColumnList,
    /// One of a fixed set of values
    Enum(&'static [&'static str]),
    /// Whole number within an inclusive range
    Integer { min: i64, max: i64 },
    /// Real number strictly between the bounds
    Fraction { min: f64, max: f64 },
}

impl FieldKind {
    pub fn is_column(&self) -> bool {
        matches!(
            self,
            FieldKind::CategoricalColumn
                | FieldKind::NumericColumn
                | FieldKind::AnyColumn
                | FieldKind::ColumnList
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub required: bool,
    pub kind: FieldKind,
    /// Value assumed when an optional field is left empty
    pub default: Option<&'static str>,
}

const fn required(name: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec {
        name,
        required: true,
        kind,
        default: None,
    }
}

const fn optional(name: &'static str, kind: FieldKind, default: Option<&'static str>) -> FieldSpec {
    FieldSpec {
        name,
        required: false,
        kind,
        default,
    }
}

pub const AGGREGATIONS: &[&str] = &["mean", "sum", "count", "min", "max", "median"];
pub const CROSSTAB_AGGREGATIONS: &[&str] = &["count", "sum", "mean"];
pub const NORMALIZE_MODES: &[&str] = &["none", "row", "total"];
pub const ALGORITHMS: &[&str] = &[
    "random_forest",
    "gradient_boosting",
    "decision_tree",
    "logistic_regression",
    "linear_regression",
];

const GROUPED_STATS_FIELDS: &[FieldSpec] = &[
    required("group_column", FieldKind::CategoricalColumn),
    required("value_column", FieldKind::NumericColumn),
    optional("aggregation", FieldKind::Enum(AGGREGATIONS), Some("mean")),
];

const CROSSTAB_FIELDS: &[FieldSpec] = &[
    required("row_column", FieldKind::CategoricalColumn),
    optional("column_column", FieldKind::CategoricalColumn, None),
    optional("value_column", FieldKind::NumericColumn, None),
    optional(
        "aggregation",
        FieldKind::Enum(CROSSTAB_AGGREGATIONS),
        Some("count"),
    ),
    optional("normalize", FieldKind::Enum(NORMALIZE_MODES), Some("none")),
];

const TOP_N_FIELDS: &[FieldSpec] = &[
    required("group_column", FieldKind::CategoricalColumn),
    required("value_column", FieldKind::NumericColumn),
    required("n", FieldKind::Integer { min: 1, max: 100 }),
    optional("aggregation", FieldKind::Enum(AGGREGATIONS), Some("mean")),
];

const COMPARISON_FIELDS: &[FieldSpec] = &[
    required("category_column", FieldKind::CategoricalColumn),
    required("value_column", FieldKind::NumericColumn),
];

const ML_MODEL_FIELDS: &[FieldSpec] = &[
    required("target_column", FieldKind::AnyColumn),
    optional("feature_columns", FieldKind::ColumnList, None),
    required("algorithm", FieldKind::Enum(ALGORITHMS)),
    optional(
        "test_size",
        FieldKind::Fraction { min: 0.0, max: 1.0 },
        Some("0.2"),
    ),
];

/// Configuration schema of one kind.
#[derive(Debug, Clone, Copy)]
pub struct ConfigSchema {
    pub kind: AnalysisKind,
    pub fields: &'static [FieldSpec],
}

impl ConfigSchema {
    pub fn field(&self, name: &str) -> Option<&'static FieldSpec> {
        self.fields.iter().find(|spec| spec.name == name)
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &'static FieldSpec> {
        self.fields.iter().filter(|spec| spec.required)
    }
}

/// Payload shape a kind's result is decoded into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultShape {
    /// One row per group with count and summary statistics
    GroupSummary,
    /// Row labels x column labels value matrix with totals
    Matrix,
    /// Label/value rows ordered by value
    RankedList,
    /// Per-category means plus the overall mean
    CategoryMeans,
    /// Metrics, feature importances and optional training history
    ModelReport,
}

impl ResultShape {
    /// Top-level payload fields the backend is expected to send.
    pub fn payload_fields(&self) -> &'static [&'static str] {
        match self {
            ResultShape::GroupSummary => &["data", "total_count", "missing_count"],
            ResultShape::Matrix => &[
                "row_labels",
                "column_labels",
                "values",
                "row_totals",
                "column_totals",
                "grand_total",
            ],
            ResultShape::RankedList => &["data", "total_groups"],
            ResultShape::CategoryMeans => &["data", "overall_mean"],
            ResultShape::ModelReport => &["metrics", "feature_importance", "training_history"],
        }
    }
}

/// Everything the client knows about one kind.
#[derive(Debug, Clone, Copy)]
pub struct KindDefinition {
    pub kind: AnalysisKind,
    pub title: &'static str,
    pub endpoint: &'static str,
    pub schema: ConfigSchema,
    pub result_shape: ResultShape,
}

impl KindDefinition {
    fn for_kind(kind: AnalysisKind) -> Self {
        let (endpoint, fields, result_shape) = match kind {
            AnalysisKind::GroupedStats => (
                "/analysis/grouped-stats",
                GROUPED_STATS_FIELDS,
                ResultShape::GroupSummary,
            ),
            AnalysisKind::Crosstab => ("/analysis/crosstab", CROSSTAB_FIELDS, ResultShape::Matrix),
            AnalysisKind::TopN => ("/analysis/top-n", TOP_N_FIELDS, ResultShape::RankedList),
            AnalysisKind::Comparison => (
                "/analysis/comparison",
                COMPARISON_FIELDS,
                ResultShape::CategoryMeans,
            ),
            AnalysisKind::MlModel => ("/model/train", ML_MODEL_FIELDS, ResultShape::ModelReport),
        };

        KindDefinition {
            kind,
            title: kind.title(),
            endpoint,
            schema: ConfigSchema { kind, fields },
            result_shape,
        }
    }
}

/// Lookup table from kind to definition.
#[derive(Debug, Clone)]
pub struct AnalysisTypeRegistry {
    definitions: HashMap<AnalysisKind, KindDefinition>,
}

impl AnalysisTypeRegistry {
    /// Creates a registry populated with every built-in kind.
    pub fn new() -> Self {
        let definitions = AnalysisKind::ALL
            .iter()
            .map(|kind| (*kind, KindDefinition::for_kind(*kind)))
            .collect();
        AnalysisTypeRegistry { definitions }
    }

    /// Looks up a kind by its string identifier.
    pub fn lookup(&self, id: &str) -> Result<&KindDefinition, RegistryError> {
        let kind = AnalysisKind::from_id(id)?;
        Ok(self.definition(kind))
    }

    pub fn definition(&self, kind: AnalysisKind) -> &KindDefinition {
        // The map is filled from AnalysisKind::ALL, so every kind is present.
        &self.definitions[&kind]
    }

    pub fn schema(&self, kind: AnalysisKind) -> &ConfigSchema {
        &self.definition(kind).schema
    }

    pub fn result_shape(&self, kind: AnalysisKind) -> ResultShape {
        self.definition(kind).result_shape
    }

    pub fn kinds(&self) -> impl Iterator<Item = AnalysisKind> {
        AnalysisKind::ALL.into_iter()
    }
}

impl Default for AnalysisTypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
