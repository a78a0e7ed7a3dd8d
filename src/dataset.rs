use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Identifier of an uploaded dataset, as issued by the dataset service.
///
/// Travels with every request so no analysis ever looks up "the current
/// file" from ambient state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetId(String);

impl DatasetId {
    /// Creates a dataset identifier.
    ///
    /// # Errors
    /// Returns an error if the identifier is empty or contains characters
    /// other than alphanumerics, dots, hyphens and underscores.
    pub fn new(id: impl Into<String>) -> Result<Self, DatasetIdError> {
        let id = id.into();
        if id.is_empty() {
            return Err(DatasetIdError::Empty);
        }
        if !id
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == '_')
        {
            return Err(DatasetIdError::InvalidCharacters);
        }
        Ok(DatasetId(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetIdError {
    Empty,
    InvalidCharacters,
}

impl fmt::Display for DatasetIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetIdError::Empty => write!(f, "Dataset id cannot be empty"),
            DatasetIdError::InvalidCharacters => write!(f, "Dataset id contains invalid characters"),
        }
    }
}

impl std::error::Error for DatasetIdError {}

/// Declared type of a dataset column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Numeric,
    Categorical,
    Date,
}

impl ColumnType {
    /// Maps a backend dtype string (pandas style) to a column type.
    pub fn from_dtype(dtype: &str) -> Self {
        let dtype = dtype.trim().to_ascii_lowercase();
        if dtype.starts_with("int") || dtype.starts_with("float") || dtype.starts_with("uint") {
            ColumnType::Numeric
        } else if dtype.starts_with("datetime") || dtype == "date" {
            ColumnType::Date
        } else {
            ColumnType::Categorical
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Numeric => "numeric",
            ColumnType::Categorical => "categorical",
            ColumnType::Date => "date",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
    /// Distinct-value count
    pub cardinality: usize,
    pub missing: usize,
}

impl Column {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Column {
            name: name.into(),
            column_type,
            cardinality: 0,
            missing: 0,
        }
    }
}

/// Read-only view of an uploaded dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub id: DatasetId,
    pub columns: Vec<Column>,
    pub row_count: usize,
}

impl Dataset {
    pub fn new(id: DatasetId, columns: Vec<Column>, row_count: usize) -> Self {
        Dataset {
            id,
            columns,
            row_count,
        }
    }

    /// Builds a dataset view from the upload service's summary.
    pub fn from_summary(id: DatasetId, summary: &DatasetSummary) -> Self {
        let columns = summary
            .columns
            .iter()
            .map(|name| {
                let column_type = summary
                    .dtypes
                    .get(name)
                    .map(|dtype| ColumnType::from_dtype(dtype))
                    .unwrap_or(ColumnType::Categorical);
                Column {
                    name: name.clone(),
                    column_type,
                    cardinality: summary.unique_counts.get(name).copied().unwrap_or(0),
                    missing: summary.missing_values.get(name).copied().unwrap_or(0),
                }
            })
            .collect();

        Dataset {
            id,
            columns,
            row_count: summary.shape.0,
        }
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|column| column.name.as_str())
    }

    pub fn columns_of_type(&self, column_type: ColumnType) -> impl Iterator<Item = &Column> {
        self.columns
            .iter()
            .filter(move |column| column.column_type == column_type)
    }
}

/// Upload service response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub columns: Vec<String>,
    #[serde(default)]
    pub head_rows: Vec<serde_json::Map<String, serde_json::Value>>,
    #[serde(default)]
    pub dtypes: HashMap<String, String>,
    /// (rows, columns)
    pub shape: (usize, usize),
    #[serde(default)]
    pub missing_values: HashMap<String, usize>,
    #[serde(default)]
    pub unique_counts: HashMap<String, usize>,
    /// Backend grade for missingness, duplication and type consistency
    #[serde(default)]
    pub quality_score: Option<f64>,
}

/// Cleaning service response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanedSummary {
    #[serde(flatten)]
    pub summary: DatasetSummary,
    /// Columns suited to frequency tables
    #[serde(default)]
    pub frequency_candidates: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn survey_summary() -> DatasetSummary {
        let mut dtypes = HashMap::new();
        dtypes.insert("province".to_string(), "object".to_string());
        dtypes.insert("poverty".to_string(), "float64".to_string());
        dtypes.insert("Consumption".to_string(), "int64".to_string());
        let mut missing = HashMap::new();
        missing.insert("poverty".to_string(), 3);

        DatasetSummary {
            columns: vec![
                "province".to_string(),
                "poverty".to_string(),
                "Consumption".to_string(),
            ],
            head_rows: Vec::new(),
            dtypes,
            shape: (120, 3),
            missing_values: missing,
            unique_counts: HashMap::new(),
            quality_score: Some(0.93),
        }
    }

    #[test]
    fn test_dataset_id_validation() {
        assert!(DatasetId::new("survey_2024.csv").is_ok());
        assert_eq!(DatasetId::new("").unwrap_err(), DatasetIdError::Empty);
        assert_eq!(
            DatasetId::new("a/b").unwrap_err(),
            DatasetIdError::InvalidCharacters
        );
    }

    #[test]
    fn test_from_dtype() {
        assert_eq!(ColumnType::from_dtype("int64"), ColumnType::Numeric);
        assert_eq!(ColumnType::from_dtype("float32"), ColumnType::Numeric);
        assert_eq!(ColumnType::from_dtype("datetime64[ns]"), ColumnType::Date);
        assert_eq!(ColumnType::from_dtype("object"), ColumnType::Categorical);
    }

    #[test]
    fn test_from_summary_keeps_column_order_and_types() {
        let id = DatasetId::new("survey").unwrap();
        let dataset = Dataset::from_summary(id, &survey_summary());

        let names: Vec<&str> = dataset.column_names().collect();
        assert_eq!(names, vec!["province", "poverty", "Consumption"]);
        assert_eq!(dataset.row_count, 120);
        assert_eq!(
            dataset.column("poverty").unwrap().column_type,
            ColumnType::Numeric
        );
        assert_eq!(dataset.column("poverty").unwrap().missing, 3);
        assert_eq!(dataset.columns_of_type(ColumnType::Numeric).count(), 2);
    }

    #[test]
    fn test_cleaned_summary_deserializes_candidates() {
        let json = serde_json::json!({
            "columns": ["province"],
            "shape": [10, 1],
            "frequency_candidates": ["province"]
        });
        let cleaned: CleanedSummary = serde_json::from_value(json).unwrap();
        assert_eq!(cleaned.frequency_candidates, vec!["province"]);
        assert_eq!(cleaned.summary.shape, (10, 1));
        assert!(cleaned.summary.quality_score.is_none());
    }
}
