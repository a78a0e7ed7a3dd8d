//! Collects field selections per analysis kind and validates them against
//! the registry schema and the active dataset.

use crate::config::{
    Algorithm, AnalysisConfig, ComparisonConfig, CrosstabConfig, FieldValue,
    GroupedStatsConfig, ModelConfig, Normalize, TopNConfig, DEFAULT_TEST_SIZE,
};
use crate::dataset::{ColumnType, Dataset};
use crate::dispatch::token::{DispatchToken, SessionGuard};
use crate::error::ConfigError;
use crate::registry::{AnalysisKind, AnalysisTypeRegistry, FieldKind, FieldSpec};
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use tracing::debug;

/// In-memory configuration state for the analysis forms.
///
/// Selections are only meaningful relative to the dataset they were made
/// against: switching dataset clears every kind's fields and invalidates
/// tokens of dispatches still in flight.
#[derive(Debug)]
pub struct ConfigurationBuilder {
    registry: AnalysisTypeRegistry,
    dataset: Option<Dataset>,
    fields: HashMap<AnalysisKind, BTreeMap<String, FieldValue>>,
    guard: SessionGuard,
}

impl ConfigurationBuilder {
    pub fn new(registry: AnalysisTypeRegistry) -> Self {
        ConfigurationBuilder {
            registry,
            dataset: None,
            fields: HashMap::new(),
            guard: SessionGuard::new(),
        }
    }

    pub fn with_dataset(registry: AnalysisTypeRegistry, dataset: Dataset) -> Self {
        let mut builder = Self::new(registry);
        builder.dataset = Some(dataset);
        builder
    }

    pub fn registry(&self) -> &AnalysisTypeRegistry {
        &self.registry
    }

    pub fn dataset(&self) -> Option<&Dataset> {
        self.dataset.as_ref()
    }

    /// Switches the active dataset.
    ///
    /// Re-selecting the same dataset keeps the current selections.
    pub fn set_dataset(&mut self, dataset: Dataset) {
        let changed = self
            .dataset
            .as_ref()
            .map_or(true, |current| current.id != dataset.id);
        if changed {
            debug!(dataset = %dataset.id, "dataset changed, clearing selections");
            self.fields.clear();
            self.guard.invalidate();
        }
        self.dataset = Some(dataset);
    }

    /// Token for a dispatch issued against the current dataset.
    pub fn token(&self) -> DispatchToken {
        self.guard.token()
    }

    /// Sets one field of a kind's configuration.
    ///
    /// # Errors
    /// Returns `UnknownField` if the field is not in the kind's schema, or
    /// `InvalidValue` if an enum/number value is outside its domain. Empty
    /// values are accepted and simply leave the field unfilled.
    pub fn set_field(
        &mut self,
        kind: AnalysisKind,
        field: &str,
        value: impl Into<FieldValue>,
    ) -> Result<(), ConfigError> {
        let spec = self.spec(kind, field)?;
        let value = value.into();
        if !value.is_empty() {
            check_domain(spec, &value)?;
        }
        self.fields
            .entry(kind)
            .or_default()
            .insert(field.to_string(), value);
        Ok(())
    }

    pub fn clear_field(&mut self, kind: AnalysisKind, field: &str) {
        if let Some(values) = self.fields.get_mut(&kind) {
            values.remove(field);
        }
    }

    pub fn field(&self, kind: AnalysisKind, field: &str) -> Option<&FieldValue> {
        self.fields.get(&kind).and_then(|values| values.get(field))
    }

    /// Clears every selection of one kind.
    pub fn reset(&mut self, kind: AnalysisKind) {
        self.fields.remove(&kind);
    }

    /// True when every required field is filled and every column selection
    /// refers to a column of the active dataset.
    pub fn is_complete(&self, kind: AnalysisKind) -> bool {
        self.validate(kind).is_ok()
    }

    /// Validates a kind's selections, collecting one error per offending field.
    pub fn validate(&self, kind: AnalysisKind) -> Result<(), Vec<ConfigError>> {
        let Some(dataset) = self.dataset.as_ref() else {
            return Err(vec![ConfigError::NoDataset]);
        };

        let schema = self.registry.schema(kind);
        let values = self.fields.get(&kind);
        let mut errors = Vec::new();
        let mut missing = Vec::new();

        for spec in schema.fields {
            let value = values
                .and_then(|values| values.get(spec.name))
                .filter(|value| !value.is_empty());
            match value {
                None if spec.required => missing.push(spec.name.to_string()),
                None => {}
                Some(value) => {
                    if let Err(err) = check_domain(spec, value) {
                        errors.push(err);
                    } else if let Err(err) = check_columns(spec, value, dataset) {
                        errors.push(err);
                    }
                }
            }
        }

        if !missing.is_empty() {
            errors.insert(0, ConfigError::MissingFields(missing));
        }

        // Cross-field rules live on the typed config; run them here too so
        // `is_complete` never disagrees with `build`.
        if errors.is_empty() {
            if let Err(err) = self.assemble(kind).and_then(|config| config.validate()) {
                errors.push(err);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Produces the typed configuration for a kind.
    ///
    /// # Errors
    /// Returns the first validation error when the selections are incomplete.
    pub fn build(&self, kind: AnalysisKind) -> Result<AnalysisConfig, ConfigError> {
        if let Err(mut errors) = self.validate(kind) {
            return Err(errors.remove(0));
        }
        self.assemble(kind)
    }

    /// Typed configuration from the current selections, with schema
    /// defaults filled in. Does not validate.
    fn assemble(&self, kind: AnalysisKind) -> Result<AnalysisConfig, ConfigError> {
        let config = match kind {
            AnalysisKind::GroupedStats => AnalysisConfig::GroupedStats(GroupedStatsConfig {
                group_column: self.text(kind, "group_column"),
                value_column: self.text(kind, "value_column"),
                aggregation: self.parsed(kind, "aggregation")?,
            }),
            AnalysisKind::Crosstab => AnalysisConfig::Crosstab(CrosstabConfig {
                row_column: self.text(kind, "row_column"),
                column_column: self.optional_text(kind, "column_column"),
                value_column: self.optional_text(kind, "value_column"),
                aggregation: self.parsed(kind, "aggregation")?,
                normalize: self.parsed::<Normalize>(kind, "normalize")?,
            }),
            AnalysisKind::TopN => AnalysisConfig::TopN(TopNConfig {
                group_column: self.text(kind, "group_column"),
                value_column: self.text(kind, "value_column"),
                n: self.parsed(kind, "n")?,
                aggregation: self.parsed(kind, "aggregation")?,
            }),
            AnalysisKind::Comparison => AnalysisConfig::Comparison(ComparisonConfig {
                category_column: self.text(kind, "category_column"),
                value_column: self.text(kind, "value_column"),
            }),
            AnalysisKind::MlModel => {
                let algorithm: Algorithm = self.parsed(kind, "algorithm")?;
                AnalysisConfig::MlModel(ModelConfig {
                    target_column: self.text(kind, "target_column"),
                    feature_columns: self
                        .field(kind, "feature_columns")
                        .map(|value| value.values().into_iter().map(str::to_string).collect())
                        .unwrap_or_default(),
                    algorithm,
                    test_size: self
                        .optional_text(kind, "test_size")
                        .and_then(|value| value.parse().ok())
                        .unwrap_or(DEFAULT_TEST_SIZE),
                    hyperparameters: algorithm.default_hyperparameters(),
                })
            }
        };
        Ok(config)
    }

    fn spec(&self, kind: AnalysisKind, field: &str) -> Result<&'static FieldSpec, ConfigError> {
        self.registry
            .schema(kind)
            .field(field)
            .ok_or_else(|| ConfigError::UnknownField {
                kind: kind.id().to_string(),
                field: field.to_string(),
            })
    }

    fn optional_text(&self, kind: AnalysisKind, field: &str) -> Option<String> {
        self.field(kind, field)
            .filter(|value| !value.is_empty())
            .and_then(FieldValue::as_single)
            .map(str::to_string)
    }

    fn text(&self, kind: AnalysisKind, field: &str) -> String {
        self.optional_text(kind, field).unwrap_or_default()
    }

    /// Parses a field, falling back to the schema default when it is empty.
    fn parsed<T: FromStr>(&self, kind: AnalysisKind, field: &str) -> Result<T, ConfigError> {
        let spec = self.spec(kind, field)?;
        let raw = self
            .optional_text(kind, field)
            .or_else(|| spec.default.map(str::to_string))
            .unwrap_or_default();
        raw.parse::<T>().map_err(|_| ConfigError::InvalidValue {
            field: field.to_string(),
            reason: format!("cannot interpret '{}'", raw),
        })
    }
}

impl Default for ConfigurationBuilder {
    fn default() -> Self {
        Self::new(AnalysisTypeRegistry::new())
    }
}

fn invalid(spec: &FieldSpec, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field: spec.name.to_string(),
        reason: reason.into(),
    }
}

fn check_domain(spec: &FieldSpec, value: &FieldValue) -> Result<(), ConfigError> {
    match (spec.kind, value) {
        (FieldKind::ColumnList, _) => Ok(()),
        (_, FieldValue::Many(_)) => Err(invalid(spec, "expects a single value")),
        (FieldKind::Enum(allowed), FieldValue::Single(raw)) => {
            let raw = raw.trim();
            if allowed.iter().any(|candidate| *candidate == raw) {
                Ok(())
            } else {
                Err(invalid(
                    spec,
                    format!("'{}' is not one of {}", raw, allowed.join(", ")),
                ))
            }
        }
        (FieldKind::Integer { min, max }, FieldValue::Single(raw)) => {
            match raw.trim().parse::<i64>() {
                Ok(number) if number >= min && number <= max => Ok(()),
                Ok(_) => Err(invalid(spec, format!("must be between {} and {}", min, max))),
                Err(_) => Err(invalid(spec, "must be a whole number")),
            }
        }
        (FieldKind::Fraction { min, max }, FieldValue::Single(raw)) => {
            match raw.trim().parse::<f64>() {
                Ok(number) if number > min && number < max => Ok(()),
                Ok(_) => Err(invalid(
                    spec,
                    format!("must be strictly between {} and {}", min, max),
                )),
                Err(_) => Err(invalid(spec, "must be a number")),
            }
        }
        (
            FieldKind::CategoricalColumn | FieldKind::NumericColumn | FieldKind::AnyColumn,
            FieldValue::Single(_),
        ) => Ok(()),
    }
}

fn check_columns(spec: &FieldSpec, value: &FieldValue, dataset: &Dataset) -> Result<(), ConfigError> {
    if !spec.kind.is_column() {
        return Ok(());
    }

    for column_name in value.values() {
        let Some(column) = dataset.column(column_name) else {
            return Err(ConfigError::ColumnNotInDataset {
                field: spec.name.to_string(),
                column: column_name.to_string(),
            });
        };

        if spec.kind == FieldKind::NumericColumn && column.column_type != ColumnType::Numeric {
            return Err(ConfigError::ColumnTypeMismatch {
                field: spec.name.to_string(),
                column: column_name.to_string(),
                expected: ColumnType::Numeric.as_str().to_string(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Aggregation;
    use crate::testing::{other_dataset, survey_dataset};

    fn builder() -> ConfigurationBuilder {
        ConfigurationBuilder::with_dataset(AnalysisTypeRegistry::new(), survey_dataset())
    }

    #[test]
    fn test_incomplete_until_required_fields_set() {
        let mut builder = builder();
        assert!(!builder.is_complete(AnalysisKind::GroupedStats));

        builder
            .set_field(AnalysisKind::GroupedStats, "group_column", "province")
            .unwrap();
        assert!(!builder.is_complete(AnalysisKind::GroupedStats));

        builder
            .set_field(AnalysisKind::GroupedStats, "value_column", "poverty")
            .unwrap();
        assert!(builder.is_complete(AnalysisKind::GroupedStats));
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let mut builder = builder();
        let err = builder
            .set_field(AnalysisKind::Comparison, "normalize", "row")
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownField { .. }));
        assert!(builder.field(AnalysisKind::Comparison, "normalize").is_none());
    }

    #[test]
    fn test_enum_value_outside_domain_is_rejected() {
        let mut builder = builder();
        let err = builder
            .set_field(AnalysisKind::Crosstab, "normalize", "column")
            .unwrap_err();
        assert_eq!(err.field(), Some("normalize"));
    }

    #[test]
    fn test_column_must_belong_to_dataset() {
        let mut builder = builder();
        builder
            .set_field(AnalysisKind::Crosstab, "row_column", "region")
            .unwrap();
        let errors = builder.validate(AnalysisKind::Crosstab).unwrap_err();
        assert_eq!(
            errors,
            vec![ConfigError::ColumnNotInDataset {
                field: "row_column".into(),
                column: "region".into()
            }]
        );
    }

    #[test]
    fn test_numeric_field_rejects_categorical_column() {
        let mut builder = builder();
        builder
            .set_field(AnalysisKind::Comparison, "category_column", "province")
            .unwrap();
        builder
            .set_field(AnalysisKind::Comparison, "value_column", "province")
            .unwrap();
        let errors = builder.validate(AnalysisKind::Comparison).unwrap_err();
        assert!(matches!(errors[0], ConfigError::ColumnTypeMismatch { .. }));
    }

    #[test]
    fn test_changing_dataset_clears_selections_and_invalidates_token() {
        let mut builder = builder();
        builder
            .set_field(AnalysisKind::Crosstab, "row_column", "province")
            .unwrap();
        let token = builder.token();
        assert!(builder.is_complete(AnalysisKind::Crosstab));

        builder.set_dataset(other_dataset());
        assert!(builder.field(AnalysisKind::Crosstab, "row_column").is_none());
        assert!(!builder.is_complete(AnalysisKind::Crosstab));
        assert!(!token.is_current());
    }

    #[test]
    fn test_reselecting_same_dataset_keeps_selections() {
        let mut builder = builder();
        builder
            .set_field(AnalysisKind::Crosstab, "row_column", "province")
            .unwrap();
        let token = builder.token();
        builder.set_dataset(survey_dataset());
        assert!(builder.is_complete(AnalysisKind::Crosstab));
        assert!(token.is_current());
    }

    #[test]
    fn test_build_crosstab_applies_defaults() {
        let mut builder = builder();
        builder
            .set_field(AnalysisKind::Crosstab, "row_column", "province")
            .unwrap();
        let config = builder.build(AnalysisKind::Crosstab).unwrap();
        assert_eq!(
            config,
            AnalysisConfig::Crosstab(CrosstabConfig {
                row_column: "province".into(),
                column_column: None,
                value_column: None,
                aggregation: Aggregation::Count,
                normalize: Normalize::None,
            })
        );
    }

    #[test]
    fn test_build_top_n_parses_integer() {
        let mut builder = builder();
        builder
            .set_field(AnalysisKind::TopN, "group_column", "province")
            .unwrap();
        builder
            .set_field(AnalysisKind::TopN, "value_column", "Consumption")
            .unwrap();
        assert!(builder.set_field(AnalysisKind::TopN, "n", "0").is_err());
        builder.set_field(AnalysisKind::TopN, "n", 5usize).unwrap();

        match builder.build(AnalysisKind::TopN).unwrap() {
            AnalysisConfig::TopN(config) => assert_eq!(config.n, 5),
            other => panic!("unexpected config: {:?}", other),
        }
    }

    #[test]
    fn test_build_model_config() {
        let mut builder = builder();
        builder
            .set_field(AnalysisKind::MlModel, "target_column", "poverty")
            .unwrap();
        builder
            .set_field(
                AnalysisKind::MlModel,
                "feature_columns",
                vec!["province", "Consumption"],
            )
            .unwrap();
        builder
            .set_field(AnalysisKind::MlModel, "algorithm", "random_forest")
            .unwrap();

        match builder.build(AnalysisKind::MlModel).unwrap() {
            AnalysisConfig::MlModel(config) => {
                assert_eq!(config.feature_columns, vec!["province", "Consumption"]);
                assert_eq!(config.test_size, DEFAULT_TEST_SIZE);
                assert_eq!(config.hyperparameters.get("n_estimators"), Some(&100.0));
            }
            other => panic!("unexpected config: {:?}", other),
        }
    }

    #[test]
    fn test_crosstab_mean_needs_value_column() {
        let mut builder = builder();
        builder
            .set_field(AnalysisKind::Crosstab, "row_column", "province")
            .unwrap();
        builder
            .set_field(AnalysisKind::Crosstab, "aggregation", "mean")
            .unwrap();
        assert!(!builder.is_complete(AnalysisKind::Crosstab));
        assert_eq!(
            builder.build(AnalysisKind::Crosstab).unwrap_err(),
            ConfigError::MissingFields(vec!["value_column".into()])
        );

        builder
            .set_field(AnalysisKind::Crosstab, "value_column", "Consumption")
            .unwrap();
        assert!(builder.is_complete(AnalysisKind::Crosstab));
        match builder.build(AnalysisKind::Crosstab).unwrap() {
            AnalysisConfig::Crosstab(config) => {
                assert_eq!(config.aggregation, Aggregation::Mean);
                assert_eq!(config.value_column.as_deref(), Some("Consumption"));
            }
            other => panic!("unexpected config: {:?}", other),
        }
    }

    #[test]
    fn test_target_listed_as_feature_is_incomplete() {
        let mut builder = builder();
        builder
            .set_field(AnalysisKind::MlModel, "target_column", "poverty")
            .unwrap();
        builder
            .set_field(AnalysisKind::MlModel, "feature_columns", vec!["poverty", "Consumption"])
            .unwrap();
        builder
            .set_field(AnalysisKind::MlModel, "algorithm", "random_forest")
            .unwrap();

        assert!(!builder.is_complete(AnalysisKind::MlModel));
        let errors = builder.validate(AnalysisKind::MlModel).unwrap_err();
        assert_eq!(errors[0].field(), Some("feature_columns"));
        assert_eq!(builder.build(AnalysisKind::MlModel).unwrap_err(), errors[0]);
    }

    #[test]
    fn test_build_without_dataset_fails() {
        let builder = ConfigurationBuilder::default();
        assert_eq!(
            builder.build(AnalysisKind::Comparison).unwrap_err(),
            ConfigError::NoDataset
        );
    }
}
