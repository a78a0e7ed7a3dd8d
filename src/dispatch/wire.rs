//! JSON request bodies and response decoding for the analysis service.

use crate::config::AnalysisConfig;
use crate::dataset::DatasetId;
use crate::error::AnalysisError;
use crate::registry::AnalysisKind;
use crate::result::{
    AnalysisResult, ComparisonResult, CrosstabResult, GroupedStatsResult, TopNResult,
    TrainingResult,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

/// Raw HTTP answer handed back by a transport.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        TransportResponse {
            status,
            body: body.into(),
        }
    }

    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(200, body)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Builds the request body for a config: `{dataset_id, ...kind fields}`.
///
/// Crosstab normalization is applied client-side, so the service always
/// returns raw cell values.
pub fn request_body(config: &AnalysisConfig, dataset_id: &DatasetId) -> Value {
    match config {
        AnalysisConfig::GroupedStats(config) => json!({
            "dataset_id": dataset_id,
            "group_column": config.group_column,
            "value_column": config.value_column,
            "aggregation": config.aggregation,
        }),
        AnalysisConfig::Crosstab(config) => json!({
            "dataset_id": dataset_id,
            "row_column": config.row_column,
            "column_column": config.column_column,
            "value_column": config.value_column,
            "aggregation": config.aggregation,
        }),
        AnalysisConfig::TopN(config) => json!({
            "dataset_id": dataset_id,
            "group_column": config.group_column,
            "value_column": config.value_column,
            "n": config.n,
            "aggregation": config.aggregation,
        }),
        AnalysisConfig::Comparison(config) => json!({
            "dataset_id": dataset_id,
            "category_column": config.category_column,
            "value_column": config.value_column,
        }),
        AnalysisConfig::MlModel(config) => {
            let mut body = json!({
                "dataset_id": dataset_id,
                "target": config.target_column,
                "test_size": config.test_size,
                "algorithm": config.algorithm,
                "algorithm_params": config.hyperparameters,
            });
            if !config.feature_columns.is_empty() {
                body["features"] = json!(config.feature_columns);
            }
            body
        }
    }
}

/// Turns a transport response into a typed result.
///
/// An `{"error": ...}` payload is a server error whatever the status; any
/// other non-success status is a network error; a success body that does not
/// match the kind's shape is a server error.
pub fn decode_response(
    kind: AnalysisKind,
    response: &TransportResponse,
) -> Result<AnalysisResult, AnalysisError> {
    let parsed: Option<Value> = serde_json::from_str(&response.body).ok();

    if let Some(message) = parsed
        .as_ref()
        .and_then(|value| value.get("error"))
        .and_then(error_message)
    {
        return Err(AnalysisError::server(message));
    }

    if !response.is_success() {
        return Err(AnalysisError::network(format!(
            "HTTP {} from {} endpoint",
            response.status,
            kind.id()
        )));
    }

    let value = parsed.ok_or_else(|| {
        AnalysisError::server(format!("{} response is not valid JSON", kind.id()))
    })?;

    match kind {
        AnalysisKind::GroupedStats => {
            decode::<GroupedStatsResult>(kind, value).map(AnalysisResult::GroupedStats)
        }
        AnalysisKind::Crosstab => decode::<CrosstabResult>(kind, value).map(AnalysisResult::Crosstab),
        AnalysisKind::TopN => decode::<TopNResult>(kind, value).map(AnalysisResult::TopN),
        AnalysisKind::Comparison => {
            decode::<ComparisonResult>(kind, value).map(AnalysisResult::Comparison)
        }
        AnalysisKind::MlModel => decode::<TrainingResult>(kind, value).map(AnalysisResult::MlModel),
    }
}

fn error_message(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(message) => Some(message.clone()),
        other => Some(other.to_string()),
    }
}

fn decode<T: DeserializeOwned>(kind: AnalysisKind, value: Value) -> Result<T, AnalysisError> {
    serde_json::from_value(value).map_err(|e| {
        AnalysisError::server(format!("malformed {} response: {}", kind.id(), e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        Aggregation, Algorithm, CrosstabConfig, ModelConfig, Normalize, DEFAULT_TEST_SIZE,
    };
    use crate::error::ErrorKind;

    fn dataset() -> DatasetId {
        DatasetId::new("survey").unwrap()
    }

    #[test]
    fn test_crosstab_body_carries_dataset_and_fields() {
        let config = AnalysisConfig::Crosstab(CrosstabConfig {
            row_column: "province".into(),
            column_column: None,
            value_column: None,
            aggregation: Aggregation::Count,
            normalize: Normalize::Row,
        });
        let body = request_body(&config, &dataset());
        assert_eq!(body["dataset_id"], "survey");
        assert_eq!(body["row_column"], "province");
        assert!(body["column_column"].is_null());
        assert!(body.get("normalize").is_none());
        assert_eq!(body["aggregation"], "count");
    }

    #[test]
    fn test_model_body_omits_empty_features() {
        let config = AnalysisConfig::MlModel(ModelConfig {
            target_column: "poverty".into(),
            feature_columns: Vec::new(),
            algorithm: Algorithm::GradientBoosting,
            test_size: DEFAULT_TEST_SIZE,
            hyperparameters: Algorithm::GradientBoosting.default_hyperparameters(),
        });
        let body = request_body(&config, &dataset());
        assert_eq!(body["target"], "poverty");
        assert_eq!(body["algorithm"], "gradient_boosting");
        assert_eq!(body["algorithm_params"]["learning_rate"], 0.1);
        assert!(body.get("features").is_none());
    }

    #[test]
    fn test_error_payload_is_server_error() {
        let response = TransportResponse::new(400, r#"{"error": "column not found"}"#);
        let err = decode_response(AnalysisKind::Comparison, &response).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Server);
        assert_eq!(err.message, "column not found");
    }

    #[test]
    fn test_error_payload_with_success_status_is_server_error() {
        let response = TransportResponse::ok(r#"{"error": "not enough rows"}"#);
        let err = decode_response(AnalysisKind::TopN, &response).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Server);
    }

    #[test]
    fn test_bare_failure_status_is_network_error() {
        let response = TransportResponse::new(502, "<html>Bad Gateway</html>");
        let err = decode_response(AnalysisKind::TopN, &response).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Network);
        assert!(err.message.contains("502"));
    }

    #[test]
    fn test_malformed_success_body_is_server_error() {
        let response = TransportResponse::ok(r#"{"data": "nope"}"#);
        let err = decode_response(AnalysisKind::GroupedStats, &response).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Server);
        assert!(err.message.contains("grouped-stats"));
    }

    #[test]
    fn test_decodes_comparison() {
        let response = TransportResponse::ok(
            r#"{"data": [{"category": "North", "mean": 0.2, "count": 10}], "overall_mean": 0.5}"#,
        );
        match decode_response(AnalysisKind::Comparison, &response).unwrap() {
            AnalysisResult::Comparison(result) => {
                assert_eq!(result.overall_mean, 0.5);
                assert_eq!(result.categories[0].label, "North");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_null_error_field_is_ignored() {
        let response = TransportResponse::ok(
            r#"{"error": null, "data": [], "overall_mean": 0.0}"#,
        );
        assert!(decode_response(AnalysisKind::Comparison, &response).is_ok());
    }
}
