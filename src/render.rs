//! Chart selection: which chart family shows a kind's records and which
//! record fields it binds.
//!
//! Empty input never produces an empty chart. Every chart area gets either a
//! populated spec or an explicit [`VisualizationSpec::NoData`].

use crate::error::{AnalysisError, ErrorKind};
use crate::registry::AnalysisKind;
use crate::result::ChartDatum;
use serde::Serialize;

/// Crosstabs with more columns than this are shown as a table.
const MAX_STACKED_SERIES: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Vertical,
    Horizontal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarSpec {
    pub title: String,
    pub category_field: String,
    pub value_fields: Vec<String>,
    pub orientation: Orientation,
    pub stacked: bool,
    /// Horizontal marker, e.g. the overall mean
    pub reference_line: Option<f64>,
    pub data: Vec<ChartDatum>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PieSpec {
    pub title: String,
    pub label_field: String,
    pub value_field: String,
    pub data: Vec<ChartDatum>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableSpec {
    pub title: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// What a chart area should display.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "chart", rename_all = "snake_case")]
pub enum VisualizationSpec {
    Bar(BarSpec),
    Pie(PieSpec),
    Table(TableSpec),
    /// Explicit empty state
    NoData { title: String, message: String },
    /// Failure banner in place of the chart
    Error { title: String, message: String },
}

impl VisualizationSpec {
    pub fn title(&self) -> &str {
        match self {
            VisualizationSpec::Bar(spec) => &spec.title,
            VisualizationSpec::Pie(spec) => &spec.title,
            VisualizationSpec::Table(spec) => &spec.title,
            VisualizationSpec::NoData { title, .. } | VisualizationSpec::Error { title, .. } => {
                title
            }
        }
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self, VisualizationSpec::NoData { .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, VisualizationSpec::Error { .. })
    }
}

/// Picks the chart family and field bindings for a kind's chart records.
pub fn render(kind: AnalysisKind, data: &[ChartDatum]) -> VisualizationSpec {
    let title = kind.title().to_string();
    if data.is_empty() {
        return no_data(kind);
    }

    match kind {
        AnalysisKind::GroupedStats => VisualizationSpec::Bar(BarSpec {
            title,
            category_field: "label".into(),
            value_fields: vec!["mean".into()],
            orientation: Orientation::Vertical,
            stacked: false,
            reference_line: None,
            data: data.to_vec(),
        }),
        AnalysisKind::Crosstab => render_crosstab(title, data),
        AnalysisKind::TopN => VisualizationSpec::Bar(BarSpec {
            title,
            category_field: "label".into(),
            value_fields: vec!["value".into()],
            orientation: Orientation::Horizontal,
            stacked: false,
            reference_line: None,
            data: data.to_vec(),
        }),
        AnalysisKind::Comparison => VisualizationSpec::Bar(BarSpec {
            title,
            category_field: "label".into(),
            value_fields: vec!["mean".into()],
            orientation: Orientation::Vertical,
            stacked: false,
            reference_line: data[0].number("overall_mean"),
            data: data.to_vec(),
        }),
        AnalysisKind::MlModel => VisualizationSpec::Bar(BarSpec {
            title,
            category_field: "feature".into(),
            value_fields: vec!["relative".into()],
            orientation: Orientation::Horizontal,
            stacked: false,
            reference_line: None,
            data: data.to_vec(),
        }),
    }
}

/// A single column becomes a pie, a handful become stacked bars and wide
/// tables stay tables.
fn render_crosstab(title: String, data: &[ChartDatum]) -> VisualizationSpec {
    let series: Vec<String> = data[0]
        .keys()
        .filter(|key| *key != "label" && *key != "total")
        .map(str::to_string)
        .collect();

    match series.len() {
        0 => VisualizationSpec::Pie(PieSpec {
            title,
            label_field: "label".into(),
            value_field: "total".into(),
            data: data.to_vec(),
        }),
        1 => VisualizationSpec::Pie(PieSpec {
            title,
            label_field: "label".into(),
            value_field: series[0].clone(),
            data: data.to_vec(),
        }),
        n if n > MAX_STACKED_SERIES => table(title, data),
        _ => VisualizationSpec::Bar(BarSpec {
            title,
            category_field: "label".into(),
            value_fields: series,
            orientation: Orientation::Vertical,
            stacked: true,
            reference_line: None,
            data: data.to_vec(),
        }),
    }
}

/// Flattens records into a table; columns come from the first record.
pub fn table(title: impl Into<String>, data: &[ChartDatum]) -> VisualizationSpec {
    let columns: Vec<String> = data
        .first()
        .map(|datum| datum.keys().map(str::to_string).collect())
        .unwrap_or_default();
    let rows = data
        .iter()
        .map(|datum| {
            columns
                .iter()
                .map(|column| datum.get(column).map(|value| value.to_string()).unwrap_or_default())
                .collect()
        })
        .collect();

    VisualizationSpec::Table(TableSpec {
        title: title.into(),
        columns,
        rows,
    })
}

fn no_data(kind: AnalysisKind) -> VisualizationSpec {
    VisualizationSpec::NoData {
        title: kind.title().to_string(),
        message: format!("No data available for {}", kind.title().to_lowercase()),
    }
}

/// Renders a settled dispatch: data is rendered, an empty result or a
/// discarded stale response shows the empty state, anything else an error.
pub fn render_outcome(
    kind: AnalysisKind,
    outcome: &Result<Vec<ChartDatum>, AnalysisError>,
) -> VisualizationSpec {
    match outcome {
        Ok(data) => render(kind, data),
        Err(error) => match error.kind {
            ErrorKind::EmptyResult | ErrorKind::Cancelled => no_data(kind),
            ErrorKind::Validation | ErrorKind::Network | ErrorKind::Server => {
                VisualizationSpec::Error {
                    title: kind.title().to_string(),
                    message: error.to_string(),
                }
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Normalize;
    use crate::testing::{poverty_by_province, province_by_education, training_result};
    use crate::transform::{
        crosstab_chart, grouped_stats_chart, importance_chart, relative_importance,
    };

    #[test]
    fn test_empty_data_is_explicit_no_data() {
        for kind in AnalysisKind::ALL {
            let spec = render(kind, &[]);
            assert!(spec.is_no_data(), "{} rendered {:?}", kind, spec);
            assert_eq!(spec.title(), kind.title());
        }
    }

    #[test]
    fn test_grouped_stats_is_bar_of_means() {
        let data = grouped_stats_chart(&poverty_by_province());
        match render(AnalysisKind::GroupedStats, &data) {
            VisualizationSpec::Bar(bar) => {
                assert_eq!(bar.category_field, "label");
                assert_eq!(bar.value_fields, vec!["mean".to_string()]);
                assert_eq!(bar.data.len(), 2);
            }
            other => panic!("expected bar, got {:?}", other),
        }
    }

    #[test]
    fn test_crosstab_with_columns_is_stacked_bar() {
        let data = crosstab_chart(&province_by_education(), Normalize::Row);
        match render(AnalysisKind::Crosstab, &data) {
            VisualizationSpec::Bar(bar) => {
                assert!(bar.stacked);
                assert_eq!(bar.value_fields, vec!["Primary", "Secondary", "Tertiary"]);
            }
            other => panic!("expected bar, got {:?}", other),
        }
    }

    #[test]
    fn test_single_column_crosstab_is_pie() {
        let data = vec![
            ChartDatum::new().with("label", "North").with("count", 10.0).with("total", 10.0),
            ChartDatum::new().with("label", "South").with("count", 30.0).with("total", 30.0),
        ];
        match render(AnalysisKind::Crosstab, &data) {
            VisualizationSpec::Pie(pie) => assert_eq!(pie.value_field, "count"),
            other => panic!("expected pie, got {:?}", other),
        }
    }

    #[test]
    fn test_wide_crosstab_falls_back_to_table() {
        let mut datum = ChartDatum::new().with("label", "North");
        for column in 0..20 {
            datum.insert(format!("c{}", column), column as f64);
        }
        datum.insert("total", 190.0);
        match render(AnalysisKind::Crosstab, &[datum]) {
            VisualizationSpec::Table(table) => {
                assert_eq!(table.columns.len(), 22);
                assert_eq!(table.rows[0][0], "North");
            }
            other => panic!("expected table, got {:?}", other),
        }
    }

    #[test]
    fn test_importance_bars_bind_relative_share() {
        let bars = relative_importance(&training_result().feature_importance);
        match render(AnalysisKind::MlModel, &importance_chart(&bars)) {
            VisualizationSpec::Bar(bar) => {
                assert_eq!(bar.category_field, "feature");
                assert_eq!(bar.orientation, Orientation::Horizontal);
            }
            other => panic!("expected bar, got {:?}", other),
        }
    }

    #[test]
    fn test_comparison_marks_overall_mean() {
        let data = vec![ChartDatum::new()
            .with("label", "North")
            .with("mean", 0.2)
            .with("overall_mean", 0.5)];
        match render(AnalysisKind::Comparison, &data) {
            VisualizationSpec::Bar(bar) => assert_eq!(bar.reference_line, Some(0.5)),
            other => panic!("expected bar, got {:?}", other),
        }
    }

    #[test]
    fn test_outcomes_map_to_states() {
        let empty = Err(AnalysisError::empty_result("zero rows"));
        assert!(render_outcome(AnalysisKind::TopN, &empty).is_no_data());

        let stale = Err(AnalysisError::cancelled("dataset changed"));
        assert!(render_outcome(AnalysisKind::TopN, &stale).is_no_data());

        let failed = Err(AnalysisError::server("column not found"));
        let spec = render_outcome(AnalysisKind::TopN, &failed);
        assert!(spec.is_error());
        match spec {
            VisualizationSpec::Error { message, .. } => assert!(message.contains("column not found")),
            _ => unreachable!(),
        }

        assert!(render_outcome(AnalysisKind::TopN, &Ok(Vec::new())).is_no_data());
    }

    #[test]
    fn test_spec_serializes_with_chart_tag() {
        let spec = render(AnalysisKind::GroupedStats, &[]);
        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(value["chart"], "no_data");
    }
}
