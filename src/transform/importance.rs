use crate::result::{ChartDatum, FeatureImportance};

#[derive(Debug, Clone, PartialEq)]
pub struct ImportanceBar {
    pub feature: String,
    pub importance: f64,
    /// Importance as a percentage of the top feature's importance
    pub relative: f64,
}

/// Scales importances against the most important feature, sorted
/// descending (stable for ties).
///
/// Works the same whatever algorithm produced the importances. When the top
/// importance is not positive every bar is zero length.
pub fn relative_importance(features: &[FeatureImportance]) -> Vec<ImportanceBar> {
    let top = features
        .iter()
        .map(|feature| feature.importance)
        .filter(|importance| importance.is_finite())
        .fold(f64::NEG_INFINITY, f64::max);

    let mut bars: Vec<ImportanceBar> = features
        .iter()
        .map(|feature| ImportanceBar {
            feature: feature.feature.clone(),
            importance: feature.importance,
            relative: if top > 0.0 && feature.importance.is_finite() {
                feature.importance / top * 100.0
            } else {
                0.0
            },
        })
        .collect();
    bars.sort_by(|a, b| b.relative.total_cmp(&a.relative));
    bars
}

pub fn importance_chart(bars: &[ImportanceBar]) -> Vec<ChartDatum> {
    bars.iter()
        .map(|bar| {
            ChartDatum::new()
                .with("feature", bar.feature.as_str())
                .with("importance", bar.importance)
                .with("relative", bar.relative)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::training_result;

    #[test]
    fn test_top_feature_is_hundred_percent() {
        let bars = relative_importance(&training_result().feature_importance);
        assert_eq!(bars[0].feature, "Consumption");
        assert_eq!(bars[0].relative, 100.0);
        assert!((bars[1].relative - 0.25 / 0.6 * 100.0).abs() < 1e-9);
        assert_eq!(bars[2].feature, "province");
    }

    #[test]
    fn test_all_zero_importances() {
        let features = vec![FeatureImportance {
            feature: "a".into(),
            importance: 0.0,
        }];
        let bars = relative_importance(&features);
        assert_eq!(bars[0].relative, 0.0);
    }

    #[test]
    fn test_empty_input() {
        assert!(relative_importance(&[]).is_empty());
    }
}
