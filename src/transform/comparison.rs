use crate::result::{ChartDatum, ComparisonResult};

/// Position of a category mean relative to the overall mean, used to pick
/// the trend icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Above,
    Below,
    Equal,
}

impl Trend {
    /// Compares with exact float equality, no epsilon.
    ///
    /// Computed means rarely compare exactly equal, so `Equal` is almost
    /// never produced for real data. Whether a tolerance was intended is an
    /// open question; the exact comparison is kept until that is decided.
    /// NaN on either side yields `Equal`.
    pub fn of(mean: f64, overall_mean: f64) -> Self {
        if mean > overall_mean {
            Trend::Above
        } else if mean < overall_mean {
            Trend::Below
        } else {
            Trend::Equal
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Above => "above",
            Trend::Below => "below",
            Trend::Equal => "equal",
        }
    }
}

pub fn comparison_chart(result: &ComparisonResult) -> Vec<ChartDatum> {
    result
        .categories
        .iter()
        .map(|category| {
            let difference = category.mean - result.overall_mean;
            let percent_difference = if result.overall_mean != 0.0 {
                Some(difference / result.overall_mean * 100.0)
            } else {
                None
            };
            ChartDatum::new()
                .with("label", category.label.as_str())
                .with("mean", category.mean)
                .with("count", category.count)
                .with("overall_mean", result.overall_mean)
                .with("difference", difference)
                .with("percent_difference", percent_difference)
                .with("trend", Trend::of(category.mean, result.overall_mean).as_str())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::CategoryMean;

    fn category(label: &str, mean: f64) -> CategoryMean {
        CategoryMean {
            label: label.to_string(),
            mean,
            count: 1,
        }
    }

    #[test]
    fn test_trend_directions() {
        assert_eq!(Trend::of(0.6, 0.5), Trend::Above);
        assert_eq!(Trend::of(0.4, 0.5), Trend::Below);
        assert_eq!(Trend::of(0.5, 0.5), Trend::Equal);
    }

    #[test]
    fn test_equality_is_exact() {
        // 0.1 + 0.2 != 0.3 in binary floating point.
        assert_eq!(Trend::of(0.1 + 0.2, 0.3), Trend::Above);
    }

    #[test]
    fn test_chart_records_carry_trend() {
        let result = ComparisonResult {
            categories: vec![category("North", 0.2), category("South", 0.6)],
            overall_mean: 0.5,
        };
        let data = comparison_chart(&result);
        assert_eq!(data[0].text("trend"), Some("below"));
        assert_eq!(data[1].text("trend"), Some("above"));
        assert!((data[1].number("percent_difference").unwrap() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_overall_mean_has_no_percent_difference() {
        let result = ComparisonResult {
            categories: vec![category("North", 0.0)],
            overall_mean: 0.0,
        };
        let data = comparison_chart(&result);
        assert_eq!(data[0].get("percent_difference"), Some(&crate::result::ChartValue::Null));
        assert_eq!(data[0].text("trend"), Some("equal"));
    }
}
