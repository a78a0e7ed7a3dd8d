use crate::result::{ChartDatum, GroupedStatsResult};

/// Grouped statistics arrive fully aggregated; each group becomes one record.
pub fn grouped_stats_chart(result: &GroupedStatsResult) -> Vec<ChartDatum> {
    result
        .groups
        .iter()
        .map(|group| {
            ChartDatum::new()
                .with("label", group.label.as_str())
                .with("count", group.count)
                .with("mean", group.mean)
                .with("min", group.min)
                .with("max", group.max)
        })
        .collect()
}
