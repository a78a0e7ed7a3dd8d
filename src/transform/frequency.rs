use crate::result::ChartDatum;

#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyRow {
    pub value: String,
    pub count: u64,
    /// Percent of all rows, missing included
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FrequencyTable {
    pub rows: Vec<FrequencyRow>,
    /// Rows whose value was empty
    pub missing: u64,
    pub total: u64,
}

impl FrequencyTable {
    pub fn to_chart_data(&self) -> Vec<ChartDatum> {
        self.rows
            .iter()
            .map(|row| {
                ChartDatum::new()
                    .with("value", row.value.as_str())
                    .with("count", row.count)
                    .with("percent", row.percent)
            })
            .collect()
    }
}

/// Groups `(value, count)` pairs by trimmed value.
///
/// Duplicate values are merged in first-seen order. Empty values are not
/// dropped: they are accumulated in `missing`, so `sum(rows.count) + missing
/// == total` always holds.
pub fn frequency_table<'a, I>(entries: I) -> FrequencyTable
where
    I: IntoIterator<Item = (&'a str, u64)>,
{
    let mut table = FrequencyTable::default();
    for (value, count) in entries {
        table.total += count;
        let value = value.trim();
        if value.is_empty() {
            table.missing += count;
            continue;
        }
        match table.rows.iter_mut().find(|row| row.value == value) {
            Some(row) => row.count += count,
            None => table.rows.push(FrequencyRow {
                value: value.to_string(),
                count,
                percent: 0.0,
            }),
        }
    }

    let total = table.total;
    for row in &mut table.rows {
        row.percent = if total == 0 {
            0.0
        } else {
            row.count as f64 / total as f64 * 100.0
        };
    }
    table
}
