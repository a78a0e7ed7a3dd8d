//! Collapsing free-text category labels into a small set of tiers.

use crate::result::{ChartDatum, GroupStat};
use std::collections::HashMap;

pub const OTHER_TIER: &str = "Other";
pub const UNKNOWN_TIER: &str = "Unknown";

/// Case-insensitive, whitespace-trimmed label to tier lookup.
#[derive(Debug, Clone)]
pub struct TierTable {
    tiers: Vec<String>,
    lookup: HashMap<String, usize>,
}

impl TierTable {
    /// Builds a table from `(tier, labels)` pairs; tier order is kept for
    /// output.
    pub fn new(entries: &[(&str, &[&str])]) -> Self {
        let mut tiers = Vec::with_capacity(entries.len());
        let mut lookup = HashMap::new();
        for (index, (tier, labels)) in entries.iter().enumerate() {
            tiers.push(tier.to_string());
            lookup.insert(normalize_label(tier), index);
            for label in labels.iter() {
                lookup.insert(normalize_label(label), index);
            }
        }
        TierTable { tiers, lookup }
    }

    /// Tier for a raw label: mapped tier, `Other` for unmapped non-empty
    /// labels, `Unknown` for empty ones.
    pub fn tier_of(&self, label: &str) -> &str {
        let key = normalize_label(label);
        if key.is_empty() {
            return UNKNOWN_TIER;
        }
        match self.lookup.get(&key) {
            Some(index) => &self.tiers[*index],
            None => OTHER_TIER,
        }
    }

    /// Output order: table tiers, then `Other`, then `Unknown`.
    fn order(&self) -> Vec<&str> {
        self.tiers
            .iter()
            .map(String::as_str)
            .chain([OTHER_TIER, UNKNOWN_TIER])
            .collect()
    }
}

fn normalize_label(label: &str) -> String {
    label.trim().to_lowercase()
}

const NO_EDUCATION_LABELS: &[&str] = &[
    "none",
    "no schooling",
    "never attended",
    "preschool",
    "pre-school",
    "kindergarten",
];
const PRIMARY_LABELS: &[&str] = &[
    "some primary",
    "primary completed",
    "elementary",
    "primary school",
];
const SECONDARY_LABELS: &[&str] = &[
    "some secondary",
    "secondary completed",
    "lower secondary",
    "upper secondary",
    "high school",
    "secondary school",
];
const TERTIARY_LABELS: &[&str] = &[
    "university",
    "college",
    "bachelor",
    "bachelors",
    "master",
    "masters",
    "phd",
    "doctorate",
    "postgraduate",
    "diploma",
    "vocational",
];

/// Education labels seen in household surveys.
pub fn education_tiers() -> TierTable {
    TierTable::new(&[
        ("No education", NO_EDUCATION_LABELS),
        ("Primary", PRIMARY_LABELS),
        ("Secondary", SECONDARY_LABELS),
        ("Tertiary", TERTIARY_LABELS),
    ])
}

#[derive(Debug, Clone, PartialEq)]
pub struct TierGroup {
    pub tier: String,
    pub count: u64,
    /// Count-weighted mean of the members' rates
    pub rate: f64,
    /// Raw labels merged into this tier, first-seen order
    pub members: Vec<String>,
}

/// Merges groups into tiers.
///
/// Counts are summed so no rows are lost. Each group's `mean` is treated as
/// a rate and merged as `sum(count * rate) / sum(count)`; a tier whose
/// members have zero total count gets rate 0. Tiers without members are
/// omitted.
pub fn regroup(groups: &[GroupStat], table: &TierTable) -> Vec<TierGroup> {
    struct Accumulator {
        count: u64,
        weighted: f64,
        members: Vec<String>,
    }

    let mut accumulators: HashMap<&str, Accumulator> = HashMap::new();
    for group in groups {
        let tier = table.tier_of(&group.label);
        let entry = accumulators.entry(tier).or_insert_with(|| Accumulator {
            count: 0,
            weighted: 0.0,
            members: Vec::new(),
        });
        entry.count += group.count;
        entry.weighted += group.count as f64 * group.mean;
        if !entry.members.contains(&group.label) {
            entry.members.push(group.label.clone());
        }
    }

    table
        .order()
        .into_iter()
        .filter_map(|tier| {
            accumulators.remove(tier).map(|acc| TierGroup {
                tier: tier.to_string(),
                count: acc.count,
                rate: if acc.count == 0 {
                    0.0
                } else {
                    acc.weighted / acc.count as f64
                },
                members: acc.members,
            })
        })
        .collect()
}

pub fn regroup_chart(tiers: &[TierGroup]) -> Vec<ChartDatum> {
    tiers
        .iter()
        .map(|tier| {
            ChartDatum::new()
                .with("label", tier.tier.as_str())
                .with("count", tier.count)
                .with("rate", tier.rate)
        })
        .collect()
}
