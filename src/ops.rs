use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::domain::{Dataset, Id, Species, Taxonomy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MergeCountsMode {
    Sum,
    Max,
}

impl fmt::Display for MergeCountsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeCountsMode::Sum => write!(f, "sum"),
            MergeCountsMode::Max => write!(f, "max"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub dataset: Dataset,
    pub merged_count: usize,
}

/// Collapses species rows that share the same trimmed name into one row
/// per name. The first row of each group wins; missing latin name, wet
/// weight and taxonomy levels are filled from the first group member
/// that has them. Counts combine per point by `Sum` or `Max`.
pub fn merge_duplicate_species(dataset: &Dataset, mode: MergeCountsMode) -> MergeOutcome {
    let mut groups: HashMap<String, Vec<&Species>> = HashMap::new();
    for sp in &dataset.species {
        let key = sp.name_cn.trim();
        if key.is_empty() {
            continue;
        }
        groups.entry(key.to_string()).or_default().push(sp);
    }

    let has_duplicates = groups.values().any(|g| g.len() > 1);
    if !has_duplicates {
        return MergeOutcome {
            dataset: dataset.clone(),
            merged_count: 0,
        };
    }

    let mut handled: HashSet<Id> = HashSet::new();
    let mut next_species = Vec::with_capacity(dataset.species.len());
    let mut merged = 0usize;

    for sp in &dataset.species {
        if !handled.insert(sp.id.clone()) {
            continue;
        }
        let key = sp.name_cn.trim();
        let group = groups.get(key).filter(|g| g.len() > 1);
        let Some(group) = group else {
            next_species.push(sp.clone());
            continue;
        };
        for member in group {
            handled.insert(member.id.clone());
        }

        let base = group[0];
        let latin = group
            .iter()
            .map(|s| s.name_latin.trim())
            .find(|l| !l.is_empty())
            .unwrap_or("")
            .to_string();
        let wet = group.iter().find_map(|s| s.avg_wet_weight_mg);
        let taxonomy = merge_taxonomy(group.iter().map(|s| &s.taxonomy));

        let mut counts: BTreeMap<Id, i64> = BTreeMap::new();
        for p in &dataset.points {
            let merged_value = match mode {
                MergeCountsMode::Sum => group.iter().map(|s| s.count_at(&p.id)).sum(),
                MergeCountsMode::Max => group
                    .iter()
                    .map(|s| s.count_at(&p.id))
                    .max()
                    .unwrap_or(0),
            };
            counts.insert(p.id.clone(), merged_value);
        }

        next_species.push(Species {
            id: base.id.clone(),
            name_cn: base.name_cn.clone(),
            name_latin: latin,
            taxonomy,
            avg_wet_weight_mg: wet,
            counts_by_point_id: counts,
        });
        merged += group.len() - 1;
    }

    let mut next = dataset.clone();
    next.species = next_species;
    MergeOutcome {
        dataset: next,
        merged_count: merged,
    }
}

fn merge_taxonomy<'a>(items: impl Iterator<Item = &'a Taxonomy>) -> Taxonomy {
    let mut result = Taxonomy::default();
    for t in items {
        if result.lvl1.is_empty() && !t.lvl1.trim().is_empty() {
            result.lvl1 = t.lvl1.clone();
        }
        if result.lvl2.is_empty() && !t.lvl2.trim().is_empty() {
            result.lvl2 = t.lvl2.clone();
        }
        if result.lvl3.is_empty() && !t.lvl3.trim().is_empty() {
            result.lvl3 = t.lvl3.clone();
        }
        if result.lvl4.is_empty() && !t.lvl4.trim().is_empty() {
            result.lvl4 = t.lvl4.clone();
        }
        if result.lvl5.is_empty() && !t.lvl5.trim().is_empty() {
            result.lvl5 = t.lvl5.clone();
        }
    }
    result
}
