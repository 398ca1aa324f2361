//! Structural diff of two sampling datasets.
//!
//! Points are matched across datasets by their trimmed label (id when the
//! label is blank), so the same station keeps its identity between two
//! surveys even when the row ids differ. Species are matched by trimmed
//! name and only count as present when they have at least one positive
//! count. Matched points get a per-metric comparison of the computed
//! diversity indices.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

use crate::calc::{DiversityCalc, IndexSource};
use crate::domain::{Dataset, Point};

/// Index deltas at or below this magnitude are treated as unchanged.
pub const INDEX_TOLERANCE: f64 = 1e-6;

/// Placeholder for values that are absent or not representable.
pub const EMPTY_VALUE: &str = "—";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerances {
    /// Applied to the integer metrics N and S. Zero means any change
    /// is reported.
    pub count: f64,
    /// Applied to the floating metrics H', D and J. Strictly-greater
    /// comparison: a delta of exactly this value is unchanged.
    pub index: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            count: 0.0,
            index: INDEX_TOLERANCE,
        }
    }
}

impl Tolerances {
    pub fn with_index(index: f64) -> Self {
        Self {
            count: 0.0,
            index,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Metric {
    #[serde(rename = "N")]
    TotalCount,
    #[serde(rename = "S")]
    SpeciesRichness,
    #[serde(rename = "H'")]
    ShannonH,
    #[serde(rename = "D")]
    MargalefD,
    #[serde(rename = "J")]
    PielouJ,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::TotalCount => "N",
            Metric::SpeciesRichness => "S",
            Metric::ShannonH => "H'",
            Metric::MargalefD => "D",
            Metric::PielouJ => "J",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One changed metric at one matched point.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexDiffRow {
    /// The comparison key of the matched point.
    pub point_label: String,
    pub metric: Metric,
    pub a_value: String,
    pub b_value: String,
    pub delta: String,
    /// Raw delta (B minus A); `None` when the value exists on one side
    /// only. Kept for magnitude sorting by callers.
    pub delta_value: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareResult {
    pub points_only_in_a: Vec<String>,
    pub points_only_in_b: Vec<String>,
    pub species_only_in_a: Vec<String>,
    pub species_only_in_b: Vec<String>,
    pub index_diffs: Vec<IndexDiffRow>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareSummary {
    pub points_only_in_a: usize,
    pub points_only_in_b: usize,
    pub species_only_in_a: usize,
    pub species_only_in_b: usize,
    pub changed_metrics: usize,
}

impl CompareResult {
    pub fn is_empty(&self) -> bool {
        self.points_only_in_a.is_empty()
            && self.points_only_in_b.is_empty()
            && self.species_only_in_a.is_empty()
            && self.species_only_in_b.is_empty()
            && self.index_diffs.is_empty()
    }

    pub fn summary(&self) -> CompareSummary {
        CompareSummary {
            points_only_in_a: self.points_only_in_a.len(),
            points_only_in_b: self.points_only_in_b.len(),
            species_only_in_a: self.species_only_in_a.len(),
            species_only_in_b: self.species_only_in_b.len(),
            changed_metrics: self.index_diffs.len(),
        }
    }
}

/// Fixed-point with six digits, trailing zeros and dot stripped; absent
/// and non-finite values render as [`EMPTY_VALUE`].
pub fn fmt_num(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => {
            let formatted = format!("{v:.6}");
            let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
            if trimmed.is_empty() || trimmed == "-0" {
                "0".to_string()
            } else {
                trimmed.to_string()
            }
        }
        _ => EMPTY_VALUE.to_string(),
    }
}

pub fn compare(a: &Dataset, b: &Dataset) -> CompareResult {
    compare_with(a, b, &DiversityCalc::default(), Tolerances::default())
}

pub fn compare_with<S: IndexSource>(
    a: &Dataset,
    b: &Dataset,
    source: &S,
    tolerances: Tolerances,
) -> CompareResult {
    let points_a: BTreeMap<String, &Point> =
        a.points.iter().map(|p| (p.compare_key(), p)).collect();
    let points_b: BTreeMap<String, &Point> =
        b.points.iter().map(|p| (p.compare_key(), p)).collect();

    let keys_a: BTreeSet<&String> = points_a.keys().collect();
    let keys_b: BTreeSet<&String> = points_b.keys().collect();
    let points_only_in_a: Vec<String> =
        keys_a.difference(&keys_b).map(|k| (*k).clone()).collect();
    let points_only_in_b: Vec<String> =
        keys_b.difference(&keys_a).map(|k| (*k).clone()).collect();

    let species_a = present_species_keys(a);
    let species_b = present_species_keys(b);
    let species_only_in_a: Vec<String> =
        species_a.difference(&species_b).cloned().collect();
    let species_only_in_b: Vec<String> =
        species_b.difference(&species_a).cloned().collect();

    let indices_a = source.point_indices(a);
    let indices_b = source.point_indices(b);

    let mut index_diffs = Vec::new();
    for key in keys_a.intersection(&keys_b) {
        let Some(pa) = points_a.get(*key) else {
            continue;
        };
        let Some(pb) = points_b.get(*key) else {
            continue;
        };
        // "Cannot compare" when either side has no computed indices for
        // the point; the key is skipped rather than reported.
        let (Some(ia), Some(ib)) = (indices_a.get(&pa.id), indices_b.get(&pb.id)) else {
            continue;
        };

        push_diff(
            &mut index_diffs,
            key,
            Metric::TotalCount,
            Some(ia.total_count as f64),
            Some(ib.total_count as f64),
            tolerances.count,
        );
        push_diff(
            &mut index_diffs,
            key,
            Metric::SpeciesRichness,
            Some(ia.species_count as f64),
            Some(ib.species_count as f64),
            tolerances.count,
        );
        push_diff(
            &mut index_diffs,
            key,
            Metric::ShannonH,
            ia.shannon_h,
            ib.shannon_h,
            tolerances.index,
        );
        push_diff(
            &mut index_diffs,
            key,
            Metric::MargalefD,
            ia.margalef_d,
            ib.margalef_d,
            tolerances.index,
        );
        push_diff(
            &mut index_diffs,
            key,
            Metric::PielouJ,
            ia.pielou_j,
            ib.pielou_j,
            tolerances.index,
        );
    }

    CompareResult {
        points_only_in_a,
        points_only_in_b,
        species_only_in_a,
        species_only_in_b,
        index_diffs,
    }
}

fn present_species_keys(dataset: &Dataset) -> BTreeSet<String> {
    dataset
        .species
        .iter()
        .filter(|sp| sp.any_count_positive())
        .map(|sp| sp.compare_key())
        .filter(|key| !key.trim().is_empty())
        .collect()
}

fn push_diff(
    diffs: &mut Vec<IndexDiffRow>,
    label: &str,
    metric: Metric,
    a_val: Option<f64>,
    b_val: Option<f64>,
    tolerance: f64,
) {
    if a_val.is_none() && b_val.is_none() {
        return;
    }
    let delta_value = match (a_val, b_val) {
        (Some(a), Some(b)) => Some(b - a),
        _ => None,
    };
    let changed = match (a_val, b_val) {
        (Some(a), Some(b)) => (b - a).abs() > tolerance,
        _ => true,
    };
    if !changed {
        return;
    }
    diffs.push(IndexDiffRow {
        point_label: label.to_string(),
        metric,
        a_value: fmt_num(a_val),
        b_value: fmt_num(b_val),
        delta: fmt_num(delta_value),
        delta_value,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fmt_num_strips_trailing_zeros() {
        assert_eq!(fmt_num(Some(0.5)), "0.5");
        assert_eq!(fmt_num(Some(10.0)), "10");
        assert_eq!(fmt_num(Some(0.0)), "0");
        assert_eq!(fmt_num(Some(0.693147)), "0.693147");
        assert_eq!(fmt_num(Some(1.2345678)), "1.234568");
        assert_eq!(fmt_num(None), "—");
        assert_eq!(fmt_num(Some(f64::NAN)), "—");
        assert_eq!(fmt_num(Some(f64::INFINITY)), "—");
    }

    #[test]
    fn push_diff_skips_both_absent() {
        let mut diffs = Vec::new();
        push_diff(&mut diffs, "1", Metric::ShannonH, None, None, 1e-6);
        assert!(diffs.is_empty());
    }

    #[test]
    fn push_diff_one_sided_value_always_changes() {
        let mut diffs = Vec::new();
        push_diff(&mut diffs, "1", Metric::PielouJ, Some(0.4), None, 1e-6);
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].a_value, "0.4");
        assert_eq!(diffs[0].b_value, "—");
        assert_eq!(diffs[0].delta, "—");
        assert_eq!(diffs[0].delta_value, None);
    }

    #[test]
    fn push_diff_respects_strict_tolerance() {
        let mut diffs = Vec::new();
        push_diff(
            &mut diffs,
            "1",
            Metric::ShannonH,
            Some(1.0),
            Some(1.0 + 1e-6),
            1e-6,
        );
        assert!(diffs.is_empty(), "delta of exactly 1e-6 is unchanged");

        push_diff(
            &mut diffs,
            "1",
            Metric::ShannonH,
            Some(1.0),
            Some(1.0 + 1.1e-6),
            1e-6,
        );
        assert_eq!(diffs.len(), 1);
    }

    #[test]
    fn metric_display_names() {
        assert_eq!(Metric::TotalCount.to_string(), "N");
        assert_eq!(Metric::SpeciesRichness.to_string(), "S");
        assert_eq!(Metric::ShannonH.to_string(), "H'");
        assert_eq!(Metric::MargalefD.to_string(), "D");
        assert_eq!(Metric::PielouJ.to_string(), "J");
    }
}
