//! Cross-check of two index-calculation runs over the same dataset,
//! value by value. Used to confirm that an alternative computation
//! (a reimplementation, an imported result) agrees with the built-in
//! calculation within a tolerance.

use serde::Serialize;

use crate::calc::{BiomassCell, DatasetCalc};
use crate::compare::EMPTY_VALUE;
use crate::domain::Dataset;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalcMismatch {
    pub kind: String,
    pub point_label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub species_name: Option<String>,
    pub ours: String,
    pub theirs: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossCheckReport {
    pub total_checked: usize,
    pub mismatch_count: usize,
    /// Mismatches capped at `max_items`; `mismatch_count` carries the
    /// uncapped total.
    pub items: Vec<CalcMismatch>,
}

pub const DEFAULT_CHECK_TOLERANCE: f64 = 1e-4;
pub const DEFAULT_MAX_ITEMS: usize = 60;

fn fmt_value(v: Option<f64>) -> String {
    match v {
        Some(v) if v.is_finite() => {
            let formatted = format!("{v:.8}");
            let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
            if trimmed.is_empty() {
                "0".to_string()
            } else {
                trimmed.to_string()
            }
        }
        _ => EMPTY_VALUE.to_string(),
    }
}

fn biomass_number(v: Option<&BiomassCell>) -> Option<f64> {
    match v {
        Some(BiomassCell::Value(mg)) => Some(*mg),
        Some(BiomassCell::MissingWetWeight) | None => None,
    }
}

fn biomass_text(v: Option<&BiomassCell>) -> String {
    match v {
        None => EMPTY_VALUE.to_string(),
        Some(BiomassCell::Value(mg)) => fmt_value(Some(*mg)),
        Some(BiomassCell::MissingWetWeight) => "missing wet weight".to_string(),
    }
}

fn nearly_equal(a: Option<f64>, b: Option<f64>, tolerance: f64) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => {
            if !a.is_finite() || !b.is_finite() {
                return false;
            }
            (a - b).abs() <= tolerance
        }
        _ => false,
    }
}

pub fn cross_check(
    dataset: &Dataset,
    ours: &DatasetCalc,
    theirs: &DatasetCalc,
    tolerance: f64,
    max_items: usize,
) -> CrossCheckReport {
    let mut items = Vec::new();
    let mut total_checked = 0usize;

    for p in &dataset.points {
        let ours_pi = ours.point_index_by_id.get(&p.id);
        let theirs_pi = theirs.point_index_by_id.get(&p.id);
        let mut check_point = |kind: &str, a: Option<f64>, b: Option<f64>| {
            total_checked += 1;
            if !nearly_equal(a, b, tolerance) {
                items.push(CalcMismatch {
                    kind: kind.to_string(),
                    point_label: p.display_label(),
                    species_name: None,
                    ours: fmt_value(a),
                    theirs: fmt_value(b),
                });
            }
        };
        check_point("H'", ours_pi.and_then(|pi| pi.shannon_h), theirs_pi.and_then(|pi| pi.shannon_h));
        check_point("J", ours_pi.and_then(|pi| pi.pielou_j), theirs_pi.and_then(|pi| pi.pielou_j));
        check_point("D", ours_pi.and_then(|pi| pi.margalef_d), theirs_pi.and_then(|pi| pi.margalef_d));
    }

    for sp in &dataset.species {
        let name = sp.display_name();
        let ours_map = ours.per_species_by_point.get(&sp.id);
        let theirs_map = theirs.per_species_by_point.get(&sp.id);
        for p in &dataset.points {
            let a = ours_map.and_then(|m| m.get(&p.id));
            let b = theirs_map.and_then(|m| m.get(&p.id));

            let mut check = |kind: &str, va: Option<f64>, vb: Option<f64>| {
                total_checked += 1;
                if !nearly_equal(va, vb, tolerance) {
                    items.push(CalcMismatch {
                        kind: kind.to_string(),
                        point_label: p.display_label(),
                        species_name: Some(name.clone()),
                        ours: fmt_value(va),
                        theirs: fmt_value(vb),
                    });
                }
            };
            check(
                "density",
                a.and_then(|c| c.density_ind_per_l),
                b.and_then(|c| c.density_ind_per_l),
            );
            check("p*ln(p)", a.and_then(|c| c.p_ln_p), b.and_then(|c| c.p_ln_p));
            check("Y", a.and_then(|c| c.dominance_y), b.and_then(|c| c.dominance_y));

            total_checked += 1;
            let ba = a.and_then(|c| c.biomass.as_ref());
            let bb = b.and_then(|c| c.biomass.as_ref());
            let same_biomass = match (ba, bb) {
                (Some(BiomassCell::MissingWetWeight), Some(BiomassCell::MissingWetWeight)) => true,
                _ => nearly_equal(biomass_number(ba), biomass_number(bb), tolerance),
            };
            if !same_biomass {
                items.push(CalcMismatch {
                    kind: "biomass".to_string(),
                    point_label: p.display_label(),
                    species_name: Some(name.clone()),
                    ours: biomass_text(ba),
                    theirs: biomass_text(bb),
                });
            }
        }
    }

    let mismatch_count = items.len();
    items.truncate(max_items);
    CrossCheckReport {
        total_checked,
        mismatch_count,
        items,
    }
}
