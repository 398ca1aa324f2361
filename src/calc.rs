//! Per-point diversity indices and per-species derived values.
//!
//! N is the total individual count at a point, S the species richness,
//! H' the Shannon index (natural log), J the Pielou evenness H'/ln(S)
//! and D the Margalef-type index (S-1)/ln(N). Density converts counts to
//! individuals per litre through the concentration step; biomass applies
//! the species' average wet weight.

use std::collections::HashMap;

use serde::Serialize;

use crate::domain::{Dataset, Id};

/// Counting-chamber correction factor for the 0.1 mL chamber.
const CHAMBER_FACTOR: f64 = 1.3;

/// Dominance cutoff for Y = (n/N) * fi.
pub const DOMINANCE_THRESHOLD: f64 = 0.02;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BiomassCell {
    Value(f64),
    MissingWetWeight,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PointIndex {
    pub point_id: Id,
    pub label: String,
    pub v_conc_ml: Option<f64>,
    pub v_orig_l: f64,
    pub total_count: i64,
    pub species_count: i64,
    pub shannon_h: Option<f64>,
    pub pielou_j: Option<f64>,
    pub margalef_d: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeciesPointCalc {
    pub count: i64,
    pub density_ind_per_l: Option<f64>,
    pub biomass: Option<BiomassCell>,
    pub p: Option<f64>,
    pub p_ln_p: Option<f64>,
    pub dominance_y: Option<f64>,
    pub is_dominant: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct DatasetCalc {
    pub point_index_by_id: HashMap<Id, PointIndex>,
    pub fi_by_species_id: HashMap<Id, f64>,
    pub per_species_by_point: HashMap<Id, HashMap<Id, SpeciesPointCalc>>,
}

/// Source of per-point indices consumed by the dataset comparator. The
/// built-in implementation is [`DiversityCalc`]; anything keyed by the same
/// point ids can stand in for it.
pub trait IndexSource {
    fn point_indices(&self, dataset: &Dataset) -> HashMap<Id, PointIndex>;
}

#[derive(Debug, Clone, Copy)]
pub struct DiversityCalc {
    pub dominance_threshold: f64,
}

impl Default for DiversityCalc {
    fn default() -> Self {
        Self {
            dominance_threshold: DOMINANCE_THRESHOLD,
        }
    }
}

impl IndexSource for DiversityCalc {
    fn point_indices(&self, dataset: &Dataset) -> HashMap<Id, PointIndex> {
        self.calc(dataset).point_index_by_id
    }
}

impl DiversityCalc {
    pub fn calc(&self, dataset: &Dataset) -> DatasetCalc {
        calc_dataset_with(dataset, self.dominance_threshold)
    }
}

fn safe_finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

pub fn density_ind_per_l(count: i64, v_conc_ml: Option<f64>, v_orig_l: f64) -> Option<f64> {
    if count <= 0 {
        return Some(0.0);
    }
    let conc = safe_finite(v_conc_ml)?;
    if v_orig_l <= 0.0 {
        return None;
    }
    Some((count as f64 / CHAMBER_FACTOR) * (conc / v_orig_l))
}

pub fn biomass_mg_per_l(
    count: i64,
    density: Option<f64>,
    wet_weight_mg: Option<f64>,
) -> Option<BiomassCell> {
    if count <= 0 {
        return Some(BiomassCell::Value(0.0));
    }
    let density = density?;
    match wet_weight_mg {
        None => Some(BiomassCell::MissingWetWeight),
        Some(wet) => Some(BiomassCell::Value(density * wet)),
    }
}

/// Occurrence frequency per species: fraction of points with a positive
/// count.
pub fn fi_by_species_id(dataset: &Dataset) -> HashMap<Id, f64> {
    let point_count = dataset.points.len();
    let mut result = HashMap::with_capacity(dataset.species.len());
    for sp in &dataset.species {
        if point_count == 0 {
            result.insert(sp.id.clone(), 0.0);
            continue;
        }
        let present = dataset
            .points
            .iter()
            .filter(|p| sp.count_positive_at(&p.id))
            .count();
        result.insert(sp.id.clone(), present as f64 / point_count as f64);
    }
    result
}

/// (N, S) for one point: total individuals and species with a positive
/// count.
pub fn point_totals(dataset: &Dataset, point_id: &Id) -> (i64, i64) {
    let mut total = 0i64;
    let mut s = 0i64;
    for sp in &dataset.species {
        let count = sp.count_at(point_id);
        total += count;
        if count > 0 {
            s += 1;
        }
    }
    (total, s)
}

pub fn shannon_h(dataset: &Dataset, point_id: &Id, total_count: i64) -> Option<f64> {
    if total_count <= 0 {
        return None;
    }
    let mut sum = 0.0;
    for sp in &dataset.species {
        let n = sp.count_at(point_id);
        if n <= 0 {
            continue;
        }
        let p = n as f64 / total_count as f64;
        if p <= 0.0 {
            continue;
        }
        sum += p * p.ln();
    }
    Some(-sum)
}

pub fn pielou_j(h: Option<f64>, s: i64) -> Option<f64> {
    let h = h?;
    if s <= 1 {
        return None;
    }
    Some(h / (s as f64).ln())
}

pub fn margalef_d(total_count: i64, s: i64) -> Option<f64> {
    if s <= 1 || total_count <= 1 {
        return None;
    }
    Some((s - 1) as f64 / (total_count as f64).ln())
}

pub fn calc_dataset(dataset: &Dataset) -> DatasetCalc {
    calc_dataset_with(dataset, DOMINANCE_THRESHOLD)
}

pub fn calc_dataset_with(dataset: &Dataset, dominance_threshold: f64) -> DatasetCalc {
    let fi_by_species_id = fi_by_species_id(dataset);

    let mut totals_by_point_id = HashMap::with_capacity(dataset.points.len());
    for p in &dataset.points {
        totals_by_point_id.insert(p.id.clone(), point_totals(dataset, &p.id));
    }

    let mut point_index_by_id = HashMap::with_capacity(dataset.points.len());
    for p in &dataset.points {
        let (total_count, s) = totals_by_point_id
            .get(&p.id)
            .copied()
            .unwrap_or((0, 0));
        let h = shannon_h(dataset, &p.id, total_count);
        let j = pielou_j(h, s);
        let d = margalef_d(total_count, s);

        point_index_by_id.insert(
            p.id.clone(),
            PointIndex {
                point_id: p.id.clone(),
                label: p.label.clone(),
                v_conc_ml: p.v_conc_ml,
                v_orig_l: p.v_orig_l,
                total_count,
                species_count: s,
                shannon_h: h,
                pielou_j: j,
                margalef_d: d,
            },
        );
    }

    let mut per_species_by_point: HashMap<Id, HashMap<Id, SpeciesPointCalc>> =
        HashMap::with_capacity(dataset.species.len());
    for sp in &dataset.species {
        let fi = fi_by_species_id.get(&sp.id).copied().unwrap_or(0.0);
        let mut by_point = HashMap::with_capacity(dataset.points.len());
        for p in &dataset.points {
            let (total_count, _) = totals_by_point_id
                .get(&p.id)
                .copied()
                .unwrap_or((0, 0));
            let count = sp.count_at(&p.id);
            let density = density_ind_per_l(count, p.v_conc_ml, p.v_orig_l);
            let biomass = biomass_mg_per_l(count, density, sp.avg_wet_weight_mg);

            let prob = if total_count > 0 {
                Some(count as f64 / total_count as f64)
            } else {
                None
            };
            let p_ln_p = match prob {
                Some(p) if p > 0.0 => Some(p * p.ln()),
                Some(p) if p == 0.0 => Some(0.0),
                _ => None,
            };

            let dominance_y = if total_count > 0 && count > 0 {
                Some((count as f64 / total_count as f64) * fi)
            } else {
                None
            };
            let is_dominant = dominance_y.map(|y| y > dominance_threshold);

            by_point.insert(
                p.id.clone(),
                SpeciesPointCalc {
                    count,
                    density_ind_per_l: density,
                    biomass,
                    p: prob,
                    p_ln_p,
                    dominance_y,
                    is_dominant,
                },
            );
        }
        per_species_by_point.insert(sp.id.clone(), by_point);
    }

    DatasetCalc {
        point_index_by_id,
        fi_by_species_id,
        per_species_by_point,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use crate::domain::{Point, Species, Taxonomy};

    use super::*;

    fn point(id: &str, v_conc_ml: Option<f64>, v_orig_l: f64) -> Point {
        Point {
            id: Id::new(id),
            label: id.to_string(),
            v_conc_ml,
            v_orig_l,
            site: None,
            depth_m: None,
        }
    }

    fn species(id: &str, wet: Option<f64>, counts: &[(&str, i64)]) -> Species {
        let counts_by_point_id: BTreeMap<Id, i64> = counts
            .iter()
            .map(|(pid, c)| (Id::new(*pid), *c))
            .collect();
        Species {
            id: Id::new(id),
            name_cn: id.to_string(),
            name_latin: String::new(),
            taxonomy: Taxonomy::default(),
            avg_wet_weight_mg: wet,
            counts_by_point_id,
        }
    }

    fn dataset(points: Vec<Point>, species_list: Vec<Species>) -> Dataset {
        Dataset {
            id: Id::new("d1"),
            title_prefix: String::new(),
            created_at: "2026-01-01T00:00:00Z".to_string(),
            updated_at: "2026-01-01T00:00:00Z".to_string(),
            points,
            species: species_list,
            stratification: Default::default(),
            read_only: false,
        }
    }

    #[test]
    fn density_uses_chamber_factor() {
        let d = density_ind_per_l(13, Some(30.0), 20.0).unwrap();
        assert!((d - 15.0).abs() < 1e-9);
        assert_eq!(density_ind_per_l(0, Some(30.0), 20.0), Some(0.0));
        assert_eq!(density_ind_per_l(5, None, 20.0), None);
        assert_eq!(density_ind_per_l(5, Some(30.0), 0.0), None);
        assert_eq!(density_ind_per_l(5, Some(f64::NAN), 20.0), None);
    }

    #[test]
    fn biomass_cases() {
        assert_eq!(
            biomass_mg_per_l(0, None, None),
            Some(BiomassCell::Value(0.0))
        );
        assert_eq!(biomass_mg_per_l(5, None, Some(1.0)), None);
        assert_eq!(
            biomass_mg_per_l(5, Some(2.0), None),
            Some(BiomassCell::MissingWetWeight)
        );
        assert_eq!(
            biomass_mg_per_l(5, Some(2.0), Some(0.5)),
            Some(BiomassCell::Value(1.0))
        );
    }

    #[test]
    fn shannon_uniform_counts() {
        // Four equally abundant species: H' = ln(4).
        let ds = dataset(
            vec![point("p1", Some(30.0), 20.0)],
            vec![
                species("a", None, &[("p1", 25)]),
                species("b", None, &[("p1", 25)]),
                species("c", None, &[("p1", 25)]),
                species("d", None, &[("p1", 25)]),
            ],
        );
        let h = shannon_h(&ds, &Id::new("p1"), 100).unwrap();
        assert!((h - 4.0f64.ln()).abs() < 1e-10);
    }

    #[test]
    fn shannon_empty_point_is_none() {
        let ds = dataset(vec![point("p1", None, 20.0)], vec![]);
        assert_eq!(shannon_h(&ds, &Id::new("p1"), 0), None);
    }

    #[test]
    fn evenness_and_margalef_guards() {
        assert_eq!(pielou_j(None, 5), None);
        assert_eq!(pielou_j(Some(0.5), 1), None);
        assert!((pielou_j(Some(2.0f64.ln()), 2).unwrap() - 1.0).abs() < 1e-12);
        assert_eq!(margalef_d(10, 1), None);
        assert_eq!(margalef_d(1, 5), None);
        let d = margalef_d(100, 5).unwrap();
        assert!((d - 4.0 / 100.0f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn fi_counts_presence_fraction() {
        let ds = dataset(
            vec![point("p1", None, 20.0), point("p2", None, 20.0)],
            vec![species("a", None, &[("p1", 3), ("p2", 0)])],
        );
        let fi = fi_by_species_id(&ds);
        assert_eq!(fi.get(&Id::new("a")).copied(), Some(0.5));
    }

    #[test]
    fn calc_dataset_fills_all_lookups() {
        let ds = dataset(
            vec![point("p1", Some(30.0), 20.0)],
            vec![
                species("a", Some(0.5), &[("p1", 8)]),
                species("b", None, &[("p1", 2)]),
            ],
        );
        let calc = calc_dataset(&ds);

        let pi = calc.point_index_by_id.get(&Id::new("p1")).unwrap();
        assert_eq!(pi.total_count, 10);
        assert_eq!(pi.species_count, 2);
        let expected_h = -(0.8f64 * 0.8f64.ln() + 0.2 * 0.2f64.ln());
        assert!((pi.shannon_h.unwrap() - expected_h).abs() < 1e-12);
        assert!(pi.pielou_j.is_some());
        assert!(pi.margalef_d.is_some());

        let a = calc
            .per_species_by_point
            .get(&Id::new("a"))
            .and_then(|m| m.get(&Id::new("p1")))
            .unwrap();
        assert_eq!(a.count, 8);
        assert_eq!(a.p, Some(0.8));
        assert_eq!(a.is_dominant, Some(true));
        assert_matches::assert_matches!(a.biomass, Some(BiomassCell::Value(_)));

        let b = calc
            .per_species_by_point
            .get(&Id::new("b"))
            .and_then(|m| m.get(&Id::new("p1")))
            .unwrap();
        assert_eq!(b.biomass, Some(BiomassCell::MissingWetWeight));
    }

    #[test]
    fn zero_count_species_has_zero_p_ln_p() {
        let ds = dataset(
            vec![point("p1", None, 20.0)],
            vec![
                species("a", None, &[("p1", 4)]),
                species("b", None, &[("p1", 0)]),
            ],
        );
        let calc = calc_dataset(&ds);
        let b = calc
            .per_species_by_point
            .get(&Id::new("b"))
            .and_then(|m| m.get(&Id::new("p1")))
            .unwrap();
        assert_eq!(b.p, Some(0.0));
        assert_eq!(b.p_ln_p, Some(0.0));
        assert_eq!(b.dominance_y, None);
        assert_eq!(b.is_dominant, None);
    }
}
