use plankton_datakit::calc::{calc_dataset, BiomassCell, DiversityCalc, IndexSource};
use plankton_datakit::domain::{Dataset, Id, Point, Species, Taxonomy};

fn point(id: &str, label: &str, v_conc_ml: Option<f64>, v_orig_l: f64) -> Point {
    Point {
        id: Id::new(id),
        label: label.to_string(),
        v_conc_ml,
        v_orig_l,
        site: None,
        depth_m: None,
    }
}

fn species(id: &str, name: &str, wet: Option<f64>, counts: &[(&str, i64)]) -> Species {
    Species {
        id: Id::new(id),
        name_cn: name.to_string(),
        name_latin: String::new(),
        taxonomy: Taxonomy::default(),
        avg_wet_weight_mg: wet,
        counts_by_point_id: counts.iter().map(|(p, c)| (Id::new(*p), *c)).collect(),
    }
}

fn survey() -> Dataset {
    Dataset {
        id: Id::new("d1"),
        title_prefix: "survey".to_string(),
        created_at: "2026-01-01T00:00:00Z".to_string(),
        updated_at: String::new(),
        points: vec![
            point("p1", "1-0", Some(30.0), 20.0),
            point("p2", "1-5", Some(30.0), 20.0),
        ],
        species: vec![
            species("s1", "水蚤", Some(0.05), &[("p1", 8), ("p2", 4)]),
            species("s2", "轮虫", None, &[("p1", 2)]),
        ],
        stratification: Default::default(),
        read_only: false,
    }
}

#[test]
fn point_indices_match_hand_computation() {
    let calc = calc_dataset(&survey());
    let p1 = calc.point_index_by_id.get(&Id::new("p1")).unwrap();

    assert_eq!(p1.total_count, 10);
    assert_eq!(p1.species_count, 2);

    // H' = -(0.8 ln 0.8 + 0.2 ln 0.2)
    let expected_h = -(0.8f64 * 0.8f64.ln() + 0.2f64 * 0.2f64.ln());
    assert!((p1.shannon_h.unwrap() - expected_h).abs() < 1e-12);
    // J = H' / ln 2
    assert!((p1.pielou_j.unwrap() - expected_h / 2.0f64.ln()).abs() < 1e-12);
    // D = (2 - 1) / ln 10
    assert!((p1.margalef_d.unwrap() - 1.0 / 10.0f64.ln()).abs() < 1e-12);
}

#[test]
fn single_species_point_has_undefined_j_and_d() {
    let calc = calc_dataset(&survey());
    let p2 = calc.point_index_by_id.get(&Id::new("p2")).unwrap();
    assert_eq!(p2.total_count, 4);
    assert_eq!(p2.species_count, 1);
    assert_eq!(p2.shannon_h, Some(0.0));
    assert_eq!(p2.pielou_j, None);
    assert_eq!(p2.margalef_d, None);
}

#[test]
fn density_and_biomass_per_species() {
    let calc = calc_dataset(&survey());
    let s1p1 = calc
        .per_species_by_point
        .get(&Id::new("s1"))
        .and_then(|m| m.get(&Id::new("p1")))
        .unwrap();

    // (8 / 1.3) * (30 / 20)
    let expected_density = (8.0 / 1.3) * 1.5;
    assert!((s1p1.density_ind_per_l.unwrap() - expected_density).abs() < 1e-9);
    match s1p1.biomass {
        Some(BiomassCell::Value(mg)) => {
            assert!((mg - expected_density * 0.05).abs() < 1e-9);
        }
        ref other => panic!("expected biomass value, got {other:?}"),
    }

    let s2p1 = calc
        .per_species_by_point
        .get(&Id::new("s2"))
        .and_then(|m| m.get(&Id::new("p1")))
        .unwrap();
    assert_eq!(s2p1.biomass, Some(BiomassCell::MissingWetWeight));
}

#[test]
fn occurrence_frequency_and_dominance() {
    let calc = calc_dataset(&survey());
    // s1 occurs at both points, s2 at one of two.
    assert_eq!(calc.fi_by_species_id.get(&Id::new("s1")).copied(), Some(1.0));
    assert_eq!(calc.fi_by_species_id.get(&Id::new("s2")).copied(), Some(0.5));

    let s1p1 = calc
        .per_species_by_point
        .get(&Id::new("s1"))
        .and_then(|m| m.get(&Id::new("p1")))
        .unwrap();
    // Y = (8/10) * 1.0
    assert!((s1p1.dominance_y.unwrap() - 0.8).abs() < 1e-12);
    assert_eq!(s1p1.is_dominant, Some(true));

    let s2p2 = calc
        .per_species_by_point
        .get(&Id::new("s2"))
        .and_then(|m| m.get(&Id::new("p2")))
        .unwrap();
    assert_eq!(s2p2.dominance_y, None);
}

#[test]
fn empty_dataset_produces_empty_lookups() {
    let ds = Dataset {
        id: Id::new("d0"),
        title_prefix: String::new(),
        created_at: "2026-01-01T00:00:00Z".to_string(),
        updated_at: String::new(),
        points: vec![],
        species: vec![],
        stratification: Default::default(),
        read_only: false,
    };
    let calc = calc_dataset(&ds);
    assert!(calc.point_index_by_id.is_empty());
    assert!(calc.fi_by_species_id.is_empty());
    assert!(calc.per_species_by_point.is_empty());
}

#[test]
fn index_source_is_deterministic() {
    let source = DiversityCalc::default();
    let ds = survey();
    let first = source.point_indices(&ds);
    let second = source.point_indices(&ds);
    assert_eq!(first, second);
}

#[test]
fn custom_dominance_threshold_changes_the_cutoff() {
    let source = DiversityCalc {
        dominance_threshold: 0.9,
    };
    let calc = source.calc(&survey());
    let s1p1 = calc
        .per_species_by_point
        .get(&Id::new("s1"))
        .and_then(|m| m.get(&Id::new("p1")))
        .unwrap();
    // Y = 0.8 stays below the raised cutoff.
    assert_eq!(s1p1.is_dominant, Some(false));
}
