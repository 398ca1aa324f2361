use plankton_datakit::domain::{Dataset, DepthRange, Id, Point, Species, Taxonomy};
use plankton_datakit::quality::{validate_dataset, IssueLevel};

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

fn counted_species(id: &str, name: &str, counts: &[(&str, i64)]) -> Species {
    Species {
        id: Id::new(id),
        name_cn: name.to_string(),
        name_latin: String::new(),
        taxonomy: Taxonomy {
            lvl1: "枝角类".to_string(),
            ..Default::default()
        },
        avg_wet_weight_mg: Some(0.05),
        counts_by_point_id: counts.iter().map(|(p, c)| (Id::new(*p), *c)).collect(),
    }
}

fn dataset(points: Vec<Point>, species: Vec<Species>) -> Dataset {
    Dataset {
        id: Id::new("d1"),
        title_prefix: String::new(),
        created_at: "2026-01-01T00:00:00Z".to_string(),
        updated_at: String::new(),
        points,
        species,
        stratification: Default::default(),
        read_only: false,
    }
}

fn titles(issues: &[plankton_datakit::quality::DataIssue]) -> Vec<&str> {
    issues.iter().map(|i| i.title.as_str()).collect()
}

#[test]
fn invalid_original_volume_is_an_error() {
    let ds = dataset(vec![point("p1", "1", Some(30.0), 0.0)], vec![]);
    let issues = validate_dataset(&ds);
    assert!(issues
        .iter()
        .any(|i| i.level == IssueLevel::Error && i.title == "invalid original volume"));
}

#[test]
fn counted_point_without_concentrated_volume_warns() {
    let ds = dataset(
        vec![point("p1", "1", None, 20.0)],
        vec![counted_species("s1", "水蚤", &[("p1", 5)])],
    );
    let issues = validate_dataset(&ds);
    assert!(titles(&issues).contains(&"missing concentrated volume"));

    // Without counts the missing volume is fine.
    let ds = dataset(vec![point("p1", "1", None, 20.0)], vec![]);
    let issues = validate_dataset(&ds);
    assert!(!titles(&issues).contains(&"missing concentrated volume"));
}

#[test]
fn counts_for_unknown_points_are_an_error() {
    let ds = dataset(
        vec![point("p1", "1", Some(30.0), 20.0)],
        vec![counted_species("s1", "水蚤", &[("p1", 2), ("ghost", 1)])],
    );
    let issues = validate_dataset(&ds);
    assert!(issues
        .iter()
        .any(|i| i.level == IssueLevel::Error && i.title == "counts reference unknown point"));
}

#[test]
fn duplicate_species_names_warn_once_per_name() {
    let ds = dataset(
        vec![point("p1", "1", Some(30.0), 20.0)],
        vec![
            counted_species("s1", "水蚤", &[("p1", 2)]),
            counted_species("s2", "水蚤 ", &[("p1", 3)]),
        ],
    );
    let issues = validate_dataset(&ds);
    let duplicates: Vec<_> = issues
        .iter()
        .filter(|i| i.title == "duplicate species name")
        .collect();
    assert_eq!(duplicates.len(), 1);
}

#[test]
fn stratification_checks_depth_presence_and_range() {
    let mut ds = dataset(
        vec![
            point("p1", "1-5", Some(30.0), 20.0),
            point("p2", "G1", Some(30.0), 20.0),
            point("p3", "1-500", Some(30.0), 20.0),
        ],
        vec![],
    );
    ds.stratification.enabled = true;
    ds.stratification.lower = DepthRange {
        min_m: 30.0,
        max_m: 100.0,
    };

    let issues = validate_dataset(&ds);
    let issue_titles = titles(&issues);
    assert!(issue_titles.contains(&"stratification: missing depth"));
    assert!(issue_titles.contains(&"stratification: depth out of range"));
}

#[test]
fn invalid_layer_ranges_warn() {
    let mut ds = dataset(vec![point("p1", "1-5", Some(30.0), 20.0)], vec![]);
    ds.stratification.enabled = true;
    ds.stratification.middle = DepthRange {
        min_m: 30.0,
        max_m: 10.0,
    };
    let issues = validate_dataset(&ds);
    assert!(titles(&issues).contains(&"stratification: invalid layer range"));
}

#[test]
fn site_consistency_flags_outliers() {
    // Same site "1" at three depths; one cast has a wildly different
    // concentrated volume and total count.
    let ds = dataset(
        vec![
            point("p1", "1-0", Some(30.0), 20.0),
            point("p2", "1-5", Some(30.0), 20.0),
            point("p3", "1-10", Some(300.0), 20.0),
        ],
        vec![
            counted_species("s1", "水蚤", &[("p1", 50), ("p2", 40), ("p3", 1)]),
        ],
    );
    let issues = validate_dataset(&ds);
    let issue_titles = titles(&issues);
    assert!(issue_titles.contains(&"site consistency: concentrated volume deviates"));
    assert!(issue_titles.contains(&"site consistency: total count deviates"));

    let flagged: Vec<_> = issues
        .iter()
        .filter(|i| i.title.starts_with("site consistency"))
        .collect();
    assert!(flagged.iter().all(|i| i.level == IssueLevel::Info));
    assert!(flagged
        .iter()
        .all(|i| i.point_id == Some(Id::new("p3"))));
}

#[test]
fn issues_carry_stable_keys() {
    let ds = dataset(
        vec![point("p1", "", Some(30.0), 20.0)],
        vec![],
    );
    let first = validate_dataset(&ds);
    let second = validate_dataset(&ds);
    let first_keys: Vec<_> = first.iter().map(|i| i.key.clone()).collect();
    let second_keys: Vec<_> = second.iter().map(|i| i.key.clone()).collect();
    assert_eq!(first_keys, second_keys);
    assert!(first_keys.iter().all(|k| !k.is_empty()));
}
