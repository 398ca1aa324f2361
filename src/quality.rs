//! Best-effort dataset validation: everything that would make counting,
//! density/biomass or the diversity indices fail or mislead is reported
//! as an issue, never as an error.

use std::collections::{BTreeMap, HashSet};

use regex::Regex;
use serde::Serialize;

use crate::calc::point_totals;
use crate::domain::{normalize_lvl1, Dataset, Id, Point};
use crate::label::resolve_site_and_depth;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueLevel {
    Info,
    Warn,
    Error,
}

impl IssueLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueLevel::Info => "info",
            IssueLevel::Warn => "warn",
            IssueLevel::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataIssue {
    pub level: IssueLevel,
    pub title: String,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub species_id: Option<Id>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub point_id: Option<Id>,
    /// Stable key for suppressing an already-acknowledged issue.
    pub key: String,
}

impl DataIssue {
    fn new(level: IssueLevel, title: &str, detail: String) -> Self {
        Self::build(level, title, detail, None, None)
    }

    fn for_point(level: IssueLevel, title: &str, detail: String, point_id: &Id) -> Self {
        Self::build(level, title, detail, None, Some(point_id.clone()))
    }

    fn for_species(level: IssueLevel, title: &str, detail: String, species_id: &Id) -> Self {
        Self::build(level, title, detail, Some(species_id.clone()), None)
    }

    fn build(
        level: IssueLevel,
        title: &str,
        detail: String,
        species_id: Option<Id>,
        point_id: Option<Id>,
    ) -> Self {
        let key = build_issue_key(level, title, &detail, species_id.as_ref(), point_id.as_ref());
        Self {
            level,
            title: title.to_string(),
            detail,
            species_id,
            point_id,
            key,
        }
    }
}

fn normalize_key_part(value: &str) -> String {
    let squeezed = Regex::new(r"\s+")
        .unwrap()
        .replace_all(value.trim(), " ")
        .into_owned();
    squeezed.chars().take(80).collect()
}

fn build_issue_key(
    level: IssueLevel,
    title: &str,
    detail: &str,
    species_id: Option<&Id>,
    point_id: Option<&Id>,
) -> String {
    let mut parts = Vec::new();
    let title = title.trim();
    parts.push(if title.is_empty() {
        level.as_str().to_string()
    } else {
        title.to_string()
    });
    if let Some(pid) = point_id.filter(|id| !id.is_blank()) {
        parts.push(format!("P:{pid}"));
    }
    if let Some(sid) = species_id.filter(|id| !id.is_blank()) {
        parts.push(format!("S:{sid}"));
    }
    if parts.len() <= 1 {
        let d = normalize_key_part(detail);
        if !d.is_empty() {
            parts.push(d);
        }
    }
    parts.join("|")
}

fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

fn point_name(point: &Point, index: usize) -> String {
    let trimmed = point.label.trim();
    if trimmed.is_empty() {
        (index + 1).to_string()
    } else {
        trimmed.to_string()
    }
}

// Ratio bands for the per-site consistency checks.
const VC_RATIO_LOW: f64 = 0.55;
const VC_RATIO_HIGH: f64 = 1.8;
const COUNT_RATIO_LOW: f64 = 0.3;
const COUNT_RATIO_HIGH: f64 = 3.0;

pub fn validate_dataset(dataset: &Dataset) -> Vec<DataIssue> {
    let mut issues = Vec::new();

    if dataset.points.is_empty() {
        issues.push(DataIssue::new(
            IssueLevel::Warn,
            "no sampling points",
            "the dataset has no sampling points; counting, calculation and export are unavailable"
                .to_string(),
        ));
        return issues;
    }

    let point_ids: HashSet<&Id> = dataset.points.iter().map(|p| &p.id).collect();

    for (idx, p) in dataset.points.iter().enumerate() {
        if p.label.trim().is_empty() {
            issues.push(DataIssue::for_point(
                IssueLevel::Warn,
                "blank point label",
                format!(
                    "sampling point #{} has no label; consider naming it (1-0, 1-2, G1, ...)",
                    idx + 1
                ),
                &p.id,
            ));
        }
        if !p.v_orig_l.is_finite() || p.v_orig_l <= 0.0 {
            issues.push(DataIssue::for_point(
                IssueLevel::Error,
                "invalid original volume",
                format!(
                    "point '{}' has original volume {} L; a value > 0 is required",
                    point_name(p, idx),
                    p.v_orig_l
                ),
                &p.id,
            ));
        }
        let used = dataset.species.iter().any(|sp| sp.count_positive_at(&p.id));
        let conc_invalid = match p.v_conc_ml {
            None => true,
            Some(v) => !v.is_finite() || v <= 0.0,
        };
        if used && conc_invalid {
            issues.push(DataIssue::for_point(
                IssueLevel::Warn,
                "missing concentrated volume",
                format!(
                    "point '{}' has counts but no usable concentrated volume; density and biomass cannot be computed",
                    point_name(p, idx)
                ),
                &p.id,
            ));
        }

        if dataset.stratification.enabled {
            let (_, depth) = resolve_site_and_depth(&p.label, p.site.as_deref(), p.depth_m);
            match depth {
                None => {
                    issues.push(DataIssue::for_point(
                        IssueLevel::Warn,
                        "stratification: missing depth",
                        format!(
                            "point '{}' has no depth; use the 'site-depth(m)' label form (e.g. 1-0.3) or the point will be skipped in layer summaries",
                            point_name(p, idx)
                        ),
                        &p.id,
                    ));
                }
                Some(depth) => {
                    let cfg = &dataset.stratification;
                    let in_any = cfg.upper.contains(depth)
                        || cfg.middle.contains(depth)
                        || cfg.lower.contains(depth);
                    if !in_any {
                        issues.push(DataIssue::for_point(
                            IssueLevel::Warn,
                            "stratification: depth out of range",
                            format!(
                                "point '{}' depth {depth} m falls in no layer; it will be skipped in layer summaries",
                                point_name(p, idx)
                            ),
                            &p.id,
                        ));
                    }
                }
            }
        }
    }

    if dataset.stratification.enabled {
        let cfg = &dataset.stratification;
        let mut check_range = |name: &str, min: f64, max: f64| {
            if !min.is_finite() || !max.is_finite() || max <= min {
                issues.push(DataIssue::new(
                    IssueLevel::Warn,
                    "stratification: invalid layer range",
                    format!("{name} layer: from={min} to={max}; finite bounds with to > from required"),
                ));
            }
        };
        check_range("upper", cfg.upper.min_m, cfg.upper.max_m);
        check_range("middle", cfg.middle.min_m, cfg.middle.max_m);
        check_range("lower", cfg.lower.min_m, cfg.lower.max_m);
    }

    // Consistency across points of the same site (stratified casts): the
    // concentrated volume and the total count should stay near the site
    // median.
    struct SitePoint<'a> {
        point: &'a Point,
        total_count: i64,
    }
    let mut grouped: BTreeMap<String, Vec<SitePoint<'_>>> = BTreeMap::new();
    for p in &dataset.points {
        let (site, depth) = resolve_site_and_depth(&p.label, p.site.as_deref(), p.depth_m);
        let Some(site) = site.filter(|s| !s.trim().is_empty()) else {
            continue;
        };
        if depth.filter(|d| d.is_finite()).is_none() {
            continue;
        }
        let (total_count, _) = point_totals(dataset, &p.id);
        grouped
            .entry(site)
            .or_default()
            .push(SitePoint { point: p, total_count });
    }

    for (site, points) in &grouped {
        if points.len() < 2 {
            continue;
        }
        let vc_values: Vec<f64> = points
            .iter()
            .filter_map(|sp| sp.point.v_conc_ml)
            .filter(|v| v.is_finite() && *v > 0.0)
            .collect();
        if let Some(vc_median) = median(&vc_values).filter(|m| *m > 0.0) {
            for sp in points {
                let Some(vc) = sp.point.v_conc_ml.filter(|v| v.is_finite() && *v > 0.0) else {
                    continue;
                };
                let ratio = vc / vc_median;
                if ratio < VC_RATIO_LOW || ratio > VC_RATIO_HIGH {
                    issues.push(DataIssue::for_point(
                        IssueLevel::Info,
                        "site consistency: concentrated volume deviates",
                        format!(
                            "site '{site}' point '{}' has Vc={vc} mL, far from the site median {vc_median:.3} mL",
                            sp.point.display_label()
                        ),
                        &sp.point.id,
                    ));
                }
            }
        }

        let count_values: Vec<f64> = points
            .iter()
            .map(|sp| sp.total_count as f64)
            .filter(|c| *c >= 0.0)
            .collect();
        if let Some(count_median) = median(&count_values).filter(|m| *m > 0.0) {
            for sp in points {
                let total = sp.total_count as f64;
                let ratio = total / count_median;
                if ratio < COUNT_RATIO_LOW || ratio > COUNT_RATIO_HIGH {
                    issues.push(DataIssue::for_point(
                        IssueLevel::Info,
                        "site consistency: total count deviates",
                        format!(
                            "site '{site}' point '{}' has total count {total}, far from the site median {count_median:.0}",
                            sp.point.display_label()
                        ),
                        &sp.point.id,
                    ));
                }
            }
        }
    }

    let mut name_counts: BTreeMap<String, usize> = BTreeMap::new();
    for sp in &dataset.species {
        for (pid, c) in &sp.counts_by_point_id {
            if !point_ids.contains(pid) {
                issues.push(DataIssue::for_species(
                    IssueLevel::Error,
                    "counts reference unknown point",
                    format!(
                        "species '{}' carries a count for a point that no longer exists",
                        sp.display_name()
                    ),
                    &sp.id,
                ));
                continue;
            }
            if *c < 0 {
                issues.push(DataIssue::for_species(
                    IssueLevel::Error,
                    "negative count",
                    format!("species '{}' has count {c} at one sampling point", sp.display_name()),
                    &sp.id,
                ));
            }
        }

        let used = sp.any_count_positive();
        if used && sp.name_cn.trim().is_empty() {
            issues.push(DataIssue::for_species(
                IssueLevel::Warn,
                "blank species name",
                "a counted species has no name; fill it in before exporting".to_string(),
                &sp.id,
            ));
        }
        if used && sp.avg_wet_weight_mg.is_none() {
            issues.push(DataIssue::for_species(
                IssueLevel::Warn,
                "missing average wet weight",
                format!(
                    "species '{}' has counts but no average wet weight; biomass will show as missing",
                    sp.display_name()
                ),
                &sp.id,
            ));
        }
        if used && normalize_lvl1(&sp.taxonomy.lvl1).is_empty() {
            issues.push(DataIssue::for_species(
                IssueLevel::Warn,
                "missing top-level taxonomy",
                format!(
                    "species '{}' has counts but no top-level group (protozoa/rotifers/cladocerans/copepods)",
                    sp.display_name()
                ),
                &sp.id,
            ));
        }

        let key = sp.name_cn.trim();
        if !key.is_empty() {
            *name_counts.entry(key.to_string()).or_insert(0) += 1;
        }
    }
    for (name, n) in &name_counts {
        if *n > 1 {
            issues.push(DataIssue::new(
                IssueLevel::Warn,
                "duplicate species name",
                format!("name '{name}' appears {n} times in this dataset"),
            ));
        }
    }

    if issues.is_empty() {
        issues.push(DataIssue::new(
            IssueLevel::Info,
            "no obvious issues",
            "the dataset satisfies the preconditions for density, biomass and diversity calculation"
                .to_string(),
        ));
    }
    issues
}
