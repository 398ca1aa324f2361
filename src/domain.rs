use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id(String);

impl Id {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Id {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Id {
    fn from(value: String) -> Self {
        Self(value)
    }
}

pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Taxonomy {
    pub lvl1: String,
    pub lvl2: String,
    pub lvl3: String,
    pub lvl4: String,
    pub lvl5: String,
}

/// Display order of the four top-level plankton groups.
pub const LVL1_ORDER: [&str; 4] = ["原生动物", "轮虫类", "枝角类", "桡足类"];

pub fn normalize_lvl1(value: &str) -> String {
    let key = value.trim();
    match key {
        "" => String::new(),
        "轮虫" | "轮虫类" => "轮虫类".to_string(),
        "桡足" | "桡足类" => "桡足类".to_string(),
        "枝角" | "枝角类" => "枝角类".to_string(),
        "原生动物" | "原生动物类" => "原生动物".to_string(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Point {
    pub id: Id,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub v_conc_ml: Option<f64>,
    pub v_orig_l: f64,
    #[serde(default)]
    pub site: Option<String>,
    #[serde(default)]
    pub depth_m: Option<f64>,
}

impl Point {
    /// Key used to match equivalent points across two datasets: the trimmed
    /// label when non-blank, the id otherwise.
    pub fn compare_key(&self) -> String {
        let trimmed = self.label.trim();
        if trimmed.is_empty() {
            self.id.as_str().to_string()
        } else {
            trimmed.to_string()
        }
    }

    pub fn display_label(&self) -> String {
        self.compare_key()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Species {
    pub id: Id,
    #[serde(default)]
    pub name_cn: String,
    #[serde(default)]
    pub name_latin: String,
    #[serde(default)]
    pub taxonomy: Taxonomy,
    #[serde(default)]
    pub avg_wet_weight_mg: Option<f64>,
    #[serde(default)]
    pub counts_by_point_id: BTreeMap<Id, i64>,
}

impl Species {
    /// Key used to match equivalent species across two datasets: the trimmed
    /// Chinese name when non-blank, the id otherwise.
    pub fn compare_key(&self) -> String {
        let trimmed = self.name_cn.trim();
        if trimmed.is_empty() {
            self.id.as_str().to_string()
        } else {
            trimmed.to_string()
        }
    }

    pub fn display_name(&self) -> String {
        self.compare_key()
    }

    pub fn count_at(&self, point_id: &Id) -> i64 {
        self.counts_by_point_id.get(point_id).copied().unwrap_or(0)
    }

    pub fn any_count_positive(&self) -> bool {
        self.counts_by_point_id.values().any(|&c| c > 0)
    }

    pub fn count_positive_at(&self, point_id: &Id) -> bool {
        self.count_at(point_id) > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DepthRange {
    pub min_m: f64,
    pub max_m: f64,
}

impl Default for DepthRange {
    fn default() -> Self {
        Self {
            min_m: 0.0,
            max_m: 0.0,
        }
    }
}

impl DepthRange {
    pub fn contains(&self, depth_m: f64) -> bool {
        depth_m >= self.min_m && depth_m <= self.max_m
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StratificationConfig {
    pub enabled: bool,
    pub upper: DepthRange,
    pub middle: DepthRange,
    pub lower: DepthRange,
}

impl Default for StratificationConfig {
    fn default() -> Self {
        // Upper 0-10 m (inclusive), middle 10-30 m, lower below 30 m;
        // overlapping bounds resolve upper -> middle -> lower.
        Self {
            enabled: false,
            upper: DepthRange {
                min_m: 0.0,
                max_m: 10.0,
            },
            middle: DepthRange {
                min_m: 10.0,
                max_m: 30.0,
            },
            lower: DepthRange {
                min_m: 30.0,
                max_m: 9999.0,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    pub id: Id,
    #[serde(default)]
    pub title_prefix: String,
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
    pub points: Vec<Point>,
    pub species: Vec<Species>,
    #[serde(default)]
    pub stratification: StratificationConfig,
    #[serde(default)]
    pub read_only: bool,
}

impl Dataset {
    pub fn new_default(default_v_orig_l: f64) -> Self {
        let created_at = now_iso();
        let point1 = Point {
            id: Id::generate(),
            label: "1".to_string(),
            v_conc_ml: None,
            v_orig_l: default_v_orig_l,
            site: Some("1".to_string()),
            depth_m: None,
        };
        Self {
            id: Id::generate(),
            title_prefix: String::new(),
            created_at: created_at.clone(),
            updated_at: created_at,
            points: vec![point1],
            species: Vec::new(),
            stratification: StratificationConfig::default(),
            read_only: false,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = now_iso();
    }

    pub fn point_by_id(&self, id: &Id) -> Option<&Point> {
        self.points.iter().find(|p| &p.id == id)
    }

    pub fn title(&self) -> String {
        let trimmed = self.title_prefix.trim();
        if trimmed.is_empty() {
            format!("untitled ({})", format_iso(&self.created_at))
        } else {
            trimmed.to_string()
        }
    }

    pub fn summary(&self) -> DatasetSummary {
        DatasetSummary {
            id: self.id.clone(),
            title: self.title(),
            created_at: self.created_at.clone(),
            updated_at: self.updated_at.clone(),
            read_only: self.read_only,
            points_count: self.points.len(),
            species_count: self.species.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetSummary {
    pub id: Id,
    pub title: String,
    pub created_at: String,
    pub updated_at: String,
    pub read_only: bool,
    pub points_count: usize,
    pub species_count: usize,
}

pub fn blank_point(default_v_orig_l: f64, next_label: &str) -> Point {
    let (site, depth_m) = crate::label::resolve_site_and_depth(next_label, None, None);
    Point {
        id: Id::generate(),
        label: next_label.to_string(),
        v_conc_ml: None,
        v_orig_l: default_v_orig_l,
        site,
        depth_m,
    }
}

pub fn blank_species(point_ids: &[Id]) -> Species {
    Species {
        id: Id::generate(),
        name_cn: String::new(),
        name_latin: String::new(),
        taxonomy: Taxonomy::default(),
        avg_wet_weight_mg: None,
        counts_by_point_id: point_ids.iter().map(|id| (id.clone(), 0)).collect(),
    }
}

fn format_iso(iso: &str) -> String {
    match DateTime::parse_from_rfc3339(iso) {
        Ok(parsed) => parsed.format("%Y-%m-%d %H:%M").to_string(),
        Err(_) => iso.to_string(),
    }
}
