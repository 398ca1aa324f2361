use serde::Serialize;

use crate::calc::{DiversityCalc, IndexSource, PointIndex};
use crate::compare::{compare_with, CompareResult, CompareSummary, Tolerances};
use crate::config::Settings;
use crate::domain::{Dataset, DatasetSummary};
use crate::error::DatakitError;
use crate::ops::{merge_duplicate_species, MergeCountsMode};
use crate::quality::{validate_dataset, DataIssue, IssueLevel};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareReport {
    pub dataset_a: DatasetSummary,
    pub dataset_b: DatasetSummary,
    pub summary: CompareSummary,
    #[serde(flatten)]
    pub result: CompareResult,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexReport {
    pub dataset: DatasetSummary,
    /// One row per sampling point, in dataset order.
    pub points: Vec<PointIndex>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityReport {
    pub dataset: DatasetSummary,
    pub errors: usize,
    pub warnings: usize,
    pub infos: usize,
    pub issues: Vec<DataIssue>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeReport {
    pub dataset: DatasetSummary,
    pub merged_count: usize,
    pub species_before: usize,
    pub species_after: usize,
}

#[derive(Clone)]
pub struct App<S: IndexSource> {
    settings: Settings,
    source: S,
}

impl App<DiversityCalc> {
    /// App wired with the built-in diversity calculation.
    pub fn with_builtin_calc(settings: Settings) -> Self {
        let source = DiversityCalc {
            dominance_threshold: settings.dominance_threshold,
        };
        Self::new(settings, source)
    }
}

impl<S: IndexSource> App<S> {
    pub fn new(settings: Settings, source: S) -> Self {
        Self { settings, source }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn compare(&self, a: &Dataset, b: &Dataset) -> CompareReport {
        self.run_compare(a, b, self.settings.index_tolerance)
    }

    pub fn compare_with_tolerance(
        &self,
        a: &Dataset,
        b: &Dataset,
        index_tolerance: f64,
    ) -> Result<CompareReport, DatakitError> {
        if !index_tolerance.is_finite() || index_tolerance < 0.0 {
            return Err(DatakitError::InvalidTolerance(index_tolerance));
        }
        Ok(self.run_compare(a, b, index_tolerance))
    }

    fn run_compare(&self, a: &Dataset, b: &Dataset, index_tolerance: f64) -> CompareReport {
        let result = compare_with(a, b, &self.source, Tolerances::with_index(index_tolerance));
        CompareReport {
            dataset_a: a.summary(),
            dataset_b: b.summary(),
            summary: result.summary(),
            result,
        }
    }

    pub fn indices(&self, dataset: &Dataset) -> IndexReport {
        let mut by_id = self.source.point_indices(dataset);
        let points = dataset
            .points
            .iter()
            .filter_map(|p| by_id.remove(&p.id))
            .collect();
        IndexReport {
            dataset: dataset.summary(),
            points,
        }
    }

    pub fn check(&self, dataset: &Dataset) -> QualityReport {
        let issues = validate_dataset(dataset);
        let count = |level: IssueLevel| issues.iter().filter(|i| i.level == level).count();
        QualityReport {
            dataset: dataset.summary(),
            errors: count(IssueLevel::Error),
            warnings: count(IssueLevel::Warn),
            infos: count(IssueLevel::Info),
            issues,
        }
    }

    pub fn merge_duplicates(
        &self,
        dataset: &Dataset,
        mode: MergeCountsMode,
    ) -> Result<(Dataset, MergeReport), DatakitError> {
        if dataset.read_only {
            return Err(DatakitError::ReadOnlyDataset(dataset.title()));
        }
        let outcome = merge_duplicate_species(dataset, mode);
        let report = MergeReport {
            dataset: outcome.dataset.summary(),
            merged_count: outcome.merged_count,
            species_before: dataset.species.len(),
            species_after: outcome.dataset.species.len(),
        };
        Ok((outcome.dataset, report))
    }
}
