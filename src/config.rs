use std::fs;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::calc::DOMINANCE_THRESHOLD;
use crate::compare::INDEX_TOLERANCE;
use crate::error::DatakitError;

pub const SETTINGS_FILE: &str = "plankton-dk.json";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Original water volume (L) assigned to newly created points.
    pub default_v_orig_l: f64,
    /// Tolerance for the floating diversity metrics in comparisons.
    pub index_tolerance: f64,
    /// Y cutoff above which a species counts as dominant at a point.
    pub dominance_threshold: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_v_orig_l: 20.0,
            index_tolerance: INDEX_TOLERANCE,
            dominance_threshold: DOMINANCE_THRESHOLD,
        }
    }
}

impl Settings {
    /// Loads settings from `path`, or from `plankton-dk.json` in the
    /// working directory. An explicit path must exist; the default file
    /// is optional and falls back to defaults.
    pub fn resolve(path: Option<&str>) -> Result<Self, DatakitError> {
        let (settings_path, required) = match path {
            Some(path) => (Utf8PathBuf::from(path), true),
            None => (Utf8PathBuf::from(SETTINGS_FILE), false),
        };

        if !settings_path.as_std_path().exists() {
            if required {
                return Err(DatakitError::ConfigRead(settings_path));
            }
            return Ok(Self::default());
        }

        let content = fs::read_to_string(settings_path.as_std_path())
            .map_err(|_| DatakitError::ConfigRead(settings_path.clone()))?;
        let settings: Settings = serde_json::from_str(&content)
            .map_err(|err| DatakitError::ConfigParse(err.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), DatakitError> {
        if !self.index_tolerance.is_finite() || self.index_tolerance < 0.0 {
            return Err(DatakitError::InvalidTolerance(self.index_tolerance));
        }
        if !self.default_v_orig_l.is_finite() || self.default_v_orig_l <= 0.0 {
            return Err(DatakitError::ConfigParse(format!(
                "defaultVOrigL must be > 0, got {}",
                self.default_v_orig_l
            )));
        }
        if !self.dominance_threshold.is_finite() || self.dominance_threshold < 0.0 {
            return Err(DatakitError::ConfigParse(format!(
                "dominanceThreshold must be >= 0, got {}",
                self.dominance_threshold
            )));
        }
        Ok(())
    }
}
