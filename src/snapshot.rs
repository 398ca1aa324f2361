use std::fs;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tempfile::Builder;

use crate::domain::Dataset;
use crate::error::DatakitError;

/// Reads one dataset snapshot from a JSON file.
pub fn read_dataset(path: &Utf8Path) -> Result<Dataset, DatakitError> {
    let content = fs::read_to_string(path.as_std_path())
        .map_err(|_| DatakitError::SnapshotRead(path.to_owned()))?;
    let dataset: Dataset =
        serde_json::from_str(&content).map_err(|err| DatakitError::SnapshotParse {
            path: path.to_owned(),
            message: err.to_string(),
        })?;
    tracing::debug!(
        path = %path,
        points = dataset.points.len(),
        species = dataset.species.len(),
        "loaded dataset snapshot"
    );
    Ok(dataset)
}

pub fn write_dataset(path: &Utf8Path, dataset: &Dataset) -> Result<(), DatakitError> {
    write_json(path, dataset)
}

/// Serializes `value` and moves it into place atomically: the JSON is
/// staged in a temporary file next to the destination and renamed over
/// it, so readers never observe a half-written snapshot.
pub fn write_json<T: Serialize>(path: &Utf8Path, value: &T) -> Result<(), DatakitError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|err| DatakitError::Serialize(err.to_string()))?;

    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent.to_owned(),
        _ => Utf8PathBuf::from("."),
    };
    fs::create_dir_all(parent.as_std_path())
        .map_err(|err| DatakitError::Filesystem(err.to_string()))?;

    let mut staged = Builder::new()
        .prefix(".plankton-dk-")
        .suffix(".json.tmp")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| DatakitError::Filesystem(err.to_string()))?;
    staged
        .write_all(json.as_bytes())
        .and_then(|()| staged.write_all(b"\n"))
        .map_err(|_| DatakitError::SnapshotWrite(path.to_owned()))?;
    staged
        .persist(path.as_std_path())
        .map_err(|_| DatakitError::SnapshotWrite(path.to_owned()))?;
    tracing::debug!(path = %path, "wrote snapshot");
    Ok(())
}
