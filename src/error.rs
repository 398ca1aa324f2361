use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum DatakitError {
    #[error("failed to read settings file at {0}")]
    ConfigRead(Utf8PathBuf),

    #[error("failed to parse settings JSON: {0}")]
    ConfigParse(String),

    #[error("failed to read dataset snapshot at {0}")]
    SnapshotRead(Utf8PathBuf),

    #[error("failed to parse dataset snapshot {path}: {message}")]
    SnapshotParse { path: Utf8PathBuf, message: String },

    #[error("failed to write {0}")]
    SnapshotWrite(Utf8PathBuf),

    #[error("failed to serialize output: {0}")]
    Serialize(String),

    #[error("invalid tolerance {0}: must be a finite value >= 0")]
    InvalidTolerance(f64),

    #[error("dataset is read-only: {0}")]
    ReadOnlyDataset(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
