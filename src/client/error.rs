use std::path::PathBuf;
use thiserror::Error;

use crate::logic::ConvertError;

/// Failures of the XNAT upload workflow
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("project '{0}' is not available on the server")]
    ProjectNotFound(String),

    #[error("subject '{0}' already exists")]
    SubjectExists(String),

    #[error("experiment '{0}' already exists")]
    ExperimentExists(String),

    #[error("scan '{0}' already exists")]
    ScanExists(String),

    #[error("interfile header not found: {}", .0.display())]
    HeaderNotFound(PathBuf),

    #[error("invalid XNAT server URL '{0}'")]
    InvalidUrl(String),

    #[error("XNAT responded with status {status}: {body}")]
    RemoteStatus { status: u16, body: String },

    #[error("request to XNAT failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Convert(#[from] ConvertError),
}

pub type UploadResult<T> = std::result::Result<T, UploadError>;
