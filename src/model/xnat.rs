use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Suffix of an interfile list-mode header file
pub const HEADER_SUFFIX: &str = ".l.hdr";
/// Suffix of the list-mode data file paired with a header
pub const DATA_SUFFIX: &str = ".l";

/// Labels locating one scan in the XNAT hierarchy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanTarget {
    pub project: String,
    pub subject: String,
    pub experiment: String,
    pub scan: String,
}

impl ScanTarget {
    pub fn new(
        project: impl Into<String>,
        subject: impl Into<String>,
        experiment: impl Into<String>,
        scan: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            subject: subject.into(),
            experiment: experiment.into(),
            scan: scan.into(),
        }
    }

    /// Subject and experiment labels sharing one timestamp, e.g.
    /// `Subj-2024-05-04-10-11-12-123` / `Exp-2024-05-04-10-11-12-123`
    pub fn timestamped(project: impl Into<String>, scan: impl Into<String>) -> Self {
        let time_id = chrono::Local::now()
            .format("%Y-%m-%d-%H-%M-%S-%3f")
            .to_string();
        Self::new(
            project,
            format!("Subj-{}", time_id),
            format!("Exp-{}", time_id),
            scan,
        )
    }
}

impl std::fmt::Display for ScanTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.project, self.subject, self.experiment, self.scan
        )
    }
}

/// Header and data file of one list-mode acquisition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFiles {
    pub header: PathBuf,
    pub data: PathBuf,
}

impl RawFiles {
    /// Derive the data file from the header by swapping `.l.hdr` for `.l`
    pub fn from_header(header: impl AsRef<Path>) -> Self {
        let header = header.as_ref().to_path_buf();
        let data = header.with_file_name(data_file_name(&file_name(&header)));
        Self { header, data }
    }

    pub fn header_name(&self) -> String {
        file_name(&self.header)
    }

    pub fn data_name(&self) -> String {
        file_name(&self.data)
    }
}

/// Name of the data file paired with a header file name
pub fn data_file_name(header_name: &str) -> String {
    header_name.replace(HEADER_SUFFIX, DATA_SUFFIX)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// What a completed upload created on the server
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadSummary {
    pub target: ScanTarget,
    pub field_count: usize,
    pub resource: String,
    pub files: Vec<String>,
}
