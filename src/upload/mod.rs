//! Upload workflow: create the XNAT hierarchy for one acquisition, store the
//! flattened header as scan fields and attach the raw list-mode files.

use log::{error, info};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::client::{UploadError, UploadResult, XnatClient};
use crate::config::AppConfig;
use crate::logic::{interfile_listmode_to_xnat, FlattenOptions};
use crate::model::{RawFiles, ScanTarget, UploadSummary};
use crate::schema::RecordDecoder;

/// Receives progress of an upload
pub trait UploadReporter: Send + Sync {
    fn step(&self, message: &str);
    fn failure(&self, message: &str);
}

/// Forwards progress to the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl UploadReporter for LogReporter {
    fn step(&self, message: &str) {
        info!("{}", message);
    }

    fn failure(&self, message: &str) {
        error!("{}", message);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadSettings {
    pub resource_label: String,
    pub experiment_xsi_type: String,
    pub flatten: FlattenOptions,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl UploadSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            resource_label: config.upload.resource_label.clone(),
            experiment_xsi_type: config.upload.experiment_xsi_type.clone(),
            flatten: config.flatten.options(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Path of the `.l.hdr` header; the data file sits next to it
    pub header: PathBuf,
    pub target: ScanTarget,
    /// Create the project when it does not exist instead of failing
    pub create_project: bool,
}

pub struct Uploader {
    client: Arc<dyn XnatClient>,
    decoder: Arc<dyn RecordDecoder>,
    reporter: Arc<dyn UploadReporter>,
    settings: UploadSettings,
}

impl Uploader {
    pub fn new(
        client: Arc<dyn XnatClient>,
        decoder: Arc<dyn RecordDecoder>,
        settings: UploadSettings,
    ) -> Self {
        Self {
            client,
            decoder,
            reporter: Arc::new(LogReporter),
            settings,
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn UploadReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Run the whole workflow for one acquisition. Stops at the first
    /// failure; nothing already created on the server is rolled back.
    pub async fn upload_interfile_data(&self, request: &UploadRequest) -> UploadResult<UploadSummary> {
        match self.run(request).await {
            Ok(summary) => Ok(summary),
            Err(err) => {
                self.reporter.failure(&err.to_string());
                Err(err)
            }
        }
    }

    async fn run(&self, request: &UploadRequest) -> UploadResult<UploadSummary> {
        let target = &request.target;
        let files = RawFiles::from_header(&request.header);
        self.reporter
            .step(&format!("Interfile header: {}", files.header.display()));

        if !files.header.is_file() {
            return Err(UploadError::HeaderNotFound(files.header.clone()));
        }
        let header = read_file(&files.header).await?;

        self.ensure_project(&target.project, request.create_project)
            .await?;

        let subjects = self.client.subject_labels(&target.project).await?;
        if subjects.contains(&target.subject) {
            return Err(UploadError::SubjectExists(target.subject.clone()));
        }
        self.client
            .create_subject(&target.project, &target.subject)
            .await?;
        self.reporter
            .step(&format!("Created subject: {}", target.subject));

        let experiments = self
            .client
            .experiment_labels(&target.project, &target.subject)
            .await?;
        if experiments.contains(&target.experiment) {
            return Err(UploadError::ExperimentExists(target.experiment.clone()));
        }
        self.client
            .create_experiment(
                &target.project,
                &target.subject,
                &target.experiment,
                &self.settings.experiment_xsi_type,
            )
            .await?;
        self.reporter
            .step(&format!("Created experiment: {}", target.experiment));

        let fields =
            interfile_listmode_to_xnat(&header, self.decoder.as_ref(), &self.settings.flatten)?;

        let scans = self
            .client
            .scan_ids(&target.project, &target.subject, &target.experiment)
            .await?;
        if scans.contains(&target.scan) {
            return Err(UploadError::ScanExists(target.scan.clone()));
        }
        self.reporter.step(&format!(
            "Creating interfile scan {} with {} header fields",
            target.scan,
            fields.len()
        ));
        self.client.put_scan(target, &fields).await?;

        let label = &self.settings.resource_label;
        self.client.create_resource(target, label).await?;

        let header_name = files.header_name();
        let data_name = files.data_name();
        let data = read_file(&files.data).await?;
        self.client
            .upload_file(target, label, &header_name, header)
            .await?;
        self.client
            .upload_file(target, label, &data_name, data)
            .await?;
        self.reporter.step(&format!(
            "Created scan {} and uploaded interfile files to {}",
            target.scan, label
        ));

        Ok(UploadSummary {
            target: target.clone(),
            field_count: fields.len(),
            resource: label.clone(),
            files: vec![header_name, data_name],
        })
    }

    async fn ensure_project(&self, project: &str, create: bool) -> UploadResult<()> {
        if self.client.project_exists(project).await? {
            self.reporter.step(&format!("Project {} exists", project));
            return Ok(());
        }
        if !create {
            return Err(UploadError::ProjectNotFound(project.to_string()));
        }

        self.client.create_project(project).await?;
        self.reporter.step(&format!("Created project: {}", project));
        Ok(())
    }
}

async fn read_file(path: &Path) -> UploadResult<Vec<u8>> {
    tokio::fs::read(path).await.map_err(|source| UploadError::Io {
        path: path.to_path_buf(),
        source,
    })
}
