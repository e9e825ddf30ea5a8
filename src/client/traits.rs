use crate::client::UploadResult;
use crate::model::{FlattenedRecord, ScanTarget};

/// Operations the uploader needs from an XNAT server
#[async_trait::async_trait]
pub trait XnatClient: Send + Sync {
    async fn project_exists(&self, project: &str) -> UploadResult<bool>;
    async fn create_project(&self, project: &str) -> UploadResult<()>;

    async fn subject_labels(&self, project: &str) -> UploadResult<Vec<String>>;
    async fn create_subject(&self, project: &str, subject: &str) -> UploadResult<()>;

    async fn experiment_labels(&self, project: &str, subject: &str) -> UploadResult<Vec<String>>;
    async fn create_experiment(
        &self,
        project: &str,
        subject: &str,
        experiment: &str,
        xsi_type: &str,
    ) -> UploadResult<()>;

    async fn scan_ids(&self, project: &str, subject: &str, experiment: &str) -> UploadResult<Vec<String>>;
    /// Create the scan and set all of its fields in one request
    async fn put_scan(&self, target: &ScanTarget, fields: &FlattenedRecord) -> UploadResult<()>;

    async fn create_resource(&self, target: &ScanTarget, label: &str) -> UploadResult<()>;
    async fn upload_file(
        &self,
        target: &ScanTarget,
        label: &str,
        name: &str,
        content: Vec<u8>,
    ) -> UploadResult<()>;
}
