use interfile_xnat::client::UploadResult;
use interfile_xnat::model::{FieldValue, FlattenedRecord, ScanTarget};
use interfile_xnat::{
    InMemoryXnat, UploadError, UploadRequest, UploadSettings, Uploader, XmlSchema, XnatClient,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

const HEADER_NAME: &str = "NEMA_IQ.l.hdr";
const DATA_NAME: &str = "NEMA_IQ.l";
const LISTMODE_BYTES: &[u8] = b"\x00\x01listmode-events\x02\x03";

fn fixtures() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures")
}

/// Copy the fixture header next to a fake list-mode data file
fn raw_files() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let header = dir.path().join(HEADER_NAME);
    std::fs::copy(fixtures().join(HEADER_NAME), &header).unwrap();
    std::fs::write(dir.path().join(DATA_NAME), LISTMODE_BYTES).unwrap();
    (dir, header)
}

fn uploader(server: &Arc<InMemoryXnat>) -> Uploader {
    let schema = XmlSchema::from_file(fixtures().join("interfile.xsd")).unwrap();
    Uploader::new(server.clone(), Arc::new(schema), UploadSettings::default())
}

fn request(header: &Path, target: &ScanTarget) -> UploadRequest {
    UploadRequest {
        header: header.to_path_buf(),
        target: target.clone(),
        create_project: false,
    }
}

#[tokio::test]
async fn test_upload_creates_hierarchy_and_files() {
    let (_dir, header) = raw_files();
    let server = Arc::new(InMemoryXnat::with_project("interfile_project"));
    let target = ScanTarget::timestamped("interfile_project", "pet_listmode_scan");

    let summary = uploader(&server)
        .upload_interfile_data(&request(&header, &target))
        .await
        .unwrap();

    assert_eq!(summary.target, target);
    assert_eq!(summary.resource, "PET_RAW");
    assert_eq!(summary.files, vec![HEADER_NAME, DATA_NAME]);
    assert_eq!(summary.field_count, 17);

    assert_eq!(
        server.experiment_type("interfile_project", &target.subject, &target.experiment),
        Some("xnat:petSessionData".to_string())
    );

    let fields = server.scan_fields(&target).unwrap();
    assert_eq!(fields.get("scans"), Some(&FieldValue::from("interfile:petLmScanData")));
    assert_eq!(
        fields.get("interfile:petLmScanData/scannerInformation/name"),
        Some(&FieldValue::from("GE Discovery 690"))
    );

    assert_eq!(server.resource_files(&target, "PET_RAW"), vec![DATA_NAME, HEADER_NAME]);
    assert_eq!(
        server.file_content(&target, "PET_RAW", HEADER_NAME),
        Some(std::fs::read(&header).unwrap())
    );
    assert_eq!(
        server.file_content(&target, "PET_RAW", DATA_NAME),
        Some(LISTMODE_BYTES.to_vec())
    );
}

#[tokio::test]
async fn test_missing_header_fails_first() {
    let server = Arc::new(InMemoryXnat::new());
    let target = ScanTarget::new("p", "s", "e", "scan");

    let err = uploader(&server)
        .upload_interfile_data(&request(Path::new("/nonexistent/NEMA_IQ.l.hdr"), &target))
        .await
        .unwrap_err();

    assert!(matches!(err, UploadError::HeaderNotFound(_)));
}

#[tokio::test]
async fn test_missing_project_unless_created() {
    let (_dir, header) = raw_files();
    let server = Arc::new(InMemoryXnat::new());
    let target = ScanTarget::new("new_project", "s", "e", "scan");

    let err = uploader(&server)
        .upload_interfile_data(&request(&header, &target))
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::ProjectNotFound(ref p) if p == "new_project"));
    assert!(!server.project_exists("new_project").await.unwrap());

    let mut create = request(&header, &target);
    create.create_project = true;
    uploader(&server).upload_interfile_data(&create).await.unwrap();
    assert!(server.project_exists("new_project").await.unwrap());
}

/// Delegates to an in-memory server but claims extra experiments and scans
/// exist, as when another session created them concurrently
struct Crowded {
    inner: Arc<InMemoryXnat>,
    experiments: Vec<String>,
    scans: Vec<String>,
}

#[async_trait::async_trait]
impl XnatClient for Crowded {
    async fn project_exists(&self, project: &str) -> UploadResult<bool> {
        self.inner.project_exists(project).await
    }

    async fn create_project(&self, project: &str) -> UploadResult<()> {
        self.inner.create_project(project).await
    }

    async fn subject_labels(&self, project: &str) -> UploadResult<Vec<String>> {
        self.inner.subject_labels(project).await
    }

    async fn create_subject(&self, project: &str, subject: &str) -> UploadResult<()> {
        self.inner.create_subject(project, subject).await
    }

    async fn experiment_labels(&self, project: &str, subject: &str) -> UploadResult<Vec<String>> {
        let mut labels = self.inner.experiment_labels(project, subject).await?;
        labels.extend(self.experiments.iter().cloned());
        Ok(labels)
    }

    async fn create_experiment(
        &self,
        project: &str,
        subject: &str,
        experiment: &str,
        xsi_type: &str,
    ) -> UploadResult<()> {
        self.inner
            .create_experiment(project, subject, experiment, xsi_type)
            .await
    }

    async fn scan_ids(&self, project: &str, subject: &str, experiment: &str) -> UploadResult<Vec<String>> {
        let mut ids = self.inner.scan_ids(project, subject, experiment).await?;
        ids.extend(self.scans.iter().cloned());
        Ok(ids)
    }

    async fn put_scan(&self, target: &ScanTarget, fields: &FlattenedRecord) -> UploadResult<()> {
        self.inner.put_scan(target, fields).await
    }

    async fn create_resource(&self, target: &ScanTarget, label: &str) -> UploadResult<()> {
        self.inner.create_resource(target, label).await
    }

    async fn upload_file(
        &self,
        target: &ScanTarget,
        label: &str,
        name: &str,
        content: Vec<u8>,
    ) -> UploadResult<()> {
        self.inner.upload_file(target, label, name, content).await
    }
}

fn crowded_uploader(server: &Arc<InMemoryXnat>, experiments: &[&str], scans: &[&str]) -> Uploader {
    let schema = XmlSchema::from_file(fixtures().join("interfile.xsd")).unwrap();
    let client = Crowded {
        inner: server.clone(),
        experiments: experiments.iter().map(|s| s.to_string()).collect(),
        scans: scans.iter().map(|s| s.to_string()).collect(),
    };
    Uploader::new(Arc::new(client), Arc::new(schema), UploadSettings::default())
}

#[tokio::test]
async fn test_existing_subject_is_rejected() {
    let (_dir, header) = raw_files();
    let server = Arc::new(InMemoryXnat::with_project("p"));
    server.create_subject("p", "taken").await.unwrap();

    let err = uploader(&server)
        .upload_interfile_data(&request(&header, &ScanTarget::new("p", "taken", "e", "scan")))
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::SubjectExists(ref s) if s == "taken"));
}

#[tokio::test]
async fn test_existing_experiment_is_rejected() {
    let (_dir, header) = raw_files();
    let server = Arc::new(InMemoryXnat::with_project("p"));
    let target = ScanTarget::new("p", "s", "e", "scan");

    let err = crowded_uploader(&server, &["e"], &[])
        .upload_interfile_data(&request(&header, &target))
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::ExperimentExists(ref e) if e == "e"));

    // the subject was created before the check failed
    assert_eq!(server.subject_labels("p").await.unwrap(), vec!["s"]);
}

#[tokio::test]
async fn test_existing_scan_is_rejected() {
    let (_dir, header) = raw_files();
    let server = Arc::new(InMemoryXnat::with_project("p"));
    let target = ScanTarget::new("p", "s", "e", "pet_listmode_scan");

    let err = crowded_uploader(&server, &[], &["pet_listmode_scan"])
        .upload_interfile_data(&request(&header, &target))
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::ScanExists(ref s) if s == "pet_listmode_scan"));
    assert!(server.scan_fields(&target).is_none());
}

#[tokio::test]
async fn test_missing_data_file_fails_upload() {
    let (dir, header) = raw_files();
    std::fs::remove_file(dir.path().join(DATA_NAME)).unwrap();
    let server = Arc::new(InMemoryXnat::with_project("p"));

    let err = uploader(&server)
        .upload_interfile_data(&request(&header, &ScanTarget::new("p", "s", "e", "scan")))
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::Io { ref path, .. } if path.ends_with(DATA_NAME)));
}

#[tokio::test]
async fn test_invalid_header_stops_before_scan() {
    let dir = tempfile::tempdir().unwrap();
    let header = dir.path().join(HEADER_NAME);
    std::fs::write(&header, b"<somethingElse/>").unwrap();
    std::fs::write(dir.path().join(DATA_NAME), LISTMODE_BYTES).unwrap();
    let server = Arc::new(InMemoryXnat::with_project("p"));
    let target = ScanTarget::new("p", "s", "e", "scan");

    let err = uploader(&server)
        .upload_interfile_data(&request(&header, &target))
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::Convert(_)));
    assert!(server.scan_ids("p", "s", "e").await.unwrap().is_empty());
}
