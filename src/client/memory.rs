use log::debug;
use parking_lot::Mutex;
use std::collections::BTreeMap;

use crate::client::{UploadError, UploadResult, XnatClient};
use crate::model::{FlattenedRecord, ScanTarget};

#[derive(Debug, Default)]
struct Project {
    subjects: BTreeMap<String, Subject>,
}

#[derive(Debug, Default)]
struct Subject {
    experiments: BTreeMap<String, Experiment>,
}

#[derive(Debug, Default)]
struct Experiment {
    xsi_type: String,
    scans: BTreeMap<String, Scan>,
}

#[derive(Debug)]
struct Scan {
    fields: FlattenedRecord,
    resources: BTreeMap<String, BTreeMap<String, Vec<u8>>>,
}

/// XNAT stand-in holding everything in memory. Used for dry runs and tests.
#[derive(Debug, Default)]
pub struct InMemoryXnat {
    projects: Mutex<BTreeMap<String, Project>>,
}

fn not_found(what: &str, name: &str) -> UploadError {
    UploadError::RemoteStatus {
        status: 404,
        body: format!("{} '{}' not found", what, name),
    }
}

impl InMemoryXnat {
    pub fn new() -> Self {
        Self::default()
    }

    /// Server that already holds an empty project
    pub fn with_project(project: &str) -> Self {
        let server = Self::new();
        server
            .projects
            .lock()
            .insert(project.to_string(), Project::default());
        server
    }

    /// Fields stored on a scan
    pub fn scan_fields(&self, target: &ScanTarget) -> Option<FlattenedRecord> {
        self.with_scan(target, |scan| scan.fields.clone()).ok()
    }

    pub fn experiment_type(&self, project: &str, subject: &str, experiment: &str) -> Option<String> {
        let projects = self.projects.lock();
        projects
            .get(project)?
            .subjects
            .get(subject)?
            .experiments
            .get(experiment)
            .map(|e| e.xsi_type.clone())
    }

    /// Names of the files in a scan resource, sorted
    pub fn resource_files(&self, target: &ScanTarget, label: &str) -> Vec<String> {
        self.with_scan(target, |scan| {
            scan.resources
                .get(label)
                .map(|files| files.keys().cloned().collect())
                .unwrap_or_default()
        })
        .unwrap_or_default()
    }

    pub fn file_content(&self, target: &ScanTarget, label: &str, name: &str) -> Option<Vec<u8>> {
        self.with_scan(target, |scan| {
            scan.resources.get(label).and_then(|files| files.get(name).cloned())
        })
        .ok()
        .flatten()
    }

    fn with_experiment<T>(
        &self,
        project: &str,
        subject: &str,
        experiment: &str,
        f: impl FnOnce(&mut Experiment) -> T,
    ) -> UploadResult<T> {
        let mut projects = self.projects.lock();
        let experiment_state = projects
            .get_mut(project)
            .ok_or_else(|| not_found("project", project))?
            .subjects
            .get_mut(subject)
            .ok_or_else(|| not_found("subject", subject))?
            .experiments
            .get_mut(experiment)
            .ok_or_else(|| not_found("experiment", experiment))?;
        Ok(f(experiment_state))
    }

    fn with_scan<T>(&self, target: &ScanTarget, f: impl FnOnce(&mut Scan) -> T) -> UploadResult<T> {
        self.with_experiment(&target.project, &target.subject, &target.experiment, |experiment| {
            experiment.scans.get_mut(&target.scan).map(f)
        })?
        .ok_or_else(|| not_found("scan", &target.scan))
    }
}

#[async_trait::async_trait]
impl XnatClient for InMemoryXnat {
    async fn project_exists(&self, project: &str) -> UploadResult<bool> {
        Ok(self.projects.lock().contains_key(project))
    }

    async fn create_project(&self, project: &str) -> UploadResult<()> {
        self.projects
            .lock()
            .entry(project.to_string())
            .or_default();
        Ok(())
    }

    async fn subject_labels(&self, project: &str) -> UploadResult<Vec<String>> {
        let projects = self.projects.lock();
        let project_state = projects
            .get(project)
            .ok_or_else(|| not_found("project", project))?;
        Ok(project_state.subjects.keys().cloned().collect())
    }

    async fn create_subject(&self, project: &str, subject: &str) -> UploadResult<()> {
        let mut projects = self.projects.lock();
        projects
            .get_mut(project)
            .ok_or_else(|| not_found("project", project))?
            .subjects
            .entry(subject.to_string())
            .or_default();
        Ok(())
    }

    async fn experiment_labels(&self, project: &str, subject: &str) -> UploadResult<Vec<String>> {
        let projects = self.projects.lock();
        let subject_state = projects
            .get(project)
            .ok_or_else(|| not_found("project", project))?
            .subjects
            .get(subject)
            .ok_or_else(|| not_found("subject", subject))?;
        Ok(subject_state.experiments.keys().cloned().collect())
    }

    async fn create_experiment(
        &self,
        project: &str,
        subject: &str,
        experiment: &str,
        xsi_type: &str,
    ) -> UploadResult<()> {
        let mut projects = self.projects.lock();
        let experiments = &mut projects
            .get_mut(project)
            .ok_or_else(|| not_found("project", project))?
            .subjects
            .get_mut(subject)
            .ok_or_else(|| not_found("subject", subject))?
            .experiments;
        experiments
            .entry(experiment.to_string())
            .or_insert_with(|| Experiment {
                xsi_type: xsi_type.to_string(),
                scans: BTreeMap::new(),
            });
        Ok(())
    }

    async fn scan_ids(&self, project: &str, subject: &str, experiment: &str) -> UploadResult<Vec<String>> {
        self.with_experiment(project, subject, experiment, |e| {
            e.scans.keys().cloned().collect()
        })
    }

    async fn put_scan(&self, target: &ScanTarget, fields: &FlattenedRecord) -> UploadResult<()> {
        debug!("Storing {} fields on scan {}", fields.len(), target);
        self.with_experiment(&target.project, &target.subject, &target.experiment, |e| {
            e.scans.insert(
                target.scan.clone(),
                Scan {
                    fields: fields.clone(),
                    resources: BTreeMap::new(),
                },
            );
        })
    }

    async fn create_resource(&self, target: &ScanTarget, label: &str) -> UploadResult<()> {
        self.with_scan(target, |scan| {
            scan.resources.entry(label.to_string()).or_default();
        })
    }

    async fn upload_file(
        &self,
        target: &ScanTarget,
        label: &str,
        name: &str,
        content: Vec<u8>,
    ) -> UploadResult<()> {
        self.with_scan(target, |scan| {
            scan.resources.get_mut(label).map(|files| {
                files.insert(name.to_string(), content);
            })
        })?
        .ok_or_else(|| not_found("resource", label))
    }
}
