use log::{debug, trace};
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;

use crate::client::{UploadError, UploadResult, XnatClient};
use crate::config::XnatConfig;
use crate::model::{FlattenedRecord, ScanTarget};

/// XNAT listing envelope: `{"ResultSet": {"Result": [...]}}`
#[derive(Debug, Deserialize)]
struct Listing {
    #[serde(rename = "ResultSet")]
    result_set: ResultSet,
}

#[derive(Debug, Deserialize)]
struct ResultSet {
    #[serde(rename = "Result", default)]
    result: Vec<serde_json::Map<String, serde_json::Value>>,
}

/// XNAT REST API client using basic authentication
#[derive(Debug, Clone)]
pub struct RestXnatClient {
    http: reqwest::Client,
    base_url: Url,
    user: String,
    password: String,
}

impl RestXnatClient {
    pub fn new(config: &XnatConfig) -> UploadResult<Self> {
        let base_url = Url::parse(&config.url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| UploadError::InvalidUrl(config.url.clone()))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url,
            user: config.user.clone(),
            password: config.password.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn project_url(&self, project: &str) -> UploadResult<Url> {
        push_segments(self.base_url.clone(), &["data", "projects", project])
    }

    fn subject_url(&self, project: &str, subject: &str) -> UploadResult<Url> {
        push_segments(self.project_url(project)?, &["subjects", subject])
    }

    fn experiment_url(&self, project: &str, subject: &str, experiment: &str) -> UploadResult<Url> {
        push_segments(self.subject_url(project, subject)?, &["experiments", experiment])
    }

    fn scan_url(&self, target: &ScanTarget) -> UploadResult<Url> {
        let experiment = self.experiment_url(&target.project, &target.subject, &target.experiment)?;
        push_segments(experiment, &["scans", target.scan.as_str()])
    }

    fn resource_url(&self, target: &ScanTarget, label: &str) -> UploadResult<Url> {
        push_segments(self.scan_url(target)?, &["resources", label])
    }

    async fn send(&self, request: RequestBuilder) -> UploadResult<Response> {
        let response = request
            .basic_auth(&self.user, Some(&self.password))
            .send()
            .await?;
        trace!("{} -> {}", response.url(), response.status());
        Ok(response)
    }

    /// Send and turn any non-success status into `RemoteStatus`
    async fn send_checked(&self, request: RequestBuilder) -> UploadResult<Response> {
        let response = self.send(request).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(UploadError::RemoteStatus {
            status: status.as_u16(),
            body,
        })
    }

    /// Values of `field` across a JSON listing
    async fn list(&self, url: Url, field: &str) -> UploadResult<Vec<String>> {
        let request = self.http.get(url).query(&[("format", "json")]);
        let listing: Listing = self.send_checked(request).await?.json().await?;

        Ok(listing
            .result_set
            .result
            .iter()
            .filter_map(|row| row.get(field).and_then(|v| v.as_str()))
            .map(str::to_string)
            .collect())
    }
}

/// Append path segments, percent-encoding each one; labels never split the path
fn push_segments(mut url: Url, segments: &[&str]) -> UploadResult<Url> {
    if url.cannot_be_a_base() {
        return Err(UploadError::InvalidUrl(url.to_string()));
    }
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    Ok(url)
}

#[async_trait::async_trait]
impl XnatClient for RestXnatClient {
    async fn project_exists(&self, project: &str) -> UploadResult<bool> {
        let response = self.send(self.http.get(self.project_url(project)?)).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(UploadError::RemoteStatus {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }

    async fn create_project(&self, project: &str) -> UploadResult<()> {
        debug!("PUT project {}", project);
        self.send_checked(self.http.put(self.project_url(project)?)).await?;
        Ok(())
    }

    async fn subject_labels(&self, project: &str) -> UploadResult<Vec<String>> {
        self.list(push_segments(self.project_url(project)?, &["subjects"])?, "label")
            .await
    }

    async fn create_subject(&self, project: &str, subject: &str) -> UploadResult<()> {
        self.send_checked(self.http.put(self.subject_url(project, subject)?))
            .await?;
        Ok(())
    }

    async fn experiment_labels(&self, project: &str, subject: &str) -> UploadResult<Vec<String>> {
        self.list(
            push_segments(self.subject_url(project, subject)?, &["experiments"])?,
            "label",
        )
        .await
    }

    async fn create_experiment(
        &self,
        project: &str,
        subject: &str,
        experiment: &str,
        xsi_type: &str,
    ) -> UploadResult<()> {
        let request = self
            .http
            .put(self.experiment_url(project, subject, experiment)?)
            .query(&[("xsiType", xsi_type)]);
        self.send_checked(request).await?;
        Ok(())
    }

    async fn scan_ids(&self, project: &str, subject: &str, experiment: &str) -> UploadResult<Vec<String>> {
        self.list(
            push_segments(self.experiment_url(project, subject, experiment)?, &["scans"])?,
            "ID",
        )
        .await
    }

    async fn put_scan(&self, target: &ScanTarget, fields: &FlattenedRecord) -> UploadResult<()> {
        let pairs = fields.to_query_pairs();
        debug!("PUT scan {} with {} query parameters", target, pairs.len());
        let request = self.http.put(self.scan_url(target)?).query(&pairs);
        self.send_checked(request).await?;
        Ok(())
    }

    async fn create_resource(&self, target: &ScanTarget, label: &str) -> UploadResult<()> {
        self.send_checked(self.http.put(self.resource_url(target, label)?))
            .await?;
        Ok(())
    }

    async fn upload_file(
        &self,
        target: &ScanTarget,
        label: &str,
        name: &str,
        content: Vec<u8>,
    ) -> UploadResult<()> {
        let url = push_segments(self.resource_url(target, label)?, &["files", name])?;
        let request = self
            .http
            .put(url)
            .query(&[("inbody", "true")])
            .body(content);
        self.send_checked(request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(url: &str) -> RestXnatClient {
        RestXnatClient::new(&XnatConfig {
            url: url.to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_urls_follow_hierarchy() {
        let client = client("http://xnat.local/");
        let target = ScanTarget::new("p", "s", "e", "pet_listmode_scan");

        assert_eq!(client.base_url().as_str(), "http://xnat.local/");
        assert_eq!(
            client.project_url("p").unwrap().as_str(),
            "http://xnat.local/data/projects/p"
        );
        assert_eq!(
            client.resource_url(&target, "PET_RAW").unwrap().as_str(),
            "http://xnat.local/data/projects/p/subjects/s/experiments/e/scans/pet_listmode_scan/resources/PET_RAW"
        );
    }

    #[test]
    fn test_url_under_base_path() {
        let client = client("https://xnat.local/xnat");
        assert_eq!(
            client.subject_url("p", "s").unwrap().as_str(),
            "https://xnat.local/xnat/data/projects/p/subjects/s"
        );
    }

    #[test]
    fn test_labels_are_percent_encoded() {
        let client = client("http://xnat.local");
        let target = ScanTarget::new("p", "subj/1", "exp#2", "scan?3");

        let url = client.scan_url(&target).unwrap();
        assert_eq!(
            url.as_str(),
            "http://xnat.local/data/projects/p/subjects/subj%2F1/experiments/exp%232/scans/scan%3F3"
        );
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let err = RestXnatClient::new(&XnatConfig {
            url: "not a url".to_string(),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, UploadError::InvalidUrl(url) if url == "not a url"));
    }

    #[test]
    fn test_listing_tolerates_missing_result() {
        let listing: Listing = serde_json::from_str(r#"{"ResultSet": {"totalRecords": "0"}}"#).unwrap();
        assert!(listing.result_set.result.is_empty());
    }
}
