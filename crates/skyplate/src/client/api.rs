//! The astrometry.net API client.
//!
//! A `NovaClient` owns one session. It is not meant to be shared between
//! concurrent workers: each worker builds its own client and logs in.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use log::{debug, info};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;

use super::encoder::{FilePayload, RequestEnvelope};
use super::options::UploadOptions;
use super::results::ResultFile;
use super::session::Session;
use super::transport::{ReqwestExchange, Transport};
use super::types::{
    AnnotationRecord, AnnotationsResponse, Calibration, JobInfo, JobListResponse, JobStatus,
    JobStatusResponse, LoginResponse, ObjectsInFieldResponse, SubmissionImagesResponse,
    SubmissionStatus, SurveyPlotResponse, TagsResponse, UploadResponse,
};
use super::wcs::{Survey, TanWcs};
use crate::config::Config;
use crate::error::ClientError;
use crate::sanitize;

pub struct NovaClient {
    transport: Transport,
    session: Option<Session>,
}

impl NovaClient {
    pub fn new(transport: Transport) -> Self {
        Self {
            transport,
            session: None,
        }
    }

    /// Builds a client with a reqwest exchange configured from `config`.
    pub fn from_config(config: &Config) -> Result<Self, ClientError> {
        let exchange = ReqwestExchange::new(&config.http)?;
        let diagnostics_dir = config
            .diagnostics_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));
        let transport = Transport::new(&config.api_url, Arc::new(exchange))
            .with_diagnostics_dir(diagnostics_dir);
        Ok(Self::new(transport))
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Authenticates with an API key, replacing any previous session.
    pub async fn login(&mut self, api_key: &SecretString) -> Result<&Session, ClientError> {
        // Login never carries the old session.
        let envelope = RequestEnvelope::new("login").arg("apikey", api_key.expose_secret());
        let response: LoginResponse = self.transport.call(&envelope).await?;

        let token = response
            .session
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ClientError::Auth("no session in login response".to_string()))?;

        info!("Logged in, session {}", sanitize::redact_token(&token));
        Ok(self.session.insert(Session::new(token)?))
    }

    async fn call<T: DeserializeOwned>(&self, envelope: RequestEnvelope) -> Result<T, ClientError> {
        if self.session.is_none() {
            debug!("Calling '{}' without a session", envelope.service());
        }
        let envelope = envelope.with_session(self.session.as_ref());
        self.transport.call(&envelope).await
    }

    /// Uploads an image file and returns the submission id.
    pub async fn upload_file(
        &self,
        path: &Path,
        options: &UploadOptions,
    ) -> Result<u64, ClientError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| ClientError::ReadFile {
                path: path.to_path_buf(),
                source,
            })?;
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();

        self.upload(Some(FilePayload::new(filename, bytes)), options)
            .await
    }

    /// Uploads an image payload, or a bare source list when `payload` is `None`.
    pub async fn upload(
        &self,
        payload: Option<FilePayload>,
        options: &UploadOptions,
    ) -> Result<u64, ClientError> {
        if payload.is_none() && !options.has_source_list() {
            return Err(ClientError::InvalidOptions(
                "upload needs an image or an x/y source list".to_string(),
            ));
        }

        let mut envelope = RequestEnvelope::new("upload").args(options.to_args()?);
        if let Some(payload) = payload {
            debug!(
                "Uploading {} ({} bytes)",
                payload.filename,
                payload.bytes.len()
            );
            envelope = envelope.payload(payload);
        }

        let response: UploadResponse = self.call(envelope).await?;
        info!("Upload accepted as submission {}", response.subid);
        Ok(response.subid)
    }

    /// Asks the service to fetch and solve an image from a URL.
    pub async fn url_upload(&self, url: &str, options: &UploadOptions) -> Result<u64, ClientError> {
        let envelope = RequestEnvelope::new("url_upload")
            .arg("url", url)
            .args(options.to_args()?);
        let response: UploadResponse = self.call(envelope).await?;
        info!("URL upload accepted as submission {}", response.subid);
        Ok(response.subid)
    }

    pub async fn submission_images(&self, submission_id: u64) -> Result<Vec<u64>, ClientError> {
        let envelope = RequestEnvelope::new("submission_images").arg("subid", submission_id);
        let response: SubmissionImagesResponse = self.call(envelope).await?;
        Ok(response.image_ids)
    }

    pub async fn submission_status(
        &self,
        submission_id: u64,
    ) -> Result<SubmissionStatus, ClientError> {
        self.call(RequestEnvelope::new(format!("submissions/{}", submission_id)))
            .await
    }

    pub async fn job_status(&self, job_id: u64) -> Result<JobStatus, ClientError> {
        let response: JobStatusResponse = self
            .call(RequestEnvelope::new(format!("jobs/{}", job_id)))
            .await?;
        Ok(response.status)
    }

    pub async fn calibration(&self, job_id: u64) -> Result<Calibration, ClientError> {
        self.call(RequestEnvelope::new(format!("jobs/{}/calibration", job_id)))
            .await
    }

    pub async fn tags(&self, job_id: u64) -> Result<Vec<String>, ClientError> {
        let response: TagsResponse = self
            .call(RequestEnvelope::new(format!("jobs/{}/tags", job_id)))
            .await?;
        Ok(response.tags)
    }

    pub async fn machine_tags(&self, job_id: u64) -> Result<Vec<String>, ClientError> {
        let response: TagsResponse = self
            .call(RequestEnvelope::new(format!("jobs/{}/machine_tags", job_id)))
            .await?;
        Ok(response.tags)
    }

    pub async fn objects_in_field(&self, job_id: u64) -> Result<Vec<String>, ClientError> {
        let response: ObjectsInFieldResponse = self
            .call(RequestEnvelope::new(format!("jobs/{}/objects_in_field", job_id)))
            .await?;
        Ok(response.objects_in_field)
    }

    /// Solved objects with drawable geometry.
    pub async fn annotations(&self, job_id: u64) -> Result<Vec<AnnotationRecord>, ClientError> {
        let response: AnnotationsResponse = self
            .call(RequestEnvelope::new(format!("jobs/{}/annotations", job_id)))
            .await?;
        Ok(response.into_valid())
    }

    pub async fn job_info(&self, job_id: u64) -> Result<JobInfo, ClientError> {
        self.call(RequestEnvelope::new(format!("jobs/{}/info", job_id)))
            .await
    }

    /// Lists job ids carrying `tag`, optionally requiring an exact match.
    pub async fn jobs_by_tag(&self, tag: &str, exact: bool) -> Result<Vec<u64>, ClientError> {
        let query: String = url::form_urlencoded::byte_serialize(tag.trim().as_bytes()).collect();
        let mut service = format!("jobs_by_tag?query={}", query);
        if exact {
            service.push_str("&exact=yes");
        }
        let response: JobListResponse = self.call(RequestEnvelope::new(service)).await?;
        Ok(response.jobs)
    }

    pub async fn my_jobs(&self) -> Result<Vec<u64>, ClientError> {
        let response: JobListResponse = self.call(RequestEnvelope::new("myjobs/")).await?;
        Ok(response.jobs)
    }

    /// Survey imagery covering the field of `wcs`, as image bytes.
    pub async fn survey_plot(
        &self,
        survey: Survey,
        wcs: &TanWcs,
    ) -> Result<Vec<u8>, ClientError> {
        let service = survey.service();
        let params =
            serde_json::to_value(wcs).map_err(|e| ClientError::Encoding(e.to_string()))?;
        let response: SurveyPlotResponse = self
            .call(RequestEnvelope::new(service).arg("wcs", params))
            .await?;
        let plot = STANDARD
            .decode(response.plot.trim())
            .map_err(|e| ClientError::MalformedResponse {
                service: service.to_string(),
                reason: format!("plot is not base64: {}", e),
            })?;
        info!("Received {} plot ({} bytes)", survey.name(), plot.len());
        Ok(plot)
    }

    /// Downloads one of the result files produced by a solved job.
    pub async fn download_result_file(
        &self,
        job_id: u64,
        file: ResultFile,
    ) -> Result<Vec<u8>, ClientError> {
        let base = self.transport.base_url();
        let url = file.url(base, job_id);
        debug!("Retrieving {} from {}", file.name(), sanitize::redact_url(&url));
        let headers = [("Referer".to_string(), base.to_string())];
        self.transport.fetch_bytes(&url, &headers).await
    }
}
