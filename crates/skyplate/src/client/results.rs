//! Best-effort retrieval of everything a solved job produced.
//!
//! Each artifact is fetched independently. A failed fetch leaves that field
//! empty and is recorded in `failures`; it never aborts the bundle.

use std::future::Future;

use log::warn;
use serde::{Deserialize, Serialize};

use super::api::NovaClient;
use super::types::{AnnotationRecord, Calibration, JobInfo};
use crate::error::ClientError;
use crate::progress::{ProgressEvent, ProgressReporter};

/// Files the service renders for a solved job, served outside the JSON API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultFile {
    /// WCS header.
    Wcs,
    /// The input image with the WCS solution embedded.
    NewFits,
    /// Google Earth sky overlay.
    Kmz,
    /// Table of matched field and index stars.
    Corr,
}

impl ResultFile {
    pub const ALL: [ResultFile; 4] = [
        ResultFile::Wcs,
        ResultFile::NewFits,
        ResultFile::Kmz,
        ResultFile::Corr,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ResultFile::Wcs => "wcs",
            ResultFile::NewFits => "new_fits",
            ResultFile::Kmz => "kmz",
            ResultFile::Corr => "corr",
        }
    }

    fn path_segment(self, job_id: u64) -> String {
        match self {
            ResultFile::Wcs => format!("wcs_file/{}", job_id),
            ResultFile::NewFits => format!("new_fits_file/{}/", job_id),
            ResultFile::Kmz => format!("kml_file/{}/", job_id),
            ResultFile::Corr => format!("corr_file/{}", job_id),
        }
    }

    /// Suffix appended to the image stem when the file is saved.
    pub fn file_suffix(self) -> &'static str {
        match self {
            ResultFile::Wcs => ".wcs",
            ResultFile::NewFits => "_new.fits",
            ResultFile::Kmz => ".kmz",
            ResultFile::Corr => "_corr.fits",
        }
    }

    /// Derives the download URL from the API base URL by swapping its
    /// `/api/` segment for the file's path.
    pub fn url(self, api_base: &str, job_id: u64) -> String {
        let segment = self.path_segment(job_id);
        if api_base.contains("/api/") {
            api_base.replacen("/api/", &format!("/{}", segment), 1)
        } else {
            format!("{}/{}", api_base.trim_end_matches('/'), segment)
        }
    }
}

/// Artifacts of one solved job. Absent fields failed to fetch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResultBundle {
    pub job_id: u64,
    pub calibration: Option<Calibration>,
    pub tags: Option<Vec<String>>,
    pub machine_tags: Option<Vec<String>>,
    pub objects_in_field: Option<Vec<String>>,
    pub annotations: Option<Vec<AnnotationRecord>>,
    pub info: Option<JobInfo>,
    /// `(artifact, error)` for every fetch that failed.
    pub failures: Vec<(String, String)>,
}

impl ResultBundle {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Pixel scale in degrees per pixel, from the calibration or job info.
    pub fn degrees_per_pixel(&self) -> Option<f64> {
        self.calibration
            .or_else(|| self.info.as_ref().and_then(|i| i.calibration))
            .map(|c| c.degrees_per_pixel())
    }
}

pub struct ResultFetcher<'a> {
    client: &'a NovaClient,
    progress: &'a dyn ProgressReporter,
}

impl<'a> ResultFetcher<'a> {
    pub fn new(client: &'a NovaClient, progress: &'a dyn ProgressReporter) -> Self {
        Self { client, progress }
    }

    pub async fn fetch_all(&self, job_id: u64) -> ResultBundle {
        let mut failures = Vec::new();

        let calibration = self
            .attempt("calibration", &mut failures, self.client.calibration(job_id))
            .await;
        let tags = self
            .attempt("tags", &mut failures, self.client.tags(job_id))
            .await;
        let machine_tags = self
            .attempt("machine_tags", &mut failures, self.client.machine_tags(job_id))
            .await;
        let objects_in_field = self
            .attempt(
                "objects_in_field",
                &mut failures,
                self.client.objects_in_field(job_id),
            )
            .await;
        let annotations = self
            .attempt("annotations", &mut failures, self.client.annotations(job_id))
            .await;
        let info = self
            .attempt("info", &mut failures, self.client.job_info(job_id))
            .await;

        ResultBundle {
            job_id,
            calibration,
            tags,
            machine_tags,
            objects_in_field,
            annotations,
            info,
            failures,
        }
    }

    /// Downloads the requested result files, skipping any that fail.
    pub async fn fetch_files(&self, job_id: u64, files: &[ResultFile]) -> Vec<(ResultFile, Vec<u8>)> {
        let mut downloaded = Vec::new();
        for &file in files {
            let mut failures = Vec::new();
            if let Some(bytes) = self
                .attempt(
                    file.name(),
                    &mut failures,
                    self.client.download_result_file(job_id, file),
                )
                .await
            {
                downloaded.push((file, bytes));
            }
        }
        downloaded
    }

    async fn attempt<T>(
        &self,
        artifact: &'static str,
        failures: &mut Vec<(String, String)>,
        fetch: impl Future<Output = Result<T, ClientError>>,
    ) -> Option<T> {
        let result = fetch.await;
        self.progress.report(ProgressEvent::ArtifactFetched {
            artifact,
            available: result.is_ok(),
        });

        match result {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Failed to fetch {}: {}", artifact, e);
                failures.push((artifact.to_string(), e.to_string()));
                None
            }
        }
    }
}
