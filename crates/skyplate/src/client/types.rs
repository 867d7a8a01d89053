//! Typed response payloads, one per service endpoint.

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub session: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadResponse {
    pub subid: u64,
    #[serde(default)]
    pub hash: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmissionImagesResponse {
    #[serde(default)]
    pub image_ids: Vec<u64>,
}

/// State of a submission as reported by `submissions/{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmissionStatus {
    /// The service reports a finish timestamp, `null`, or a boolean.
    #[serde(default, deserialize_with = "deserialize_finished")]
    pub processing_finished: bool,
    #[serde(default)]
    pub processing_started: Option<String>,
    /// Job ids in creation order. Entries are `null` until a job exists.
    #[serde(default)]
    pub jobs: Vec<Option<u64>>,
    #[serde(default)]
    pub user_images: Vec<u64>,
}

impl SubmissionStatus {
    /// The first job id that exists, if any.
    pub fn first_job(&self) -> Option<u64> {
        self.jobs.iter().flatten().next().copied()
    }
}

fn deserialize_finished<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    use serde_json::Value;

    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => false,
        Value::Bool(b) => b,
        Value::String(s) => !s.trim().is_empty() && s != "None",
        Value::Number(_) => true,
        Value::Array(_) | Value::Object(_) => {
            return Err(serde::de::Error::custom(
                "processing_finished must be a timestamp, boolean or null",
            ))
        }
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Solving,
    Success,
    Failure,
    /// Any status string this client does not recognize; treated as pending.
    #[serde(other)]
    Unknown,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::Failure)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobStatusResponse {
    pub status: JobStatus,
}

/// Astrometric calibration of a solved job.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    /// Field center right ascension, degrees.
    pub ra: f64,
    /// Field center declination, degrees.
    pub dec: f64,
    /// Pixel scale in arcseconds per pixel, as the service reports it.
    pub pixscale: f64,
    /// Field rotation, degrees East of North.
    pub orientation: f64,
    pub parity: f64,
    /// Field radius, degrees.
    #[serde(default)]
    pub radius: Option<f64>,
}

impl Calibration {
    pub fn degrees_per_pixel(&self) -> f64 {
        self.pixscale / 3600.0
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TagsResponse {
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObjectsInFieldResponse {
    #[serde(default)]
    pub objects_in_field: Vec<String>,
}

/// Survey imagery rendered for a WCS, base64-encoded.
#[derive(Debug, Clone, Deserialize)]
pub struct SurveyPlotResponse {
    pub plot: String,
}

/// One solved celestial object, positioned on the image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationRecord {
    #[serde(rename = "pixelx")]
    pub pixel_x: f64,
    #[serde(rename = "pixely")]
    pub pixel_y: f64,
    #[serde(default)]
    pub radius: f64,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vmag: Option<f64>,
}

impl AnnotationRecord {
    pub fn new(pixel_x: f64, pixel_y: f64, names: &[&str]) -> Self {
        Self {
            pixel_x,
            pixel_y,
            radius: 0.0,
            kind: String::new(),
            names: names.iter().map(|n| n.to_string()).collect(),
            vmag: None,
        }
    }

    /// Finite, non-negative pixel position and radius.
    pub fn is_valid(&self) -> bool {
        self.pixel_x.is_finite()
            && self.pixel_y.is_finite()
            && self.pixel_x >= 0.0
            && self.pixel_y >= 0.0
            && self.radius.is_finite()
            && self.radius >= 0.0
    }

    pub fn label(&self) -> &str {
        self.names.first().map(String::as_str).unwrap_or("Unknown")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotationsResponse {
    #[serde(default)]
    pub annotations: Vec<AnnotationRecord>,
}

impl AnnotationsResponse {
    /// Drops records whose geometry cannot be drawn.
    pub fn into_valid(self) -> Vec<AnnotationRecord> {
        let total = self.annotations.len();
        let valid: Vec<AnnotationRecord> =
            self.annotations.into_iter().filter(|a| a.is_valid()).collect();
        if valid.len() != total {
            log::warn!(
                "Dropped {} annotation(s) with invalid pixel geometry",
                total - valid.len()
            );
        }
        valid
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobInfo {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub original_filename: Option<String>,
    #[serde(default)]
    pub objects_in_field: Vec<String>,
    #[serde(default)]
    pub machine_tags: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub calibration: Option<Calibration>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobListResponse {
    #[serde(default, alias = "job_ids")]
    pub jobs: Vec<u64>,
}
