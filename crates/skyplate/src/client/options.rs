//! Upload options recognized by the `upload` and `url_upload` services.
//!
//! Every option the service understands is an explicit field here with its
//! type and default. Options are validated before they are encoded.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ClientError;

/// Commercial-use permission for the uploaded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CommercialUse {
    #[serde(rename = "y")]
    Allow,
    #[serde(rename = "n")]
    Deny,
    /// Use the account default (deny unless configured otherwise).
    #[default]
    #[serde(rename = "d")]
    AccountDefault,
}

/// Modification permission for the uploaded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Modifications {
    #[serde(rename = "y")]
    Allow,
    #[serde(rename = "n")]
    Deny,
    #[serde(rename = "sa")]
    ShareAlike,
    #[default]
    #[serde(rename = "d")]
    AccountDefault,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Visibility {
    #[default]
    #[serde(rename = "y")]
    Public,
    #[serde(rename = "n")]
    Private,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScaleUnits {
    /// Width of the field in degrees.
    DegWidth,
    /// Width of the field in arcminutes.
    ArcminWidth,
    /// Pixel scale in arcseconds per pixel.
    ArcsecPerPix,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScaleType {
    /// Lower and upper bounds.
    #[serde(rename = "ul")]
    Bounds,
    /// Estimate plus percentage error.
    #[serde(rename = "ev")]
    Estimate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Parity {
    Positive,
    Negative,
    Both,
}

impl TryFrom<u8> for Parity {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Parity::Positive),
            1 => Ok(Parity::Negative),
            2 => Ok(Parity::Both),
            other => Err(format!("parity must be 0, 1 or 2, got {}", other)),
        }
    }
}

impl From<Parity> for u8 {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::Positive => 0,
            Parity::Negative => 1,
            Parity::Both => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadOptions {
    pub allow_commercial_use: CommercialUse,
    pub allow_modifications: Modifications,
    pub publicly_visible: Visibility,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale_units: Option<ScaleUnits>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale_type: Option<ScaleType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale_lower: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale_upper: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale_est: Option<f64>,
    /// Percentage error on `scale_est`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale_err: Option<f64>,

    /// Field center right ascension in degrees.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub center_ra: Option<f64>,
    /// Field center declination in degrees.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub center_dec: Option<f64>,
    /// Search radius around the field center in degrees.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub radius: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub parity: Option<Parity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downsample_factor: Option<u32>,
    /// Expected star position error in pixels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub positional_error: Option<f64>,
    /// SIP polynomial distortion order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tweak_order: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crpix_center: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invert: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_sextractor: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_height: Option<u32>,
    /// Source list x coordinates, for uploads without an image.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<Vec<f64>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            allow_commercial_use: CommercialUse::AccountDefault,
            allow_modifications: Modifications::AccountDefault,
            publicly_visible: Visibility::Public,
            scale_units: None,
            scale_type: None,
            scale_lower: None,
            scale_upper: None,
            scale_est: None,
            scale_err: None,
            center_ra: None,
            center_dec: None,
            radius: None,
            parity: None,
            downsample_factor: None,
            positional_error: None,
            tweak_order: None,
            crpix_center: None,
            invert: None,
            use_sextractor: None,
            image_width: None,
            image_height: None,
            x: None,
            y: None,
            album: None,
        }
    }
}

impl UploadOptions {
    /// Whether the options carry a source list instead of expecting an image.
    pub fn has_source_list(&self) -> bool {
        self.x.is_some() || self.y.is_some()
    }

    /// Fills `scale_type` from whichever scale hints are present.
    ///
    /// Bounds win over an estimate; a single bound still means bounds.
    pub fn with_inferred_scale_type(mut self) -> Self {
        if self.scale_type.is_none() {
            self.scale_type = if self.scale_lower.is_some() || self.scale_upper.is_some() {
                Some(ScaleType::Bounds)
            } else if self.scale_est.is_some() && self.scale_err.is_some() {
                Some(ScaleType::Estimate)
            } else {
                None
            };
        }
        self
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        for (name, value) in [
            ("scale_lower", self.scale_lower),
            ("scale_upper", self.scale_upper),
            ("scale_est", self.scale_est),
            ("radius", self.radius),
            ("positional_error", self.positional_error),
        ] {
            if let Some(v) = value {
                if !v.is_finite() || v <= 0.0 {
                    return Err(invalid(format!("{} must be a positive number, got {}", name, v)));
                }
            }
        }

        if let Some(err) = self.scale_err {
            if !err.is_finite() || err <= 0.0 || err > 100.0 {
                return Err(invalid(format!(
                    "scale_err is a percentage in (0, 100], got {}",
                    err
                )));
            }
        }

        if let (Some(lower), Some(upper)) = (self.scale_lower, self.scale_upper) {
            if lower > upper {
                return Err(invalid(format!(
                    "scale_lower ({}) exceeds scale_upper ({})",
                    lower, upper
                )));
            }
        }

        match self.scale_type {
            Some(ScaleType::Bounds) if self.scale_lower.is_none() && self.scale_upper.is_none() => {
                return Err(invalid(
                    "scale_type 'ul' needs scale_lower and/or scale_upper".to_string(),
                ));
            }
            Some(ScaleType::Estimate) if self.scale_est.is_none() || self.scale_err.is_none() => {
                return Err(invalid(
                    "scale_type 'ev' needs both scale_est and scale_err".to_string(),
                ));
            }
            _ => {}
        }

        if let Some(ra) = self.center_ra {
            if !(0.0..=360.0).contains(&ra) {
                return Err(invalid(format!("center_ra must be within [0, 360], got {}", ra)));
            }
        }
        if let Some(dec) = self.center_dec {
            if !(-90.0..=90.0).contains(&dec) {
                return Err(invalid(format!(
                    "center_dec must be within [-90, 90], got {}",
                    dec
                )));
            }
        }
        if self.center_ra.is_some() != self.center_dec.is_some() {
            return Err(invalid(
                "center_ra and center_dec must be given together".to_string(),
            ));
        }
        if self.radius.is_some() && self.center_ra.is_none() {
            return Err(invalid("radius requires a field center".to_string()));
        }

        if self.downsample_factor == Some(0) {
            return Err(invalid("downsample_factor must be at least 1".to_string()));
        }

        if self.has_source_list() {
            let (Some(x), Some(y)) = (&self.x, &self.y) else {
                return Err(invalid("x and y must be given together".to_string()));
            };
            if x.len() != y.len() {
                return Err(invalid(format!(
                    "x and y lengths differ ({} vs {})",
                    x.len(),
                    y.len()
                )));
            }
            if x.is_empty() {
                return Err(invalid("source list is empty".to_string()));
            }
            if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
                return Err(invalid("source list contains non-finite coordinates".to_string()));
            }
            if self.image_width.is_none() || self.image_height.is_none() {
                return Err(invalid(
                    "source list uploads need image_width and image_height".to_string(),
                ));
            }
        }

        for (name, value) in [("image_width", self.image_width), ("image_height", self.image_height)]
        {
            if value == Some(0) {
                return Err(invalid(format!("{} must be positive", name)));
            }
        }

        if self.album.as_deref().is_some_and(|a| a.trim().is_empty()) {
            return Err(invalid("album must not be blank".to_string()));
        }

        Ok(())
    }

    /// Validates and converts to the argument object sent to the service.
    pub fn to_args(&self) -> Result<Map<String, Value>, ClientError> {
        let resolved = self.clone().with_inferred_scale_type();
        resolved.validate()?;

        match serde_json::to_value(&resolved) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(ClientError::Encoding(
                "upload options did not serialize to an object".to_string(),
            )),
            Err(e) => Err(ClientError::Encoding(e.to_string())),
        }
    }
}

fn invalid(message: String) -> ClientError {
    ClientError::InvalidOptions(message)
}
