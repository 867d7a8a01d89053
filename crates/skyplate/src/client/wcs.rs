//! TAN projection parameters read from a solved `.wcs` header, as sent to
//! the survey image endpoints.

use serde::Serialize;

use crate::error::ClientError;

/// FITS headers are a sequence of fixed-width 80-byte cards.
const CARD_LEN: usize = 80;

/// Survey whose imagery the service renders for a WCS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Survey {
    Sdss,
    Galex,
}

impl Survey {
    pub fn service(self) -> &'static str {
        match self {
            Survey::Sdss => "sdss_image_for_wcs",
            Survey::Galex => "galex_image_for_wcs",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Survey::Sdss => "sdss",
            Survey::Galex => "galex",
        }
    }
}

/// Gnomonic (TAN) WCS: reference point, CD matrix and image size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TanWcs {
    pub crval1: f64,
    pub crval2: f64,
    pub crpix1: f64,
    pub crpix2: f64,
    pub cd11: f64,
    pub cd12: f64,
    pub cd21: f64,
    pub cd22: f64,
    pub imagew: f64,
    pub imageh: f64,
}

impl TanWcs {
    /// Parses the primary header of a `.wcs` file.
    ///
    /// Reading stops at the `END` card. Every parameter must be present.
    pub fn from_header(bytes: &[u8]) -> Result<Self, ClientError> {
        let mut values: Vec<(String, f64)> = Vec::new();

        for card in bytes.chunks(CARD_LEN) {
            let text = String::from_utf8_lossy(card);
            let card: &str = &text;
            let keyword = card.get(..8).unwrap_or(card).trim_end();
            if keyword == "END" {
                break;
            }
            let Some(value) = card.get(8..).and_then(|rest| rest.strip_prefix("= ")) else {
                continue;
            };
            let value = value.split('/').next().unwrap_or("").trim();
            if let Ok(number) = value.replace(['D', 'd'], "E").parse::<f64>() {
                values.push((keyword.to_string(), number));
            }
        }

        let get = |key: &str| {
            values
                .iter()
                .rev()
                .find(|(k, _)| k == key)
                .map(|(_, v)| *v)
                .ok_or_else(|| ClientError::InvalidWcs(format!("missing {}", key)))
        };

        let wcs = TanWcs {
            crval1: get("CRVAL1")?,
            crval2: get("CRVAL2")?,
            crpix1: get("CRPIX1")?,
            crpix2: get("CRPIX2")?,
            cd11: get("CD1_1")?,
            cd12: get("CD1_2")?,
            cd21: get("CD2_1")?,
            cd22: get("CD2_2")?,
            imagew: get("IMAGEW")?,
            imageh: get("IMAGEH")?,
        };
        if wcs.imagew <= 0.0 || wcs.imageh <= 0.0 {
            return Err(ClientError::InvalidWcs(format!(
                "image size {}x{} is not positive",
                wcs.imagew, wcs.imageh
            )));
        }
        Ok(wcs)
    }
}
