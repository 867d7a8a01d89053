//! Request encoding for the astrometry.net JSON-over-form protocol.
//!
//! Every call carries a single `request-json` field. Calls without a file are
//! sent as `application/x-www-form-urlencoded`; calls with a file are sent as
//! `multipart/form-data` with exactly two parts, `request-json` then `file`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::{Map, Value};

use super::session::Session;
use crate::error::ClientError;

/// Name of the form field / multipart part that carries the argument object.
pub const REQUEST_JSON_FIELD: &str = "request-json";

/// Name of the multipart part that carries the binary payload.
pub const FILE_FIELD: &str = "file";

/// Random bytes drawn per boundary token.
const BOUNDARY_ENTROPY_BYTES: usize = 32;

/// Boundary re-draws before giving up on finding a non-colliding token.
const MAX_BOUNDARY_ATTEMPTS: usize = 8;

const BOUNDARY_PREFIX: &str = "skyplate-";

/// Binary payload attached to an upload.
#[derive(Clone)]
pub struct FilePayload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl FilePayload {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }
}

impl std::fmt::Debug for FilePayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilePayload")
            .field("filename", &self.filename)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// A wire-ready request body with the headers it needs.
#[derive(Debug, Clone)]
pub struct EncodedRequest {
    pub body: Vec<u8>,
    pub headers: Vec<(String, String)>,
}

impl EncodedRequest {
    /// Returns the value of a header by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns the multipart boundary token, if this is a multipart request.
    pub fn boundary(&self) -> Option<&str> {
        let content_type = self.header("Content-Type")?;
        let start = content_type.find("boundary=")? + "boundary=".len();
        Some(content_type[start..].trim_matches('"'))
    }
}

/// One service call: the service path, its arguments and an optional file.
///
/// Argument keys are unique; setting a key twice keeps the last value.
#[derive(Debug, Clone)]
pub struct RequestEnvelope {
    service: String,
    args: Map<String, Value>,
    payload: Option<FilePayload>,
}

impl RequestEnvelope {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            args: Map::new(),
            payload: None,
        }
    }

    pub fn arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }

    /// Merges every key of `args` into the envelope.
    pub fn args(mut self, args: Map<String, Value>) -> Self {
        self.args.extend(args);
        self
    }

    pub fn payload(mut self, payload: FilePayload) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Injects the session token under the `session` key.
    pub fn with_session(mut self, session: Option<&Session>) -> Self {
        if let Some(session) = session {
            self.args
                .insert("session".to_string(), Value::String(session.token().to_string()));
        }
        self
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn arguments(&self) -> &Map<String, Value> {
        &self.args
    }

    pub fn has_payload(&self) -> bool {
        self.payload.is_some()
    }

    pub fn encode(&self) -> Result<EncodedRequest, ClientError> {
        encode(&self.args, self.payload.as_ref())
    }
}

/// Serializes `args` (and optionally a file) into a request body and headers.
pub fn encode(
    args: &Map<String, Value>,
    payload: Option<&FilePayload>,
) -> Result<EncodedRequest, ClientError> {
    let json = serde_json::to_string(args).map_err(|e| ClientError::Encoding(e.to_string()))?;

    match payload {
        None => Ok(encode_form(&json)),
        Some(payload) => encode_multipart(&json, payload),
    }
}

fn encode_form(json: &str) -> EncodedRequest {
    let body = url::form_urlencoded::Serializer::new(String::new())
        .append_pair(REQUEST_JSON_FIELD, json)
        .finish();

    EncodedRequest {
        body: body.into_bytes(),
        headers: vec![(
            "Content-Type".to_string(),
            "application/x-www-form-urlencoded".to_string(),
        )],
    }
}

fn encode_multipart(json: &str, payload: &FilePayload) -> Result<EncodedRequest, ClientError> {
    let boundary = generate_boundary(&[json.as_bytes(), &payload.bytes])?;
    let filename = sanitize_filename(&payload.filename);

    let head = format!(
        "--{b}\r\n\
         Content-Type: text/plain\r\n\
         MIME-Version: 1.0\r\n\
         Content-Disposition: form-data; name=\"{json_field}\"\r\n\
         \r\n\
         {json}\r\n\
         --{b}\r\n\
         Content-Type: application/octet-stream\r\n\
         MIME-Version: 1.0\r\n\
         Content-Disposition: form-data; name=\"{file_field}\"; filename=\"{filename}\"\r\n\
         \r\n",
        b = boundary,
        json_field = REQUEST_JSON_FIELD,
        file_field = FILE_FIELD,
    );
    let tail = format!("\r\n--{}--\r\n", boundary);

    let mut body = Vec::with_capacity(head.len() + payload.bytes.len() + tail.len());
    body.extend_from_slice(head.as_bytes());
    body.extend_from_slice(&payload.bytes);
    body.extend_from_slice(tail.as_bytes());

    Ok(EncodedRequest {
        body,
        headers: vec![(
            "Content-Type".to_string(),
            format!("multipart/form-data; boundary=\"{}\"", boundary),
        )],
    })
}

/// Draws a random boundary that does not occur in any of `contents`.
fn generate_boundary(contents: &[&[u8]]) -> Result<String, ClientError> {
    for _ in 0..MAX_BOUNDARY_ATTEMPTS {
        let mut bytes = [0u8; BOUNDARY_ENTROPY_BYTES];
        getrandom::fill(&mut bytes)
            .map_err(|e| ClientError::Encoding(format!("Failed to generate boundary: {}", e)))?;
        let boundary = format!("{}{}", BOUNDARY_PREFIX, URL_SAFE_NO_PAD.encode(bytes));

        if !contents.iter().any(|c| contains_subslice(c, boundary.as_bytes())) {
            return Ok(boundary);
        }
        log::debug!("Boundary collided with request content, drawing another");
    }

    Err(ClientError::Encoding(
        "Could not find a multipart boundary absent from the payload".to_string(),
    ))
}

fn contains_subslice(haystack: &[u8], needle: &[u8]) -> bool {
    needle.is_empty() || haystack.windows(needle.len()).any(|w| w == needle)
}

/// Keeps only the final path component and strips characters that would
/// break the quoted `filename` parameter.
fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename);
    let cleaned: String = base
        .chars()
        .filter(|c| !matches!(c, '"' | '\r' | '\n'))
        .collect();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}
