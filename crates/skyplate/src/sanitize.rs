//! Helpers for sanitizing data before it enters log lines and span fields.
//!
//! Logs are safe to share for debugging: these functions make sure API keys,
//! session tokens and full local paths never leak into them.

use std::path::Path;

/// Number of leading characters of a token kept visible.
const TOKEN_VISIBLE_PREFIX: usize = 4;

/// Returns only the filename component of a path (no directory).
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Masks a secret token, keeping a short prefix for correlation.
///
/// - `abcdef123456` → `abcd****`
/// - `abc` → `****`
pub fn redact_token(token: &str) -> String {
    let visible: String = token.chars().take(TOKEN_VISIBLE_PREFIX).collect();
    if token.chars().count() <= TOKEN_VISIBLE_PREFIX * 2 {
        "****".to_string()
    } else {
        format!("{}****", visible)
    }
}

/// Strips userinfo from a URL before logging it.
///
/// - `https://user:pw@nova.astrometry.net/api/` → `https://****@nova.astrometry.net/api/`
/// - `https://nova.astrometry.net/api/` → unchanged
pub fn redact_url(url: &str) -> String {
    if let Some(scheme_end) = url.find("://") {
        let after_scheme = &url[scheme_end + 3..];
        let host_end = after_scheme.find('/').unwrap_or(after_scheme.len());
        if let Some(at_pos) = after_scheme[..host_end].find('@') {
            let scheme = &url[..scheme_end + 3];
            let after_at = &after_scheme[at_pos + 1..];
            return format!("{}****@{}", scheme, after_at);
        }
    }

    url.to_string()
}
