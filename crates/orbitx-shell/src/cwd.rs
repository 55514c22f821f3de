//! Working-directory announcements: value decoding and per-pane dedup.

use percent_encoding::percent_decode_str;
use url::Url;

use crate::error::CwdDecodeError;

const FILE_SCHEME: &str = "file://";

/// Decode the payload of an OSC 7 sequence (or a `P;Cwd=` property) into a
/// filesystem path.
///
/// - `file://host/path` URLs yield their percent-decoded path component.
/// - `/C:/Users/...` style paths lose the leading slash.
/// - Anything else is percent-decoded as a plain path.
/// - An empty value is rejected.
pub fn decode_cwd_value(raw: &str) -> Result<String, CwdDecodeError> {
    if raw.is_empty() {
        return Err(CwdDecodeError::Empty);
    }
    let path = if raw.starts_with(FILE_SCHEME) {
        let url = Url::parse(raw).map_err(|e| CwdDecodeError::InvalidUrl(e.to_string()))?;
        percent_decode_strict(url.path())?
    } else {
        percent_decode_strict(raw)?
    };
    Ok(strip_drive_slash(path))
}

/// Percent-decode, rejecting `%` not followed by two hex digits and
/// byte sequences that are not UTF-8.
fn percent_decode_strict(input: &str) -> Result<String, CwdDecodeError> {
    let bytes = input.as_bytes();
    let mut i = 0;
    while let Some(off) = bytes[i..].iter().position(|&b| b == b'%') {
        let at = i + off;
        let well_formed = bytes
            .get(at + 1..at + 3)
            .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit));
        if !well_formed {
            return Err(CwdDecodeError::MalformedEscape { offset: at });
        }
        i = at + 3;
    }

    percent_decode_str(input)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|_| CwdDecodeError::InvalidUtf8)
}

/// `/C:/dir` -> `C:/dir`.
fn strip_drive_slash(path: String) -> String {
    let b = path.as_bytes();
    if b.len() >= 3 && b[0] == b'/' && b[1].is_ascii_alphabetic() && b[2] == b':' {
        path[1..].to_string()
    } else {
        path
    }
}

// ---------------------------------------------------------------------------
// CwdTracker
// ---------------------------------------------------------------------------

/// Mirrors the backend-reported cwd of one pane for the UI.
///
/// Only reports values that differ from the last one seen. It never writes
/// anything back: the backend owns the truth.
#[derive(Debug, Default, Clone)]
pub struct CwdTracker {
    current: Option<String>,
}

impl CwdTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `cwd`. Returns `true` when it differs from the stored value.
    pub fn observe(&mut self, cwd: &str) -> bool {
        if self.current.as_deref() == Some(cwd) {
            return false;
        }
        self.current = Some(cwd.to_string());
        true
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn reset(&mut self) {
        self.current = None;
    }
}
