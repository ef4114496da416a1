//! `data:` URL encoding and parsing.

use crate::error::{Result, SceneCraftError};
use base64::Engine;
use std::fmt;
use std::str::FromStr;

const SCHEME: &str = "data:";
const BASE64_MARKER: &str = ";base64";

/// A base64 data URL split into its MIME type and payload.
///
/// Both fields are guaranteed non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    mime_type: String,
    data: String,
}

impl DataUrl {
    /// Encodes raw bytes as a data URL with the given MIME type.
    pub fn encode(mime_type: impl Into<String>, bytes: &[u8]) -> Result<Self> {
        let mime_type = mime_type.into();
        if mime_type.trim().is_empty() {
            return Err(SceneCraftError::MalformedInput(
                "data URL needs a MIME type".into(),
            ));
        }
        if bytes.is_empty() {
            return Err(SceneCraftError::MalformedInput(
                "data URL needs a non-empty payload".into(),
            ));
        }
        Ok(Self {
            mime_type,
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
        })
    }

    /// Parses a `data:<mime>;base64,<payload>` string.
    ///
    /// Fails with [`SceneCraftError::MalformedInput`] if the scheme, the comma
    /// separator, the base64 marker, the MIME type or the payload is missing.
    pub fn parse(input: &str) -> Result<Self> {
        let rest = input
            .strip_prefix(SCHEME)
            .ok_or_else(|| malformed("missing `data:` scheme"))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| malformed("missing `,` separator"))?;
        let mime_type = header
            .strip_suffix(BASE64_MARKER)
            .ok_or_else(|| malformed("payload is not base64-encoded"))?;

        if mime_type.is_empty() {
            return Err(malformed("missing MIME type"));
        }
        if payload.is_empty() {
            return Err(malformed("missing base64 payload"));
        }

        Ok(Self {
            mime_type: mime_type.to_string(),
            data: payload.to_string(),
        })
    }

    /// Returns the MIME type (e.g. `image/png`).
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Returns the base64 payload.
    pub fn data(&self) -> &str {
        &self.data
    }

    /// Decodes the payload back into raw bytes.
    pub fn decode(&self) -> Result<Vec<u8>> {
        base64::engine::general_purpose::STANDARD
            .decode(&self.data)
            .map_err(|e| SceneCraftError::Decode(e.to_string()))
    }

    /// Consumes the URL, returning `(mime_type, base64_payload)`.
    pub fn into_parts(self) -> (String, String) {
        (self.mime_type, self.data)
    }
}

impl FromStr for DataUrl {
    type Err = SceneCraftError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for DataUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{},{}", SCHEME, self.mime_type, BASE64_MARKER, self.data)
    }
}

fn malformed(reason: &str) -> SceneCraftError {
    SceneCraftError::MalformedInput(format!("invalid data URL: {reason}"))
}
