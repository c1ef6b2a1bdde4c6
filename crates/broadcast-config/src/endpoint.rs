//! Broadcast destination.

use std::fmt;

use serde_json::Value;
use url::Url;

use crate::error::CompileError;
use crate::CompileResult;

/// Schemes the ingest endpoint may use.
const SUPPORTED_SCHEMES: &[&str] = &["rtmp", "rtmps"];

/// Ingest URL plus stream key.
#[derive(Clone, PartialEq, Eq)]
pub struct Endpoint {
    url: Url,
    stream_key: String,
}

impl Endpoint {
    /// Validate an ingest URL and stream key.
    pub fn new(url: &str, stream_key: &str) -> CompileResult<Self> {
        if url.trim().is_empty() {
            return Err(CompileError::MissingCredential("rtmpsUrl"));
        }
        if stream_key.trim().is_empty() {
            return Err(CompileError::MissingCredential("streamKey"));
        }

        let parsed = Url::parse(url)
            .map_err(|e| CompileError::invalid("rtmpsUrl", format!("`{url}`: {e}")))?;
        if !SUPPORTED_SCHEMES.contains(&parsed.scheme()) {
            return Err(CompileError::invalid(
                "rtmpsUrl",
                format!("unsupported scheme `{}`", parsed.scheme()),
            ));
        }

        Ok(Self {
            url: parsed,
            stream_key: stream_key.to_string(),
        })
    }

    /// Read `rtmpsUrl` and `streamKey` from a start-options object.
    pub fn from_options(options: &Value) -> CompileResult<Self> {
        let url = credential(options, "rtmpsUrl")?;
        let stream_key = credential(options, "streamKey")?;
        Self::new(url, stream_key)
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn stream_key(&self) -> &str {
        &self.stream_key
    }

    /// URL with the stream key appended as the last path segment.
    pub fn publish_url(&self) -> String {
        let base = self.url.as_str();
        if base.ends_with('/') {
            format!("{}{}", base, self.stream_key)
        } else {
            format!("{}/{}", base, self.stream_key)
        }
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("url", &self.url.as_str())
            .field("stream_key", &"<redacted>")
            .finish()
    }
}

fn credential<'a>(options: &'a Value, key: &'static str) -> CompileResult<&'a str> {
    match options.get(key) {
        None | Some(Value::Null) => Err(CompileError::MissingCredential(key)),
        Some(Value::String(text)) => Ok(text),
        Some(_) => Err(CompileError::invalid(key, "expected a string")),
    }
}
