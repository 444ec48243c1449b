//! HTTP image probe: fetches a URL and checks that it decodes as an image.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use reqwest::Url;
use tracing::{debug, trace};

use crate::domain::errors::ProbeError;
use crate::domain::ports::ImageProbePort;
use crate::infrastructure::config::ProbeConfig;

/// Probes images over HTTP(S), with inline `data:` URL support.
///
/// Relative paths (`/x.png`, `./x.png`, `../x.png`) are resolved against the
/// configured base URL; without one they fail.
pub struct HttpImageProbe {
    http_client: reqwest::Client,
    base_url: Option<Url>,
    verify_decode: bool,
    timeout_secs: u64,
}

impl std::fmt::Debug for HttpImageProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpImageProbe")
            .field("base_url", &self.base_url.as_ref().map(Url::as_str))
            .field("verify_decode", &self.verify_decode)
            .field("timeout_secs", &self.timeout_secs)
            .finish_non_exhaustive()
    }
}

impl HttpImageProbe {
    /// Creates a probe from configuration.
    ///
    /// # Errors
    /// Returns error if the base URL is invalid or the HTTP client cannot be
    /// created.
    pub fn new(config: &ProbeConfig) -> Result<Self, ProbeError> {
        let base_url = config
            .base_url
            .as_deref()
            .map(|raw| Url::parse(raw).map_err(|e| ProbeError::invalid_url(raw, e.to_string())))
            .transpose()?;

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ProbeError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            base_url,
            verify_decode: config.verify_decode,
            timeout_secs: config.timeout_secs,
        })
    }

    /// Resolves a raw image reference to an absolute URL.
    ///
    /// # Errors
    /// Returns error for relative paths without a base URL or unparsable input.
    pub fn resolve(&self, raw: &str) -> Result<Url, ProbeError> {
        let raw = raw.trim();
        if is_relative_path(raw) {
            let base = self.base_url.as_ref().ok_or_else(|| ProbeError::MissingBaseUrl {
                path: raw.to_string(),
            })?;
            return base
                .join(raw)
                .map_err(|e| ProbeError::invalid_url(raw, e.to_string()));
        }
        Url::parse(raw).map_err(|e| ProbeError::invalid_url(raw, e.to_string()))
    }

    /// Downloads image bytes from a URL.
    async fn download(&self, url: Url) -> Result<(Bytes, Option<String>), ProbeError> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| self.map_request_error(&e))?;

        if !response.status().is_success() {
            return Err(ProbeError::HttpStatus {
                status: response.status().as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.map_request_error(&e))?;

        Ok((bytes, content_type))
    }

    fn map_request_error(&self, e: &reqwest::Error) -> ProbeError {
        if e.is_timeout() {
            ProbeError::Timeout {
                secs: self.timeout_secs,
            }
        } else {
            ProbeError::network(e.to_string())
        }
    }

    async fn check_image(&self, bytes: Bytes) -> Result<(), ProbeError> {
        if !self.verify_decode {
            return image::guess_format(&bytes)
                .map(|_| ())
                .map_err(|e| ProbeError::decode(e.to_string()));
        }

        tokio::task::spawn_blocking(move || image::load_from_memory(&bytes).map(|_| ()))
            .await
            .map_err(|e| ProbeError::decode(format!("Decode task panicked: {e}")))?
            .map_err(|e| ProbeError::decode(e.to_string()))
    }
}

#[async_trait]
impl ImageProbePort for HttpImageProbe {
    async fn probe(&self, url: &str) -> Result<(), ProbeError> {
        let target = self.resolve(url)?;

        let (bytes, content_type) = match target.scheme() {
            "http" | "https" => {
                debug!(url = %target, "Probing image over network");
                self.download(target).await?
            }
            "data" => decode_data_url(target.as_str())?,
            other => {
                return Err(ProbeError::UnsupportedScheme {
                    scheme: other.to_string(),
                });
            }
        };

        if let Some(content_type) = content_type.as_deref() {
            if !is_image_content_type(content_type) {
                return Err(ProbeError::NotAnImage {
                    content_type: content_type.to_string(),
                });
            }
        }

        trace!(url = %url, size = bytes.len(), "Checking image payload");
        self.check_image(bytes).await
    }
}

fn is_relative_path(raw: &str) -> bool {
    raw.starts_with('/') || raw.starts_with("./") || raw.starts_with("../")
}

/// Servers frequently mislabel images as generic binaries, so those pass
/// through to the decoder.
fn is_image_content_type(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    mime.starts_with("image/") || mime == "application/octet-stream" || mime.is_empty()
}

/// Decodes a `data:[<mime>][;base64],<payload>` URL.
fn decode_data_url(url: &str) -> Result<(Bytes, Option<String>), ProbeError> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| ProbeError::invalid_url(url, "not a data URL"))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| ProbeError::invalid_url(url, "data URL without payload"))?;

    let is_base64 = meta.ends_with(";base64");
    let mime = meta.trim_end_matches(";base64");
    let content_type = (!mime.is_empty()).then(|| mime.to_string());

    if !is_base64 {
        return Err(ProbeError::decode("data URL payload is not base64"));
    }

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| ProbeError::decode(format!("Invalid base64 payload: {e}")))?;

    Ok((Bytes::from(bytes), content_type))
}
