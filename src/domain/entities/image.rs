//! Domain types for image handling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Raw image descriptor as delivered by the catalog feed.
///
/// The ERP has changed shape over time: some products carry bare URL strings,
/// others objects with the URL under one of several field names.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ImageDescriptor {
    /// A bare URL string.
    Url(String),
    /// An object carrying the URL and optional metadata.
    Object(DescriptorFields),
    /// Any other JSON value. Never resolves to a URL.
    Other(Value),
}

impl<'de> Deserialize<'de> for ImageDescriptor {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::String(url) => Self::Url(url),
            Value::Object(_) => match DescriptorFields::deserialize(&value) {
                Ok(fields) => Self::Object(fields),
                Err(_) => Self::Other(value),
            },
            other => Self::Other(other),
        })
    }
}

/// Object form of an [`ImageDescriptor`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorFields {
    /// Preferred URL field.
    #[serde(default, deserialize_with = "crate::domain::serde_utils::lenient_string::deserialize")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// ERP attachment field.
    #[serde(default, deserialize_with = "crate::domain::serde_utils::lenient_string::deserialize")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anexo: Option<String>,
    /// HTML-style source field.
    #[serde(default, deserialize_with = "crate::domain::serde_utils::lenient_string::deserialize")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    /// Plain link field.
    #[serde(default, deserialize_with = "crate::domain::serde_utils::lenient_string::deserialize")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    /// Human readable description.
    #[serde(default, deserialize_with = "crate::domain::serde_utils::lenient_string::deserialize")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Image type hint (e.g. "cover").
    #[serde(
        default,
        rename = "type",
        deserialize_with = "crate::domain::serde_utils::lenient_string::deserialize"
    )]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl DescriptorFields {
    /// Creates an object descriptor with only the `url` field set.
    #[must_use]
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    fn url_candidates(&self) -> [Option<&str>; 4] {
        [
            self.url.as_deref(),
            self.anexo.as_deref(),
            self.src.as_deref(),
            self.link.as_deref(),
        ]
    }
}

impl ImageDescriptor {
    /// Resolves the raw URL candidate, walking the legacy field chain.
    ///
    /// Returns the first non-empty candidate without validating its shape.
    #[must_use]
    pub fn resolve_url(&self) -> Option<&str> {
        match self {
            Self::Url(url) => Some(url.as_str()).filter(|u| !u.is_empty()),
            Self::Object(fields) => fields
                .url_candidates()
                .into_iter()
                .flatten()
                .find(|u| !u.is_empty()),
            Self::Other(_) => None,
        }
    }

    /// Returns the description, if the descriptor carries one.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        match self {
            Self::Object(fields) => fields.description.as_deref().filter(|d| !d.is_empty()),
            _ => None,
        }
    }

    /// Returns the type hint, if the descriptor carries one.
    #[must_use]
    pub fn kind(&self) -> Option<&str> {
        match self {
            Self::Object(fields) => fields.kind.as_deref().filter(|k| !k.is_empty()),
            _ => None,
        }
    }
}

impl From<&str> for ImageDescriptor {
    fn from(s: &str) -> Self {
        Self::Url(s.to_owned())
    }
}

impl From<String> for ImageDescriptor {
    fn from(s: String) -> Self {
        Self::Url(s)
    }
}

impl From<DescriptorFields> for ImageDescriptor {
    fn from(fields: DescriptorFields) -> Self {
        Self::Object(fields)
    }
}

/// Image after normalization: canonical shape used by every manager.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedImage {
    /// Stable identifier `{owner}_{index}`.
    pub id: String,
    /// Validated URL. Never changes after creation.
    pub url: String,
    /// Description, defaulting to `Image {index + 1}`.
    pub description: String,
    /// Type hint, defaulting to `image`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Position in the owner's descriptor list.
    pub index: usize,
    /// Descriptor the image was derived from.
    #[serde(skip)]
    pub original: ImageDescriptor,
}

/// Successfully loaded image as exposed to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadedImage {
    /// The normalized image.
    #[serde(flatten)]
    pub image: NormalizedImage,
    /// Always true; kept for parity with the failure records callers render.
    pub loaded: bool,
    /// True when the outcome came from the registry without probing.
    pub from_cache: bool,
}

impl LoadedImage {
    /// Wraps a normalized image as loaded.
    #[must_use]
    pub const fn new(image: NormalizedImage, from_cache: bool) -> Self {
        Self {
            image,
            loaded: true,
            from_cache,
        }
    }

    /// Returns the image URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.image.url
    }

    /// Returns the image index in the owner's list.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.image.index
    }
}

/// Terminal status of a URL in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    /// The image was fetched and decoded.
    Loaded,
    /// The probe failed.
    Error,
}

impl CacheStatus {
    /// Returns true if the image loaded.
    #[must_use]
    pub const fn is_loaded(self) -> bool {
        matches!(self, Self::Loaded)
    }

    /// Returns true if the probe failed.
    #[must_use]
    pub const fn is_error(self) -> bool {
        matches!(self, Self::Error)
    }
}

impl std::fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Loaded => write!(f, "loaded"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Terminal registry entry for one URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheEntry {
    /// Terminal status.
    pub status: CacheStatus,
    /// When the status was recorded.
    pub timestamp: DateTime<Utc>,
}

impl CacheEntry {
    /// Creates an entry stamped with the current time.
    #[must_use]
    pub fn now(status: CacheStatus) -> Self {
        Self {
            status,
            timestamp: Utc::now(),
        }
    }
}

/// Outcome of validating one URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// The image loaded.
    Loaded {
        /// True when resolved from the registry without waiting on a probe.
        from_cache: bool,
    },
    /// The image failed to load.
    Failed {
        /// True when resolved from the registry without waiting on a probe.
        from_cache: bool,
    },
    /// The caller stopped observing before the outcome was known.
    Cancelled,
}

impl ValidationOutcome {
    /// Builds an outcome from a terminal status.
    #[must_use]
    pub const fn from_status(status: CacheStatus, from_cache: bool) -> Self {
        match status {
            CacheStatus::Loaded => Self::Loaded { from_cache },
            CacheStatus::Error => Self::Failed { from_cache },
        }
    }

    /// Returns true if the image loaded.
    #[must_use]
    pub const fn is_loaded(self) -> bool {
        matches!(self, Self::Loaded { .. })
    }

    /// Returns true if the image failed.
    #[must_use]
    pub const fn is_failed(self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Returns true if the caller cancelled.
    #[must_use]
    pub const fn is_cancelled(self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_from_json_string() {
        let d: ImageDescriptor = serde_json::from_str(r#""https://example.com/a.png""#).unwrap();
        assert_eq!(d.resolve_url(), Some("https://example.com/a.png"));
    }

    #[test]
    fn test_descriptor_field_chain() {
        let d: ImageDescriptor =
            serde_json::from_str(r#"{"anexo": "/files/1.jpg", "link": "/files/2.jpg"}"#).unwrap();
        assert_eq!(d.resolve_url(), Some("/files/1.jpg"));

        let d: ImageDescriptor =
            serde_json::from_str(r#"{"url": "", "src": "./x.webp", "description": "Front"}"#)
                .unwrap();
        assert_eq!(d.resolve_url(), Some("./x.webp"));
        assert_eq!(d.description(), Some("Front"));
    }

    #[test]
    fn test_descriptor_type_field() {
        let d: ImageDescriptor =
            serde_json::from_str(r#"{"url": "/a.png", "type": "cover"}"#).unwrap();
        assert_eq!(d.kind(), Some("cover"));
    }

    #[test]
    fn test_descriptor_other_shapes_do_not_resolve() {
        let list: Vec<ImageDescriptor> =
            serde_json::from_str(r#"[42, null, {"url": 7}, ["/a.png"]]"#).unwrap();
        assert_eq!(list[0].resolve_url(), None);
        assert_eq!(list[1].resolve_url(), None);
        assert_eq!(list[3].resolve_url(), None);
        // numeric fields are coerced to text; validation rejects them later
        assert_eq!(list[2].resolve_url(), Some("7"));
    }

    #[test]
    fn test_empty_string_does_not_resolve() {
        assert_eq!(ImageDescriptor::from("").resolve_url(), None);
    }

    #[test]
    fn test_outcome_from_status() {
        assert!(ValidationOutcome::from_status(CacheStatus::Loaded, true).is_loaded());
        assert!(ValidationOutcome::from_status(CacheStatus::Error, false).is_failed());
        assert!(CacheStatus::Error.is_error());
        assert!(!CacheStatus::Loaded.is_error());
    }
}
