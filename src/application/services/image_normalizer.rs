use reqwest::Url;
use tracing::warn;

use crate::domain::entities::{ImageDescriptor, NormalizedImage};

const DEFAULT_KIND: &str = "image";
const ANONYMOUS_OWNER: &str = "image";

/// Turns raw catalog descriptors into [`NormalizedImage`]s.
pub struct ImageNormalizer;

impl ImageNormalizer {
    /// Returns true if `candidate` parses as an absolute URL or is a relative
    /// path starting with `/`, `./` or `../`.
    #[must_use]
    pub fn is_valid_image_url(candidate: &str) -> bool {
        let candidate = candidate.trim();
        if candidate.is_empty() {
            return false;
        }
        if candidate.starts_with('/') || candidate.starts_with("./") || candidate.starts_with("../")
        {
            return true;
        }
        Url::parse(candidate).is_ok()
    }

    /// Normalizes one descriptor at `index`, or returns `None` if it carries
    /// no usable URL.
    #[must_use]
    pub fn normalize(
        descriptor: &ImageDescriptor,
        index: usize,
        owner: Option<&str>,
    ) -> Option<NormalizedImage> {
        let Some(raw) = descriptor.resolve_url() else {
            warn!(index, owner = owner.unwrap_or_default(), "Image descriptor has no URL");
            return None;
        };

        if !Self::is_valid_image_url(raw) {
            warn!(index, url = %raw, "Rejected malformed image URL");
            return None;
        }

        Some(NormalizedImage {
            id: format!("{}_{index}", owner.unwrap_or(ANONYMOUS_OWNER)),
            url: raw.trim().to_string(),
            description: descriptor
                .description()
                .map_or_else(|| format!("Image {}", index + 1), str::to_string),
            kind: descriptor.kind().unwrap_or(DEFAULT_KIND).to_string(),
            index,
            original: descriptor.clone(),
        })
    }

    /// Normalizes a descriptor list, dropping rejected entries.
    ///
    /// Indices refer to positions in the raw list, so they may have gaps.
    #[must_use]
    pub fn normalize_all(images: &[ImageDescriptor], owner: Option<&str>) -> Vec<NormalizedImage> {
        images
            .iter()
            .enumerate()
            .filter_map(|(index, descriptor)| Self::normalize(descriptor, index, owner))
            .collect()
    }

    /// Cheap identity of a descriptor list: the raw URL candidates in order.
    ///
    /// Two lists with the same key normalize to the same images.
    #[must_use]
    pub fn source_key(images: &[ImageDescriptor]) -> Vec<Option<String>> {
        images
            .iter()
            .map(|descriptor| descriptor.resolve_url().map(|url| url.trim().to_string()))
            .collect()
    }
}
