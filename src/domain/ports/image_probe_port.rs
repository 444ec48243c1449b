//! Port definition for image probing.

use async_trait::async_trait;

use crate::domain::errors::ProbeError;

/// Port for the "load this URL and tell me whether it decoded" capability.
///
/// Implementations must be thread-safe. A probe is issued at most once per
/// URL per loading episode; callers never see the error directly, it is
/// folded into the registry as a terminal failure.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageProbePort: Send + Sync {
    /// Fetches the image at `url` and checks that it is a decodable image.
    async fn probe(&self, url: &str) -> Result<(), ProbeError>;
}
