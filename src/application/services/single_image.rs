//! Single image manager for thumbnails.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::domain::entities::{ImageDescriptor, ValidationOutcome};

use super::image_normalizer::ImageNormalizer;
use super::image_validator::ImageValidator;

/// A thumbnail that loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SingleImage {
    /// Image URL.
    pub url: String,
    /// True when the outcome came from the registry without probing.
    pub from_cache: bool,
}

/// Snapshot of a [`SingleImageManager`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SingleImageState {
    /// The loaded image, if any.
    pub image: Option<SingleImage>,
    /// True if the current URL failed or is malformed.
    pub has_error: bool,
    /// True while a load is outstanding.
    pub is_loading: bool,
}

#[derive(Default)]
struct Inner {
    url: Option<String>,
    state: SingleImageState,
    loading: Option<String>,
}

/// Validates exactly one image, sharing the registry with batch managers.
///
/// Methods take `&self` so the manager can be shared across tasks; a local
/// guard keeps the same instance from loading one URL twice at once.
pub struct SingleImageManager {
    validator: Arc<ImageValidator>,
    inner: Mutex<Inner>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for SingleImageManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("SingleImageManager")
            .field("url", &inner.url)
            .field("state", &inner.state)
            .finish_non_exhaustive()
    }
}

/// Clears the re-entrancy guard even if the load future is dropped.
struct LoadGuard<'a> {
    inner: &'a Mutex<Inner>,
    url: String,
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        let mut inner = self.inner.lock();
        if inner.loading.as_deref() == Some(self.url.as_str()) {
            inner.loading = None;
            if inner.url.as_deref() == Some(self.url.as_str()) {
                inner.state.is_loading = false;
            }
        }
    }
}

impl SingleImageManager {
    /// Creates a manager with no source.
    #[must_use]
    pub fn new(validator: Arc<ImageValidator>) -> Self {
        Self {
            validator,
            inner: Mutex::new(Inner::default()),
            cancel: CancellationToken::new(),
        }
    }

    /// Points the manager at a new descriptor.
    ///
    /// Loads when the resolved URL changes; clears all state when the
    /// descriptor is absent or carries no URL. A malformed URL is reported as
    /// an error without probing.
    pub async fn set_source(&self, descriptor: Option<&ImageDescriptor>) {
        let resolved = descriptor
            .and_then(ImageDescriptor::resolve_url)
            .map(|url| url.trim().to_string());

        {
            let mut inner = self.inner.lock();
            if inner.url == resolved {
                trace!(url = ?resolved, "Single image source unchanged");
                return;
            }
            inner.url.clone_from(&resolved);
            inner.state = SingleImageState::default();

            match resolved.as_deref() {
                None => {
                    debug!("Single image source cleared");
                    return;
                }
                Some(url) if !ImageNormalizer::is_valid_image_url(url) => {
                    debug!(url = %url, "Single image URL is malformed");
                    inner.state.has_error = true;
                    return;
                }
                Some(_) => {}
            }
        }

        self.load().await;
    }

    /// Validates the current URL.
    ///
    /// Returns `false` without doing anything when there is no valid URL or a
    /// load for it is already outstanding on this instance.
    pub async fn load(&self) -> bool {
        let guard = {
            let mut inner = self.inner.lock();
            let Some(url) = inner.url.clone() else {
                return false;
            };
            if !ImageNormalizer::is_valid_image_url(&url) {
                return false;
            }
            if inner.loading.as_deref() == Some(url.as_str()) {
                trace!(url = %url, "Single image load already outstanding");
                return false;
            }
            inner.loading = Some(url.clone());
            inner.state.is_loading = true;
            LoadGuard {
                inner: &self.inner,
                url,
            }
        };

        let outcome = self
            .validator
            .validate_with_cancel(&guard.url, &self.cancel)
            .await;

        {
            let mut inner = self.inner.lock();
            if inner.url.as_deref() != Some(guard.url.as_str()) {
                debug!(url = %guard.url, "Single image source changed during load");
            } else {
                match outcome {
                    ValidationOutcome::Loaded { from_cache } => {
                        inner.state.image = Some(SingleImage {
                            url: guard.url.clone(),
                            from_cache,
                        });
                        inner.state.has_error = false;
                    }
                    ValidationOutcome::Failed { .. } => {
                        inner.state.image = None;
                        inner.state.has_error = true;
                    }
                    ValidationOutcome::Cancelled => {}
                }
            }
        }

        drop(guard);
        true
    }

    /// Invalidates the shared entry for the current URL and loads it again.
    pub async fn reload_image(&self) -> bool {
        let url = {
            let mut inner = self.inner.lock();
            let Some(url) = inner.url.clone() else {
                return false;
            };
            inner.state.image = None;
            inner.state.has_error = false;
            url
        };
        self.validator.invalidate(&url);
        self.load().await
    }

    /// Stops observing outstanding loads.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Returns a snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> SingleImageState {
        self.inner.lock().state.clone()
    }

    /// Returns the loaded image, if any.
    #[must_use]
    pub fn image(&self) -> Option<SingleImage> {
        self.inner.lock().state.image.clone()
    }

    /// Returns true if the current URL failed.
    #[must_use]
    pub fn has_error(&self) -> bool {
        self.inner.lock().state.has_error
    }

    /// Returns true while a load is outstanding.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.inner.lock().state.is_loading
    }

    /// Returns the current URL.
    #[must_use]
    pub fn url(&self) -> Option<String> {
        self.inner.lock().url.clone()
    }
}

impl Drop for SingleImageManager {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::application::services::ValidatorConfig;
    use crate::domain::entities::DescriptorFields;
    use crate::domain::errors::ProbeError;
    use crate::domain::ports::MockImageProbePort;
    use crate::domain::ports::mocks::ScriptedProbe;
    use crate::infrastructure::image::ImageRegistry;

    fn manager_with(probe: Arc<dyn crate::domain::ports::ImageProbePort>) -> SingleImageManager {
        SingleImageManager::new(Arc::new(ImageValidator::new(
            ImageRegistry::shared(),
            probe,
            ValidatorConfig::default(),
        )))
    }

    #[tokio::test]
    async fn test_success() {
        let mut mock = MockImageProbePort::new();
        mock.expect_probe()
            .withf(|url| url.ends_with("/thumb.png"))
            .times(1)
            .returning(|_| Ok(()));
        let manager = manager_with(Arc::new(mock));

        let descriptor = ImageDescriptor::from(DescriptorFields {
            link: Some("https://a.test/thumb.png".to_string()),
            ..DescriptorFields::default()
        });
        manager.set_source(Some(&descriptor)).await;

        assert_eq!(
            manager.state(),
            SingleImageState {
                image: Some(SingleImage {
                    url: "https://a.test/thumb.png".to_string(),
                    from_cache: false,
                }),
                has_error: false,
                is_loading: false,
            }
        );
    }

    #[tokio::test]
    async fn test_failure() {
        let mut mock = MockImageProbePort::new();
        mock.expect_probe()
            .times(1)
            .returning(|_| Err(ProbeError::HttpStatus { status: 404 }));
        let manager = manager_with(Arc::new(mock));

        manager
            .set_source(Some(&ImageDescriptor::from("/missing.png")))
            .await;

        assert!(manager.image().is_none());
        assert!(manager.has_error());
    }

    #[tokio::test]
    async fn test_same_url_does_not_reload() {
        let probe = Arc::new(ScriptedProbe::new());
        let manager = manager_with(probe.clone());
        let descriptor = ImageDescriptor::from("/a.png");

        manager.set_source(Some(&descriptor)).await;
        manager.set_source(Some(&descriptor)).await;

        assert_eq!(probe.calls_for("/a.png"), 1);
    }

    #[tokio::test]
    async fn test_changed_url_reloads() {
        let probe = Arc::new(ScriptedProbe::new());
        probe.fail("/b.png");
        let manager = manager_with(probe.clone());

        manager.set_source(Some(&"/a.png".into())).await;
        assert!(manager.image().is_some());

        manager.set_source(Some(&"/b.png".into())).await;
        assert!(manager.image().is_none());
        assert!(manager.has_error());
        assert_eq!(manager.url().as_deref(), Some("/b.png"));
    }

    #[tokio::test]
    async fn test_absent_source_clears_state() {
        let probe = Arc::new(ScriptedProbe::new());
        let manager = manager_with(probe.clone());

        manager.set_source(Some(&"/a.png".into())).await;
        manager.set_source(None).await;

        assert_eq!(manager.state(), SingleImageState::default());
        assert!(manager.url().is_none());
    }

    #[tokio::test]
    async fn test_malformed_url_is_an_error_without_probe() {
        let probe = Arc::new(ScriptedProbe::new());
        let manager = manager_with(probe.clone());

        manager.set_source(Some(&"nope".into())).await;

        assert!(manager.has_error());
        assert_eq!(probe.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_reentrant_load_is_ignored() {
        let probe = Arc::new(ScriptedProbe::with_delay(Duration::from_millis(30)));
        let manager = manager_with(probe.clone());

        let descriptor = ImageDescriptor::from("/slow.png");
        let ((), second) = tokio::join!(manager.set_source(Some(&descriptor)), async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            manager.load().await
        });

        assert!(!second);
        assert_eq!(probe.calls_for("/slow.png"), 1);
        assert!(!manager.is_loading());
        assert!(manager.image().is_some());
    }

    #[tokio::test]
    async fn test_reload_retries_failed_url() {
        let probe = Arc::new(ScriptedProbe::new());
        probe.fail("/a.png");
        let manager = manager_with(probe.clone());

        manager.set_source(Some(&"/a.png".into())).await;
        assert!(manager.has_error());

        probe.succeed("/a.png");
        assert!(manager.reload_image().await);

        assert!(!manager.has_error());
        assert_eq!(
            manager.image(),
            Some(SingleImage {
                url: "/a.png".to_string(),
                from_cache: false,
            })
        );
        assert_eq!(probe.calls_for("/a.png"), 2);
    }
}
