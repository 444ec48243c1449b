//! Batch image manager for one owning entity.

use std::collections::HashSet;
use std::sync::Arc;

use futures_util::future::join_all;
use parking_lot::Mutex;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::domain::entities::{ImageDescriptor, LoadedImage, NormalizedImage, ValidationOutcome};

use super::image_normalizer::ImageNormalizer;
use super::image_validator::ImageValidator;

/// Counts describing one manager's view plus the shared registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImageStats {
    /// Normalized images owned by this manager.
    pub total: usize,
    /// Images that loaded.
    pub loaded: usize,
    /// Distinct URLs that failed.
    pub failed: usize,
    /// This manager's URLs currently being probed.
    pub loading: usize,
    /// Terminal entries in the shared registry.
    pub cache_size: usize,
    /// Probes in flight across the shared registry.
    pub loading_images: usize,
}

/// Validates every image of one owner and keeps a stable success/failure view.
///
/// The view only changes when the owner's URL list actually changes, so a
/// caller may call [`ImageManager::sync`] on every refresh. Methods take
/// `&self`; the view can be read while a load is outstanding.
///
/// Dropping the manager stops it observing outstanding loads; probes already
/// dispatched still complete and populate the shared registry.
pub struct ImageManager {
    validator: Arc<ImageValidator>,
    owner: Option<String>,
    view: Mutex<View>,
    cancel: CancellationToken,
}

#[derive(Default)]
struct View {
    source_key: Option<Vec<Option<String>>>,
    images: Vec<NormalizedImage>,
    loaded_images: Vec<LoadedImage>,
    image_errors: HashSet<String>,
    /// Bumped whenever `images` is replaced; results for an older list are
    /// discarded.
    generation: u64,
    loading: usize,
}

impl View {
    fn splice(&mut self, image: LoadedImage) {
        let position = self
            .loaded_images
            .partition_point(|loaded| loaded.index() < image.index());
        self.loaded_images.insert(position, image);
    }
}

/// Keeps `is_loading` raised for as long as it lives.
struct LoadingGuard<'a> {
    view: &'a Mutex<View>,
}

impl<'a> LoadingGuard<'a> {
    fn enter(view: &'a Mutex<View>) -> Self {
        view.lock().loading += 1;
        Self { view }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        let mut view = self.view.lock();
        view.loading = view.loading.saturating_sub(1);
    }
}

impl std::fmt::Debug for ImageManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let view = self.view.lock();
        f.debug_struct("ImageManager")
            .field("owner", &self.owner)
            .field("images", &view.images.len())
            .field("loaded", &view.loaded_images.len())
            .field("errors", &view.image_errors.len())
            .field("is_loading", &(view.loading > 0))
            .finish_non_exhaustive()
    }
}

impl ImageManager {
    /// Creates an empty manager for `owner`.
    #[must_use]
    pub fn new(validator: Arc<ImageValidator>, owner: Option<String>) -> Self {
        Self {
            validator,
            owner,
            view: Mutex::new(View::default()),
            cancel: CancellationToken::new(),
        }
    }

    fn owner_field(&self) -> &str {
        self.owner.as_deref().unwrap_or_default()
    }

    /// Replaces the descriptor list if its URLs differ from the current one.
    ///
    /// Returns `true` when the view was reset and needs a [`load`](Self::load).
    pub fn set_images(&self, images: &[ImageDescriptor]) -> bool {
        let key = ImageNormalizer::source_key(images);
        let mut view = self.view.lock();
        if view.source_key.as_ref() == Some(&key) {
            trace!(owner = self.owner_field(), "Image list unchanged");
            return false;
        }

        view.images = ImageNormalizer::normalize_all(images, self.owner.as_deref());
        view.source_key = Some(key);
        view.loaded_images.clear();
        view.image_errors.clear();
        view.generation += 1;
        debug!(
            owner = self.owner_field(),
            raw = images.len(),
            normalized = view.images.len(),
            "Image list changed"
        );
        true
    }

    /// Validates every normalized image concurrently and rebuilds the view.
    ///
    /// Completes once every image has settled. Failures are isolated per URL.
    pub async fn load(&self) {
        let (images, generation) = {
            let mut view = self.view.lock();
            if view.images.is_empty() {
                view.loaded_images.clear();
                view.image_errors.clear();
                return;
            }
            (view.images.clone(), view.generation)
        };

        let loading = LoadingGuard::enter(&self.view);
        let outcomes = join_all(
            images
                .iter()
                .map(|image| self.validator.validate_with_cancel(&image.url, &self.cancel)),
        )
        .await;
        drop(loading);

        if self.cancel.is_cancelled() {
            debug!(owner = self.owner_field(), "Discarding results of cancelled batch");
            return;
        }

        let mut loaded_images = Vec::with_capacity(images.len());
        let mut image_errors = HashSet::new();
        for (image, outcome) in images.into_iter().zip(outcomes) {
            match outcome {
                ValidationOutcome::Loaded { from_cache } => {
                    loaded_images.push(LoadedImage::new(image, from_cache));
                }
                ValidationOutcome::Failed { .. } | ValidationOutcome::Cancelled => {
                    image_errors.insert(image.url);
                }
            }
        }

        let mut view = self.view.lock();
        if view.generation != generation {
            debug!(owner = self.owner_field(), "Image list changed during load");
            return;
        }
        info!(
            owner = self.owner_field(),
            loaded = loaded_images.len(),
            failed = image_errors.len(),
            "Image batch settled"
        );
        view.loaded_images = loaded_images;
        view.image_errors = image_errors;
    }

    /// Applies a descriptor list and loads it if it changed.
    ///
    /// Returns `true` if a load ran.
    pub async fn sync(&self, images: &[ImageDescriptor]) -> bool {
        let changed = self.set_images(images);
        if changed {
            self.load().await;
        }
        changed
    }

    /// Invalidates `url` and validates it again.
    ///
    /// On success the image is spliced back into
    /// [`loaded_images`](Self::loaded_images) at its original position; on
    /// failure it stays in [`image_errors`](Self::image_errors). If the
    /// manager is cancelled the previous membership is kept. Returns `true`
    /// if the image loaded; URLs this manager does not own are ignored.
    pub async fn reload_image(&self, url: &str) -> bool {
        if self.cancel.is_cancelled() {
            debug!(url = %url, "Reload requested on cancelled manager");
            return false;
        }

        let (targets, was_failed, previous, generation) = {
            let mut view = self.view.lock();
            let targets: Vec<NormalizedImage> = view
                .images
                .iter()
                .filter(|image| image.url == url)
                .cloned()
                .collect();
            if targets.is_empty() {
                debug!(url = %url, "Reload requested for unknown image");
                return false;
            }

            let was_failed = view.image_errors.remove(url);
            let previous: Vec<LoadedImage> = view
                .loaded_images
                .iter()
                .filter(|loaded| loaded.url() == url)
                .cloned()
                .collect();
            view.loaded_images.retain(|loaded| loaded.url() != url);
            (targets, was_failed, previous, view.generation)
        };

        self.validator.invalidate(url);
        let loading = LoadingGuard::enter(&self.view);
        let outcome = self.validator.validate_with_cancel(url, &self.cancel).await;
        drop(loading);

        let mut view = self.view.lock();
        if view.generation != generation {
            debug!(url = %url, "Image list changed during reload");
            return false;
        }

        match outcome {
            ValidationOutcome::Loaded { from_cache } => {
                for image in targets {
                    view.splice(LoadedImage::new(image, from_cache));
                }
                info!(url = %url, "Image reloaded");
                true
            }
            ValidationOutcome::Failed { .. } => {
                view.image_errors.insert(url.to_string());
                false
            }
            ValidationOutcome::Cancelled => {
                if was_failed {
                    view.image_errors.insert(url.to_string());
                }
                for loaded in previous {
                    view.splice(loaded);
                }
                false
            }
        }
    }

    /// Wipes the shared registry. Affects every manager using it.
    pub fn clear_image_cache(&self) {
        self.validator.registry().clear();
        info!("Cleared image cache");
    }

    /// Returns counts for observability.
    #[must_use]
    pub fn image_stats(&self) -> ImageStats {
        let (urls, total, loaded, failed) = {
            let view = self.view.lock();
            let urls: HashSet<String> = view.images.iter().map(|image| image.url.clone()).collect();
            (
                urls,
                view.images.len(),
                view.loaded_images.len(),
                view.image_errors.len(),
            )
        };
        let registry = self.validator.registry();
        let loading = urls.iter().filter(|url| registry.is_loading(url)).count();
        let global = registry.stats();

        ImageStats {
            total,
            loaded,
            failed,
            loading,
            cache_size: global.cache_size,
            loading_images: global.loading_images,
        }
    }

    /// Stops observing outstanding loads. Later loads resolve immediately
    /// without touching the view.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Images that loaded, in original list order.
    #[must_use]
    pub fn loaded_images(&self) -> Vec<LoadedImage> {
        self.view.lock().loaded_images.clone()
    }

    /// URLs that failed.
    #[must_use]
    pub fn image_errors(&self) -> HashSet<String> {
        self.view.lock().image_errors.clone()
    }

    /// Normalized images backing the view.
    #[must_use]
    pub fn images(&self) -> Vec<NormalizedImage> {
        self.view.lock().images.clone()
    }

    /// Owner this manager was created for.
    #[must_use]
    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    /// Returns true while a load or reload is outstanding.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.view.lock().loading > 0
    }

    /// Returns true if at least one image loaded.
    #[must_use]
    pub fn has_images(&self) -> bool {
        !self.view.lock().loaded_images.is_empty()
    }

    /// Returns true if at least one image failed.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.view.lock().image_errors.is_empty()
    }

    /// Returns true if `url` would pass normalization.
    #[must_use]
    pub fn is_valid_image_url(&self, url: &str) -> bool {
        ImageNormalizer::is_valid_image_url(url)
    }
}

impl Drop for ImageManager {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::application::services::ValidatorConfig;
    use crate::domain::entities::{CacheStatus, DescriptorFields};
    use crate::domain::ports::mocks::ScriptedProbe;
    use crate::infrastructure::image::ImageRegistry;

    const A: &str = "https://shop.test/a.png";
    const B: &str = "https://shop.test/b.png";
    const C: &str = "https://shop.test/c.png";

    fn setup(probe: ScriptedProbe) -> (Arc<ImageValidator>, Arc<ScriptedProbe>) {
        let probe = Arc::new(probe);
        let validator = Arc::new(ImageValidator::new(
            ImageRegistry::shared(),
            probe.clone(),
            ValidatorConfig::default(),
        ));
        (validator, probe)
    }

    fn descriptors(urls: &[&str]) -> Vec<ImageDescriptor> {
        urls.iter().map(|url| ImageDescriptor::from(*url)).collect()
    }

    fn loaded_urls(manager: &ImageManager) -> Vec<String> {
        manager
            .loaded_images()
            .iter()
            .map(|loaded| loaded.url().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_order() {
        let (validator, probe) = setup(ScriptedProbe::new());
        probe.fail(B);
        let manager = ImageManager::new(validator, Some("42".to_string()));

        manager.sync(&descriptors(&[A, B, C])).await;

        assert_eq!(loaded_urls(&manager), vec![A, C]);
        assert_eq!(manager.image_errors(), HashSet::from([B.to_string()]));
        assert!(manager.has_images());
        assert!(manager.has_errors());
        assert!(!manager.is_loading());
        assert_eq!(manager.loaded_images()[1].image.id, "42_2");
    }

    #[tokio::test]
    async fn test_empty_input() {
        let (validator, probe) = setup(ScriptedProbe::new());
        let manager = ImageManager::new(validator, None);

        manager.sync(&[]).await;

        assert!(manager.loaded_images().is_empty());
        assert!(manager.image_errors().is_empty());
        assert!(!manager.is_loading());
        assert!(!manager.has_images());
        assert_eq!(probe.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_rejected_descriptors_never_probe() {
        let (validator, probe) = setup(ScriptedProbe::new());
        let manager = ImageManager::new(validator, None);
        let list = vec![
            ImageDescriptor::from("no scheme here"),
            ImageDescriptor::from(DescriptorFields::default()),
            ImageDescriptor::from(A),
        ];

        manager.sync(&list).await;

        assert_eq!(loaded_urls(&manager), vec![A]);
        assert!(manager.image_errors().is_empty());
        assert_eq!(probe.total_calls(), 1);
    }

    #[tokio::test]
    async fn test_identical_list_is_idempotent() {
        let (validator, probe) = setup(ScriptedProbe::new());
        probe.fail(B);
        let manager = ImageManager::new(validator, None);

        assert!(manager.sync(&descriptors(&[A, B])).await);
        let first_loaded = manager.loaded_images();
        let first_errors = manager.image_errors();

        // referentially new, semantically identical
        let again = vec![
            ImageDescriptor::from(DescriptorFields::with_url(A)),
            ImageDescriptor::from(B.to_string()),
        ];
        assert!(!manager.sync(&again).await);

        assert_eq!(manager.loaded_images(), first_loaded);
        assert_eq!(manager.image_errors(), first_errors);
        assert_eq!(probe.total_calls(), 2);
    }

    #[tokio::test]
    async fn test_changed_list_reloads_from_cache() {
        let (validator, probe) = setup(ScriptedProbe::new());
        let manager = ImageManager::new(validator, None);

        manager.sync(&descriptors(&[A])).await;
        assert!(manager.sync(&descriptors(&[A, C])).await);

        assert_eq!(loaded_urls(&manager), vec![A, C]);
        assert!(manager.loaded_images()[0].from_cache);
        assert!(!manager.loaded_images()[1].from_cache);
        assert_eq!(probe.calls_for(A), 1);
    }

    #[tokio::test]
    async fn test_concurrent_batches_share_probes() {
        let (validator, probe) = setup(ScriptedProbe::with_delay(Duration::from_millis(30)));
        let first = ImageManager::new(validator.clone(), Some("1".to_string()));
        let second = ImageManager::new(validator, Some("2".to_string()));

        let list_one = descriptors(&[A, B]);
        let list_two = descriptors(&[B, C]);
        tokio::join!(first.sync(&list_one), second.sync(&list_two));

        assert_eq!(probe.calls_for(B), 1);
        assert_eq!(probe.total_calls(), 3);
        assert_eq!(loaded_urls(&first), vec![A, B]);
        assert_eq!(loaded_urls(&second), vec![B, C]);
    }

    #[tokio::test]
    async fn test_error_persists_across_managers() {
        let (validator, probe) = setup(ScriptedProbe::new());
        probe.fail(B);

        let first = ImageManager::new(validator.clone(), None);
        first.sync(&descriptors(&[B])).await;

        probe.succeed(B);
        let second = ImageManager::new(validator, None);
        second.sync(&descriptors(&[B])).await;

        assert!(second.image_errors().contains(B));
        assert_eq!(probe.calls_for(B), 1);
    }

    #[tokio::test]
    async fn test_reload_moves_image_into_place() {
        let (validator, probe) = setup(ScriptedProbe::new());
        probe.fail(B);
        let manager = ImageManager::new(validator.clone(), None);
        manager.sync(&descriptors(&[A, B, C])).await;
        assert_eq!(loaded_urls(&manager), vec![A, C]);

        probe.succeed(B);
        assert!(manager.reload_image(B).await);

        assert_eq!(loaded_urls(&manager), vec![A, B, C]);
        assert!(manager.image_errors().is_empty());
        assert_eq!(
            validator.registry().get(B).unwrap().status,
            CacheStatus::Loaded
        );
        assert_eq!(probe.calls_for(B), 2);
    }

    #[tokio::test]
    async fn test_reload_renewed_failure_stays_in_errors() {
        let (validator, probe) = setup(ScriptedProbe::new());
        probe.fail(A);
        let manager = ImageManager::new(validator, None);
        manager.sync(&descriptors(&[A])).await;

        assert!(!manager.reload_image(A).await);
        assert!(manager.image_errors().contains(A));
        assert_eq!(probe.calls_for(A), 2);
    }

    #[tokio::test]
    async fn test_reload_unknown_url_is_ignored() {
        let (validator, probe) = setup(ScriptedProbe::new());
        let manager = ImageManager::new(validator, None);
        manager.sync(&descriptors(&[A])).await;

        assert!(!manager.reload_image(C).await);
        assert_eq!(probe.calls_for(C), 0);
    }

    #[tokio::test]
    async fn test_clear_cache_forces_new_probe() {
        let (validator, probe) = setup(ScriptedProbe::new());
        let first = ImageManager::new(validator.clone(), None);
        first.sync(&descriptors(&[A])).await;

        first.clear_image_cache();
        assert!(validator.registry().is_empty());

        let second = ImageManager::new(validator, None);
        second.sync(&descriptors(&[A])).await;

        assert_eq!(probe.calls_for(A), 2);
        assert!(!second.loaded_images()[0].from_cache);
    }

    #[tokio::test]
    async fn test_image_stats() {
        let (validator, probe) = setup(ScriptedProbe::new());
        probe.fail(C);
        let manager = ImageManager::new(validator, None);
        manager.sync(&descriptors(&[A, B, C])).await;

        let stats = manager.image_stats();
        assert_eq!(
            stats,
            ImageStats {
                total: 3,
                loaded: 2,
                failed: 1,
                loading: 0,
                cache_size: 3,
                loading_images: 0,
            }
        );
    }

    #[tokio::test]
    async fn test_cancelled_manager_keeps_view() {
        let (validator, probe) = setup(ScriptedProbe::new());
        let manager = ImageManager::new(validator, None);
        manager.cancel();

        manager.sync(&descriptors(&[A])).await;

        assert!(manager.loaded_images().is_empty());
        assert!(!manager.is_loading());
        assert_eq!(probe.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_is_loading_visible_during_load() {
        let (validator, _probe) = setup(ScriptedProbe::with_delay(Duration::from_millis(50)));
        let manager = ImageManager::new(validator, None);
        assert!(manager.set_images(&descriptors(&[A, B])));

        let ((), seen) = tokio::join!(manager.load(), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            (manager.is_loading(), manager.image_stats().loading)
        });

        assert_eq!(seen, (true, 2));
        assert!(!manager.is_loading());
        assert_eq!(loaded_urls(&manager), vec![A, B]);
    }

    #[tokio::test]
    async fn test_reload_on_cancelled_manager_keeps_partition() {
        let (validator, probe) = setup(ScriptedProbe::new());
        probe.fail(B);
        let manager = ImageManager::new(validator.clone(), None);
        manager.sync(&descriptors(&[A, B])).await;

        manager.cancel();
        assert!(!manager.reload_image(B).await);

        assert_eq!(loaded_urls(&manager), vec![A]);
        assert_eq!(manager.image_errors(), HashSet::from([B.to_string()]));
        assert_eq!(validator.registry().get(B).unwrap().status, CacheStatus::Error);
        assert_eq!(probe.calls_for(B), 1);
    }

    #[tokio::test]
    async fn test_reload_cancelled_mid_flight_restores_membership() {
        let (validator, probe) = setup(ScriptedProbe::with_delay(Duration::from_millis(50)));
        probe.fail(B);
        let manager = ImageManager::new(validator, None);
        manager.sync(&descriptors(&[A, B, C])).await;

        let (reloaded, ()) = tokio::join!(manager.reload_image(A), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            manager.cancel();
        });

        assert!(!reloaded);
        assert_eq!(loaded_urls(&manager), vec![A, C]);
        assert_eq!(manager.image_errors(), HashSet::from([B.to_string()]));
        assert!(!manager.is_loading());
    }

    #[test]
    fn test_is_valid_image_url_delegates() {
        let validator = Arc::new(ImageValidator::new(
            ImageRegistry::shared(),
            Arc::new(ScriptedProbe::new()),
            ValidatorConfig::default(),
        ));
        let manager = ImageManager::new(validator, None);
        assert!(manager.is_valid_image_url("../a.png"));
        assert!(!manager.is_valid_image_url("a.png"));
    }
}
