//! Catalog validation use case implementation.

use std::sync::Arc;

use futures_util::future::join_all;
use tracing::{debug, info};

use crate::application::dto::{CatalogReport, Product, ProductReport};
use crate::application::services::{ImageManager, ImageValidator};

/// Validates the images of every product through one shared registry.
#[derive(Clone)]
pub struct ValidateCatalogUseCase {
    validator: Arc<ImageValidator>,
}

impl ValidateCatalogUseCase {
    /// Creates new catalog validation use case.
    #[must_use]
    pub const fn new(validator: Arc<ImageValidator>) -> Self {
        Self { validator }
    }

    /// Runs every product's batch concurrently and collects the results.
    ///
    /// Products sharing a URL share its probe.
    pub async fn execute(&self, products: &[Product]) -> CatalogReport {
        debug!(products = products.len(), "Validating catalog images");

        let managers: Vec<ImageManager> = products
            .iter()
            .map(|product| ImageManager::new(Arc::clone(&self.validator), product.id.clone()))
            .collect();

        join_all(
            managers
                .iter()
                .zip(products)
                .map(|(manager, product)| manager.sync(product.images())),
        )
        .await;

        let products: Vec<ProductReport> = managers
            .iter()
            .zip(products)
            .map(|(manager, product)| {
                let mut errors: Vec<String> = manager.image_errors().into_iter().collect();
                errors.sort();
                ProductReport {
                    owner: product.id.clone(),
                    name: product.name.clone(),
                    loaded: manager.loaded_images(),
                    errors,
                    stats: manager.image_stats(),
                }
            })
            .collect();

        let report = CatalogReport {
            products,
            registry: self.validator.registry().stats(),
        };

        info!(
            products = report.products.len(),
            loaded = report.loaded_count(),
            failed = report.failed_count(),
            "Catalog validated"
        );
        report
    }
}
