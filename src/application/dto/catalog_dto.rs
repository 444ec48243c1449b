//! Catalog DTOs.

use serde::{Deserialize, Serialize};

use crate::application::services::ImageStats;
use crate::domain::entities::{ImageDescriptor, LoadedImage};
use crate::infrastructure::image::RegistryStats;

/// Product as delivered by the catalog feed. Only the image-related fields
/// are read.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Product {
    /// Product identifier, used to namespace image ids.
    #[serde(
        default,
        alias = "codigo",
        deserialize_with = "crate::domain::serde_utils::string_or_number::option::deserialize"
    )]
    pub id: Option<String>,
    /// Display name.
    #[serde(
        default,
        alias = "nome",
        deserialize_with = "crate::domain::serde_utils::lenient_string::deserialize"
    )]
    pub name: Option<String>,
    /// Raw image descriptors; absent and `null` both mean no images.
    #[serde(default, alias = "imagens")]
    pub images: Option<Vec<ImageDescriptor>>,
}

impl Product {
    /// Returns the image descriptors, empty when absent.
    #[must_use]
    pub fn images(&self) -> &[ImageDescriptor] {
        self.images.as_deref().unwrap_or_default()
    }
}

/// Keys that mark a JSON object as a product rather than an image descriptor.
const PRODUCT_KEYS: [&str; 4] = ["id", "codigo", "images", "imagens"];

/// Parses a catalog document.
///
/// Accepts an array of products, a single product object, or a bare array of
/// image descriptors (treated as one anonymous product). An array of objects
/// is a product list as soon as one item carries a product key; items
/// without images are products with no images.
///
/// # Errors
/// Returns error if the text is not JSON or does not match any accepted shape.
pub fn parse_catalog(text: &str) -> Result<Vec<Product>, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_str(text)?;

    let is_product = |item: &serde_json::Value| {
        item.as_object()
            .is_some_and(|fields| PRODUCT_KEYS.iter().any(|key| fields.contains_key(*key)))
    };

    if is_product(&value) {
        return Ok(vec![serde_json::from_value(value)?]);
    }

    let is_product_list = value.as_array().is_some_and(|items| {
        items.iter().all(serde_json::Value::is_object) && items.iter().any(is_product)
    });
    if is_product_list {
        return serde_json::from_value(value);
    }

    let images: Vec<ImageDescriptor> = serde_json::from_value(value)?;
    Ok(vec![Product {
        images: Some(images),
        ..Product::default()
    }])
}

/// Validation result for one product.
#[derive(Debug, Clone, Serialize)]
pub struct ProductReport {
    /// Product identifier.
    pub owner: Option<String>,
    /// Display name.
    pub name: Option<String>,
    /// Images that loaded, in catalog order.
    pub loaded: Vec<LoadedImage>,
    /// URLs that failed, sorted.
    pub errors: Vec<String>,
    /// Per-product counts.
    pub stats: ImageStats,
}

/// Validation result for a whole catalog.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogReport {
    /// One entry per product, in input order.
    pub products: Vec<ProductReport>,
    /// Shared registry state after validation.
    pub registry: RegistryStats,
}

impl CatalogReport {
    /// Total loaded images across products.
    #[must_use]
    pub fn loaded_count(&self) -> usize {
        self.products.iter().map(|p| p.loaded.len()).sum()
    }

    /// Total failed URLs across products.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.products.iter().map(|p| p.errors.len()).sum()
    }
}
