//! Application layer with use cases, services and DTOs.

/// Data transfer objects.
pub mod dto;
/// Image normalization, validation and managers.
pub mod services;
/// Use case implementations.
pub mod use_cases;

pub use dto::{CatalogReport, Product, ProductReport, parse_catalog};
pub use services::{
    ImageManager, ImageNormalizer, ImageStats, ImageValidator, SingleImageManager,
    ValidatorConfig,
};
pub use use_cases::ValidateCatalogUseCase;
