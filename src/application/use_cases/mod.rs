//! Use case implementations.

mod validate_catalog_use_case;

pub use validate_catalog_use_case::ValidateCatalogUseCase;
