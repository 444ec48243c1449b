//! Data transfer objects for the application layer.

mod catalog_dto;

pub use catalog_dto::{CatalogReport, Product, ProductReport, parse_catalog};
