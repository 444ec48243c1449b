//! Domain layer with core image entities and port definitions.

/// Entity definitions.
pub mod entities;
/// Error types.
pub mod errors;
/// Port definitions.
pub mod ports;
/// Serde utilities.
pub mod serde_utils;

pub use entities::{
    CacheEntry, CacheStatus, ImageDescriptor, LoadedImage, NormalizedImage, ValidationOutcome,
};
pub use errors::ProbeError;
pub use ports::ImageProbePort;
