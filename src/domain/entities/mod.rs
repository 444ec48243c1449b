//! Domain entity definitions.

mod image;

pub use self::image::{
    CacheEntry, CacheStatus, DescriptorFields, ImageDescriptor, LoadedImage, NormalizedImage,
    ValidationOutcome,
};
