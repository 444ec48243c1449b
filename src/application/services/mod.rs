pub mod image_manager;
pub mod image_normalizer;
pub mod image_validator;
pub mod single_image;

pub use image_manager::{ImageManager, ImageStats};
pub use image_normalizer::ImageNormalizer;
pub use image_validator::{ImageValidator, ValidatorConfig};
pub use single_image::{SingleImage, SingleImageManager, SingleImageState};
