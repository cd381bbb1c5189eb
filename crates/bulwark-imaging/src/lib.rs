pub mod annotate;
pub mod digits;

pub use annotate::{CropAndNumber, CropMargins};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("could not decode image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("could not encode image: {0}")]
    Encode(#[source] image::ImageError),

    #[error("image too small to crop: {width}x{height}")]
    TooSmall { width: u32, height: u32 },
}

/// Turns an approved opponent screenshot into the image that gets published.
/// Implementations take the input by reference and never hand back partial
/// output: any failure is an `Err`.
pub trait ImageTransform: Send + Sync {
    fn apply(&self, image: &[u8], number: i64) -> Result<Vec<u8>, ImageError>;
}
