use std::io::Cursor;

use image::{DynamicImage, GenericImageView, ImageFormat, Rgba};
use tracing::debug;

use crate::digits::{self, Stroke};
use crate::{ImageError, ImageTransform};

/// Fraction of each edge cut away before stamping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropMargins {
    pub top: f32,
    pub bottom: f32,
    pub left: f32,
    pub right: f32,
}

impl Default for CropMargins {
    /// Portrait phone screenshot: keep the enemy name and the enemy army
    /// grid, drop the player's own half and the hero column.
    fn default() -> Self {
        Self {
            top: 0.02,
            bottom: 0.50,
            left: 0.05,
            right: 0.25,
        }
    }
}

/// Crop to the opponent's half of the screenshot and stamp a large red
/// sequence number in the top-left corner. Output is always PNG.
#[derive(Debug, Clone)]
pub struct CropAndNumber {
    pub margins: CropMargins,
    /// Digit height as a fraction of the cropped image's shorter side.
    pub number_scale: f32,
    pub inset: u32,
    pub stroke: Stroke,
}

impl Default for CropAndNumber {
    fn default() -> Self {
        Self {
            margins: CropMargins::default(),
            number_scale: 0.15,
            inset: 20,
            stroke: Stroke {
                fill: Rgba([255, 0, 0, 255]),
                outline: Rgba([255, 255, 255, 255]),
                outline_width: 3,
            },
        }
    }
}

impl CropAndNumber {
    pub fn new(margins: CropMargins) -> Self {
        Self {
            margins,
            ..Default::default()
        }
    }

    /// Crop rectangle as (x, y, width, height) for an image of the given size.
    pub fn crop_rect(&self, width: u32, height: u32) -> Result<(u32, u32, u32, u32), ImageError> {
        let m = &self.margins;
        let top = (height as f32 * m.top).round() as u32;
        let bottom = (height as f32 * m.bottom).round() as u32;
        let left = (width as f32 * m.left).round() as u32;
        let right = (width as f32 * m.right).round() as u32;

        let crop_w = width.saturating_sub(left + right);
        let crop_h = height.saturating_sub(top + bottom);
        if crop_w == 0 || crop_h == 0 {
            return Err(ImageError::TooSmall { width, height });
        }
        Ok((left, top, crop_w, crop_h))
    }
}

impl ImageTransform for CropAndNumber {
    fn apply(&self, image: &[u8], number: i64) -> Result<Vec<u8>, ImageError> {
        let source = image::load_from_memory(image).map_err(ImageError::Decode)?;
        let (width, height) = source.dimensions();
        let (x, y, crop_w, crop_h) = self.crop_rect(width, height)?;

        let mut cropped = source.crop_imm(x, y, crop_w, crop_h).to_rgba8();

        let digit_height = ((crop_w.min(crop_h) as f32 * self.number_scale).round() as u32).max(1);
        digits::draw_number(
            &mut cropped,
            number,
            self.inset as i64,
            self.inset as i64,
            digit_height,
            self.stroke,
        );

        let mut out = Vec::new();
        DynamicImage::ImageRgba8(cropped)
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .map_err(ImageError::Encode)?;

        debug!(
            "Stamped #{} on {}x{} crop of {}x{} image",
            number, crop_w, crop_h, width, height
        );
        Ok(out)
    }
}
