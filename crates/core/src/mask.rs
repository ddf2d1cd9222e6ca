//! Mask representation and the logit-to-mask threshold contract.
//!
//! The engine returns raw per-pixel confidence (logits). The adapter
//! contract fixes the binarization explicitly: a pixel is foreground when
//! its logit is strictly greater than [`LOGIT_FOREGROUND_THRESHOLD`].
//! Binary masks are persisted as single-channel grayscale PNG with
//! foreground 255 and background 0.

use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};

use crate::error::CoreError;

/// Threshold applied to raw engine confidence. Strictly-greater-than.
pub const LOGIT_FOREGROUND_THRESHOLD: f32 = 0.0;

/// Pixel value of foreground in a persisted mask.
pub const FOREGROUND: u8 = 255;

/// Pixel value of background in a persisted mask.
pub const BACKGROUND: u8 = 0;

/// Raw per-pixel confidence for one frame, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskLogits {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

impl MaskLogits {
    /// Build a logit grid, checking that `data` matches `width * height`.
    pub fn new(width: u32, height: u32, data: Vec<f32>) -> Result<Self, CoreError> {
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(CoreError::Engine(format!(
                "logit buffer has {} values, expected {expected} ({width}x{height})",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }
}

/// A binary foreground/background mask matching a frame's dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Mask {
    /// Binarize raw engine confidence at the declared threshold.
    pub fn from_logits(logits: &MaskLogits) -> Self {
        let data = logits
            .data()
            .iter()
            .map(|&v| {
                if v > LOGIT_FOREGROUND_THRESHOLD {
                    FOREGROUND
                } else {
                    BACKGROUND
                }
            })
            .collect();
        Self {
            width: logits.width(),
            height: logits.height(),
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of foreground pixels.
    pub fn foreground_pixels(&self) -> usize {
        self.data.iter().filter(|&&v| v == FOREGROUND).count()
    }

    /// Whether the pixel at `(x, y)` is foreground. Out-of-bounds is
    /// background.
    pub fn is_foreground(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        self.data[(y * self.width + x) as usize] == FOREGROUND
    }

    /// Encode as a single-channel grayscale PNG.
    pub fn to_png_bytes(&self) -> Result<Vec<u8>, CoreError> {
        let mut buf = Vec::new();
        PngEncoder::new(&mut buf)
            .write_image(&self.data, self.width, self.height, ExtendedColorType::L8)
            .map_err(|e| CoreError::Internal(format!("PNG encode failed: {e}")))?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logit_shape_mismatch_rejected() {
        assert!(MaskLogits::new(2, 2, vec![0.0; 3]).is_err());
        assert!(MaskLogits::new(2, 2, vec![0.0; 4]).is_ok());
    }

    #[test]
    fn threshold_is_strictly_greater_than_zero() {
        let logits = MaskLogits::new(2, 2, vec![-1.0, 0.0, 0.0001, 7.5]).unwrap();
        let mask = Mask::from_logits(&logits);

        // Exactly zero is background.
        assert!(!mask.is_foreground(0, 0));
        assert!(!mask.is_foreground(1, 0));
        assert!(mask.is_foreground(0, 1));
        assert!(mask.is_foreground(1, 1));
        assert_eq!(mask.foreground_pixels(), 2);
    }

    #[test]
    fn out_of_bounds_lookup_is_background() {
        let logits = MaskLogits::new(1, 1, vec![1.0]).unwrap();
        let mask = Mask::from_logits(&logits);
        assert!(mask.is_foreground(0, 0));
        assert!(!mask.is_foreground(1, 0));
        assert!(!mask.is_foreground(0, 1));
    }

    #[test]
    fn png_output_is_decodable_grayscale() {
        let logits = MaskLogits::new(3, 2, vec![1.0, -1.0, 1.0, -1.0, 1.0, -1.0]).unwrap();
        let mask = Mask::from_logits(&logits);

        let bytes = mask.to_png_bytes().unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap().into_luma8();
        assert_eq!(decoded.dimensions(), (3, 2));
        assert_eq!(decoded.get_pixel(0, 0).0[0], FOREGROUND);
        assert_eq!(decoded.get_pixel(1, 0).0[0], BACKGROUND);
    }
}
