// ============================================================
// Layer 4 — Image Preprocessor
// ============================================================
// Turns arbitrary images into the fixed-size tensors the model
// consumes. The same Preprocessor is used in two places:
//
//   training  → decode + resize once at load time, then
//               (optional flip) + normalise per batch
//   serving   → decode + resize + normalise per request
//
// Both paths go through `resize` and `to_tensor`, so identical
// pixels always produce identical tensors.
//
// Steps:
//   1. Decode bytes (JPEG / PNG / WebP) into a DynamicImage
//   2. Reject images with zero width or height
//   3. Convert to 8-bit RGB (drops alpha, expands greyscale)
//   4. Resize to S×S with bilinear filtering (aspect ratio ignored)
//   5. Optionally mirror left↔right (training augmentation only)
//   6. Scale u8 → f32 in [0, 1] and lay out channel-major (CHW)

use image::{imageops, imageops::FilterType, DynamicImage, RgbImage};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::domain::image_tensor::{ImageTensor, CHANNELS};
use crate::error::{Error, Result};

/// Probability of mirroring a training image.
pub const FLIP_PROBABILITY: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preprocessor {
    /// Target side length S.
    size: u32,
}

impl Preprocessor {
    pub fn new(size: u32) -> Self {
        Self { size }
    }

    /// Decode raw bytes into an image, rejecting empty images.
    pub fn decode(bytes: &[u8]) -> Result<DynamicImage> {
        if bytes.is_empty() {
            return Err(Error::invalid_image("empty input"));
        }
        let image = image::load_from_memory(bytes)
            .map_err(|e| Error::invalid_image(e.to_string()))?;
        if image.width() == 0 || image.height() == 0 {
            return Err(Error::invalid_image(format!(
                "zero extent {}x{}",
                image.width(),
                image.height()
            )));
        }
        Ok(image)
    }

    /// Convert to RGB and resize to S×S.
    pub fn resize(&self, image: &DynamicImage) -> Result<RgbImage> {
        if image.width() == 0 || image.height() == 0 {
            return Err(Error::invalid_image(format!(
                "zero extent {}x{}",
                image.width(),
                image.height()
            )));
        }
        let rgb = image.to_rgb8();
        Ok(imageops::resize(&rgb, self.size, self.size, FilterType::Triangle))
    }

    /// Normalise an RGB buffer into a CHW tensor, mirroring it first if asked.
    ///
    /// Buffers that are not already S×S are resized first.
    pub fn to_tensor(&self, rgb: &RgbImage, flip: bool) -> ImageTensor {
        let resized;
        let rgb = if rgb.dimensions() == (self.size, self.size) {
            rgb
        } else {
            resized = imageops::resize(rgb, self.size, self.size, FilterType::Triangle);
            &resized
        };

        let side  = self.size as usize;
        let plane = side * side;
        let mut data = vec![0.0f32; CHANNELS * plane];

        for (x, y, pixel) in rgb.enumerate_pixels() {
            let x = if flip { side - 1 - x as usize } else { x as usize };
            let offset = y as usize * side + x;
            for (c, value) in pixel.0.iter().enumerate() {
                data[c * plane + offset] = f32::from(*value) / 255.0;
            }
        }

        ImageTensor::from_chw_exact(data, side)
    }

    /// Inference / evaluation variant: resize + normalise, never flipped.
    pub fn preprocess(&self, image: &DynamicImage) -> Result<ImageTensor> {
        let rgb = self.resize(image)?;
        Ok(self.to_tensor(&rgb, false))
    }

    /// Decode then preprocess, as the `/predict` handler does.
    pub fn preprocess_bytes(&self, bytes: &[u8]) -> Result<ImageTensor> {
        let image = Self::decode(bytes)?;
        self.preprocess(&image)
    }
}

// ─── Augmentation ─────────────────────────────────────────────────────────────
/// How training samples are perturbed when they are fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Augmentation {
    /// Validation, test and inference: pixels pass through untouched.
    None,
    /// Mirror with probability [`FLIP_PROBABILITY`].
    ///
    /// The decision for a sample depends only on (seed, epoch, index),
    /// so it does not matter which loader worker fetches it.
    RandomHorizontalFlip { seed: u64 },
}

impl Augmentation {
    pub fn should_flip(&self, epoch: u64, index: usize) -> bool {
        match *self {
            Self::None => false,
            Self::RandomHorizontalFlip { seed } => {
                let mixed = seed
                    ^ epoch.wrapping_mul(0x9E37_79B9_7F4A_7C15)
                    ^ (index as u64).wrapping_mul(0xC2B2_AE3D_27D4_EB4F);
                ChaCha8Rng::seed_from_u64(mixed).gen_bool(FLIP_PROBABILITY)
            }
        }
    }
}
