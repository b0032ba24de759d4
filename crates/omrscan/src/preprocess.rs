//! Image normalization: decode, intensity conversion, adaptive binarization
//! and morphological cleanup.
//!
//! Scans have uneven illumination, so ink is decided against a local
//! box-filter mean rather than a single global threshold. The binarized
//! output uses ink = 255 and background = 0, pixel-aligned with the input.

use image::{DynamicImage, GrayImage, Luma};
use imageproc::distance_transform::Norm;

use crate::error::EngineError;

const INK: u8 = 255;
const BACKGROUND: u8 = 0;

/// Decoded single-channel sheet image.
#[derive(Debug, Clone)]
pub struct RasterImage {
    gray: GrayImage,
}

impl RasterImage {
    /// Decode PNG/JPEG (or any format the `image` crate reads) from memory.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EngineError> {
        let decoded =
            image::load_from_memory(bytes).map_err(|e| EngineError::ImageDecode(e.to_string()))?;
        Self::from_dynamic(&decoded)
    }

    pub fn from_dynamic(image: &DynamicImage) -> Result<Self, EngineError> {
        Self::from_gray(image.to_luma8())
    }

    pub fn from_gray(gray: GrayImage) -> Result<Self, EngineError> {
        let (w, h) = gray.dimensions();
        if w == 0 || h == 0 {
            return Err(EngineError::ImageDecode(format!(
                "image has zero dimension ({w}x{h})"
            )));
        }
        Ok(Self { gray })
    }

    pub fn gray(&self) -> &GrayImage {
        &self.gray
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.gray.dimensions()
    }
}

/// Binarized sheet image: ink pixels are 255, background is 0.
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryImage {
    mask: GrayImage,
}

impl BinaryImage {
    /// Wrap a mask, mapping every non-zero sample to ink.
    pub fn from_mask(mut mask: GrayImage) -> Self {
        for p in mask.pixels_mut() {
            p[0] = if p[0] > 0 { INK } else { BACKGROUND };
        }
        Self { mask }
    }

    pub fn as_gray(&self) -> &GrayImage {
        &self.mask
    }

    pub fn width(&self) -> u32 {
        self.mask.width()
    }

    pub fn height(&self) -> u32 {
        self.mask.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.mask.dimensions()
    }

    #[inline]
    pub fn is_ink(&self, x: u32, y: u32) -> bool {
        self.mask.get_pixel(x, y)[0] != BACKGROUND
    }

    /// Fraction of ink pixels over the whole image.
    pub fn ink_fraction(&self) -> f32 {
        let total = self.mask.as_raw().len();
        if total == 0 {
            return 0.0;
        }
        let ink = self.mask.as_raw().iter().filter(|&&v| v != BACKGROUND).count();
        ink as f32 / total as f32
    }
}

/// Configuration for adaptive binarization and cleanup.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    /// Local-mean window radius (pixels). `None` derives it from the image size.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_radius: Option<u32>,
    /// Derived window radius as a fraction of the shorter image side.
    pub block_radius_frac: f32,
    /// Lower bound for the derived window radius.
    pub min_block_radius: u32,
    /// Lower bound for the derived window radius as a multiple of the bubble
    /// radius. A window that does not reach past a filled bubble reads its
    /// center as background.
    pub bubble_window_factor: f32,
    /// A pixel is ink when it is darker than the local mean by more than this.
    pub offset: u8,
    /// Structuring-element radius for opening then closing. `0` disables cleanup.
    ///
    /// Printed outlines must be at least `2 * morph_radius + 1` pixels thick
    /// to survive the opening.
    pub morph_radius: u8,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            block_radius: None,
            block_radius_frac: 1.0 / 25.0,
            min_block_radius: 15,
            bubble_window_factor: 2.5,
            offset: 25,
            morph_radius: 1,
        }
    }
}

impl NormalizeConfig {
    /// Window radius used for an image of the given size.
    pub fn effective_block_radius(&self, width: u32, height: u32) -> u32 {
        if let Some(r) = self.block_radius {
            return r.max(1);
        }
        let short_side = width.min(height) as f32;
        ((short_side * self.block_radius_frac).round() as u32).max(self.min_block_radius.max(1))
    }

    /// Window radius for a sheet whose bubbles have radius `bubble_radius_px`.
    ///
    /// An explicit `block_radius` is used as is.
    pub fn block_radius_for_bubbles(
        &self,
        width: u32,
        height: u32,
        bubble_radius_px: f32,
    ) -> u32 {
        let base = self.effective_block_radius(width, height);
        if self.block_radius.is_some() {
            return base;
        }
        let floor = (bubble_radius_px.max(0.0) * self.bubble_window_factor).ceil() as u32;
        base.max(floor)
    }
}

/// Adaptive mean thresholding against a box-filtered local mean.
pub fn adaptive_binarize(gray: &GrayImage, block_radius: u32, offset: u8) -> BinaryImage {
    let local_mean = imageproc::filter::box_filter(gray, block_radius, block_radius);
    let offset = i16::from(offset);
    let mut mask = GrayImage::new(gray.width(), gray.height());
    for ((out, px), mean) in mask
        .pixels_mut()
        .zip(gray.pixels())
        .zip(local_mean.pixels())
    {
        let ink = i16::from(px[0]) < i16::from(mean[0]) - offset;
        *out = Luma([if ink { INK } else { BACKGROUND }]);
    }
    BinaryImage { mask }
}

/// Opening (removes isolated specks) followed by closing (fills small gaps).
pub fn morphological_cleanup(binary: &BinaryImage, radius: u8) -> BinaryImage {
    if radius == 0 {
        return binary.clone();
    }
    let opened = imageproc::morphology::open(&binary.mask, Norm::L1, radius);
    let closed = imageproc::morphology::close(&opened, Norm::L1, radius);
    BinaryImage { mask: closed }
}

/// Full normalizer stage with the window derived from the image size.
pub fn normalize(raster: &RasterImage, config: &NormalizeConfig) -> BinaryImage {
    let (w, h) = raster.dimensions();
    normalize_with_block_radius(raster, config, config.effective_block_radius(w, h))
}

/// Normalizer stage with a caller-chosen local-mean window radius.
pub fn normalize_with_block_radius(
    raster: &RasterImage,
    config: &NormalizeConfig,
    block_radius: u32,
) -> BinaryImage {
    let (w, h) = raster.dimensions();
    tracing::debug!(
        "normalize {}x{} block_radius={} offset={} morph_radius={}",
        w,
        h,
        block_radius,
        config.offset,
        config.morph_radius
    );
    let binary = adaptive_binarize(raster.gray(), block_radius, config.offset);
    let cleaned = morphological_cleanup(&binary, config.morph_radius);
    tracing::debug!("ink fraction after cleanup: {:.4}", cleaned.ink_fraction());
    cleaned
}
