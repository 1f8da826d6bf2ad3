//! Pixel-exact image diffing.
//!
//! The distance between two pixels is the largest absolute difference over the
//! four RGBA channels. A pixel is mismatched when that distance exceeds the
//! configured threshold, so a threshold of `0` means bit-exact equality.
//!
//! The diff image marks mismatched pixels opaque red and keeps matched pixels
//! as a dimmed, half-transparent copy of the rendered image.

use crate::image_data::{DecodedImage, Geometry, RGBA_CHANNELS};
use crate::result::{VerificarError, VerificarResult};
use serde::{Deserialize, Serialize};

/// Color used for mismatched pixels in the diff image
pub const MISMATCH_COLOR: [u8; 4] = [255, 0, 0, 255];

/// Alpha applied to matched pixels in the diff image
pub const MATCHED_ALPHA: u8 = 128;

/// Configuration for the pixel scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DiffConfig {
    /// Per-pixel channel distance still considered equal (0 = bit-exact)
    pub threshold: u8,
}

impl DiffConfig {
    /// Exact-match configuration
    #[must_use]
    pub const fn exact() -> Self {
        Self { threshold: 0 }
    }

    /// Set the per-pixel threshold
    #[must_use]
    pub const fn with_threshold(mut self, threshold: u8) -> Self {
        self.threshold = threshold;
        self
    }
}

/// Outcome of a pixel scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelDiff {
    /// Number of pixels whose distance exceeds the threshold
    pub mismatched_pixels: u64,
    /// Total number of pixels compared
    pub total_pixels: u64,
    /// Largest channel distance seen anywhere
    pub max_channel_diff: u8,
    /// Visualization with the same geometry as the inputs
    pub diff_image: DecodedImage,
}

impl PixelDiff {
    /// True when no pixel differs at all
    #[must_use]
    pub const fn is_identical(&self) -> bool {
        self.mismatched_pixels == 0
    }

    /// Percentage of mismatched pixels (0.0-100.0)
    #[must_use]
    pub fn mismatch_percentage(&self) -> f64 {
        if self.total_pixels == 0 {
            0.0
        } else {
            self.mismatched_pixels as f64 / self.total_pixels as f64 * 100.0
        }
    }
}

/// Largest absolute difference over the four RGBA channels
#[must_use]
pub fn channel_distance(a: [u8; 4], b: [u8; 4]) -> u8 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| x.abs_diff(y))
        .max()
        .unwrap_or(0)
}

/// Verify both images share width, height and channel count
///
/// # Errors
///
/// Returns [`VerificarError::GeometryMismatch`] with both triples
pub fn check_geometry(rendered: &DecodedImage, fixture: &DecodedImage) -> VerificarResult<Geometry> {
    let (r, f) = (rendered.geometry(), fixture.geometry());
    if r == f {
        Ok(r)
    } else {
        Err(VerificarError::GeometryMismatch {
            rendered: r,
            fixture: f,
        })
    }
}

/// Compare `rendered` against `fixture` pixel by pixel
///
/// Geometry is validated before any pixel is read.
///
/// # Errors
///
/// Returns [`VerificarError::GeometryMismatch`] if the images differ in size or channels
pub fn diff_images(
    rendered: &DecodedImage,
    fixture: &DecodedImage,
    config: DiffConfig,
) -> VerificarResult<PixelDiff> {
    let geometry = check_geometry(rendered, fixture)?;

    let stride = RGBA_CHANNELS as usize;
    let mut diff = Vec::with_capacity(geometry.byte_len());
    let mut mismatched_pixels = 0u64;
    let mut max_channel_diff = 0u8;

    for (r, f) in rendered
        .pixels()
        .chunks_exact(stride)
        .zip(fixture.pixels().chunks_exact(stride))
    {
        let rp = [r[0], r[1], r[2], r[3]];
        let distance = channel_distance(rp, [f[0], f[1], f[2], f[3]]);
        max_channel_diff = max_channel_diff.max(distance);

        if distance > config.threshold {
            mismatched_pixels += 1;
            diff.extend_from_slice(&MISMATCH_COLOR);
        } else {
            diff.extend_from_slice(&[rp[0] / 2, rp[1] / 2, rp[2] / 2, MATCHED_ALPHA]);
        }
    }

    let diff_image = DecodedImage::from_rgba(geometry.width, geometry.height, diff)
        .ok_or_else(|| VerificarError::Encode {
            message: format!("diff buffer does not match geometry {geometry}"),
        })?;

    Ok(PixelDiff {
        mismatched_pixels,
        total_pixels: geometry.pixel_count(),
        max_channel_diff,
        diff_image,
    })
}
