//! Decoded pixel buffers.
//!
//! Both sides of a comparison are normalized to 8-bit RGBA before any pixel is
//! looked at. Sources without an alpha channel (JPEG, RGB PNG) get an opaque one.

use crate::result::{ImageSide, VerificarError, VerificarResult};
use image::{ExtendedColorType, ImageEncoder, RgbaImage};
use serde::{Deserialize, Serialize};

/// Channel count of every decoded image (RGBA)
pub const RGBA_CHANNELS: u8 = 4;

/// Default JPEG quality for diff artifacts
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Width, height and channel count of an image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Geometry {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Channels per pixel
    pub channels: u8,
}

impl Geometry {
    /// Create a geometry triple
    #[must_use]
    pub const fn new(width: u32, height: u32, channels: u8) -> Self {
        Self {
            width,
            height,
            channels,
        }
    }

    /// Number of pixels
    #[must_use]
    pub const fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Number of bytes a buffer of this geometry occupies
    #[must_use]
    pub const fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * self.channels as usize
    }
}

impl std::fmt::Display for Geometry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}x{}", self.width, self.height, self.channels)
    }
}

/// An image decoded into a flat RGBA byte buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    width: u32,
    height: u32,
    channels: u8,
    pixels: Vec<u8>,
}

impl DecodedImage {
    /// Decode an encoded buffer (PNG or JPEG), forcing RGBA output
    ///
    /// # Errors
    ///
    /// Returns [`VerificarError::DecodeError`] naming `side` if the buffer is empty
    /// or not a supported image
    pub fn decode(bytes: &[u8], side: ImageSide) -> VerificarResult<Self> {
        if bytes.is_empty() {
            return Err(VerificarError::decode(side, "buffer is empty"));
        }

        let decoded = image::load_from_memory(bytes)
            .map_err(|e| VerificarError::decode(side, e.to_string()))?
            .to_rgba8();

        let (width, height) = decoded.dimensions();
        Ok(Self {
            width,
            height,
            channels: RGBA_CHANNELS,
            pixels: decoded.into_raw(),
        })
    }

    /// Wrap an existing RGBA buffer
    ///
    /// Returns `None` if `pixels` does not hold exactly `width * height * 4` bytes.
    #[must_use]
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Option<Self> {
        let expected = Geometry::new(width, height, RGBA_CHANNELS).byte_len();
        (pixels.len() == expected).then_some(Self {
            width,
            height,
            channels: RGBA_CHANNELS,
            pixels,
        })
    }

    /// Create an image filled with a single color
    #[must_use]
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let count = width as usize * height as usize;
        let mut pixels = Vec::with_capacity(count * RGBA_CHANNELS as usize);
        for _ in 0..count {
            pixels.extend_from_slice(&rgba);
        }
        Self {
            width,
            height,
            channels: RGBA_CHANNELS,
            pixels,
        }
    }

    /// Width in pixels
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Channels per pixel (always 4)
    #[must_use]
    pub const fn channels(&self) -> u8 {
        self.channels
    }

    /// Width, height and channels as one value
    #[must_use]
    pub const fn geometry(&self) -> Geometry {
        Geometry::new(self.width, self.height, self.channels)
    }

    /// Raw RGBA bytes, row-major
    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// RGBA value at `(x, y)`, or `None` when out of bounds
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * RGBA_CHANNELS as usize;
        let px = &self.pixels[idx..idx + RGBA_CHANNELS as usize];
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Overwrite the pixel at `(x, y)`; out-of-bounds writes are ignored
    pub fn set_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let idx = (y as usize * self.width as usize + x as usize) * RGBA_CHANNELS as usize;
        self.pixels[idx..idx + RGBA_CHANNELS as usize].copy_from_slice(&rgba);
    }

    /// Encode as PNG, preserving alpha
    ///
    /// # Errors
    ///
    /// Returns error if encoding fails
    pub fn encode_png(&self) -> VerificarResult<Vec<u8>> {
        let mut buffer = Vec::new();
        image::codecs::png::PngEncoder::new(&mut buffer)
            .write_image(
                &self.pixels,
                self.width,
                self.height,
                ExtendedColorType::Rgba8,
            )
            .map_err(|e| VerificarError::Encode {
                message: format!("Failed to encode PNG: {e}"),
            })?;
        Ok(buffer)
    }

    /// Encode as lossy JPEG
    ///
    /// JPEG carries no alpha, so each pixel is composited over white first.
    ///
    /// # Errors
    ///
    /// Returns error if encoding fails
    pub fn encode_jpeg(&self, quality: u8) -> VerificarResult<Vec<u8>> {
        let rgb = flatten_over_white(&self.pixels);
        let mut buffer = Vec::new();
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100))
            .write_image(&rgb, self.width, self.height, ExtendedColorType::Rgb8)
            .map_err(|e| VerificarError::Encode {
                message: format!("Failed to encode JPEG: {e}"),
            })?;
        Ok(buffer)
    }

    /// Convert into an `image` crate buffer
    #[must_use]
    pub fn into_rgba_image(self) -> Option<RgbaImage> {
        RgbaImage::from_raw(self.width, self.height, self.pixels)
    }
}

impl From<RgbaImage> for DecodedImage {
    fn from(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            channels: RGBA_CHANNELS,
            pixels: image.into_raw(),
        }
    }
}

fn flatten_over_white(rgba: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(rgba.len() / 4 * 3);
    for px in rgba.chunks_exact(4) {
        let alpha = u16::from(px[3]);
        for &channel in &px[..3] {
            let blended = (u16::from(channel) * alpha + 255 * (255 - alpha) + 127) / 255;
            rgb.push(blended as u8);
        }
    }
    rgb
}
