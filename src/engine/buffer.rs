// src/engine/buffer.rs
//
// Decoded pixel storage handed from the load context to callbacks.

use crate::error::{ResizeError, Result};
use image::{
    ColorType, DynamicImage, GrayAlphaImage, GrayImage, ImageBuffer, Pixel, RgbImage, RgbaImage,
};

/// Pixel layout of a [`PixelBuffer`]. All layouts are 8 bits per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelConfig {
    Luma8,
    LumaA8,
    Rgb8,
    Rgba8,
}

impl PixelConfig {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelConfig::Luma8 => 1,
            PixelConfig::LumaA8 => 2,
            PixelConfig::Rgb8 => 3,
            PixelConfig::Rgba8 => 4,
        }
    }

    pub fn has_alpha(self) -> bool {
        matches!(self, PixelConfig::LumaA8 | PixelConfig::Rgba8)
    }

    /// Map a decoder color type onto a native config. `None` means the decoder
    /// output has to be converted (16-bit and float layouts).
    pub fn from_color_type(color: ColorType) -> Option<Self> {
        match color {
            ColorType::L8 => Some(PixelConfig::Luma8),
            ColorType::La8 => Some(PixelConfig::LumaA8),
            ColorType::Rgb8 => Some(PixelConfig::Rgb8),
            ColorType::Rgba8 => Some(PixelConfig::Rgba8),
            _ => None,
        }
    }
}

/// An owned, tightly packed, row-major image.
///
/// Buffers are never shared between in-flight tasks: the pipeline produces one and
/// moves it into the callback.
#[derive(Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    config: PixelConfig,
    data: Vec<u8>,
}

impl std::fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("config", &self.config)
            .field("bytes", &self.data.len())
            .finish()
    }
}

impl PixelBuffer {
    /// Allocate a zeroed buffer (transparent for alpha configs, black otherwise).
    pub fn new(width: u32, height: u32, config: PixelConfig) -> Result<Self> {
        let len = byte_len(width, height, config)?;
        Ok(Self {
            width,
            height,
            config,
            data: vec![0u8; len],
        })
    }

    /// Wrap existing pixel bytes. The length must match the dimensions exactly.
    pub fn from_raw(width: u32, height: u32, config: PixelConfig, data: Vec<u8>) -> Result<Self> {
        let expected = byte_len(width, height, config)?;
        if data.len() != expected {
            return Err(ResizeError::invalid_argument(
                "data",
                format!("{} bytes", data.len()),
                format!("expected {expected} bytes for {width}x{height} {config:?}"),
            ));
        }
        Ok(Self {
            width,
            height,
            config,
            data,
        })
    }

    /// Convert a decoded image, keeping 8-bit layouts and widening everything else to RGBA8.
    pub fn from_dynamic(img: DynamicImage) -> Self {
        let (width, height) = (img.width(), img.height());
        let (config, data) = match img {
            DynamicImage::ImageLuma8(buf) => (PixelConfig::Luma8, buf.into_raw()),
            DynamicImage::ImageLumaA8(buf) => (PixelConfig::LumaA8, buf.into_raw()),
            DynamicImage::ImageRgb8(buf) => (PixelConfig::Rgb8, buf.into_raw()),
            DynamicImage::ImageRgba8(buf) => (PixelConfig::Rgba8, buf.into_raw()),
            other => (PixelConfig::Rgba8, other.to_rgba8().into_raw()),
        };
        Self {
            width,
            height,
            config,
            data,
        }
    }

    pub fn into_dynamic(self) -> Result<DynamicImage> {
        let (w, h) = (self.width, self.height);
        let img = match self.config {
            PixelConfig::Luma8 => GrayImage::from_raw(w, h, self.data).map(DynamicImage::ImageLuma8),
            PixelConfig::LumaA8 => {
                GrayAlphaImage::from_raw(w, h, self.data).map(DynamicImage::ImageLumaA8)
            }
            PixelConfig::Rgb8 => RgbImage::from_raw(w, h, self.data).map(DynamicImage::ImageRgb8),
            PixelConfig::Rgba8 => {
                RgbaImage::from_raw(w, h, self.data).map(DynamicImage::ImageRgba8)
            }
        };
        img.ok_or_else(|| ResizeError::internal_panic("pixel buffer length mismatch"))
    }

    /// Borrow the pixels as a typed `image` buffer view.
    pub fn as_image<P: Pixel<Subpixel = u8>>(&self) -> Option<ImageBuffer<P, &[u8]>> {
        if usize::from(P::CHANNEL_COUNT) != self.config.bytes_per_pixel() {
            return None;
        }
        ImageBuffer::from_raw(self.width, self.height, self.data.as_slice())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn config(&self) -> PixelConfig {
        self.config
    }

    pub fn row_bytes(&self) -> usize {
        self.width as usize * self.config.bytes_per_pixel()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    /// Bytes of the pixel at (x, y). Panics when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let bpp = self.config.bytes_per_pixel();
        let start = y as usize * self.row_bytes() + x as usize * bpp;
        &self.data[start..start + bpp]
    }

    /// True if `other` could be decoded into this buffer without reallocating.
    pub fn is_compatible(&self, width: u32, height: u32, config: PixelConfig) -> bool {
        self.width == width && self.height == height && self.config == config
    }

    /// Capacity of the backing allocation, used to observe buffer reuse.
    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    /// Reshape in place, keeping the allocation when it is large enough.
    pub(crate) fn reshape(&mut self, width: u32, height: u32, config: PixelConfig) -> Result<()> {
        let len = byte_len(width, height, config)?;
        self.data.resize(len, 0);
        self.width = width;
        self.height = height;
        self.config = config;
        Ok(())
    }
}

fn byte_len(width: u32, height: u32, config: PixelConfig) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|px| px.checked_mul(config.bytes_per_pixel()))
        .ok_or_else(|| {
            ResizeError::invalid_argument(
                "dimensions",
                format!("{width}x{height}"),
                "pixel buffer size overflows usize",
            )
        })
}
