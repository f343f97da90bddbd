// src/engine/decoder.rs
//
// Image codec seam: approximate (subsampled) decode and full decode with
// destination reuse. The default implementation is backed by the image crate.

use crate::engine::buffer::{PixelBuffer, PixelConfig};
use crate::engine::common::run_with_panic_policy;
use crate::engine::io::{EncodedBytes, Source};
use crate::engine::{MAX_DIMENSION, MAX_PIXELS};
use crate::error::ResizeError;
use image::{DynamicImage, ImageDecoder, ImageReader};
use std::io::Cursor;

type DecoderResult<T> = std::result::Result<T, ResizeError>;

/// Turns encoded sources into pixel buffers.
///
/// Implementations run on the load context and may block on I/O.
pub trait ImageCodec: Send + Sync {
    /// Decode at or near `bound_w x bound_h`. The result is never more than one
    /// power-of-two step larger than needed on either axis.
    ///
    /// Only the size of the result is bounded. Whether peak memory is bounded too
    /// depends on the implementation; see [`DefaultCodec`].
    fn decode_approx(&self, source: Source, bound_w: u32, bound_h: u32)
        -> DecoderResult<PixelBuffer>;

    /// Decode at full resolution. When `reuse` is given, its allocation is used as
    /// the destination if it is large enough.
    fn decode_full(&self, source: Source, reuse: Option<PixelBuffer>)
        -> DecoderResult<PixelBuffer>;
}

/// Decompression bomb limits applied from the header, before pixels are decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeLimits {
    pub max_dimension: u32,
    pub max_pixels: u64,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_dimension: MAX_DIMENSION,
            max_pixels: MAX_PIXELS,
        }
    }
}

impl DecodeLimits {
    pub fn check(&self, width: u32, height: u32) -> DecoderResult<()> {
        if width > self.max_dimension || height > self.max_dimension {
            return Err(ResizeError::dimension_exceeds_limit(
                width.max(height),
                self.max_dimension,
            ));
        }
        let pixels = width as u64 * height as u64;
        if pixels > self.max_pixels {
            return Err(ResizeError::pixel_count_exceeds_limit(
                pixels,
                self.max_pixels,
            ));
        }
        Ok(())
    }
}

/// Security check against the crate-wide default limits.
pub fn check_dimensions(width: u32, height: u32) -> DecoderResult<()> {
    DecodeLimits::default().check(width, height)
}

/// Largest power of two `s` such that `width/s >= bound_w` and `height/s >= bound_h`.
pub fn sample_size(width: u32, height: u32, bound_w: u32, bound_h: u32) -> u32 {
    let bound_w = bound_w.max(1);
    let bound_h = bound_h.max(1);
    let mut sample = 1u32;
    while sample < (1 << 30) {
        let next = sample * 2;
        if width / next >= bound_w && height / next >= bound_h {
            sample = next;
        } else {
            break;
        }
    }
    sample
}

/// Default codec backed by the image crate (JPEG, PNG, WebP).
#[derive(Debug, Clone, Default)]
pub struct DefaultCodec {
    limits: DecodeLimits,
}

impl DefaultCodec {
    pub fn new(limits: DecodeLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> DecodeLimits {
        self.limits
    }

    fn open(&self, source: Source) -> DecoderResult<ImageReader<Cursor<EncodedBytes>>> {
        let label = source.describe();
        let reader = ImageReader::new(source.into_cursor()?)
            .with_guessed_format()
            .map_err(|e| ResizeError::decode_failed(format!("{label}: failed to read header: {e}")))?;
        if reader.format().is_none() {
            return Err(ResizeError::unsupported_format(format!(
                "{label}: unrecognized image data"
            )));
        }
        Ok(reader)
    }

    fn checked_header(&self, width: u32, height: u32) -> DecoderResult<()> {
        if width == 0 || height == 0 {
            return Err(ResizeError::empty_image(width, height));
        }
        self.limits.check(width, height)
    }
}

impl ImageCodec for DefaultCodec {
    /// Known limit: the image crate has no scaled decode, so the whole image is
    /// decoded at full resolution and then downsampled. Peak memory is that of a
    /// full decode (bounded by [`DecodeLimits`]), not of the returned buffer.
    fn decode_approx(
        &self,
        source: Source,
        bound_w: u32,
        bound_h: u32,
    ) -> DecoderResult<PixelBuffer> {
        if bound_w == 0 || bound_h == 0 {
            return Err(ResizeError::invalid_dimensions(bound_w, bound_h));
        }
        run_with_panic_policy("decode:approx", || {
            let decoder = self.open(source)?.into_decoder()?;
            let (width, height) = decoder.dimensions();
            self.checked_header(width, height)?;

            let img = DynamicImage::from_decoder(decoder)?;
            let sample = sample_size(width, height, bound_w, bound_h);
            if sample == 1 {
                return Ok(PixelBuffer::from_dynamic(img));
            }

            let out_w = width.div_ceil(sample);
            let out_h = height.div_ceil(sample);
            tracing::trace!(width, height, sample, out_w, out_h, "subsampling decode");
            Ok(PixelBuffer::from_dynamic(img.thumbnail_exact(out_w, out_h)))
        })
    }

    fn decode_full(
        &self,
        source: Source,
        reuse: Option<PixelBuffer>,
    ) -> DecoderResult<PixelBuffer> {
        run_with_panic_policy("decode:full", || {
            let decoder = self.open(source)?.into_decoder()?;
            let (width, height) = decoder.dimensions();
            self.checked_header(width, height)?;

            match PixelConfig::from_color_type(decoder.color_type()) {
                Some(config) => {
                    let mut dst = match reuse {
                        Some(mut buf) => {
                            buf.reshape(width, height, config)?;
                            buf
                        }
                        None => PixelBuffer::new(width, height, config)?,
                    };
                    decoder.read_image(dst.as_bytes_mut())?;
                    Ok(dst)
                }
                // Wide layouts cannot be decoded straight into an 8-bit buffer.
                None => Ok(PixelBuffer::from_dynamic(DynamicImage::from_decoder(
                    decoder,
                )?)),
            }
        })
    }
}
