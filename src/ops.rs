// src/ops.rs
//
// Resize operations.
// A ResizeRequest is cheap to build and carries everything one task needs; the
// expensive work happens in execute(), on the load context.

use crate::engine::buffer::PixelBuffer;
use crate::engine::compositor::Compositor;
use crate::engine::decoder::{DecodeLimits, ImageCodec};
use crate::engine::fit::{center_crop_fit, contain_decode_bound, contain_fit};
use crate::engine::io::Source;
use crate::engine::task::CancelToken;
use crate::error::{ResizeError, Result};
use std::str::FromStr;

/// Fitting policy of a resize task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResizeMode {
    /// Approximate decode, then scale to cover the target and crop the overflow
    CenterCrop,
    /// Approximate decode against the smaller axis, then scale to fit inside the target
    FitInSpace,
    /// Approximate decode only
    Approximate,
    /// Full decode, optionally into a reused buffer
    AsIs,
}

impl ResizeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResizeMode::CenterCrop => "center-crop",
            ResizeMode::FitInSpace => "fit-in-space",
            ResizeMode::Approximate => "approximate",
            ResizeMode::AsIs => "as-is",
        }
    }

    /// Whether this mode takes a target size.
    pub fn needs_target(&self) -> bool {
        !matches!(self, ResizeMode::AsIs)
    }
}

impl FromStr for ResizeMode {
    type Err = ResizeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "center-crop" | "centercrop" | "cover" => Ok(ResizeMode::CenterCrop),
            "fit-in-space" | "fitinspace" | "contain" => Ok(ResizeMode::FitInSpace),
            "approximate" | "approx" => Ok(ResizeMode::Approximate),
            "as-is" | "asis" | "full" => Ok(ResizeMode::AsIs),
            other => Err(ResizeError::invalid_argument(
                "mode",
                other.to_string(),
                "expected center-crop, fit-in-space, approximate or as-is",
            )),
        }
    }
}

/// Everything one resize task needs.
///
/// The reuse buffer is moved in, so a buffer can only ever belong to one in-flight
/// request. Cloning a buffer to hand the "same" scratch space to two requests is a
/// caller error: each clone is a separate allocation and no reuse happens.
#[derive(Debug)]
pub struct ResizeRequest {
    pub mode: ResizeMode,
    pub source: Source,
    /// Target width; ignored for `AsIs`
    pub width: u32,
    /// Target height; ignored for `AsIs`
    pub height: u32,
    /// Destination reused by `AsIs`
    pub reuse: Option<PixelBuffer>,
}

impl ResizeRequest {
    pub fn center_crop(source: impl Into<Source>, width: u32, height: u32) -> Self {
        Self::sized(ResizeMode::CenterCrop, source.into(), width, height)
    }

    pub fn fit_in_space(source: impl Into<Source>, width: u32, height: u32) -> Self {
        Self::sized(ResizeMode::FitInSpace, source.into(), width, height)
    }

    pub fn approximate(source: impl Into<Source>, width: u32, height: u32) -> Self {
        Self::sized(ResizeMode::Approximate, source.into(), width, height)
    }

    pub fn as_is(source: impl Into<Source>, reuse: Option<PixelBuffer>) -> Self {
        Self {
            mode: ResizeMode::AsIs,
            source: source.into(),
            width: 0,
            height: 0,
            reuse,
        }
    }

    fn sized(mode: ResizeMode, source: Source, width: u32, height: u32) -> Self {
        Self {
            mode,
            source,
            width,
            height,
            reuse: None,
        }
    }

    /// Target must be non-empty. Re-checked on the load context before decoding.
    pub fn validate(&self) -> Result<()> {
        if self.mode.needs_target() && (self.width == 0 || self.height == 0) {
            return Err(ResizeError::invalid_dimensions(self.width, self.height));
        }
        Ok(())
    }

    /// Argument checks done at submission time, before anything is scheduled.
    ///
    /// Besides [`validate`](Self::validate), the target must fit `limits`: the
    /// composite allocates a buffer of the target size, so an oversized target is
    /// refused here rather than failing the allocation on the load context.
    pub fn validate_within(&self, limits: &DecodeLimits) -> Result<()> {
        self.validate()?;
        if self.mode.needs_target() {
            let (width, height) = (self.width, self.height);
            limits.check(width, height).map_err(|e| {
                ResizeError::invalid_argument("target", format!("{width}x{height}"), e.to_string())
            })?;
        }
        Ok(())
    }

    /// Run the request to completion on the current thread.
    ///
    /// Steps run strictly in order (decode, then fit + composite); `token` is checked
    /// between them so a cancelled task skips the composite.
    pub fn execute(
        self,
        codec: &dyn ImageCodec,
        compositor: &dyn Compositor,
        token: &CancelToken,
    ) -> Result<PixelBuffer> {
        self.validate()?;
        let (width, height) = (self.width, self.height);

        match self.mode {
            ResizeMode::CenterCrop => {
                let decoded = non_empty(codec.decode_approx(self.source, width, height)?)?;
                if decoded.dimensions() == (width, height) {
                    return Ok(decoded);
                }
                token.check()?;
                let transform = center_crop_fit(decoded.width(), decoded.height(), width, height)?;
                compositor.composite(&decoded, &transform)
            }
            ResizeMode::FitInSpace => {
                let (bound_w, bound_h) = contain_decode_bound(width, height);
                let decoded = non_empty(codec.decode_approx(self.source, bound_w, bound_h)?)?;
                token.check()?;
                let transform = contain_fit(decoded.width(), decoded.height(), width, height)?;
                if transform.is_identity() && transform.out_size() == decoded.dimensions() {
                    return Ok(decoded);
                }
                compositor.composite(&decoded, &transform)
            }
            ResizeMode::Approximate => {
                non_empty(codec.decode_approx(self.source, width, height)?)
            }
            ResizeMode::AsIs => non_empty(codec.decode_full(self.source, self.reuse)?),
        }
    }
}

/// A codec that hands back an empty buffer has failed to decode.
fn non_empty(buf: PixelBuffer) -> Result<PixelBuffer> {
    if buf.width() == 0 || buf.height() == 0 {
        return Err(ResizeError::empty_image(buf.width(), buf.height()));
    }
    Ok(buf)
}
