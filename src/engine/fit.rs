// src/engine/fit.rs
//
// Fit calculator: pure geometry that turns (source size, target size) into the
// scale/translate applied by the compositor. No I/O, no allocation of pixels.

use crate::error::{ResizeError, Result};

/// Affine scale + translate from source pixel space to an output of
/// `out_width x out_height`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitTransform {
    pub scale_x: f32,
    pub scale_y: f32,
    pub translate_x: f32,
    pub translate_y: f32,
    pub out_width: u32,
    pub out_height: u32,
}

impl FitTransform {
    /// Identity for a source of the given size.
    pub fn identity(width: u32, height: u32) -> Self {
        Self {
            scale_x: 1.0,
            scale_y: 1.0,
            translate_x: 0.0,
            translate_y: 0.0,
            out_width: width,
            out_height: height,
        }
    }

    pub fn is_identity(&self) -> bool {
        self.scale_x == 1.0
            && self.scale_y == 1.0
            && self.translate_x == 0.0
            && self.translate_y == 0.0
    }

    pub fn out_size(&self) -> (u32, u32) {
        (self.out_width, self.out_height)
    }

    /// Size of the source after scaling, before cropping to the output.
    pub fn scaled_size(&self, src_w: u32, src_h: u32) -> (f32, f32) {
        (src_w as f32 * self.scale_x, src_h as f32 * self.scale_y)
    }

    /// Source point -> output point.
    pub fn map_point(&self, x: f32, y: f32) -> (f32, f32) {
        (
            x * self.scale_x + self.translate_x,
            y * self.scale_y + self.translate_y,
        )
    }

    /// Output point -> source point.
    pub fn inverse_map(&self, x: f32, y: f32) -> (f32, f32) {
        (
            (x - self.translate_x) / self.scale_x,
            (y - self.translate_y) / self.scale_y,
        )
    }
}

fn validate(sw: u32, sh: u32, tw: u32, th: u32) -> Result<()> {
    if sw == 0 || sh == 0 {
        return Err(ResizeError::invalid_argument(
            "source",
            format!("{sw}x{sh}"),
            "source dimensions must be positive",
        ));
    }
    if tw == 0 || th == 0 {
        return Err(ResizeError::invalid_dimensions(tw, th));
    }
    Ok(())
}

/// Nearest whole pixel, halves rounded up.
#[inline]
fn round_px(v: f32) -> f32 {
    (v + 0.5).floor()
}

/// Fill-and-crop: scale so the source covers `tw x th`, center the overflow.
///
/// The axis comparison is done on integers (`sw*th` vs `tw*sh`) so exact aspect
/// matches never flip on float error. Ties take the vertical-centering branch.
pub fn center_crop_fit(sw: u32, sh: u32, tw: u32, th: u32) -> Result<FitTransform> {
    validate(sw, sh, tw, th)?;

    let (scale, dx, dy) = if sw as u64 * th as u64 > tw as u64 * sh as u64 {
        let scale = th as f32 / sh as f32;
        (scale, (tw as f32 - sw as f32 * scale) * 0.5, 0.0)
    } else {
        let scale = tw as f32 / sw as f32;
        (scale, 0.0, (th as f32 - sh as f32 * scale) * 0.5)
    };

    Ok(FitTransform {
        scale_x: scale,
        scale_y: scale,
        translate_x: round_px(dx),
        translate_y: round_px(dy),
        out_width: tw,
        out_height: th,
    })
}

/// Contain: scale so the source fits inside `tw x th` without cropping.
///
/// The output is the scaled source size, not the requested bounds. The limiting
/// axis lands exactly on its bound; the other is rounded and clamped to `[1, bound]`.
pub fn contain_fit(sw: u32, sh: u32, tw: u32, th: u32) -> Result<FitTransform> {
    validate(sw, sh, tw, th)?;

    let width_limited = tw as u64 * sh as u64 <= th as u64 * sw as u64;
    let (scale, out_w, out_h) = if width_limited {
        let scale = tw as f64 / sw as f64;
        let h = ((sh as f64 * scale).round() as u32).clamp(1, th);
        (scale, tw, h)
    } else {
        let scale = th as f64 / sh as f64;
        let w = ((sw as f64 * scale).round() as u32).clamp(1, tw);
        (scale, w, th)
    };

    Ok(FitTransform {
        scale_x: scale as f32,
        scale_y: scale as f32,
        translate_x: 0.0,
        translate_y: 0.0,
        out_width: out_w,
        out_height: out_h,
    })
}

/// Approximate-decode bound for contain-fit: the larger target axis is relaxed to 1
/// so the decoder subsamples against the smaller one.
pub fn contain_decode_bound(tw: u32, th: u32) -> (u32, u32) {
    let bw = if tw > th { 1 } else { tw };
    let bh = if th > tw { 1 } else { th };
    (bw, bh)
}
