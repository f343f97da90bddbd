// src/engine/compositor.rs
//
// Draws a source buffer through a FitTransform into a freshly allocated destination.
// Sampling is nearest-neighbour (no bilinear/mipmap filtering); pixels on the edge
// of the drawn rectangle are weighted by coverage so edges stay anti-aliased.

use crate::engine::buffer::PixelBuffer;
use crate::engine::common::run_with_panic_policy;
use crate::engine::fit::FitTransform;
use crate::error::ResizeError;
use rayon::prelude::*;

type CompositeResult<T> = std::result::Result<T, ResizeError>;

/// Applies a transform to produce an output of exactly `transform.out_size()`.
pub trait Compositor: Send + Sync {
    fn composite(&self, source: &PixelBuffer, transform: &FitTransform)
        -> CompositeResult<PixelBuffer>;
}

/// Default CPU compositor. Rows are drawn in parallel on the current rayon pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCompositor;

impl Compositor for DefaultCompositor {
    fn composite(
        &self,
        source: &PixelBuffer,
        transform: &FitTransform,
    ) -> CompositeResult<PixelBuffer> {
        let (out_w, out_h) = transform.out_size();
        let fail = |msg: &'static str| {
            ResizeError::composite_failed(source.dimensions(), (out_w, out_h), msg)
        };

        if source.width() == 0 || source.height() == 0 {
            return Err(fail("empty source buffer"));
        }
        if out_w == 0 || out_h == 0 {
            return Err(fail("empty destination"));
        }
        let valid_scale = |s: f32| s.is_finite() && s > 0.0;
        if !valid_scale(transform.scale_x) || !valid_scale(transform.scale_y) {
            return Err(fail("transform scale must be positive and finite"));
        }
        if !transform.translate_x.is_finite() || !transform.translate_y.is_finite() {
            return Err(fail("transform translate must be finite"));
        }

        run_with_panic_policy("composite", || {
            let mut dst = PixelBuffer::new(out_w, out_h, source.config())?;
            let row_bytes = dst.row_bytes();
            dst.as_bytes_mut()
                .par_chunks_mut(row_bytes)
                .enumerate()
                .for_each(|(y, row)| draw_row(source, transform, y as u32, row));
            Ok(dst)
        })
    }
}

/// Length of `[a0, a1] ∩ [b0, b1]`, clamped to `[0, 1]`.
#[inline]
fn overlap(a0: f32, a1: f32, b0: f32, b1: f32) -> f32 {
    (a1.min(b1) - a0.max(b0)).clamp(0.0, 1.0)
}

fn draw_row(source: &PixelBuffer, t: &FitTransform, y: u32, row: &mut [u8]) {
    let config = source.config();
    let bpp = config.bytes_per_pixel();
    let (src_w, src_h) = source.dimensions();
    let (left, top) = t.map_point(0.0, 0.0);
    let (right, bottom) = t.map_point(src_w as f32, src_h as f32);

    let fy = y as f32;
    let cov_y = overlap(fy, fy + 1.0, top, bottom);
    if cov_y <= 0.0 {
        return;
    }

    for (x, px) in row.chunks_exact_mut(bpp).enumerate() {
        let fx = x as f32;
        let cov_x = overlap(fx, fx + 1.0, left, right);
        if cov_x <= 0.0 {
            continue;
        }

        let (u, v) = t.inverse_map(fx + 0.5, fy + 0.5);
        let sx = (u.floor().max(0.0) as u32).min(src_w - 1);
        let sy = (v.floor().max(0.0) as u32).min(src_h - 1);
        px.copy_from_slice(source.pixel(sx, sy));

        let coverage = cov_x * cov_y;
        if coverage < 1.0 {
            if config.has_alpha() {
                let a = &mut px[bpp - 1];
                *a = (*a as f32 * coverage).round() as u8;
            } else {
                for c in px.iter_mut() {
                    *c = (*c as f32 * coverage).round() as u8;
                }
            }
        }
    }
}
