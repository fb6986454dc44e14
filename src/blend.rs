//! Correction field synthesis and seam removal.
//!
//! The correction is built in two passes over the working window:
//!
//! 1. [`synthesize`] blurs the full-ellipse mask into a soft weight `S` and
//!    mixes the target so that
//!    ```text
//!    blended = factor * (S * T + (1 - S) * T / factor)
//!    ```
//!    which lifts the donut by `factor`. Where `S` vanishes the target is
//!    copied unchanged.
//!    A box-averaged copy `M` of `blended` is kept as interpolation source.
//! 2. [`radial_blend`] replaces every pixel of the blend band by a linear
//!    interpolation of `M` between the inner and outer band boundaries,
//!    measured along the ray from the ellipse center.

use image::Luma;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::config::{RepairConfig, Sampling, ScaleBand};
use crate::field::{self, GrayFloatImage};
use crate::geometry::{EllipseGeometry, WorkingWindow};
use crate::mask;
use crate::stats::CorrectionFactor;

/// Ring thickness below which a pixel falls back to the outer sample
const THICKNESS_EPSILON: f32 = 1e-6;

/// Window-sized fields produced by [`synthesize`]
#[derive(Debug, Clone)]
pub struct BlendFields {
    /// Target mixed with its corrected version through the smoothed mask
    pub blended: GrayFloatImage,
    /// Box-averaged `blended`, sampled at the blend band boundaries
    pub interpolation_source: GrayFloatImage,
}

/// Build the un-refined correction field over `window`.
///
/// `target` is the full image; the returned fields are window-local.
pub fn synthesize(
    target: &GrayFloatImage,
    geometry: &EllipseGeometry,
    window: &WorkingWindow,
    correction: CorrectionFactor,
    config: &RepairConfig,
) -> BlendFields {
    let full = mask::region_mask(geometry, ScaleBand::disc(1.0), window);
    let smoothed = field::smooth(&full, config.smoothing_sigma);
    let outside_weights = mask::inverted(&smoothed);

    let mut blended = GrayFloatImage::new(window.width(), window.height());
    for (lx, ly, pixel) in blended.enumerate_pixels_mut() {
        let (x, y) = window.to_image(lx, ly);
        let t = target.get_pixel(x, y)[0];
        let inside_weight = smoothed.get_pixel(lx, ly)[0].max(0.0);
        if inside_weight == 0.0 {
            *pixel = Luma([t]);
            continue;
        }
        let outside_weight = outside_weights.get_pixel(lx, ly)[0];

        let inside = (inside_weight * t).max(0.0);
        let outside = (outside_weight * correction.inverse * t).max(0.0);
        *pixel = Luma([(inside + outside).max(0.0) * correction.factor]);
    }

    let interpolation_source = field::box_average(&blended, config.box_size);

    BlendFields {
        blended,
        interpolation_source,
    }
}

/// Linear blend between the boundary samples.
///
/// `ratio` is the distance from the outer boundary in units of ring
/// thickness: 0 yields `outer`, 1 yields `inner`.
pub fn interpolate(ratio: f32, inner: f32, outer: f32) -> f32 {
    ratio * inner + (1.0 - ratio) * outer
}

/// Value of the image pixel `(x, y)` interpolated across `band`.
///
/// Returns `None` as second element when the ring has no thickness along
/// the pixel's ray, in which case the outer sample is used.
pub fn radial_value(
    source: &GrayFloatImage,
    geometry: &EllipseGeometry,
    window: &WorkingWindow,
    band: ScaleBand,
    sampling: Sampling,
    x: f32,
    y: f32,
) -> (f32, Option<f32>) {
    let angle = (y - geometry.center_y).atan2(x - geometry.center_x);
    let (outer_x, outer_y) = geometry.boundary_point(angle, band.max);
    let (inner_x, inner_y) = geometry.boundary_point(angle, band.min);

    let (ox, oy) = (window.x0 as f32, window.y0 as f32);
    let inner = field::sample(source, inner_x - ox, inner_y - oy, sampling);
    let outer = field::sample(source, outer_x - ox, outer_y - oy, sampling);

    let thickness = (inner_x - outer_x).hypot(inner_y - outer_y);
    if thickness < THICKNESS_EPSILON {
        return (outer, None);
    }

    let ratio = (x - outer_x).hypot(y - outer_y) / thickness;
    (interpolate(ratio, inner, outer), Some(ratio))
}

/// Replace the blend band of `fields.blended` by radial interpolation.
///
/// Returns the final correction field and the number of pixels that hit
/// the zero-thickness fallback.
pub fn radial_blend(
    fields: &BlendFields,
    geometry: &EllipseGeometry,
    window: &WorkingWindow,
    config: &RepairConfig,
) -> (GrayFloatImage, usize) {
    let band = mask::region_mask(geometry, config.blend, window);
    let mut output = fields.blended.clone();
    let width = window.width() as usize;
    if width == 0 {
        return (output, 0);
    }

    let blend_row = |ly: usize, row: &mut [f32]| -> usize {
        let mut degenerate = 0;
        for (lx, value) in row.iter_mut().enumerate() {
            if band.get_pixel(lx as u32, ly as u32)[0] <= 0.0 {
                continue;
            }
            let (x, y) = window.to_image(lx as u32, ly as u32);
            let (weighted, ratio) = radial_value(
                &fields.interpolation_source,
                geometry,
                window,
                config.blend,
                config.sampling,
                x as f32,
                y as f32,
            );
            if ratio.is_none() {
                degenerate += 1;
            }
            *value = weighted;
        }
        degenerate
    };

    #[cfg(feature = "rayon")]
    let degenerate: usize = output
        .par_chunks_mut(width)
        .enumerate()
        .map(|(ly, row)| blend_row(ly, row))
        .sum();

    #[cfg(not(feature = "rayon"))]
    let degenerate: usize = output
        .chunks_mut(width)
        .enumerate()
        .map(|(ly, row)| blend_row(ly, row))
        .sum();

    (output, degenerate)
}
