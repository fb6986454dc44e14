use image::Luma;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::config::ScaleBand;
use crate::field::GrayFloatImage;
use crate::geometry::{EllipseGeometry, WorkingWindow};

/// Binary membership mask of `band` over the working window.
///
/// The returned buffer is window-sized; local pixel `(lx, ly)` corresponds
/// to image pixel `(window.x0 + lx, window.y0 + ly)`. Values are 1.0 inside
/// the band and 0.0 elsewhere.
pub fn region_mask(
    geometry: &EllipseGeometry,
    band: ScaleBand,
    window: &WorkingWindow,
) -> GrayFloatImage {
    let width = window.width();
    let mut mask = GrayFloatImage::new(width, window.height());
    if window.is_empty() {
        return mask;
    }

    let fill_row = |ly: usize, row: &mut [f32]| {
        let y = (window.y0 + ly as u32) as f32;
        for (lx, value) in row.iter_mut().enumerate() {
            let x = (window.x0 + lx as u32) as f32;
            *value = if geometry.in_band(x, y, band) { 1.0 } else { 0.0 };
        }
    };

    #[cfg(feature = "rayon")]
    {
        mask.par_chunks_mut(width as usize)
            .enumerate()
            .for_each(|(ly, row)| fill_row(ly, row));
    }

    #[cfg(not(feature = "rayon"))]
    {
        mask.chunks_mut(width as usize)
            .enumerate()
            .for_each(|(ly, row)| fill_row(ly, row));
    }

    mask
}

/// Number of mask pixels above zero
pub fn positive_count(mask: &GrayFloatImage) -> usize {
    mask.pixels().filter(|p| p[0] > 0.0).count()
}

/// `1 - mask`, clamped to be non-negative
pub fn inverted(mask: &GrayFloatImage) -> GrayFloatImage {
    let mut output = mask.clone();
    for pixel in output.pixels_mut() {
        *pixel = Luma([(1.0 - pixel[0]).max(0.0)]);
    }
    output
}
