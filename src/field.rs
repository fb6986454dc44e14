//! Single-channel float buffers and the small set of operations the repair
//! performs on them: sub-pixel sampling, separable smoothing and export.

use image::{ImageBuffer, Luma};
use imageproc::filter::{gaussian_blur_f32, separable_filter_equal};

use crate::config::Sampling;

/// Single-channel image or mask with `f32` samples
pub type GrayFloatImage = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Read `field` at a continuous position.
///
/// Positions outside the buffer are clamped to the nearest edge pixel.
pub fn sample(field: &GrayFloatImage, x: f32, y: f32, sampling: Sampling) -> f32 {
    match sampling {
        Sampling::Nearest => sample_nearest(field, x, y),
        Sampling::Bilinear => sample_bilinear(field, x, y),
    }
}

fn sample_nearest(field: &GrayFloatImage, x: f32, y: f32) -> f32 {
    let (width, height) = field.dimensions();
    let xi = clamp_index(x.round(), width);
    let yi = clamp_index(y.round(), height);
    field.get_pixel(xi, yi)[0]
}

fn sample_bilinear(field: &GrayFloatImage, x: f32, y: f32) -> f32 {
    let (width, height) = field.dimensions();
    let x = x.clamp(0.0, (width - 1) as f32);
    let y = y.clamp(0.0, (height - 1) as f32);

    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = field.get_pixel(x0, y0)[0];
    let p10 = field.get_pixel(x1, y0)[0];
    let p01 = field.get_pixel(x0, y1)[0];
    let p11 = field.get_pixel(x1, y1)[0];

    (1.0 - fx) * (1.0 - fy) * p00 + fx * (1.0 - fy) * p10 + (1.0 - fx) * fy * p01 + fx * fy * p11
}

fn clamp_index(value: f32, len: u32) -> u32 {
    if value <= 0.0 {
        0
    } else {
        (value as u32).min(len - 1)
    }
}

/// Gaussian low-pass of a mask or field
pub fn smooth(field: &GrayFloatImage, sigma: f32) -> GrayFloatImage {
    gaussian_blur_f32(field, sigma)
}

/// Normalized separable box average with `size` taps per axis.
///
/// Edges are handled by repeating the border sample.
pub fn box_average(field: &GrayFloatImage, size: u32) -> GrayFloatImage {
    let (width, height) = field.dimensions();
    if width == 0 || height == 0 || size <= 1 {
        return field.clone();
    }

    let kernel = vec![1.0 / size as f32; size as usize];
    separable_filter_equal(field, &kernel)
}

/// Convert samples in [0, 1] to 16-bit grayscale for export
pub fn float_to_luma16(field: &GrayFloatImage) -> ImageBuffer<Luma<u16>, Vec<u16>> {
    let (width, height) = field.dimensions();
    let mut output = ImageBuffer::new(width, height);

    for (x, y, pixel) in field.enumerate_pixels() {
        let value = (pixel[0].clamp(0.0, 1.0) * 65535.0 + 0.5) as u16;
        output.put_pixel(x, y, Luma([value]));
    }

    output
}
