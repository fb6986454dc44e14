#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::error::{Region, RepairError, RepairResult};
use crate::field::GrayFloatImage;
use crate::geometry::WorkingWindow;

/// Median of `values`, sorting them in place.
///
/// Odd counts return the middle element, even counts the mean of the two
/// central elements. Returns `None` for an empty slice.
pub fn median(values: &mut [f32]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }

    #[cfg(feature = "rayon")]
    {
        values.par_sort_unstable_by(f32::total_cmp);
    }
    #[cfg(not(feature = "rayon"))]
    {
        values.sort_unstable_by(f32::total_cmp);
    }

    let n = values.len();
    if n % 2 == 1 {
        Some(values[n / 2])
    } else {
        Some((values[n / 2 - 1] + values[n / 2]) / 2.0)
    }
}

/// Source samples at every positive pixel of a window-local `mask`
pub fn masked_samples(
    source: &GrayFloatImage,
    mask: &GrayFloatImage,
    window: &WorkingWindow,
) -> Vec<f32> {
    mask.enumerate_pixels()
        .filter(|(_, _, m)| m[0] > 0.0)
        .map(|(lx, ly, _)| {
            let (x, y) = window.to_image(lx, ly);
            source.get_pixel(x, y)[0]
        })
        .collect()
}

/// Robust brightness of one sampling region
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionMedian {
    pub median: f32,
    pub samples: usize,
}

/// Median of `source` under the positive pixels of `mask`.
///
/// # Errors
///
/// Returns [`RepairError::EmptyRegion`] if the mask selects no pixel.
pub fn masked_median(
    source: &GrayFloatImage,
    mask: &GrayFloatImage,
    window: &WorkingWindow,
    region: Region,
) -> RepairResult<RegionMedian> {
    let mut samples = masked_samples(source, mask, window);
    let count = samples.len();
    let median = median(&mut samples).ok_or(RepairError::EmptyRegion(region))?;

    Ok(RegionMedian {
        median,
        samples: count,
    })
}

/// Ratio that lifts the donut to the brightness of its surroundings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrectionFactor {
    /// `median_ring / median_core`
    pub factor: f32,
    /// `1 / factor`
    pub inverse: f32,
}

impl CorrectionFactor {
    /// # Errors
    ///
    /// Returns [`RepairError::UndefinedCorrection`] if either median is not
    /// finite, the core median is zero, or the resulting factor is zero.
    pub fn from_medians(median_ring: f32, median_core: f32) -> RepairResult<Self> {
        let undefined = RepairError::UndefinedCorrection {
            median_ring,
            median_core,
        };
        if !median_ring.is_finite() || !median_core.is_finite() || median_core == 0.0 {
            return Err(undefined);
        }

        let factor = median_ring / median_core;
        if factor == 0.0 || !factor.is_finite() {
            return Err(undefined);
        }

        Ok(Self {
            factor,
            inverse: 1.0 / factor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_median_odd_and_even() {
        assert_eq!(median(&mut [3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&mut [4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&mut [7.5]), Some(7.5));
        assert_eq!(median(&mut []), None);
    }

    #[test]
    fn test_median_scale_invariance() {
        let values = [0.12, 0.9, 0.33, 0.41, 0.05, 0.77, 0.6, 0.2];
        let base = median(&mut values.clone()).unwrap();
        for k in [0.5f32, 2.0, 4.0, 1024.0] {
            let mut scaled: Vec<f32> = values.iter().map(|v| v * k).collect();
            assert_eq!(median(&mut scaled).unwrap(), k * base);
        }
    }

    #[test]
    fn test_masked_median_uses_window_offset() {
        let source = GrayFloatImage::from_fn(10, 10, |x, y| Luma([(x + 10 * y) as f32]));
        let window = WorkingWindow::clip(2.0, 3.0, 5.0, 5.0, 10, 10);
        let mut mask = GrayFloatImage::new(window.width(), window.height());
        mask.put_pixel(0, 0, Luma([1.0]));
        mask.put_pixel(2, 1, Luma([1.0]));
        mask.put_pixel(1, 1, Luma([0.0]));

        let result = masked_median(&source, &mask, &window, Region::Ring).unwrap();
        assert_eq!(result.samples, 2);
        // image pixels (2, 3) = 32 and (4, 4) = 44
        assert_eq!(result.median, 38.0);
    }

    #[test]
    fn test_empty_mask_is_an_error() {
        let source = GrayFloatImage::from_pixel(4, 4, Luma([1.0]));
        let window = WorkingWindow::clip(0.0, 0.0, 4.0, 4.0, 4, 4);
        let mask = GrayFloatImage::new(4, 4);
        assert_eq!(
            masked_median(&source, &mask, &window, Region::Core),
            Err(RepairError::EmptyRegion(Region::Core))
        );
    }

    #[test]
    fn test_correction_factor() {
        let factor = CorrectionFactor::from_medians(0.6, 0.3).unwrap();
        assert!((factor.factor - 2.0).abs() < 1e-6);
        assert!((factor.inverse - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_correction_factor_rejects_zero_and_nan() {
        assert!(matches!(
            CorrectionFactor::from_medians(0.6, 0.0),
            Err(RepairError::UndefinedCorrection { .. })
        ));
        assert!(CorrectionFactor::from_medians(f32::NAN, 0.3).is_err());
        assert!(CorrectionFactor::from_medians(0.6, f32::INFINITY).is_err());
        assert!(CorrectionFactor::from_medians(0.0, 0.3).is_err());
    }
}
