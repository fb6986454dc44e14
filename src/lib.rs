//! Dust donut repair library
//!
//! This library removes "dust donuts" from single-channel astronomical
//! images. A donut is the ring-shaped shadow an out-of-focus dust particle
//! casts on the sensor; it darkens a roughly elliptical patch of sky.
//!
//! # Overview
//!
//! The user outlines the donut on a (possibly downsampled) preview. The
//! bounding box of that outline defines an ellipse `E` in full-resolution
//! coordinates, and the repair
//!
//! 1. samples the median brightness of a ring just outside the donut
//!    (`1.15..1.25 × E`) and of a disc inside it (`0.8 × E`),
//! 2. derives the correction factor
//!    ```text
//!    factor = median(ring) / median(core)
//!    ```
//! 3. blurs the filled ellipse into a soft weight `S` and lifts the target
//!    `T` through it:
//!    ```text
//!    C = S × factor × T + (1 - S) × T
//!    ```
//! 4. rebuilds the transition band `0.75..1.25 × E` by interpolating a
//!    smoothed copy of `C` along rays from the ellipse center, so no edge
//!    of the binary masks survives,
//! 5. writes `C` into the target.
//!
//! All work is confined to a working window around the ellipse; pixels
//! outside it are never read or written.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use donut_repair::{repair_dynamic_image, Annotation, DownsamplingFactor, RepairSession};
//!
//! let image = image::open("images/flat.tif").unwrap();
//! let annotation = Annotation::from_drag([210.0, 140.0], [262.0, 190.0]);
//! let session = RepairSession::new(annotation, DownsamplingFactor::new(4.0).unwrap());
//!
//! let repaired = repair_dynamic_image(&image, &session).unwrap();
//! donut_repair::float_to_luma16(&repaired).save("repaired.png").unwrap();
//! ```
//!
//! # Failure Semantics
//!
//! The repair is all-or-nothing: every check and every intermediate field
//! is computed before the target is touched, so any error leaves the target
//! bit-identical to its input.

pub mod annotation;
pub mod blend;
pub mod config;
pub mod error;
pub mod field;
pub mod geometry;
pub mod mask;
pub mod stats;

use image::{DynamicImage, Luma};
use tracing::{debug, info, warn};

pub use annotation::{Annotation, DownsamplingFactor, PreviewZoom};
pub use config::{RepairConfig, Sampling, ScaleBand};
pub use error::{Region, RepairError, RepairResult};
pub use field::{float_to_luma16, GrayFloatImage};
pub use geometry::{EllipseGeometry, WorkingWindow};
pub use stats::{CorrectionFactor, RegionMedian};

/// Everything one repair needs besides the pixels.
///
/// A session is built once per repair and passed by reference through the
/// pipeline; nothing in it is mutated while the repair runs.
#[derive(Debug, Clone, PartialEq)]
pub struct RepairSession {
    /// Outline of the donut in preview coordinates
    pub annotation: Annotation,
    /// Scale from preview to full-resolution coordinates
    pub downsampling: DownsamplingFactor,
    pub config: RepairConfig,
}

impl RepairSession {
    pub fn new(annotation: Annotation, downsampling: DownsamplingFactor) -> Self {
        Self {
            annotation,
            downsampling,
            config: RepairConfig::default(),
        }
    }

    pub fn with_config(mut self, config: RepairConfig) -> Self {
        self.config = config;
        self
    }

    /// Compute the correction for `target`, measuring brightness on `source`.
    ///
    /// Neither image is modified. Use [`Correction::apply`] to commit.
    ///
    /// # Errors
    ///
    /// - [`RepairError::InvalidConfig`] if the configuration is out of range
    /// - [`RepairError::NoAnnotation`] / [`RepairError::TooFewPoints`] for an unusable outline
    /// - [`RepairError::DimensionMismatch`] if source and target differ in size
    /// - [`RepairError::DegenerateGeometry`] if the outline has no extent
    /// - [`RepairError::EmptyRegion`] if the ring or core misses the image
    /// - [`RepairError::UndefinedCorrection`] if the core median is zero or not finite
    pub fn compute(
        &self,
        source: &GrayFloatImage,
        target: &GrayFloatImage,
    ) -> RepairResult<Correction> {
        let config = &self.config;
        config.validate()?;
        self.annotation.validate()?;

        if source.dimensions() != target.dimensions() {
            return Err(RepairError::DimensionMismatch {
                source: source.dimensions(),
                target: target.dimensions(),
            });
        }
        let (width, height) = source.dimensions();

        let geometry = EllipseGeometry::from_annotation(&self.annotation, self.downsampling)?;
        debug!(
            "ellipse center=({:.1}, {:.1}) radii=({:.1}, {:.1})",
            geometry.center_x, geometry.center_y, geometry.radius_x, geometry.radius_y
        );

        let window = WorkingWindow::around(&geometry, config, width, height);
        if window.clipped {
            warn!(
                "working window clipped to image bounds: [{}, {}) x [{}, {})",
                window.x0, window.x1, window.y0, window.y1
            );
        } else {
            debug!(
                "working window [{}, {}) x [{}, {})",
                window.x0, window.x1, window.y0, window.y1
            );
        }

        let ring_mask = mask::region_mask(&geometry, config.ring, &window);
        let ring = stats::masked_median(source, &ring_mask, &window, Region::Ring)?;
        info!("Median of ring: {} ({} samples)", ring.median, ring.samples);

        let core_mask = mask::region_mask(&geometry, config.core(), &window);
        let core = stats::masked_median(source, &core_mask, &window, Region::Core)?;
        info!("Median of core: {} ({} samples)", core.median, core.samples);

        let correction = CorrectionFactor::from_medians(ring.median, core.median)?;
        info!("Correction factor: {}", correction.factor);

        let fields = blend::synthesize(target, &geometry, &window, correction, config);
        let (field, degenerate_pixels) = blend::radial_blend(&fields, &geometry, &window, config);
        if degenerate_pixels > 0 {
            debug!("{degenerate_pixels} blend pixels fell back to the outer sample");
        }

        Ok(Correction {
            field,
            window,
            image_size: (width, height),
            stats: CorrectionStats {
                geometry,
                window,
                ring,
                core,
                correction,
                degenerate_pixels,
            },
        })
    }

    /// Repair `image` in place, using it as both source and target
    pub fn run(&self, image: &mut GrayFloatImage) -> RepairResult<CorrectionStats> {
        let correction = self.compute(&*image, &*image)?;
        correction.apply(image)
    }
}

/// Diagnostics of one repair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrectionStats {
    pub geometry: EllipseGeometry,
    pub window: WorkingWindow,
    pub ring: RegionMedian,
    pub core: RegionMedian,
    pub correction: CorrectionFactor,
    /// Blend pixels whose ray had no ring thickness
    pub degenerate_pixels: usize,
}

/// Final correction field, ready to be written into the target.
///
/// Applying consumes the correction, so a computed field is committed at
/// most once.
#[derive(Debug)]
pub struct Correction {
    field: GrayFloatImage,
    window: WorkingWindow,
    image_size: (u32, u32),
    stats: CorrectionStats,
}

impl Correction {
    /// Window-local field that replaces the target pixels
    pub fn field(&self) -> &GrayFloatImage {
        &self.field
    }

    pub fn window(&self) -> &WorkingWindow {
        &self.window
    }

    pub fn stats(&self) -> &CorrectionStats {
        &self.stats
    }

    /// Overwrite the working window of `target` with the correction field.
    ///
    /// # Errors
    ///
    /// Returns [`RepairError::DimensionMismatch`] if `target` is not the
    /// image the correction was computed for; `target` is left untouched.
    pub fn apply(self, target: &mut GrayFloatImage) -> RepairResult<CorrectionStats> {
        if target.dimensions() != self.image_size {
            return Err(RepairError::DimensionMismatch {
                source: self.image_size,
                target: target.dimensions(),
            });
        }

        for (lx, ly, pixel) in self.field.enumerate_pixels() {
            let (x, y) = self.window.to_image(lx, ly);
            target.put_pixel(x, y, Luma([pixel[0]]));
        }

        Ok(self.stats)
    }
}

/// Convert a decoded image to a float buffer, rejecting multi-channel data
///
/// # Errors
///
/// Returns [`RepairError::NotMonochrome`] if the image has more than one channel.
pub fn to_monochrome(image: &DynamicImage) -> RepairResult<GrayFloatImage> {
    let channels = image.color().channel_count();
    if channels > 1 {
        return Err(RepairError::NotMonochrome { channels });
    }
    Ok(image.to_luma32f())
}

/// Repair a dust donut in `source`, using `source` for both measurement and target.
///
/// Returns the corrected image; `source` itself is not modified.
pub fn repair_dust_donut(
    source: &GrayFloatImage,
    session: &RepairSession,
) -> RepairResult<GrayFloatImage> {
    let correction = session.compute(source, source)?;
    let mut target = source.clone();
    correction.apply(&mut target)?;
    Ok(target)
}

/// Repair a dust donut in a decoded image
///
/// # Errors
///
/// Returns [`RepairError::NotMonochrome`] for colour images, otherwise any
/// error of [`RepairSession::compute`].
pub fn repair_dynamic_image(
    image: &DynamicImage,
    session: &RepairSession,
) -> RepairResult<GrayFloatImage> {
    let mono = to_monochrome(image)?;
    repair_dust_donut(&mono, session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, RgbImage};

    /// 100x100 sky at 0.6 with a donut of radius 20 at 0.3
    fn donut_image() -> GrayFloatImage {
        GrayFloatImage::from_fn(100, 100, |x, y| {
            let dx = x as f32 - 50.0;
            let dy = y as f32 - 50.0;
            if dx * dx + dy * dy <= 400.0 {
                Luma([0.3])
            } else {
                Luma([0.6])
            }
        })
    }

    fn donut_session() -> RepairSession {
        let annotation =
            Annotation::new(vec![[30.0, 50.0], [50.0, 30.0], [70.0, 50.0], [50.0, 70.0]]);
        RepairSession::new(annotation, DownsamplingFactor::FULL)
    }

    fn assert_bit_identical(a: &GrayFloatImage, b: &GrayFloatImage) {
        assert_eq!(a.dimensions(), b.dimensions());
        for (pa, pb) in a.pixels().zip(b.pixels()) {
            assert_eq!(pa[0].to_bits(), pb[0].to_bits());
        }
    }

    #[test]
    fn test_correction_factor_round_trip() {
        let mut image = donut_image();
        let stats = donut_session().run(&mut image).unwrap();

        assert_eq!(stats.ring.median, 0.6);
        assert_eq!(stats.core.median, 0.3);
        assert!((stats.correction.factor - 2.0).abs() < 1e-5);
        assert_eq!(stats.degenerate_pixels, 0);

        for (x, y) in [(50, 50), (55, 50), (50, 46)] {
            let value = image.get_pixel(x, y)[0];
            assert!((value - 0.6).abs() < 0.03, "core pixel ({x}, {y}) = {value}");
        }
        assert!((image.get_pixel(0, 0)[0] - 0.6).abs() < 1e-3);
        assert!((image.get_pixel(99, 99)[0] - 0.6).abs() < 1e-3);
    }

    #[test]
    fn test_correction_is_finite_and_non_negative() {
        let image = donut_image();
        let repaired = repair_dust_donut(&image, &donut_session()).unwrap();
        for pixel in repaired.pixels() {
            assert!(pixel[0].is_finite());
            assert!(pixel[0] >= 0.0);
        }
    }

    #[test]
    fn test_pixels_outside_window_untouched() {
        let image = GrayFloatImage::from_fn(300, 300, |x, y| {
            Luma([((x * 7 + y * 13) % 97) as f32 / 97.0 + 0.1])
        });
        let annotation = Annotation::new(vec![
            [130.0, 150.0],
            [150.0, 130.0],
            [170.0, 150.0],
            [150.0, 170.0],
        ]);
        let session = RepairSession::new(annotation, DownsamplingFactor::FULL);
        let correction = session.compute(&image, &image).unwrap();
        let window = *correction.window();
        assert!(!window.clipped);

        let mut target = image.clone();
        correction.apply(&mut target).unwrap();
        for (x, y, pixel) in target.enumerate_pixels() {
            let inside = x >= window.x0 && x < window.x1 && y >= window.y0 && y < window.y1;
            if !inside {
                assert_eq!(pixel[0].to_bits(), image.get_pixel(x, y)[0].to_bits());
            }
        }
    }

    #[test]
    fn test_zero_core_leaves_target_unchanged() {
        let mut image = donut_image();
        for pixel in image.pixels_mut() {
            if pixel[0] == 0.3 {
                *pixel = Luma([0.0]);
            }
        }
        let before = image.clone();

        let result = donut_session().run(&mut image);
        assert!(matches!(result, Err(RepairError::UndefinedCorrection { .. })));
        assert_bit_identical(&image, &before);
    }

    #[test]
    fn test_region_outside_image_leaves_target_unchanged() {
        let mut image = donut_image();
        let before = image.clone();
        let annotation = Annotation::new(vec![[500.0, 520.0], [520.0, 500.0], [540.0, 520.0]]);
        let session = RepairSession::new(annotation, DownsamplingFactor::FULL);

        let result = session.run(&mut image);
        assert_eq!(result, Err(RepairError::EmptyRegion(Region::Ring)));
        assert_bit_identical(&image, &before);
    }

    #[test]
    fn test_core_outside_image_leaves_target_unchanged() {
        // ring reaches x = 7.5 at the left edge, the 0.8 core stops at x = -6
        let mut image = donut_image();
        let before = image.clone();
        let annotation =
            Annotation::new(vec![[-60.0, 50.0], [-30.0, 20.0], [0.0, 50.0], [-30.0, 80.0]]);
        let session = RepairSession::new(annotation, DownsamplingFactor::FULL);

        let result = session.run(&mut image);
        assert_eq!(result, Err(RepairError::EmptyRegion(Region::Core)));
        assert_bit_identical(&image, &before);
    }

    #[test]
    fn test_degenerate_annotation_rejected() {
        let mut image = donut_image();
        let before = image.clone();
        let flat = Annotation::new(vec![[30.0, 50.0], [50.0, 50.0], [70.0, 50.0]]);
        let session = RepairSession::new(flat, DownsamplingFactor::FULL);

        assert!(matches!(
            session.run(&mut image),
            Err(RepairError::DegenerateGeometry { .. })
        ));
        assert_bit_identical(&image, &before);
    }

    #[test]
    fn test_missing_annotation_rejected() {
        let session = RepairSession::new(Annotation::default(), DownsamplingFactor::FULL);
        let image = donut_image();
        assert_eq!(
            repair_dust_donut(&image, &session).map(|_| ()),
            Err(RepairError::NoAnnotation)
        );
    }

    #[test]
    fn test_invalid_config_rejected_before_work() {
        let config = RepairConfig {
            blend: ScaleBand::new(1.25, 0.75),
            ..Default::default()
        };
        let session = donut_session().with_config(config);
        let image = donut_image();
        assert!(matches!(
            session.compute(&image, &image),
            Err(RepairError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_dimension_mismatch() {
        let source = donut_image();
        let target = GrayFloatImage::new(50, 50);
        assert_eq!(
            donut_session().compute(&source, &target).map(|_| ()),
            Err(RepairError::DimensionMismatch {
                source: (100, 100),
                target: (50, 50),
            })
        );
    }

    #[test]
    fn test_apply_rejects_other_image() {
        let image = donut_image();
        let correction = donut_session().compute(&image, &image).unwrap();
        let mut other = GrayFloatImage::new(64, 64);
        assert!(correction.apply(&mut other).is_err());
        assert!(other.pixels().all(|p| p[0] == 0.0));
    }

    #[test]
    fn test_clipped_window_stays_in_bounds() {
        // donut hanging over the top-left corner
        let image = GrayFloatImage::from_fn(80, 80, |x, y| {
            let dx = x as f32 - 10.0;
            let dy = y as f32 - 12.0;
            if dx * dx + dy * dy <= 225.0 {
                Luma([0.2])
            } else {
                Luma([0.5])
            }
        });
        let annotation =
            Annotation::new(vec![[-5.0, 12.0], [10.0, -3.0], [25.0, 12.0], [10.0, 27.0]]);
        let session = RepairSession::new(annotation, DownsamplingFactor::FULL);

        let correction = session.compute(&image, &image).unwrap();
        let window = *correction.window();
        assert!(window.clipped);
        assert_eq!((window.x0, window.y0), (0, 0));
        assert_eq!(correction.field().dimensions(), (window.width(), window.height()));
        assert!(window.x1 <= 80 && window.y1 <= 80);

        let stats = correction.stats().correction;
        assert!((stats.factor - 2.5).abs() < 1e-5);
    }

    #[test]
    fn test_downsampled_annotation() {
        let mut image = donut_image();
        let annotation =
            Annotation::new(vec![[15.0, 25.0], [25.0, 15.0], [35.0, 25.0], [25.0, 35.0]]);
        let session = RepairSession::new(annotation, DownsamplingFactor::new(2.0).unwrap());
        let stats = session.run(&mut image).unwrap();

        assert_eq!(stats.geometry.center_x, 50.0);
        assert_eq!(stats.geometry.radius_y, 20.0);
        assert!((stats.correction.factor - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_repair_dynamic_image_rejects_color() {
        let image = DynamicImage::ImageRgb8(RgbImage::new(10, 10));
        assert_eq!(
            repair_dynamic_image(&image, &donut_session()).map(|_| ()),
            Err(RepairError::NotMonochrome { channels: 3 })
        );
    }

    #[test]
    fn test_repair_dynamic_image_gray() {
        let gray = GrayImage::from_fn(100, 100, |x, y| {
            let dx = x as f32 - 50.0;
            let dy = y as f32 - 50.0;
            if dx * dx + dy * dy <= 400.0 {
                Luma([60])
            } else {
                Luma([120])
            }
        });
        let image = DynamicImage::ImageLuma8(gray);
        let repaired = repair_dynamic_image(&image, &donut_session()).unwrap();

        assert_eq!(repaired.dimensions(), (100, 100));
        let center = repaired.get_pixel(50, 50)[0];
        assert!((center - 120.0 / 255.0).abs() < 0.03, "center {center}");
    }
}
