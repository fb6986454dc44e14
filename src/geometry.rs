use crate::annotation::{Annotation, DownsamplingFactor};
use crate::config::{RepairConfig, ScaleBand};
use crate::error::{RepairError, RepairResult};

/// Radii at or below this many pixels are treated as zero
const RADIUS_EPSILON: f32 = 1e-3;

/// Axis-aligned ellipse in full-resolution pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EllipseGeometry {
    pub center_x: f32,
    pub center_y: f32,
    pub radius_x: f32,
    pub radius_y: f32,
}

impl EllipseGeometry {
    /// Ellipse inscribed in the annotation's bounding box, scaled to full resolution.
    ///
    /// # Errors
    ///
    /// - [`RepairError::NoAnnotation`] if the annotation has no points
    /// - [`RepairError::DegenerateGeometry`] if either radius is ~0
    pub fn from_annotation(
        annotation: &Annotation,
        downsampling: DownsamplingFactor,
    ) -> RepairResult<Self> {
        let (min_x, min_y, max_x, max_y) = annotation.bounds().ok_or(RepairError::NoAnnotation)?;
        let d = downsampling.get();
        let (x0, x1, y0, y1) = (min_x * d, max_x * d, min_y * d, max_y * d);

        let radius_x = (x1 - x0) / 2.0;
        let radius_y = (y1 - y0) / 2.0;
        if !(radius_x > RADIUS_EPSILON && radius_y > RADIUS_EPSILON) {
            return Err(RepairError::DegenerateGeometry { radius_x, radius_y });
        }

        Ok(Self {
            center_x: (x0 + x1) / 2.0,
            center_y: (y0 + y1) / 2.0,
            radius_x,
            radius_y,
        })
    }

    /// Whether `(x, y)` lies inside the ellipse with both radii multiplied by `scale`
    pub fn contains(&self, x: f32, y: f32, scale: f32) -> bool {
        if scale <= 0.0 {
            return false;
        }
        let u = (x - self.center_x) / (self.radius_x * scale);
        let v = (y - self.center_y) / (self.radius_y * scale);
        u * u + v * v <= 1.0
    }

    /// Whether `(x, y)` lies inside `band.max` and outside `band.min`
    pub fn in_band(&self, x: f32, y: f32, band: ScaleBand) -> bool {
        self.contains(x, y, band.max) && !self.contains(x, y, band.min)
    }

    /// Point on the scaled ellipse along the ray at `angle` from the center
    pub fn boundary_point(&self, angle: f32, scale: f32) -> (f32, f32) {
        (
            self.center_x + self.radius_x * scale * angle.cos(),
            self.center_y + self.radius_y * scale * angle.sin(),
        )
    }
}

/// Rectangle of pixels `[x0, x1) x [y0, y1)` that bounds all repair work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkingWindow {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
    /// Set when the image border cut the unclipped window
    pub clipped: bool,
}

impl WorkingWindow {
    /// Window covering every region of `config` plus the smoothing reach,
    /// clipped to a `width x height` image
    pub fn around(
        geometry: &EllipseGeometry,
        config: &RepairConfig,
        width: u32,
        height: u32,
    ) -> Self {
        let scale = config.outer_scale();
        let reach = config.smoothing_reach() as f32;
        let half_x = geometry.radius_x * scale + reach;
        let half_y = geometry.radius_y * scale + reach;

        Self::clip(
            (geometry.center_x - half_x).floor(),
            (geometry.center_y - half_y).floor(),
            (geometry.center_x + half_x).ceil() + 1.0,
            (geometry.center_y + half_y).ceil() + 1.0,
            width,
            height,
        )
    }

    /// Clip a continuous rectangle to `[0, width) x [0, height)`
    pub fn clip(x0: f32, y0: f32, x1: f32, y1: f32, width: u32, height: u32) -> Self {
        let clipped = x0 < 0.0 || y0 < 0.0 || x1 > width as f32 || y1 > height as f32;
        let cx0 = x0.clamp(0.0, width as f32) as u32;
        let cy0 = y0.clamp(0.0, height as f32) as u32;
        let cx1 = x1.clamp(cx0 as f32, width as f32) as u32;
        let cy1 = y1.clamp(cy0 as f32, height as f32) as u32;

        Self {
            x0: cx0,
            y0: cy0,
            x1: cx1,
            y1: cy1,
            clipped,
        }
    }

    pub fn width(&self) -> u32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> u32 {
        self.y1 - self.y0
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Image coordinates of the window-local pixel `(lx, ly)`
    pub fn to_image(&self, lx: u32, ly: u32) -> (u32, u32) {
        (self.x0 + lx, self.y0 + ly)
    }
}
