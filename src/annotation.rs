use serde::{Deserialize, Serialize};

use crate::error::{RepairError, RepairResult};

/// Angular step between points of a drawn ellipse, in radians
const ELLIPSE_STEP: f32 = 0.01;

/// Closed boundary drawn around a donut on the preview image.
///
/// Coordinates are preview pixels. Only the bounding box of the points is
/// used by the repair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub points: Vec<[f32; 2]>,
}

impl Annotation {
    pub fn new(points: Vec<[f32; 2]>) -> Self {
        Self { points }
    }

    /// Ellipse inscribed in the rectangle spanned by a mouse drag
    pub fn from_drag(start: [f32; 2], end: [f32; 2]) -> Self {
        let center_x = (start[0] + end[0]) / 2.0;
        let center_y = (start[1] + end[1]) / 2.0;
        let radius_x = (end[0] - start[0]).abs() / 2.0;
        let radius_y = (end[1] - start[1]).abs() / 2.0;

        let steps = (std::f32::consts::TAU / ELLIPSE_STEP).ceil() as usize;
        let points = (0..steps)
            .map(|i| {
                let angle = i as f32 * ELLIPSE_STEP;
                [
                    center_x + radius_x * angle.cos(),
                    center_y + radius_y * angle.sin(),
                ]
            })
            .collect();

        Self { points }
    }

    /// Copy with every point scaled by `ratio` and rounded to whole pixels.
    ///
    /// This is what happens to the drawn shapes when the preview zoom level
    /// changes.
    pub fn rescaled(&self, ratio: f32) -> Self {
        let points = self
            .points
            .iter()
            .map(|p| [(p[0] * ratio).round(), (p[1] * ratio).round()])
            .collect();
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Ensure the annotation can describe an ellipse
    pub fn validate(&self) -> RepairResult<()> {
        match self.points.len() {
            0 => Err(RepairError::NoAnnotation),
            n if n < 3 => Err(RepairError::TooFewPoints(n)),
            _ => Ok(()),
        }
    }

    /// Axis-aligned bounding box as `(min_x, min_y, max_x, max_y)`
    pub fn bounds(&self) -> Option<(f32, f32, f32, f32)> {
        let first = self.points.first()?;
        let init = (first[0], first[1], first[0], first[1]);
        Some(self.points.iter().fold(init, |(x0, y0, x1, y1), p| {
            (x0.min(p[0]), y0.min(p[1]), x1.max(p[0]), y1.max(p[1]))
        }))
    }
}

/// Ratio between full-resolution and preview pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f32", into = "f32")]
pub struct DownsamplingFactor(f32);

impl DownsamplingFactor {
    pub const FULL: DownsamplingFactor = DownsamplingFactor(1.0);

    pub fn new(value: f32) -> RepairResult<Self> {
        if !value.is_finite() || value < 1.0 {
            return Err(RepairError::InvalidDownsampling(value));
        }
        Ok(Self(value))
    }

    pub fn get(self) -> f32 {
        self.0
    }
}

impl Default for DownsamplingFactor {
    fn default() -> Self {
        Self::FULL
    }
}

impl TryFrom<f32> for DownsamplingFactor {
    type Error = RepairError;

    fn try_from(value: f32) -> RepairResult<Self> {
        Self::new(value)
    }
}

impl From<DownsamplingFactor> for f32 {
    fn from(factor: DownsamplingFactor) -> f32 {
        factor.0
    }
}

/// Zoom levels offered for the annotation preview
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewZoom {
    /// 1:1
    Full,
    /// 1:2
    Half,
    /// 1:4
    Quarter,
    /// 1:8
    Eighth,
    /// Largest integer reduction that fits the image width into the preview
    FitToPreview { preview_width: u32 },
}

impl PreviewZoom {
    pub fn downsampling(self, image_width: u32) -> DownsamplingFactor {
        let factor = match self {
            PreviewZoom::Full => 1,
            PreviewZoom::Half => 2,
            PreviewZoom::Quarter => 4,
            PreviewZoom::Eighth => 8,
            PreviewZoom::FitToPreview { preview_width } => {
                image_width.checked_div(preview_width).unwrap_or(1).max(1)
            }
        };
        DownsamplingFactor(factor as f32)
    }
}
