use serde::{Deserialize, Serialize};

use crate::error::{RepairError, RepairResult};

/// Pair of multipliers applied to the annotated radii.
///
/// A pixel belongs to the band when it lies inside the ellipse scaled by
/// `max` and outside the ellipse scaled by `min`. `min = 0` selects a
/// filled ellipse.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleBand {
    pub min: f32,
    pub max: f32,
}

impl ScaleBand {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Filled ellipse at `scale`
    pub const fn disc(scale: f32) -> Self {
        Self {
            min: 0.0,
            max: scale,
        }
    }

    fn validate(&self, name: &str) -> RepairResult<()> {
        if !self.min.is_finite() || !self.max.is_finite() {
            return Err(RepairError::InvalidConfig(format!(
                "{name} band must be finite"
            )));
        }
        if self.min < 0.0 {
            return Err(RepairError::InvalidConfig(format!(
                "{name} band min must be non-negative, got {}",
                self.min
            )));
        }
        if self.min >= self.max {
            return Err(RepairError::InvalidConfig(format!(
                "{name} band min ({}) must be below max ({})",
                self.min, self.max
            )));
        }
        Ok(())
    }
}

/// How the interpolation source is read at non-integer positions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sampling {
    Nearest,
    #[default]
    Bilinear,
}

/// Tunable constants of the repair.
///
/// The defaults are the empirical values the tool has always used; they
/// have no derivation beyond "works on typical donuts".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepairConfig {
    /// Annulus sampled for the surrounding sky brightness.
    pub ring: ScaleBand,
    /// Radius multiplier of the disc sampled for the donut brightness.
    pub core_scale: f32,
    /// Transition annulus rebuilt by radial interpolation.
    pub blend: ScaleBand,
    /// Minimum half-extent of the working window, in radii.
    pub window_scale: f32,
    /// Sigma of the Gaussian blur applied to the full-ellipse mask.
    pub smoothing_sigma: f32,
    /// Taps of the box average that smooths the interpolation source. Must be odd.
    pub box_size: u32,
    pub sampling: Sampling,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            ring: ScaleBand::new(1.15, 1.25),
            core_scale: 0.8,
            blend: ScaleBand::new(0.75, 1.25),
            window_scale: 1.4,
            smoothing_sigma: 8.3,
            box_size: 7,
            sampling: Sampling::Bilinear,
        }
    }
}

impl RepairConfig {
    pub fn validate(&self) -> RepairResult<()> {
        self.ring.validate("ring")?;
        self.blend.validate("blend")?;

        if !(self.core_scale.is_finite() && self.core_scale > 0.0) {
            return Err(RepairError::InvalidConfig(format!(
                "core scale must be positive, got {}",
                self.core_scale
            )));
        }
        if !(self.smoothing_sigma.is_finite() && self.smoothing_sigma > 0.0) {
            return Err(RepairError::InvalidConfig(format!(
                "smoothing sigma must be positive, got {}",
                self.smoothing_sigma
            )));
        }
        if self.box_size == 0 || self.box_size % 2 == 0 {
            return Err(RepairError::InvalidConfig(format!(
                "box size must be odd, got {}",
                self.box_size
            )));
        }
        if !self.window_scale.is_finite() || self.window_scale < self.outer_scale_of_bands() {
            return Err(RepairError::InvalidConfig(format!(
                "window scale {} does not cover the ring and blend bands",
                self.window_scale
            )));
        }
        Ok(())
    }

    /// Core sampling disc as a band
    pub fn core(&self) -> ScaleBand {
        ScaleBand::disc(self.core_scale)
    }

    fn outer_scale_of_bands(&self) -> f32 {
        self.ring.max.max(self.blend.max).max(self.core_scale)
    }

    /// Radius multiplier that bounds every region the repair touches
    pub fn outer_scale(&self) -> f32 {
        self.outer_scale_of_bands().max(self.window_scale)
    }

    /// Pixels by which the smoothing stages reach beyond the outermost region
    pub fn smoothing_reach(&self) -> u32 {
        (3.0 * self.smoothing_sigma).ceil() as u32 + self.box_size / 2
    }
}
