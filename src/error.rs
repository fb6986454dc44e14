/// Sampling region whose median feeds the correction factor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    /// The annulus around the donut that represents the undisturbed sky
    Ring,
    /// The disc inside the donut
    Core,
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Region::Ring => write!(f, "ring"),
            Region::Core => write!(f, "core"),
        }
    }
}

/// Errors that can occur during dust donut repair
#[derive(Debug, Clone, PartialEq)]
pub enum RepairError {
    /// The image has more than one channel
    NotMonochrome { channels: u8 },
    /// No annotation was supplied
    NoAnnotation,
    /// The annotation has fewer points than an ellipse needs
    TooFewPoints(usize),
    /// Source and target images differ in size
    DimensionMismatch {
        source: (u32, u32),
        target: (u32, u32),
    },
    /// The downsampling factor was below 1 or not finite
    InvalidDownsampling(f32),
    /// A configuration value is out of range
    InvalidConfig(String),
    /// The annotation's bounding box collapses in at least one axis
    DegenerateGeometry { radius_x: f32, radius_y: f32 },
    /// A sampling mask selected no pixels inside the image
    EmptyRegion(Region),
    /// The core median is zero or not finite
    UndefinedCorrection { median_ring: f32, median_core: f32 },
}

impl std::fmt::Display for RepairError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RepairError::NotMonochrome { channels } => {
                write!(f, "only single-channel images are supported, got {channels} channels")
            }
            RepairError::NoAnnotation => write!(f, "no donut was selected with a shape"),
            RepairError::TooFewPoints(count) => {
                write!(f, "annotation needs at least 3 points, got {count}")
            }
            RepairError::DimensionMismatch { source, target } => write!(
                f,
                "source is {}x{} but target is {}x{}",
                source.0, source.1, target.0, target.1
            ),
            RepairError::InvalidDownsampling(value) => {
                write!(f, "downsampling factor must be finite and at least 1, got {value}")
            }
            RepairError::InvalidConfig(reason) => write!(f, "invalid configuration: {reason}"),
            RepairError::DegenerateGeometry { radius_x, radius_y } => write!(
                f,
                "annotation is degenerate (radius_x={radius_x}, radius_y={radius_y})"
            ),
            RepairError::EmptyRegion(region) => {
                write!(f, "{region} sampling region contains no image pixels")
            }
            RepairError::UndefinedCorrection {
                median_ring,
                median_core,
            } => write!(
                f,
                "correction factor undefined (ring median {median_ring}, core median {median_core})"
            ),
        }
    }
}

impl std::error::Error for RepairError {}

/// Result type for repair operations
pub type RepairResult<T> = Result<T, RepairError>;
