//! Detector interface.

mod command;

use thiserror::Error;
use zonegeom::DetectionBox;

use crate::render::RasterImage;

pub use command::CommandDetector;

#[derive(Debug, Error)]
pub enum DetectError {
    #[error("failed to stage tile for the detector: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode tile for the detector: {0}")]
    Encode(#[from] image::ImageError),
    #[error("detector exited with {status}: {stderr}")]
    Process { status: String, stderr: String },
    #[error("unreadable detector output: {0}")]
    Output(String),
}

/// Patch parameters for a detection run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectParams {
    /// Patch edge length in pixels.
    pub patch_size: u32,
    /// Fractional overlap between neighbouring patches.
    pub patch_overlap: f64,
    /// IoU above which overlapping boxes from neighbouring patches are merged.
    pub iou_threshold: f64,
}

impl Default for DetectParams {
    fn default() -> Self {
        Self { patch_size: 400, patch_overlap: 0.15, iou_threshold: 0.15 }
    }
}

/// Finds trees in a raster. Boxes are in the raster's pixel space.
pub trait Detector {
    fn detect(&self, image: &RasterImage, params: &DetectParams) -> Result<Vec<DetectionBox>, DetectError>;
}

impl<D: Detector + ?Sized> Detector for &D {
    fn detect(&self, image: &RasterImage, params: &DetectParams) -> Result<Vec<DetectionBox>, DetectError> {
        (**self).detect(image, params)
    }
}
