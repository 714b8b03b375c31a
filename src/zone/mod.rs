//! Per-zone processing: state, outcomes, artifact naming and the batch loop.

mod naming;
mod orchestrator;

use std::fmt;

use serde::Serialize;
use thiserror::Error;
use zonegeom::{AssessedDetection, CrsError, DetectionBox, GeoPolygon, GeometryError, PixelPolygon, ProjectError, TileBounds};

use crate::detect::DetectError;
use crate::render::{RasterImage, RenderError};

pub use naming::ArtifactNames;
pub use orchestrator::ZoneOrchestrator;

/// Where a zone is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneState {
    Pending,
    Rendering,
    Projecting,
    Detecting,
    Filtering,
    Persisting,
    Done,
    Skipped,
    Failed,
}

impl fmt::Display for ZoneState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ZoneState::Pending => "pending",
            ZoneState::Rendering => "rendering",
            ZoneState::Projecting => "projecting",
            ZoneState::Detecting => "detecting",
            ZoneState::Filtering => "filtering",
            ZoneState::Persisting => "persisting",
            ZoneState::Done => "done",
            ZoneState::Skipped => "skipped",
            ZoneState::Failed => "failed",
        })
    }
}

/// Everything derived for one zone, handed to the artifact sink.
#[derive(Debug, Clone)]
pub struct Zone {
    /// 1-based position in the input.
    pub index: usize,
    pub polygon: GeoPolygon,
    /// Bounds in the source CRS.
    pub tile_bounds: TileBounds,
    /// Bounds in the tile CRS.
    pub projected_bounds: TileBounds,
    pub image: RasterImage,
    pub pixel_polygon: PixelPolygon,
    /// Every raw detection with its zone test result.
    pub detections: Vec<AssessedDetection>,
}

impl Zone {
    /// Detections that passed the zone test.
    pub fn accepted(&self) -> impl Iterator<Item = &DetectionBox> + '_ {
        self.detections.iter().filter(|d| d.accepted).map(|d| &d.detection)
    }
}

/// Errors that end a single zone without stopping the batch.
#[derive(Debug, Error)]
pub enum ZoneError {
    #[error("polygon has {points} point(s), at least {min} required")]
    Validation { points: usize, min: usize },
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error(transparent)]
    Crs(#[from] CrsError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Detect(#[from] DetectError),
    #[error("failed to persist artifacts: {0:#}")]
    Persist(anyhow::Error),
}

impl From<ProjectError> for ZoneError {
    fn from(e: ProjectError) -> Self {
        match e {
            ProjectError::Geometry(e) => ZoneError::Geometry(e),
            ProjectError::Crs(e) => ZoneError::Crs(e),
        }
    }
}

impl ZoneError {
    /// Bad zone input (as opposed to a collaborator failure).
    pub fn is_skip(&self) -> bool {
        matches!(self, ZoneError::Validation { .. } | ZoneError::Geometry(_) | ZoneError::Crs(_))
    }
}

/// Errors that abort a whole batch.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("cannot establish working CRS: {0}")]
    Crs(#[from] CrsError),
    #[error("failed to write batch report: {0:#}")]
    Report(anyhow::Error),
}

/// Terminal state of one zone.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ZoneOutcome {
    Done { detections: usize, accepted: usize },
    Skipped { reason: String },
    Failed { stage: ZoneState, reason: String },
}

impl ZoneOutcome {
    pub fn state(&self) -> ZoneState {
        match self {
            ZoneOutcome::Done { .. } => ZoneState::Done,
            ZoneOutcome::Skipped { .. } => ZoneState::Skipped,
            ZoneOutcome::Failed { .. } => ZoneState::Failed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneReport {
    pub index: usize,
    #[serde(flatten)]
    pub outcome: ZoneOutcome,
}

/// Summary of a batch run, one entry per input zone in input order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    pub source_epsg: u32,
    pub tile_epsg: u32,
    pub zones: Vec<ZoneReport>,
}

impl BatchReport {
    fn count(&self, state: ZoneState) -> usize {
        self.zones.iter().filter(|z| z.outcome.state() == state).count()
    }

    #[inline] pub fn done(&self) -> usize { self.count(ZoneState::Done) }

    #[inline] pub fn skipped(&self) -> usize { self.count(ZoneState::Skipped) }

    #[inline] pub fn failed(&self) -> usize { self.count(ZoneState::Failed) }
}

/// Receives each finished zone's artifacts.
pub trait ArtifactSink {
    fn persist(&mut self, zone: &Zone, names: &ArtifactNames) -> anyhow::Result<()>;

    /// Called once after the last zone.
    fn finish(&mut self, _report: &BatchReport) -> anyhow::Result<()> { Ok(()) }
}

impl<S: ArtifactSink + ?Sized> ArtifactSink for &mut S {
    fn persist(&mut self, zone: &Zone, names: &ArtifactNames) -> anyhow::Result<()> {
        (**self).persist(zone, names)
    }

    fn finish(&mut self, report: &BatchReport) -> anyhow::Result<()> {
        (**self).finish(report)
    }
}
