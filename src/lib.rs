#![doc = "Treezone public API"]
pub mod config;
pub mod detect;
pub mod io;
pub mod render;
pub mod zone;

#[doc(inline)]
pub use config::{PipelineConfig, ResolutionMode};

#[doc(inline)]
pub use detect::{CommandDetector, DetectParams, Detector};

#[doc(inline)]
pub use io::{read_zones, DirectorySink, ZoneCollection};

#[doc(inline)]
pub use render::{RasterImage, Renderer};

#[cfg(feature = "wms")]
#[doc(inline)]
pub use render::WmsRenderer;

#[doc(inline)]
pub use zone::{ArtifactSink, BatchError, BatchReport, ZoneOrchestrator, ZoneOutcome, ZoneState};

pub use zonegeom;
