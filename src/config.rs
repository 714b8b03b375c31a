//! Pipeline configuration.
//!
//! Every tunable of a batch run lives here with its default, so the
//! orchestrator and adapters never carry their own literals. A config can be
//! loaded from JSON; missing fields fall back to the defaults below.

use std::{fmt, fs, path::Path, str::FromStr};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use zonegeom::{DEFAULT_IOA_THRESHOLD, EPSG_WEB_MERCATOR, EPSG_WGS84};

/// Imagery resolution requested for every zone of a batch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMode {
    #[default]
    Standard,
    /// Finer ground sampling and a larger detection patch.
    High,
}

impl fmt::Display for ResolutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResolutionMode::Standard => "standard",
            ResolutionMode::High => "high",
        })
    }
}

impl FromStr for ResolutionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(ResolutionMode::Standard),
            "high" => Ok(ResolutionMode::High),
            other => Err(format!("invalid resolution '{other}'; expected 'standard' or 'high'")),
        }
    }
}

/// Raster request parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RenderSettings {
    /// WMS endpoint (without query string).
    pub url: String,
    /// WMS layer name.
    pub layer: String,
    /// WMS style name, empty for the server default.
    pub style: String,
    /// Image MIME type requested from the server.
    pub format: String,
    /// Ground size of one pixel in tile-CRS units, standard resolution.
    pub pixel_size: f64,
    /// Ground size of one pixel in tile-CRS units, high resolution.
    pub pixel_size_high: f64,
    /// Upper bound on either image dimension; larger tiles are downsampled.
    pub max_dimension: u32,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            url: "https://data.geopf.fr/wms-r/wms".to_string(),
            layer: "ORTHOIMAGERY.ORTHOPHOTOS".to_string(),
            style: String::new(),
            format: "image/png".to_string(),
            pixel_size: 0.5,
            pixel_size_high: 0.2,
            max_dimension: 8_192,
            timeout_secs: 60,
        }
    }
}

impl RenderSettings {
    pub fn pixel_size_for(&self, mode: ResolutionMode) -> f64 {
        match mode {
            ResolutionMode::Standard => self.pixel_size,
            ResolutionMode::High => self.pixel_size_high,
        }
    }
}

/// Parameters handed to the detector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DetectionSettings {
    /// Patch edge length in pixels, standard resolution.
    pub patch_size: u32,
    /// Patch edge length in pixels, high resolution.
    pub patch_size_high: u32,
    /// Fractional overlap between neighbouring patches.
    pub patch_overlap: f64,
    /// IoU threshold for merging boxes across patches.
    pub iou_threshold: f64,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            patch_size: 400,
            patch_size_high: 800,
            patch_overlap: 0.15,
            iou_threshold: 0.15,
        }
    }
}

impl DetectionSettings {
    pub fn patch_size_for(&self, mode: ResolutionMode) -> u32 {
        match mode {
            ResolutionMode::Standard => self.patch_size,
            ResolutionMode::High => self.patch_size_high,
        }
    }
}

/// Zone clipping parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FilterSettings {
    /// Keep a detection when its intersection-over-area with the zone is above this.
    pub ioa_threshold: f64,
    /// When false, detections over the whole tile are kept.
    pub clip_to_zone: bool,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self { ioa_threshold: DEFAULT_IOA_THRESHOLD, clip_to_zone: true }
    }
}

/// Top-level configuration of a batch run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// CRS assumed for input polygons when the file declares none.
    pub default_source_epsg: u32,
    /// CRS tiles are requested and projected in.
    pub tile_epsg: u32,
    /// Minimum vertex count for a zone to be processed.
    pub min_zone_points: usize,
    pub resolution: ResolutionMode,
    pub render: RenderSettings,
    pub detection: DetectionSettings,
    pub filter: FilterSettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            default_source_epsg: EPSG_WGS84,
            tile_epsg: EPSG_WEB_MERCATOR,
            min_zone_points: 3,
            resolution: ResolutionMode::Standard,
            render: RenderSettings::default(),
            detection: DetectionSettings::default(),
            filter: FilterSettings::default(),
        }
    }
}

impl PipelineConfig {
    /// Load a config from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("[config] Failed to read {}", path.display()))?;
        Self::from_json(&text)
            .with_context(|| format!("[config] Invalid config in {}", path.display()))
    }

    /// Parse a config from a JSON string.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Patch size for the configured resolution.
    #[inline]
    pub fn patch_size(&self) -> u32 { self.detection.patch_size_for(self.resolution) }
}
