use std::{fs::{self, File}, io::{BufWriter, Write}, path::PathBuf};

use anyhow::{Context, Result};
use log::{debug, info};
use serde::Serialize;
use zonegeom::{PixelPolygon, TileBounds};

use super::{annotate::annotate, csv::write_predictions};
use crate::zone::{ArtifactNames, ArtifactSink, BatchReport, Zone};

/// File name of the batch summary written by [`DirectorySink::finish`].
pub const REPORT_FILE: &str = "report.json";

/// Polygon artifact: the zone outline in pixel space plus enough context to
/// place the tile back on the map.
#[derive(Debug, Serialize)]
struct PolygonRecord<'a> {
    index: usize,
    epsg: u32,
    bounds: [f64; 4],
    width: u32,
    height: u32,
    polygon: &'a PixelPolygon,
}

/// Writes every artifact of a zone into one output directory.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    out_dir: PathBuf,
}

impl DirectorySink {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self { out_dir: out_dir.into() }
    }

    fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.out_dir)
            .with_context(|| format!("[io::sink] Failed to create output directory {}", self.out_dir.display()))
    }

    fn write_json<T: Serialize>(&self, name: &str, value: &T) -> Result<PathBuf> {
        let path = self.out_dir.join(name);
        let file = File::create(&path)
            .with_context(|| format!("[io::sink] Failed to create {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, value)
            .with_context(|| format!("[io::sink] Failed to write JSON to {}", path.display()))?;
        writer.flush()
            .with_context(|| format!("[io::sink] Failed to flush {}", path.display()))?;
        Ok(path)
    }
}

impl ArtifactSink for DirectorySink {
    fn persist(&mut self, zone: &Zone, names: &ArtifactNames) -> Result<()> {
        self.ensure_dir()?;

        let tile_path = self.out_dir.join(names.tile());
        zone.image.to_rgb().save(&tile_path)
            .with_context(|| format!("[io::sink] Failed to save tile {}", tile_path.display()))?;

        let bounds: &TileBounds = &zone.projected_bounds;
        let record = PolygonRecord {
            index: zone.index,
            epsg: bounds.epsg(),
            bounds: bounds.as_array(),
            width: zone.image.width(),
            height: zone.image.height(),
            polygon: &zone.pixel_polygon,
        };
        self.write_json(&names.polygon(), &record)?;

        write_predictions(&zone.detections, &self.out_dir.join(names.predictions()))?;

        let annotated_path = self.out_dir.join(names.annotated());
        annotate(&zone.image, &zone.pixel_polygon, &zone.detections).save(&annotated_path)
            .with_context(|| format!("[io::sink] Failed to save annotated tile {}", annotated_path.display()))?;

        debug!("[io::sink] zone {} written to {}", zone.index, self.out_dir.display());
        Ok(())
    }

    fn finish(&mut self, report: &BatchReport) -> Result<()> {
        self.ensure_dir()?;
        let path = self.write_json(REPORT_FILE, report)?;
        info!("[io::sink] report written to {}", path.display());
        Ok(())
    }
}
