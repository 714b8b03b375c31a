//! Detector backed by an external model process.
//!
//! The tile is written to a temporary PNG and the program is invoked as
//! `<program> <args...> <image.png> <patch_size> <patch_overlap> <iou_threshold>`.
//! It must print a CSV table on stdout with the columns `xmin, ymin, xmax, ymax,
//! score` and optionally `label`.

use std::{io::Cursor, process::Command};

use log::{debug, info};
use polars::{frame::DataFrame, io::SerReader, prelude::{CsvReader, DataType}};
use zonegeom::DetectionBox;

use super::{DetectError, DetectParams, Detector};
use crate::render::RasterImage;

/// Label given to boxes when the model output has no `label` column.
const DEFAULT_LABEL: &str = "Tree";

#[derive(Debug, Clone)]
pub struct CommandDetector {
    program: String,
    args: Vec<String>,
}

impl CommandDetector {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self { program: program.into(), args }
    }
}

impl Detector for CommandDetector {
    fn detect(&self, image: &RasterImage, params: &DetectParams) -> Result<Vec<DetectionBox>, DetectError> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("tile.png");
        image.to_rgb().save(&path)?;

        info!("[detect] running {} on {}x{} tile (patch {})", self.program, image.width(), image.height(), params.patch_size);
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(&path)
            .arg(params.patch_size.to_string())
            .arg(params.patch_overlap.to_string())
            .arg(params.iou_threshold.to_string())
            .output()?;

        if !output.status.success() {
            return Err(DetectError::Process {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8(output.stdout)
            .map_err(|e| DetectError::Output(format!("stdout is not UTF-8: {e}")))?;
        let detections = parse_detections(&stdout)?;
        debug!("[detect] {} raw detection(s)", detections.len());
        Ok(detections)
    }
}

/// Parse the detector's CSV table into boxes.
pub(crate) fn parse_detections(csv: &str) -> Result<Vec<DetectionBox>, DetectError> {
    if csv.trim().is_empty() {
        return Ok(Vec::new());
    }

    let df = CsvReader::new(Cursor::new(csv.as_bytes()))
        .finish()
        .map_err(|e| DetectError::Output(e.to_string()))?;
    if df.height() == 0 {
        return Ok(Vec::new());
    }

    let xmin = float_column(&df, "xmin")?;
    let ymin = float_column(&df, "ymin")?;
    let xmax = float_column(&df, "xmax")?;
    let ymax = float_column(&df, "ymax")?;
    let score = float_column(&df, "score")?;
    let labels = label_column(&df)?;

    Ok((0..df.height())
        .map(|i| DetectionBox::new(xmin[i], ymin[i], xmax[i], ymax[i], score[i], labels[i].clone()))
        .collect())
}

fn float_column(df: &DataFrame, name: &str) -> Result<Vec<f64>, DetectError> {
    let column = df.column(name)
        .map_err(|_| DetectError::Output(format!("missing column '{name}'")))?
        .cast(&DataType::Float64)
        .map_err(|e| DetectError::Output(format!("column '{name}' is not numeric: {e}")))?;
    let values = column.f64().map_err(|e| DetectError::Output(e.to_string()))?;
    values.into_iter()
        .map(|v| v.ok_or_else(|| DetectError::Output(format!("empty value in column '{name}'"))))
        .collect()
}

fn label_column(df: &DataFrame) -> Result<Vec<String>, DetectError> {
    let Ok(column) = df.column("label") else {
        return Ok(vec![DEFAULT_LABEL.to_string(); df.height()]);
    };
    let column = column.cast(&DataType::String).map_err(|e| DetectError::Output(e.to_string()))?;
    let values = column.str().map_err(|e| DetectError::Output(e.to_string()))?;
    Ok(values.into_iter()
        .map(|v| v.unwrap_or(DEFAULT_LABEL).to_string())
        .collect())
}
