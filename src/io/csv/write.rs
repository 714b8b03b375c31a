//! Predictions table writing.

use std::{fs::File, path::Path};

use anyhow::{Context, Result};
use polars::{frame::DataFrame, io::SerWriter, prelude::{CsvWriter, NamedFrom}, series::Series};
use zonegeom::AssessedDetection;

/// Write a DataFrame to a CSV file.
pub(crate) fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("[io::csv::write] Failed to create CSV file: {}", path.display()))?;
    CsvWriter::new(file)
        .finish(df)
        .with_context(|| format!("[io::csv::write] Failed to write CSV to {:?}", path))
}

/// Build the predictions table: one row per raw detection, with its IoA
/// (empty in whole-image mode) and whether it was kept.
pub(crate) fn predictions_frame(detections: &[AssessedDetection]) -> Result<DataFrame> {
    let column = |f: fn(&AssessedDetection) -> f64| detections.iter().map(f).collect::<Vec<f64>>();

    let df = DataFrame::new(vec![
        Series::new("xmin".into(), column(|a| a.detection.xmin)).into(),
        Series::new("ymin".into(), column(|a| a.detection.ymin)).into(),
        Series::new("xmax".into(), column(|a| a.detection.xmax)).into(),
        Series::new("ymax".into(), column(|a| a.detection.ymax)).into(),
        Series::new("score".into(), column(|a| a.detection.score)).into(),
        Series::new("label".into(), detections.iter().map(|a| a.detection.label.as_str()).collect::<Vec<_>>()).into(),
        Series::new("ioa".into(), detections.iter().map(|a| a.ioa).collect::<Vec<Option<f64>>>()).into(),
        Series::new("inside".into(), detections.iter().map(|a| a.accepted).collect::<Vec<bool>>()).into(),
    ])
    .context("[io::csv::write] Failed to build predictions table")?;
    Ok(df)
}

/// Write the predictions table for one zone.
pub(crate) fn write_predictions(detections: &[AssessedDetection], path: &Path) -> Result<()> {
    let mut df = predictions_frame(detections)?;
    write_csv(&mut df, path)
}
