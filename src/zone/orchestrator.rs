use log::{error, info, warn};
use zonegeom::{assess, bounding_box, project, GeoPolygon, Transformer};

use super::{ArtifactNames, ArtifactSink, BatchError, BatchReport, Zone, ZoneError, ZoneOutcome, ZoneReport, ZoneState};
use crate::config::PipelineConfig;
use crate::detect::{DetectParams, Detector};
use crate::io::ZoneCollection;
use crate::render::Renderer;

/// Runs every zone of a batch through render, projection, detection and
/// filtering, one at a time and in input order. A failing zone is recorded
/// and the loop moves on.
pub struct ZoneOrchestrator<R, D, S> {
    config: PipelineConfig,
    renderer: R,
    detector: D,
    sink: S,
}

impl<R: Renderer, D: Detector, S: ArtifactSink> ZoneOrchestrator<R, D, S> {
    pub fn new(config: PipelineConfig, renderer: R, detector: D, sink: S) -> Self {
        Self { config, renderer, detector, sink }
    }

    /// Give back the sink, e.g. to inspect what was persisted.
    pub fn into_sink(self) -> S { self.sink }

    /// Process every zone. Only an unresolvable working CRS or a failure to
    /// write the final report aborts the batch.
    pub fn run(&mut self, zones: &ZoneCollection) -> Result<BatchReport, BatchError> {
        let source_epsg = zones.source_epsg(self.config.default_source_epsg);
        let tile_epsg = self.config.tile_epsg;
        let to_tile = Transformer::new(source_epsg, tile_epsg)?;

        let polygons = zones.polygons(source_epsg);
        let valid_zones = polygons.iter().filter(|p| p.len() >= self.config.min_zone_points).count();
        info!("[batch] {} zone(s), {valid_zones} valid, EPSG:{source_epsg} -> EPSG:{tile_epsg}", polygons.len());

        let mut reports = Vec::with_capacity(polygons.len());
        for (i, polygon) in polygons.into_iter().enumerate() {
            let index = i + 1;
            let names = ArtifactNames::for_zone(index, valid_zones);
            let mut state = ZoneState::Pending;

            let outcome = match self.process(index, polygon, &to_tile, &names, &mut state) {
                Ok((detections, accepted)) => {
                    info!("[zone {index}] done: {accepted} of {detections} detection(s) inside the zone");
                    ZoneOutcome::Done { detections, accepted }
                }
                // Bad input is only a skip before any work was done on the zone.
                Err(e) if state == ZoneState::Pending && e.is_skip() => {
                    warn!("[zone {index}] skipped: {e}");
                    ZoneOutcome::Skipped { reason: e.to_string() }
                }
                Err(e) => {
                    error!("[zone {index}] failed while {state}: {e}");
                    ZoneOutcome::Failed { stage: state, reason: e.to_string() }
                }
            };
            reports.push(ZoneReport { index, outcome });
        }

        let report = BatchReport { source_epsg, tile_epsg, zones: reports };
        info!("[batch] {} done, {} skipped, {} failed", report.done(), report.skipped(), report.failed());
        self.sink.finish(&report).map_err(BatchError::Report)?;
        Ok(report)
    }

    /// Drive one zone to `Done`, updating `state` as it goes so a failure can
    /// be attributed to its stage. Returns (raw, accepted) detection counts.
    fn process(
        &mut self,
        index: usize,
        polygon: GeoPolygon,
        to_tile: &Transformer,
        names: &ArtifactNames,
        state: &mut ZoneState,
    ) -> Result<(usize, usize), ZoneError> {
        let min = self.config.min_zone_points;
        if polygon.len() < min {
            return Err(ZoneError::Validation { points: polygon.len(), min });
        }

        let tile_bounds = bounding_box(&polygon)?;
        let projected_bounds = to_tile.convert_bounds(&tile_bounds)?;
        projected_bounds.ensure_non_degenerate()?;

        *state = ZoneState::Rendering;
        let image = self.renderer.render(&projected_bounds, self.config.resolution)?;

        *state = ZoneState::Projecting;
        let pixel_polygon = project(&polygon, image.width(), image.height(), image.bounds())?;

        *state = ZoneState::Detecting;
        let params = DetectParams {
            patch_size: self.config.patch_size(),
            patch_overlap: self.config.detection.patch_overlap,
            iou_threshold: self.config.detection.iou_threshold,
        };
        let raw = self.detector.detect(&image, &params)?;

        *state = ZoneState::Filtering;
        let clip = self.config.filter.clip_to_zone.then_some(&pixel_polygon);
        let detections = assess(&raw, clip, self.config.filter.ioa_threshold);

        *state = ZoneState::Persisting;
        let zone = Zone { index, polygon, tile_bounds, projected_bounds, image, pixel_polygon, detections };
        self.sink.persist(&zone, names).map_err(ZoneError::Persist)?;

        *state = ZoneState::Done;
        Ok((raw.len(), zone.accepted().count()))
    }
}
