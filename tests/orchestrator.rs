use std::cell::RefCell;

use treezone::{
    config::PipelineConfig,
    detect::{DetectError, DetectParams, Detector},
    io::{read_zones_str, ZoneCollection, REPORT_FILE},
    render::{RasterImage, RenderError, Renderer},
    zone::{ArtifactNames, ArtifactSink, BatchError, BatchReport, Zone, ZoneOutcome, ZoneState},
    DirectorySink, ResolutionMode, ZoneOrchestrator,
};
use treezone::zonegeom::{DetectionBox, TileBounds};

const TILE_SIZE: u32 = 100;

/// CRS code with no registered definition.
const UNREGISTERED_EPSG: u32 = 99999;

/// Renders a blank tile for any bounds. Tiles east of `fail_from_x` fail;
/// tiles east of `foreign_from_x` come back tagged with an unregistered CRS.
struct FakeRenderer {
    fail_from_x: f64,
    foreign_from_x: f64,
    calls: RefCell<Vec<(TileBounds, ResolutionMode)>>,
}

impl FakeRenderer {
    fn new() -> Self {
        Self { fail_from_x: f64::INFINITY, foreign_from_x: f64::INFINITY, calls: RefCell::new(Vec::new()) }
    }

    fn failing_from(x: f64) -> Self {
        Self { fail_from_x: x, ..Self::new() }
    }

    fn foreign_from(x: f64) -> Self {
        Self { foreign_from_x: x, ..Self::new() }
    }
}

impl Renderer for FakeRenderer {
    fn render(&self, bounds: &TileBounds, mode: ResolutionMode) -> Result<RasterImage, RenderError> {
        self.calls.borrow_mut().push((*bounds, mode));
        if bounds.xmin() >= self.fail_from_x {
            return Err(RenderError::Service("layer unavailable".to_string()));
        }
        let covered = if bounds.xmin() >= self.foreign_from_x {
            TileBounds::new(bounds.xmin(), bounds.ymin(), bounds.xmax(), bounds.ymax(), UNREGISTERED_EPSG)
        } else {
            *bounds
        };
        Ok(RasterImage::filled(TILE_SIZE, TILE_SIZE, [30, 110, 30], covered))
    }
}

/// Returns the same two boxes for every tile: one in the lower-left corner,
/// one in the upper-right corner. Tiles east of `fail_from_x` make it exit.
struct FakeDetector {
    fail_from_x: f64,
    params: RefCell<Vec<DetectParams>>,
}

impl FakeDetector {
    fn new() -> Self {
        Self { fail_from_x: f64::INFINITY, params: RefCell::new(Vec::new()) }
    }

    fn failing_from(x: f64) -> Self {
        Self { fail_from_x: x, ..Self::new() }
    }
}

impl Detector for FakeDetector {
    fn detect(&self, image: &RasterImage, params: &DetectParams) -> Result<Vec<DetectionBox>, DetectError> {
        self.params.borrow_mut().push(*params);
        if image.bounds().xmin() >= self.fail_from_x {
            return Err(DetectError::Process { status: "exit status: 1".to_string(), stderr: "out of memory".to_string() });
        }
        Ok(vec![
            DetectionBox::new(5.0, 60.0, 15.0, 70.0, 0.9, "Tree"),
            DetectionBox::new(80.0, 5.0, 90.0, 15.0, 0.7, "Tree"),
        ])
    }
}

#[derive(Debug, PartialEq)]
struct Persisted {
    index: usize,
    tile: String,
    accepted: usize,
    detections: usize,
}

#[derive(Default)]
struct RecordingSink {
    persisted: Vec<Persisted>,
    report: Option<BatchReport>,
    fail_persist: Option<usize>,
    fail_finish: bool,
}

impl ArtifactSink for RecordingSink {
    fn persist(&mut self, zone: &Zone, names: &ArtifactNames) -> anyhow::Result<()> {
        anyhow::ensure!(self.fail_persist != Some(zone.index), "read-only file system");
        self.persisted.push(Persisted {
            index: zone.index,
            tile: names.tile(),
            accepted: zone.accepted().count(),
            detections: zone.detections.len(),
        });
        Ok(())
    }

    fn finish(&mut self, report: &BatchReport) -> anyhow::Result<()> {
        anyhow::ensure!(!self.fail_finish, "disk full");
        self.report = Some(report.clone());
        Ok(())
    }
}

/// A FeatureCollection declaring `epsg`, with one Polygon feature per ring.
fn collection(epsg: u32, rings: &[&[(f64, f64)]]) -> ZoneCollection {
    let features = rings.iter()
        .map(|ring| {
            let mut coords: Vec<[f64; 2]> = ring.iter().map(|&(x, y)| [x, y]).collect();
            coords.push(coords[0]);
            serde_json::json!({
                "type": "Feature",
                "properties": {},
                "geometry": { "type": "Polygon", "coordinates": [coords] },
            })
        })
        .collect::<Vec<_>>();
    let doc = serde_json::json!({
        "type": "FeatureCollection",
        "crs": { "type": "name", "properties": { "name": format!("EPSG:{epsg}") } },
        "features": features,
    });
    read_zones_str(&doc.to_string()).unwrap()
}

const TRIANGLE: &[(f64, f64)] = &[(0.0, 0.0), (100.0, 0.0), (0.0, 100.0)];
const SQUARE: &[(f64, f64)] = &[(200.0, 200.0), (300.0, 200.0), (300.0, 300.0), (200.0, 300.0)];
const FAR_SQUARE: &[(f64, f64)] = &[(1000.0, 1000.0), (1100.0, 1000.0), (1100.0, 1100.0), (1000.0, 1100.0)];
const SEGMENT: &[(f64, f64)] = &[(400.0, 400.0), (500.0, 500.0)];

fn config() -> PipelineConfig {
    PipelineConfig { tile_epsg: 3857, ..Default::default() }
}

#[test]
fn invalid_zone_is_skipped_and_others_keep_their_position() {
    let zones = collection(3857, &[TRIANGLE, SEGMENT, SQUARE]);
    let mut orchestrator = ZoneOrchestrator::new(config(), FakeRenderer::new(), FakeDetector::new(), RecordingSink::default());
    let report = orchestrator.run(&zones).unwrap();

    assert_eq!((report.done(), report.skipped(), report.failed()), (2, 1, 0));
    assert_eq!(report.zones[1].outcome.state(), ZoneState::Skipped);

    let sink = orchestrator.into_sink();
    assert_eq!(sink.persisted, vec![
        Persisted { index: 1, tile: "tile_1.png".into(), accepted: 1, detections: 2 },
        Persisted { index: 3, tile: "tile_3.png".into(), accepted: 2, detections: 2 },
    ]);
    assert_eq!(sink.report, Some(report));
}

#[test]
fn single_valid_zone_has_unsuffixed_artifacts() {
    let zones = collection(3857, &[SEGMENT, SQUARE]);
    let mut orchestrator = ZoneOrchestrator::new(config(), FakeRenderer::new(), FakeDetector::new(), RecordingSink::default());
    orchestrator.run(&zones).unwrap();

    let sink = orchestrator.into_sink();
    assert_eq!(sink.persisted.len(), 1);
    assert_eq!(sink.persisted[0].index, 2);
    assert_eq!(sink.persisted[0].tile, "tile.png");
}

#[test]
fn render_failure_only_fails_its_zone() {
    let zones = collection(3857, &[TRIANGLE, FAR_SQUARE, SQUARE]);
    let renderer = FakeRenderer::failing_from(1000.0);
    let mut orchestrator = ZoneOrchestrator::new(config(), &renderer, FakeDetector::new(), RecordingSink::default());
    let report = orchestrator.run(&zones).unwrap();

    assert_eq!(renderer.calls.borrow().len(), 3);
    assert_eq!((report.done(), report.skipped(), report.failed()), (2, 0, 1));
    match &report.zones[1].outcome {
        ZoneOutcome::Failed { stage, reason } => {
            assert_eq!(*stage, ZoneState::Rendering);
            assert!(reason.contains("layer unavailable"), "{reason}");
        }
        other => panic!("expected a failed zone, got {other:?}"),
    }

    let indices: Vec<usize> = orchestrator.into_sink().persisted.iter().map(|p| p.index).collect();
    assert_eq!(indices, vec![1, 3]);
}

#[test]
fn detector_failure_only_fails_its_zone() {
    let zones = collection(3857, &[FAR_SQUARE, SQUARE]);
    let detector = FakeDetector::failing_from(1000.0);
    let mut orchestrator = ZoneOrchestrator::new(config(), FakeRenderer::new(), &detector, RecordingSink::default());
    let report = orchestrator.run(&zones).unwrap();

    assert_eq!(detector.params.borrow().len(), 2);
    match &report.zones[0].outcome {
        ZoneOutcome::Failed { stage, reason } => {
            assert_eq!(*stage, ZoneState::Detecting);
            assert!(reason.contains("out of memory"), "{reason}");
        }
        other => panic!("expected a failed zone, got {other:?}"),
    }
    assert_eq!(report.zones[1].outcome, ZoneOutcome::Done { detections: 2, accepted: 2 });

    let sink = orchestrator.into_sink();
    assert_eq!(sink.persisted.len(), 1);
    assert_eq!(sink.persisted[0].tile, "tile_2.png");
    assert!(sink.report.is_some());
}

#[test]
fn persist_failure_only_fails_its_zone() {
    let zones = collection(3857, &[TRIANGLE, SQUARE, FAR_SQUARE]);
    let sink = RecordingSink { fail_persist: Some(2), ..Default::default() };
    let mut orchestrator = ZoneOrchestrator::new(config(), FakeRenderer::new(), FakeDetector::new(), sink);
    let report = orchestrator.run(&zones).unwrap();

    assert_eq!((report.done(), report.skipped(), report.failed()), (2, 0, 1));
    match &report.zones[1].outcome {
        ZoneOutcome::Failed { stage, reason } => {
            assert_eq!(*stage, ZoneState::Persisting);
            assert!(reason.contains("read-only file system"), "{reason}");
        }
        other => panic!("expected a failed zone, got {other:?}"),
    }

    let sink = orchestrator.into_sink();
    let indices: Vec<usize> = sink.persisted.iter().map(|p| p.index).collect();
    assert_eq!(indices, vec![1, 3]);
    assert_eq!(sink.report, Some(report));
}

#[test]
fn conversion_failure_after_render_is_a_projection_failure() {
    let zones = collection(3857, &[FAR_SQUARE, SQUARE]);
    let mut orchestrator = ZoneOrchestrator::new(config(), FakeRenderer::foreign_from(1000.0), FakeDetector::new(), RecordingSink::default());
    let report = orchestrator.run(&zones).unwrap();

    match &report.zones[0].outcome {
        ZoneOutcome::Failed { stage, reason } => {
            assert_eq!(*stage, ZoneState::Projecting);
            assert!(reason.contains("99999"), "{reason}");
        }
        other => panic!("expected a failed zone, got {other:?}"),
    }
    assert_eq!(report.zones[1].outcome.state(), ZoneState::Done);
    assert_eq!(report.skipped(), 0);
}

#[test]
fn degenerate_zone_is_skipped() {
    let flat: &[(f64, f64)] = &[(0.0, 10.0), (50.0, 10.0), (100.0, 10.0)];
    let zones = collection(3857, &[flat, SQUARE]);
    let mut orchestrator = ZoneOrchestrator::new(config(), FakeRenderer::new(), FakeDetector::new(), RecordingSink::default());
    let report = orchestrator.run(&zones).unwrap();

    assert!(matches!(report.zones[0].outcome, ZoneOutcome::Skipped { .. }));
    // Both zones had enough points, so names stay numbered.
    assert_eq!(orchestrator.into_sink().persisted[0].tile, "tile_2.png");
}

#[test]
fn unknown_source_crs_aborts_the_batch() {
    let zones = collection(99999, &[SQUARE]);
    let mut orchestrator = ZoneOrchestrator::new(config(), FakeRenderer::new(), FakeDetector::new(), RecordingSink::default());
    let err = orchestrator.run(&zones).unwrap_err();

    assert!(matches!(err, BatchError::Crs(_)));
    assert!(orchestrator.into_sink().persisted.is_empty());
}

#[test]
fn report_failure_aborts_the_batch() {
    let zones = collection(3857, &[SQUARE]);
    let sink = RecordingSink { fail_finish: true, ..Default::default() };
    let mut orchestrator = ZoneOrchestrator::new(config(), FakeRenderer::new(), FakeDetector::new(), sink);

    assert!(matches!(orchestrator.run(&zones), Err(BatchError::Report(_))));
}

#[test]
fn whole_image_mode_keeps_every_detection() {
    let mut config = config();
    config.filter.clip_to_zone = false;
    let zones = collection(3857, &[TRIANGLE]);
    let mut orchestrator = ZoneOrchestrator::new(config, FakeRenderer::new(), FakeDetector::new(), RecordingSink::default());
    orchestrator.run(&zones).unwrap();

    assert_eq!(orchestrator.into_sink().persisted[0].accepted, 2);
}

#[test]
fn high_resolution_reaches_renderer_and_detector() {
    let config = PipelineConfig { resolution: ResolutionMode::High, ..config() };
    let renderer = FakeRenderer::new();
    let detector = FakeDetector::new();
    let zones = collection(3857, &[SQUARE]);
    ZoneOrchestrator::new(config.clone(), &renderer, &detector, RecordingSink::default()).run(&zones).unwrap();

    assert_eq!(renderer.calls.borrow()[0].1, ResolutionMode::High);
    assert_eq!(detector.params.borrow()[0].patch_size, config.detection.patch_size_high);
}

#[test]
fn geographic_zones_are_rendered_in_web_mercator() {
    let paris: &[(f64, f64)] = &[(2.34, 48.84), (2.36, 48.84), (2.36, 48.86), (2.34, 48.86)];
    let renderer = FakeRenderer::new();
    let zones = collection(4326, &[paris]);
    let report = ZoneOrchestrator::new(config(), &renderer, FakeDetector::new(), RecordingSink::default())
        .run(&zones)
        .unwrap();

    assert_eq!(report.source_epsg, 4326);
    let (bounds, _) = renderer.calls.borrow()[0];
    assert_eq!(bounds.epsg(), 3857);
    assert!(bounds.xmin() > 260_000.0 && bounds.xmax() < 263_000.0, "{bounds:?}");
    assert!(bounds.ymin() > 6_247_000.0 && bounds.ymax() < 6_252_000.0, "{bounds:?}");
}

#[test]
fn directory_sink_writes_numbered_artifacts_and_report() {
    let dir = tempfile::tempdir().unwrap();
    let zones = collection(3857, &[TRIANGLE, SQUARE]);
    let sink = DirectorySink::new(dir.path());
    ZoneOrchestrator::new(config(), FakeRenderer::new(), FakeDetector::new(), sink).run(&zones).unwrap();

    for n in [1, 2] {
        for name in [format!("tile_{n}.png"), format!("polygon_{n}.json"), format!("predictions_{n}.csv"), format!("annotated_{n}.png")] {
            assert!(dir.path().join(&name).is_file(), "missing {name}");
        }
    }

    let csv = std::fs::read_to_string(dir.path().join("predictions_1.csv")).unwrap();
    assert_eq!(csv.lines().count(), 3);
    assert!(csv.starts_with("xmin,ymin,xmax,ymax,score,label,ioa,inside"));

    let report: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(dir.path().join(REPORT_FILE)).unwrap()).unwrap();
    assert_eq!(report["zones"][0]["state"], "done");
    assert_eq!(report["zones"][0]["accepted"], 1);
}
