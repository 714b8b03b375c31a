use anyhow::{Context, Result};
use log::info;
use treezone::{
    config::{PipelineConfig, ResolutionMode},
    read_zones, CommandDetector, DirectorySink, WmsRenderer, ZoneOrchestrator, ZoneOutcome,
};

use crate::cli::{Cli, DetectArgs};

/// Apply command-line overrides on top of the loaded configuration.
fn configure(args: &DetectArgs) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };

    if args.high_resolution { config.resolution = ResolutionMode::High; }
    if args.no_clip { config.filter.clip_to_zone = false; }
    if let Some(url) = &args.wms_url { config.render.url = url.clone(); }
    if let Some(layer) = &args.layer { config.render.layer = layer.clone(); }
    if let Some(threshold) = args.threshold {
        anyhow::ensure!((0.0..=1.0).contains(&threshold), "[detect] threshold must be within [0, 1], got {threshold}");
        config.filter.ioa_threshold = threshold;
    }

    Ok(config)
}

pub fn run(_cli: &Cli, args: &DetectArgs) -> Result<()> {
    let config = configure(args)?;
    let out_dir = args.output.clone().unwrap_or_else(|| "output".into());

    let zones = read_zones(&args.geojson)
        .with_context(|| format!("[detect] Failed to read zones from {}", args.geojson.display()))?;
    info!("[detect] {} zone(s) read from {}", zones.len(), args.geojson.display());

    let renderer = WmsRenderer::new(&config.render)?;
    let detector = CommandDetector::new(&args.detector, args.detector_args.clone());
    let sink = DirectorySink::new(&out_dir);

    let mut orchestrator = ZoneOrchestrator::new(config, renderer, detector, sink);
    let report = orchestrator.run(&zones)?;

    for zone in &report.zones {
        match &zone.outcome {
            ZoneOutcome::Done { detections, accepted } =>
                println!("zone {}: {accepted}/{detections} tree(s) inside", zone.index),
            ZoneOutcome::Skipped { reason } => println!("zone {}: skipped ({reason})", zone.index),
            ZoneOutcome::Failed { stage, reason } => println!("zone {}: failed while {stage} ({reason})", zone.index),
        }
    }
    println!(
        "{} done, {} skipped, {} failed; artifacts in {}",
        report.done(), report.skipped(), report.failed(), out_dir.display(),
    );

    Ok(())
}
