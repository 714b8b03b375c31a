use std::path::PathBuf;

/// Tree detection over GeoJSON zones
#[derive(clap::Parser, Debug)]
#[command(name = "treezone", version, about, propagate_version = true)]
pub struct Cli {
    /// Increase output verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Render, detect and filter trees for every zone of a GeoJSON file
    Detect(DetectArgs),
}

#[derive(clap::Args, Debug)]
pub struct DetectArgs {
    /// Input zones (GeoJSON FeatureCollection)
    #[arg(long, default_value = "data/export.geojson", value_hint = clap::ValueHint::FilePath)]
    pub geojson: PathBuf,

    /// Output directory, defaults to "./output"
    #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
    pub output: Option<PathBuf>,

    /// Pipeline configuration (JSON)
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Render at the finer pixel size and detect with larger patches
    #[arg(long)]
    pub high_resolution: bool,

    /// Keep every detection instead of clipping to the zone
    #[arg(long)]
    pub no_clip: bool,

    /// WMS endpoint
    #[arg(long)]
    pub wms_url: Option<String>,

    /// WMS layer name
    #[arg(long)]
    pub layer: Option<String>,

    /// Minimum IoA (exclusive) for a detection to count as inside its zone
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Detector program
    #[arg(long, value_hint = clap::ValueHint::CommandName)]
    pub detector: String,

    /// Extra arguments passed to the detector before the image path
    #[arg(last = true)]
    pub detector_args: Vec<String>,
}
