//! IO for zone input and per-zone artifacts.
//!
//! - `geojson` - zone polygons and declared CRS from a FeatureCollection
//! - `csv` - predictions table
//! - `annotate` - tile with the zone outline and accepted boxes drawn on it
//! - `sink` - writes every artifact of a zone into an output directory

pub(crate) mod annotate;
pub(crate) mod csv;
pub mod geojson;
mod sink;

pub use geojson::{read_zones, read_zones_str, InputError, ZoneCollection};
pub use sink::{DirectorySink, REPORT_FILE};
