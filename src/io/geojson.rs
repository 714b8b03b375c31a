//! GeoJSON zone input.
//!
//! Reads a FeatureCollection (as exported by overpass-turbo or any GIS tool)
//! into bare polygon rings plus the optional declared CRS.

use std::{fs, io::ErrorKind, path::{Path, PathBuf}};

use geo::Coord;
use log::{debug, warn};
use serde_json::Value;
use thiserror::Error;
use zonegeom::GeoPolygon;

/// Errors raised while reading the zone input. All of them are fatal for a run.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("no such file: {0}")]
    NotFound(PathBuf),
    #[error("failed to read {path}: {source}")]
    Io { path: PathBuf, #[source] source: std::io::Error },
    #[error("malformed JSON in {origin}: {source}")]
    Malformed { origin: String, #[source] source: serde_json::Error },
    #[error("missing expected field '{0}'")]
    MissingField(String),
    #[error("invalid field '{field}': {reason}")]
    InvalidField { field: String, reason: String },
    #[error("unsupported CRS name '{0}'")]
    UnsupportedCrs(String),
}

/// Polygons read from the input, not yet tagged with a CRS.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ZoneCollection {
    declared_epsg: Option<u32>,
    rings: Vec<Vec<Coord<f64>>>,
}

impl ZoneCollection {
    pub fn new(rings: Vec<Vec<Coord<f64>>>, declared_epsg: Option<u32>) -> Self {
        Self { declared_epsg, rings }
    }

    /// EPSG code named by the file's `crs` member, if any.
    #[inline] pub fn declared_epsg(&self) -> Option<u32> { self.declared_epsg }

    #[inline] pub fn len(&self) -> usize { self.rings.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.rings.is_empty() }

    /// The declared CRS, or `default` when the file declares none.
    #[inline]
    pub fn source_epsg(&self, default: u32) -> u32 { self.declared_epsg.unwrap_or(default) }

    /// Tag every ring with `epsg`.
    pub fn polygons(&self, epsg: u32) -> Vec<GeoPolygon> {
        self.rings.iter().map(|ring| GeoPolygon::new(ring.clone(), epsg)).collect()
    }
}

/// Read zones from a GeoJSON file.
pub fn read_zones(path: &Path) -> Result<ZoneCollection, InputError> {
    let bytes = fs::read(path).map_err(|source| match source.kind() {
        ErrorKind::NotFound => InputError::NotFound(path.to_path_buf()),
        _ => InputError::Io { path: path.to_path_buf(), source },
    })?;
    let value: Value = serde_json::from_slice(&bytes)
        .map_err(|source| InputError::Malformed { origin: path.display().to_string(), source })?;
    parse_zones(&value)
}

/// Read zones from a GeoJSON string.
pub fn read_zones_str(text: &str) -> Result<ZoneCollection, InputError> {
    let value: Value = serde_json::from_str(text)
        .map_err(|source| InputError::Malformed { origin: "<string>".to_string(), source })?;
    parse_zones(&value)
}

/// Extract rings and the declared CRS from a parsed GeoJSON document.
pub fn parse_zones(value: &Value) -> Result<ZoneCollection, InputError> {
    let declared_epsg = match value.get("crs") {
        Some(crs) if !crs.is_null() => Some(parse_crs_member(crs)?),
        _ => None,
    };

    let features: Vec<&Value> = match value.get("type").and_then(Value::as_str) {
        Some("Feature") => vec![value],
        _ => value.get("features")
            .ok_or_else(|| InputError::MissingField("features".to_string()))?
            .as_array()
            .ok_or_else(|| invalid("features", "expected an array"))?
            .iter()
            .collect(),
    };

    let mut rings = Vec::new();
    for (idx, feature) in features.iter().enumerate() {
        let geometry = feature.get("geometry")
            .ok_or_else(|| InputError::MissingField(format!("features[{idx}].geometry")))?;
        if geometry.is_null() {
            warn!("[io::geojson] feature {idx} has no geometry, skipping");
            continue;
        }

        let kind = geometry.get("type").and_then(Value::as_str)
            .ok_or_else(|| InputError::MissingField(format!("features[{idx}].geometry.type")))?;
        let coords = || geometry.get("coordinates")
            .ok_or_else(|| InputError::MissingField(format!("features[{idx}].geometry.coordinates")));

        match kind {
            "Polygon" => rings.push(parse_exterior(coords()?, idx)?),
            "MultiPolygon" => {
                let parts = coords()?.as_array()
                    .ok_or_else(|| invalid("coordinates", "expected an array of polygons"))?;
                for part in parts {
                    rings.push(parse_exterior(part, idx)?);
                }
            }
            other => warn!("[io::geojson] feature {idx} is a {other}, only polygons are zones; skipping"),
        }
    }

    debug!("[io::geojson] read {} zone(s), declared CRS {:?}", rings.len(), declared_epsg);
    Ok(ZoneCollection::new(rings, declared_epsg))
}

/// Parse the exterior ring of Polygon coordinates `[[[x, y], ...], holes...]`.
/// The closing vertex (equal to the first) is dropped.
fn parse_exterior(polygon: &Value, idx: usize) -> Result<Vec<Coord<f64>>, InputError> {
    let exterior = polygon.as_array()
        .and_then(|rings| rings.first())
        .and_then(Value::as_array)
        .ok_or_else(|| invalid("coordinates", &format!("feature {idx}: expected a polygon ring")))?;

    let mut ring = exterior.iter()
        .map(|position| parse_position(position, idx))
        .collect::<Result<Vec<_>, _>>()?;

    if ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }
    Ok(ring)
}

fn parse_position(position: &Value, idx: usize) -> Result<Coord<f64>, InputError> {
    let xy = position.as_array()
        .filter(|p| p.len() >= 2)
        .and_then(|p| Some(Coord { x: p[0].as_f64()?, y: p[1].as_f64()? }))
        .ok_or_else(|| invalid("coordinates", &format!("feature {idx}: position {position} is not [x, y]")))?;
    Ok(xy)
}

/// Parse a legacy GeoJSON `crs` member: `{"type": "name", "properties": {"name": ...}}`.
fn parse_crs_member(crs: &Value) -> Result<u32, InputError> {
    let name = crs.get("properties")
        .and_then(|p| p.get("name"))
        .and_then(Value::as_str)
        .ok_or_else(|| InputError::MissingField("crs.properties.name".to_string()))?;
    parse_crs_name(name).ok_or_else(|| InputError::UnsupportedCrs(name.to_string()))
}

/// Accepts `EPSG:2154`, `urn:ogc:def:crs:EPSG::2154` and the OGC CRS84 URN.
pub fn parse_crs_name(name: &str) -> Option<u32> {
    let name = name.trim();
    if name.ends_with("CRS84") {
        return Some(4326);
    }
    if !name.to_ascii_uppercase().contains("EPSG") {
        return None;
    }
    name.rsplit(':').next()?.parse().ok()
}

fn invalid(field: &str, reason: &str) -> InputError {
    InputError::InvalidField { field: field.to_string(), reason: reason.to_string() }
}
