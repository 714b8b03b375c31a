use std::f64::consts::FRAC_PI_4;
use std::fmt;

use proj4rs::{proj::Proj as Proj4, transform::transform};
use thiserror::Error;

use crate::bbox::TileBounds;

/// WGS84 geographic (longitude/latitude in degrees).
pub const EPSG_WGS84: u32 = 4326;

/// Web Mercator (spherical Mercator), the CRS of XYZ/WMS web tiles.
pub const EPSG_WEB_MERCATOR: u32 = 3857;

/// Sphere radius used by Web Mercator.
const WEB_MERCATOR_RADIUS: f64 = 6_378_137.0;

#[derive(Debug, Error)]
pub enum CrsError {
    /// No definition is registered for this EPSG code.
    #[error("unknown CRS EPSG:{0}")]
    Unknown(u32),
    /// The PROJ.4 definition for a known code was rejected by the projection engine.
    #[error("failed to build PROJ.4 definition for EPSG:{epsg}: {message}")]
    Definition { epsg: u32, message: String },
    /// The point could not be transformed (outside the projection's domain, etc).
    #[error("transform EPSG:{from} -> EPSG:{to} failed for ({x}, {y}): {message}")]
    Transform { from: u32, to: u32, x: f64, y: f64, message: String },
}

/// Build the PROJ.4 string for a supported EPSG code.
fn proj4_definition(epsg: u32) -> Option<String> {
    let definition = match epsg {
        4326 => "+proj=longlat +datum=WGS84 +no_defs +type=crs",
        4269 => "+proj=longlat +datum=NAD83 +no_defs +type=crs",
        4258 | 4171 => "+proj=longlat +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +no_defs +type=crs",
        3857 | 900913 | 3785 | 102100 => {
            "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 +units=m +nadgrids=@null +no_defs +type=crs"
        }
        2154 => {
            "+proj=lcc +lat_0=46.5 +lon_0=3 +lat_1=49 +lat_2=44 +x_0=700000 +y_0=6600000 +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +units=m +no_defs +type=crs"
        }
        3035 => {
            "+proj=laea +lat_0=52 +lon_0=10 +x_0=4321000 +y_0=3210000 +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +units=m +no_defs +type=crs"
        }
        // WGS84 / UTM: 326zz (north) / 327zz (south)
        32601..=32660 => return Some(format!("+proj=utm +zone={} +datum=WGS84 +units=m +no_defs +type=crs", epsg - 32600)),
        32701..=32760 => return Some(format!("+proj=utm +zone={} +south +datum=WGS84 +units=m +no_defs +type=crs", epsg - 32700)),
        _ => return None,
    };
    Some(definition.to_string())
}

#[inline]
fn is_web_mercator(epsg: u32) -> bool {
    matches!(epsg, 3857 | 900913 | 3785 | 102100)
}

/// A resolved coordinate reference system.
pub struct Crs {
    epsg: u32,
    geographic: bool,
    proj: Proj4,
}

impl fmt::Debug for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Crs")
            .field("epsg", &self.epsg)
            .field("geographic", &self.geographic)
            .finish_non_exhaustive()
    }
}

impl Crs {
    /// Look up and build the definition for `epsg`.
    pub fn from_epsg(epsg: u32) -> Result<Self, CrsError> {
        let definition = proj4_definition(epsg).ok_or(CrsError::Unknown(epsg))?;
        let proj = Proj4::from_proj_string(&definition)
            .map_err(|e| CrsError::Definition { epsg, message: format!("{e:?}") })?;
        Ok(Self { epsg, geographic: definition.starts_with("+proj=longlat"), proj })
    }

    #[inline] pub fn epsg(&self) -> u32 { self.epsg }

    /// True for angular (lat/long, degree) systems, false for planar ones.
    #[inline] pub fn is_geographic(&self) -> bool { self.geographic }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    Identity,
    MercatorForward,
    MercatorInverse,
    Proj4,
}

/// Converts points between two fixed CRSs, resolving both definitions once.
#[derive(Debug)]
pub struct Transformer {
    from: Crs,
    to: Crs,
    strategy: Strategy,
}

impl Transformer {
    pub fn new(from_epsg: u32, to_epsg: u32) -> Result<Self, CrsError> {
        let from = Crs::from_epsg(from_epsg)?;
        let to = Crs::from_epsg(to_epsg)?;

        let strategy = if from_epsg == to_epsg || (is_web_mercator(from_epsg) && is_web_mercator(to_epsg)) {
            Strategy::Identity
        } else if from_epsg == EPSG_WGS84 && is_web_mercator(to_epsg) {
            Strategy::MercatorForward
        } else if is_web_mercator(from_epsg) && to_epsg == EPSG_WGS84 {
            Strategy::MercatorInverse
        } else {
            Strategy::Proj4
        };

        Ok(Self { from, to, strategy })
    }

    /// Convert `(x, y)` from the source CRS to the target CRS.
    ///
    /// Callers always speak `(x, y)`: easting/northing for projected systems and
    /// longitude/latitude for geographic ones. Geographic definitions are
    /// latitude-first on the transform side, so a geographic input is issued as
    /// `(y, x)` and a geographic output is swapped back before returning.
    pub fn convert(&self, x: f64, y: f64) -> Result<(f64, f64), CrsError> {
        let input = if self.from.is_geographic() { (y, x) } else { (x, y) };
        let (a, b) = self.transform_authority(input)
            .map_err(|message| CrsError::Transform { from: self.from.epsg, to: self.to.epsg, x, y, message })?;
        if self.to.is_geographic() { Ok((b, a)) } else { Ok((a, b)) }
    }

    /// Convert both corners of `bounds` (which must be in the source CRS).
    pub fn convert_bounds(&self, bounds: &TileBounds) -> Result<TileBounds, CrsError> {
        let (xmin, ymin) = self.convert(bounds.xmin(), bounds.ymin())?;
        let (xmax, ymax) = self.convert(bounds.xmax(), bounds.ymax())?;
        Ok(TileBounds::new(xmin, ymin, xmax, ymax, self.to.epsg))
    }

    /// Transform a point given and returned in authority axis order
    /// (latitude first for geographic systems).
    fn transform_authority(&self, (a, b): (f64, f64)) -> Result<(f64, f64), String> {
        let (east, north) = if self.from.is_geographic() { (b, a) } else { (a, b) };

        let (east, north) = match self.strategy {
            Strategy::Identity => (east, north),
            Strategy::MercatorForward => mercator_forward(east, north)?,
            Strategy::MercatorInverse => mercator_inverse(east, north),
            Strategy::Proj4 => {
                // proj4rs works in radians for geographic systems
                let mut point = if self.from.is_geographic() {
                    (east.to_radians(), north.to_radians(), 0.0)
                } else {
                    (east, north, 0.0)
                };
                transform(&self.from.proj, &self.to.proj, &mut point).map_err(|e| format!("{e:?}"))?;
                if self.to.is_geographic() {
                    (point.0.to_degrees(), point.1.to_degrees())
                } else {
                    (point.0, point.1)
                }
            }
        };

        if !east.is_finite() || !north.is_finite() {
            return Err("non-finite result".to_string());
        }

        Ok(if self.to.is_geographic() { (north, east) } else { (east, north) })
    }
}

/// Spherical Mercator forward projection, degrees in, meters out.
fn mercator_forward(lon: f64, lat: f64) -> Result<(f64, f64), String> {
    if lat.abs() >= 90.0 {
        return Err(format!("latitude {lat} is outside the Mercator domain"));
    }
    let x = WEB_MERCATOR_RADIUS * lon.to_radians();
    let y = WEB_MERCATOR_RADIUS * (FRAC_PI_4 + lat.to_radians() / 2.0).tan().ln();
    Ok((x, y))
}

/// Spherical Mercator inverse projection, meters in, degrees out.
fn mercator_inverse(x: f64, y: f64) -> (f64, f64) {
    let lon = (x / WEB_MERCATOR_RADIUS).to_degrees();
    let lat = (2.0 * (y / WEB_MERCATOR_RADIUS).exp().atan() - 2.0 * FRAC_PI_4).to_degrees();
    (lon, lat)
}

/// One-shot conversion of a single point between two EPSG codes.
pub fn convert(x: f64, y: f64, input_epsg: u32, output_epsg: u32) -> Result<(f64, f64), CrsError> {
    Transformer::new(input_epsg, output_epsg)?.convert(x, y)
}
