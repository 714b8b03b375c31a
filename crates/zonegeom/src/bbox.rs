use geo::Coord;
use serde::Serialize;
use thiserror::Error;

use crate::polygon::GeoPolygon;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeometryError {
    #[error("polygon has no vertices")]
    EmptyPolygon,
    /// Zero width or height; pixel projection would divide by zero.
    #[error("degenerate bounds ({xmin}, {ymin}, {xmax}, {ymax})")]
    DegenerateBounds { xmin: f64, ymin: f64, xmax: f64, ymax: f64 },
}

/// Axis-aligned bounding box in a single CRS.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TileBounds {
    xmin: f64,
    ymin: f64,
    xmax: f64,
    ymax: f64,
    epsg: u32,
}

impl TileBounds {
    /// Build bounds from two corners; the axes are normalized so that
    /// `xmin <= xmax` and `ymin <= ymax` always hold.
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64, epsg: u32) -> Self {
        Self { xmin: x0.min(x1), ymin: y0.min(y1), xmax: x0.max(x1), ymax: y0.max(y1), epsg }
    }

    #[inline] pub fn xmin(&self) -> f64 { self.xmin }
    #[inline] pub fn ymin(&self) -> f64 { self.ymin }
    #[inline] pub fn xmax(&self) -> f64 { self.xmax }
    #[inline] pub fn ymax(&self) -> f64 { self.ymax }
    #[inline] pub fn epsg(&self) -> u32 { self.epsg }

    #[inline] pub fn width(&self) -> f64 { self.xmax - self.xmin }

    #[inline] pub fn height(&self) -> f64 { self.ymax - self.ymin }

    /// `[xmin, ymin, xmax, ymax]`
    #[inline] pub fn as_array(&self) -> [f64; 4] { [self.xmin, self.ymin, self.xmax, self.ymax] }

    #[inline]
    pub fn is_degenerate(&self) -> bool {
        !(self.width() > 0.0 && self.height() > 0.0)
    }

    /// Reject zero-area (or NaN) bounds.
    pub fn ensure_non_degenerate(&self) -> Result<(), GeometryError> {
        if self.is_degenerate() {
            return Err(GeometryError::DegenerateBounds {
                xmin: self.xmin, ymin: self.ymin, xmax: self.xmax, ymax: self.ymax,
            });
        }
        Ok(())
    }
}

/// Axis-aligned bounding box of the polygon's vertices, in the polygon's CRS.
pub fn bounding_box(polygon: &GeoPolygon) -> Result<TileBounds, GeometryError> {
    let (min, max) = polygon.coords().iter()
        .map(|c| (*c, *c))
        .reduce(|(min, max), (c, _)| (
            Coord { x: min.x.min(c.x), y: min.y.min(c.y) },
            Coord { x: max.x.max(c.x), y: max.y.max(c.y) },
        ))
        .ok_or(GeometryError::EmptyPolygon)?;

    Ok(TileBounds::new(min.x, min.y, max.x, max.y, polygon.epsg()))
}
