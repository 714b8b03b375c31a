use geo::Coord;
use serde::Serialize;

use crate::crs::{CrsError, Transformer};

/// A single coordinate pair tagged with the EPSG code it is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoPoint {
    x: f64,
    y: f64,
    epsg: u32,
}

impl GeoPoint {
    #[inline] pub fn new(x: f64, y: f64, epsg: u32) -> Self { Self { x, y, epsg } }

    #[inline] pub fn x(&self) -> f64 { self.x }

    #[inline] pub fn y(&self) -> f64 { self.y }

    #[inline] pub fn epsg(&self) -> u32 { self.epsg }

    /// Re-express this point in another CRS.
    pub fn to_epsg(&self, epsg: u32) -> Result<GeoPoint, CrsError> {
        let (x, y) = Transformer::new(self.epsg, epsg)?.convert(self.x, self.y)?;
        Ok(GeoPoint::new(x, y, epsg))
    }
}

/// An ordered ring of vertices sharing one CRS. The ring is implicitly closed:
/// the last vertex connects back to the first without being repeated.
///
/// No validity checks happen here; a ring with fewer than three vertices is
/// representable and left for callers to reject.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoPolygon {
    epsg: u32,
    ring: Vec<Coord<f64>>,
}

impl GeoPolygon {
    pub fn new(ring: Vec<Coord<f64>>, epsg: u32) -> Self {
        Self { epsg, ring }
    }

    /// Build a polygon from `(x, y)` tuples.
    pub fn from_tuples(points: &[(f64, f64)], epsg: u32) -> Self {
        Self::new(points.iter().map(|&(x, y)| Coord { x, y }).collect(), epsg)
    }

    #[inline] pub fn epsg(&self) -> u32 { self.epsg }

    #[inline] pub fn len(&self) -> usize { self.ring.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.ring.is_empty() }

    #[inline] pub fn coords(&self) -> &[Coord<f64>] { &self.ring }

    /// Iterate the ring as tagged points.
    pub fn points(&self) -> impl Iterator<Item = GeoPoint> + '_ {
        self.ring.iter().map(|c| GeoPoint::new(c.x, c.y, self.epsg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn points_carry_polygon_epsg() {
        let polygon = GeoPolygon::from_tuples(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)], 2154);
        assert_eq!(polygon.len(), 3);
        assert!(polygon.points().all(|p| p.epsg() == 2154));
        assert_eq!(polygon.points().nth(1), Some(GeoPoint::new(1.0, 0.0, 2154)));
    }

    #[test]
    fn empty_polygon_is_representable() {
        let polygon = GeoPolygon::new(Vec::new(), 4326);
        assert!(polygon.is_empty());
        assert_eq!(polygon.points().count(), 0);
    }

    #[test]
    fn same_crs_point_conversion_is_identity() {
        let point = GeoPoint::new(2.35, 48.85, 4326);
        assert_eq!(point.to_epsg(4326).unwrap(), point);
    }
}
