use geo::{Coord, LineString, Polygon};
use serde::Serialize;
use thiserror::Error;

use crate::bbox::{GeometryError, TileBounds};
use crate::crs::{CrsError, Transformer};
use crate::polygon::GeoPolygon;

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error(transparent)]
    Crs(#[from] CrsError),
}

/// A polygon in image pixel space: `(col, row)` pairs, row 0 at the top of the image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PixelPolygon(Vec<(i32, i32)>);

impl PixelPolygon {
    pub fn new(points: Vec<(i32, i32)>) -> Self { Self(points) }

    #[inline] pub fn points(&self) -> &[(i32, i32)] { &self.0 }

    #[inline] pub fn len(&self) -> usize { self.0.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.0.is_empty() }

    /// Convert to a `geo::Polygon` (the ring is closed by `geo`).
    pub fn to_polygon(&self) -> Polygon<f64> {
        let ring: Vec<Coord<f64>> = self.0.iter()
            .map(|&(col, row)| Coord { x: col as f64, y: row as f64 })
            .collect();
        Polygon::new(LineString::from(ring), vec![])
    }
}

/// Map a geographic polygon into the pixel grid of an image rendered over `bounds`.
///
/// Each vertex is converted to the CRS of `bounds`, scaled to the image size,
/// flipped vertically (image rows grow downwards) and truncated to whole pixels.
pub fn project(
    polygon: &GeoPolygon,
    image_width: u32,
    image_height: u32,
    bounds: &TileBounds,
) -> Result<PixelPolygon, ProjectError> {
    bounds.ensure_non_degenerate()?;

    let transformer = Transformer::new(polygon.epsg(), bounds.epsg())?;
    let x_scale = image_width as f64 / bounds.width();
    let y_scale = image_height as f64 / bounds.height();

    let points = polygon.coords().iter()
        .map(|c| {
            let (x, y) = transformer.convert(c.x, c.y)?;
            let col = (x - bounds.xmin()) * x_scale;
            let row = (bounds.ymax() - y) * y_scale;
            Ok((col as i32, row as i32))
        })
        .collect::<Result<Vec<_>, CrsError>>()?;

    Ok(PixelPolygon(points))
}
