pub mod bbox;
pub mod crs;
pub mod filter;
pub mod polygon;
pub mod project;

pub use bbox::{bounding_box, GeometryError, TileBounds};
pub use crs::{convert, Crs, CrsError, Transformer, EPSG_WEB_MERCATOR, EPSG_WGS84};
pub use filter::{assess, filter, intersection_over_area, AssessedDetection, DetectionBox, DEFAULT_IOA_THRESHOLD};
pub use polygon::{GeoPoint, GeoPolygon};
pub use project::{project, PixelPolygon, ProjectError};
