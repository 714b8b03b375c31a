//! Raster tiles and the renderer interface.

#[cfg(feature = "wms")]
mod wms;

use image::{Rgb, RgbImage};
use ndarray::{Array3, ShapeError};
use thiserror::Error;
use zonegeom::{GeometryError, TileBounds};

use crate::config::ResolutionMode;

#[cfg(feature = "wms")]
pub use wms::WmsRenderer;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("cannot render tile: {0}")]
    InvalidBounds(#[from] GeometryError),
    #[error("tile service returned HTTP {status}: {message}")]
    Http { status: u16, message: String },
    /// The service answered with an error document (unknown layer, bad CRS, ...).
    #[error("tile service error: {0}")]
    Service(String),
    #[error("tile request timed out after {0}s")]
    Timeout(u64),
    #[error("tile request failed: {0}")]
    Transport(String),
    #[error("failed to decode tile image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("tile image has unexpected shape: {0}")]
    Shape(#[from] ShapeError),
}

/// An RGB raster (`height x width x 3`) covering `bounds`.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterImage {
    pixels: Array3<u8>,
    bounds: TileBounds,
}

impl RasterImage {
    /// Wrap a `height x width x 3` array.
    pub fn new(pixels: Array3<u8>, bounds: TileBounds) -> Result<Self, RenderError> {
        if pixels.shape()[2] != 3 {
            return Err(RenderError::Shape(ShapeError::from_kind(ndarray::ErrorKind::IncompatibleShape)));
        }
        Ok(Self { pixels, bounds })
    }

    /// A uniformly coloured raster, mostly useful for tests and placeholders.
    pub fn filled(width: u32, height: u32, color: [u8; 3], bounds: TileBounds) -> Self {
        let pixels = Array3::from_shape_fn((height as usize, width as usize, 3), |(_, _, c)| color[c]);
        Self { pixels, bounds }
    }

    pub fn from_rgb(image: RgbImage, bounds: TileBounds) -> Result<Self, RenderError> {
        let (width, height) = image.dimensions();
        let pixels = Array3::from_shape_vec((height as usize, width as usize, 3), image.into_raw())?;
        Ok(Self { pixels, bounds })
    }

    pub fn to_rgb(&self) -> RgbImage {
        RgbImage::from_fn(self.width(), self.height(), |x, y| {
            let (x, y) = (x as usize, y as usize);
            Rgb([self.pixels[[y, x, 0]], self.pixels[[y, x, 1]], self.pixels[[y, x, 2]]])
        })
    }

    #[inline] pub fn width(&self) -> u32 { self.pixels.shape()[1] as u32 }

    #[inline] pub fn height(&self) -> u32 { self.pixels.shape()[0] as u32 }

    #[inline] pub fn pixels(&self) -> &Array3<u8> { &self.pixels }

    /// Bounds the raster was rendered for, in the tile CRS.
    #[inline] pub fn bounds(&self) -> &TileBounds { &self.bounds }
}

/// Produces a raster image for a bounding box.
pub trait Renderer {
    fn render(&self, bounds: &TileBounds, mode: ResolutionMode) -> Result<RasterImage, RenderError>;
}

impl<R: Renderer + ?Sized> Renderer for &R {
    fn render(&self, bounds: &TileBounds, mode: ResolutionMode) -> Result<RasterImage, RenderError> {
        (**self).render(bounds, mode)
    }
}

/// Pixel dimensions for a tile covering `bounds` at `pixel_size` ground units per pixel,
/// scaled down so neither side exceeds `max_dimension`.
pub fn image_size(bounds: &TileBounds, pixel_size: f64, max_dimension: u32) -> Result<(u32, u32), RenderError> {
    bounds.ensure_non_degenerate()?;

    let width = (bounds.width() / pixel_size).ceil();
    let height = (bounds.height() / pixel_size).ceil();
    let scale = (max_dimension as f64 / width.max(height)).min(1.0);

    let width = ((width * scale).round() as u32).max(1);
    let height = ((height * scale).round() as u32).max(1);
    Ok((width, height))
}
