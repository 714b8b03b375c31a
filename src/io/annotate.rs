//! Draw the zone outline and accepted detections onto a tile.

use image::{Rgb, RgbImage};
use imageproc::{
    drawing::{draw_hollow_rect_mut, draw_line_segment_mut},
    rect::Rect,
};
use zonegeom::{AssessedDetection, DetectionBox, PixelPolygon};

use crate::render::RasterImage;

const ZONE_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const BOX_COLOR: Rgb<u8> = Rgb([0, 0, 255]);

/// Copy of `image` with the polygon outline and the accepted boxes drawn on it.
pub(crate) fn annotate(image: &RasterImage, polygon: &PixelPolygon, detections: &[AssessedDetection]) -> RgbImage {
    let mut canvas = image.to_rgb();
    let (img_w, img_h) = canvas.dimensions();
    if img_w == 0 || img_h == 0 {
        return canvas;
    }

    let points = polygon.points();
    for (i, &(col, row)) in points.iter().enumerate() {
        let (next_col, next_row) = points[(i + 1) % points.len()];
        draw_line_segment_mut(&mut canvas, (col as f32, row as f32), (next_col as f32, next_row as f32), ZONE_COLOR);
    }

    for detection in detections.iter().filter(|d| d.accepted) {
        if let Some(rect) = rect_from_box(&detection.detection, img_w, img_h) {
            draw_hollow_rect_mut(&mut canvas, rect, BOX_COLOR);
        }
    }

    canvas
}

/// Clamp a detection box to the image and convert it to an integer rectangle.
/// Boxes entirely outside the image yield `None`.
fn rect_from_box(detection: &DetectionBox, img_w: u32, img_h: u32) -> Option<Rect> {
    let max_x = (img_w - 1) as f64;
    let max_y = (img_h - 1) as f64;
    if detection.xmax < 0.0 || detection.ymax < 0.0 || detection.xmin > max_x || detection.ymin > max_y {
        return None;
    }

    let x1 = detection.xmin.clamp(0.0, max_x);
    let y1 = detection.ymin.clamp(0.0, max_y);
    let x2 = detection.xmax.clamp(0.0, max_x);
    let y2 = detection.ymax.clamp(0.0, max_y);

    let width = (x2 - x1).max(1.0).round() as u32;
    let height = (y2 - y1).max(1.0).round() as u32;

    Some(Rect::at(x1.round() as i32, y1.round() as i32).of_size(width, height))
}
