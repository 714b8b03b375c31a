use geo::{Area, Coord, LineString, Polygon};
use serde::Serialize;

use crate::project::PixelPolygon;

/// Minimum intersection-over-area for a detection to count as inside a zone.
pub const DEFAULT_IOA_THRESHOLD: f64 = 0.4;

/// One detector output box in pixel space.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionBox {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
    pub score: f64,
    pub label: String,
}

impl DetectionBox {
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64, score: f64, label: impl Into<String>) -> Self {
        Self { xmin, ymin, xmax, ymax, score, label: label.into() }
    }

    /// Area of the box, zero for inverted or NaN extents.
    #[inline]
    pub fn area(&self) -> f64 {
        if self.xmax > self.xmin && self.ymax > self.ymin {
            (self.xmax - self.xmin) * (self.ymax - self.ymin)
        } else {
            0.0
        }
    }

    /// The box as a 4-corner ring: (xmin,ymin), (xmin,ymax), (xmax,ymax), (xmax,ymin).
    pub fn to_polygon(&self) -> Polygon<f64> {
        Polygon::new(
            LineString::from(vec![
                Coord { x: self.xmin, y: self.ymin },
                Coord { x: self.xmin, y: self.ymax },
                Coord { x: self.xmax, y: self.ymax },
                Coord { x: self.xmax, y: self.ymin },
            ]),
            vec![],
        )
    }
}

/// A detection with the outcome of the zone test.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssessedDetection {
    pub detection: DetectionBox,
    /// `None` when no zone polygon was supplied.
    pub ioa: Option<f64>,
    pub accepted: bool,
}

/// Area of `detection ∩ zone` divided by the area of `detection`.
///
/// Zero-area boxes and zones with fewer than three vertices yield 0.
pub fn intersection_over_area(detection: &DetectionBox, zone: &Polygon<f64>) -> f64 {
    let box_area = detection.area();
    let ring = open_ring(zone.exterior());
    if box_area <= 0.0 || ring.len() < 3 {
        return 0.0;
    }

    // Work relative to the box corner so tile-scale coordinates keep their precision.
    let origin = Coord { x: detection.xmin, y: detection.ymin };
    let local: Vec<Coord<f64>> = ring.iter().map(|&c| c - origin).collect();
    let clipped = clip_ring_to_box(&local, detection.xmax - detection.xmin, detection.ymax - detection.ymin);
    if clipped.len() < 3 {
        return 0.0;
    }

    let overlap = Polygon::new(LineString::from(clipped), vec![]).unsigned_area();
    overlap / box_area
}

/// Ring vertices without the closing duplicate.
fn open_ring(ring: &LineString<f64>) -> &[Coord<f64>] {
    match ring.0.as_slice() {
        [first, .., last] if first == last => &ring.0[..ring.0.len() - 1],
        coords => coords,
    }
}

/// Clip a ring to the box `[0, width] x [0, height]` (Sutherland-Hodgman).
/// The box is convex, so the result covers exactly the overlap even for a
/// concave ring.
fn clip_ring_to_box(ring: &[Coord<f64>], width: f64, height: f64) -> Vec<Coord<f64>> {
    let mut output = ring.to_vec();

    output = clip_against_edge(&output, |p| p.x >= 0.0, |a, b| {
        Coord { x: 0.0, y: a.y + (0.0 - a.x) / (b.x - a.x) * (b.y - a.y) }
    });
    output = clip_against_edge(&output, |p| p.x <= width, |a, b| {
        Coord { x: width, y: a.y + (width - a.x) / (b.x - a.x) * (b.y - a.y) }
    });
    output = clip_against_edge(&output, |p| p.y >= 0.0, |a, b| {
        Coord { x: a.x + (0.0 - a.y) / (b.y - a.y) * (b.x - a.x), y: 0.0 }
    });
    output = clip_against_edge(&output, |p| p.y <= height, |a, b| {
        Coord { x: a.x + (height - a.y) / (b.y - a.y) * (b.x - a.x), y: height }
    });

    output
}

fn clip_against_edge<F, I>(ring: &[Coord<f64>], inside: F, intersect: I) -> Vec<Coord<f64>>
where
    F: Fn(&Coord<f64>) -> bool,
    I: Fn(&Coord<f64>, &Coord<f64>) -> Coord<f64>,
{
    let n = ring.len();
    let mut output = Vec::with_capacity(n + 4);

    for i in 0..n {
        let current = &ring[i];
        let next = &ring[(i + 1) % n];
        match (inside(current), inside(next)) {
            (true, true) => output.push(*next),
            (true, false) => output.push(intersect(current, next)),
            (false, true) => {
                output.push(intersect(current, next));
                output.push(*next);
            }
            (false, false) => {}
        }
    }

    output
}

/// Score every detection against `zone`. Without a zone all detections are accepted.
pub fn assess(detections: &[DetectionBox], zone: Option<&PixelPolygon>, threshold: f64) -> Vec<AssessedDetection> {
    let Some(zone) = zone else {
        return detections.iter()
            .map(|d| AssessedDetection { detection: d.clone(), ioa: None, accepted: true })
            .collect();
    };

    let zone = zone.to_polygon();
    detections.iter()
        .map(|d| {
            let ioa = intersection_over_area(d, &zone);
            AssessedDetection { detection: d.clone(), ioa: Some(ioa), accepted: ioa > threshold }
        })
        .collect()
}

/// Keep the detections whose IoA with `zone` is strictly above `threshold`.
pub fn filter(detections: &[DetectionBox], zone: Option<&PixelPolygon>, threshold: f64) -> Vec<DetectionBox> {
    assess(detections, zone, threshold).into_iter()
        .filter(|a| a.accepted)
        .map(|a| a.detection)
        .collect()
}
