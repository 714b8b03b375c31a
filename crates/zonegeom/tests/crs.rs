// Integration tests for CRS conversion: axis order in both directions,
// round trips through the fast Mercator path and through proj4rs.

use zonegeom::{convert, CrsError, TileBounds, Transformer};

fn assert_close(actual: (f64, f64), expected: (f64, f64), tol: f64) {
    assert!(
        (actual.0 - expected.0).abs() <= tol && (actual.1 - expected.1).abs() <= tol,
        "{actual:?} differs from {expected:?} by more than {tol}",
    );
}

#[test]
fn geographic_to_mercator_returns_easting_northing() {
    let (x, y) = convert(2.35, 48.85, 4326, 3857).unwrap();
    assert_close((x, y), (261_600.80, 6_249_447.75), 0.5);
    // Not the swapped pair
    assert!(x < y);
}

#[test]
fn mercator_to_geographic_returns_lon_lat() {
    let (lon, lat) = convert(261_600.80, 6_249_447.75, 3857, 4326).unwrap();
    assert_close((lon, lat), (2.35, 48.85), 1e-6);
}

#[test]
fn mercator_round_trip_both_directions() {
    for &(lon, lat) in &[(2.35, 48.85), (-73.9857, 40.7484), (151.2, -33.86), (0.0, 0.0)] {
        let (x, y) = convert(lon, lat, 4326, 3857).unwrap();
        assert_close(convert(x, y, 3857, 4326).unwrap(), (lon, lat), 1e-9);
    }
    for &(x, y) in &[(-8_236_050.45, 4_975_301.25), (1_000.0, -2_000.0)] {
        let (lon, lat) = convert(x, y, 3857, 4326).unwrap();
        assert_close(convert(lon, lat, 4326, 3857).unwrap(), (x, y), 1e-6);
    }
}

#[test]
fn lambert93_axis_order_and_round_trip() {
    let (x, y) = convert(2.35, 48.85, 4326, 2154).unwrap();
    assert_close((x, y), (652_301.56, 6_861_302.73), 1.0);

    assert_close(convert(x, y, 2154, 4326).unwrap(), (2.35, 48.85), 1e-7);

    let (lon, lat) = convert(700_000.0, 6_600_000.0, 2154, 4326).unwrap();
    assert_close((lon, lat), (3.0, 46.5), 1e-6);
    assert_close(convert(lon, lat, 4326, 2154).unwrap(), (700_000.0, 6_600_000.0), 1e-3);
}

#[test]
fn projected_to_projected_through_proj4() {
    let (x, y) = convert(652_301.56, 6_861_302.73, 2154, 3857).unwrap();
    assert_close((x, y), (261_600.80, 6_249_447.75), 1.0);
}

#[test]
fn geographic_to_geographic_keeps_lon_lat() {
    let (lon, lat) = convert(2.35, 48.85, 4326, 4258).unwrap();
    assert_close((lon, lat), (2.35, 48.85), 1e-6);
}

#[test]
fn identity_conversion() {
    assert_eq!(convert(12.5, -3.25, 2154, 2154).unwrap(), (12.5, -3.25));
    assert_eq!(convert(12.5, -3.25, 4326, 4326).unwrap(), (12.5, -3.25));
}

#[test]
fn unknown_codes_fail_on_either_side() {
    assert!(matches!(convert(0.0, 0.0, 1, 3857), Err(CrsError::Unknown(1))));
    assert!(matches!(Transformer::new(4326, 2), Err(CrsError::Unknown(2))));
}

#[test]
fn bounds_corners_are_converted() {
    let transformer = Transformer::new(4326, 3857).unwrap();
    let bounds = TileBounds::new(2.30, 48.80, 2.40, 48.90, 4326);
    let projected = transformer.convert_bounds(&bounds).unwrap();
    assert_eq!(projected.epsg(), 3857);
    assert!(projected.xmin() < projected.xmax());
    assert!(projected.ymin() < projected.ymax());
    assert_close((projected.xmin(), projected.ymin()), convert(2.30, 48.80, 4326, 3857).unwrap(), 1e-9);
    assert_close((projected.xmax(), projected.ymax()), convert(2.40, 48.90, 4326, 3857).unwrap(), 1e-9);
}
