use land_atlas::geometry::{
    area_caveats, bounds, centroid, ring_area, square_meters_to_hectares, AreaCaveat, Coordinate,
    Ring,
};

fn coords(points: &[(f64, f64)]) -> Vec<Coordinate> {
    points.iter().map(|&p| Coordinate::from(p)).collect()
}

#[test]
fn small_square_is_about_a_hectare() {
    let ring = Ring::new(coords(&[
        (0.0, 0.0),
        (0.0, 0.001),
        (0.001, 0.001),
        (0.001, 0.0),
        (0.0, 0.0),
    ]))
    .unwrap();
    let area = ring_area(&ring);
    assert!(area > 0.0);
    let ha = square_meters_to_hectares(area);
    assert!(ha > 1.0 && ha < 2.0, "got {ha} ha");
}

#[test]
fn area_ignores_orientation() {
    let rings = [
        coords(&[(0.0, 0.0), (0.0, 0.001), (0.001, 0.001), (0.001, 0.0), (0.0, 0.0)]),
        coords(&[
            (78.1, 23.0),
            (78.2, 23.0),
            (78.25, 23.05),
            (78.2, 23.1),
            (78.1, 23.1),
            (78.1, 23.0),
        ]),
    ];
    for c in rings {
        let ring = Ring::new(c).unwrap();
        let forward = ring_area(&ring);
        let backward = ring_area(&ring.reversed());
        assert!((forward - backward).abs() < 1e-6 * forward.max(1.0));
    }
}

#[test]
fn open_and_short_rings_are_rejected() {
    assert!(Ring::new(coords(&[(0.0, 0.0), (0.0, 1.0), (1.0, 1.0), (1.0, 0.0)])).is_err());
    assert!(Ring::new(coords(&[(0.0, 0.0), (0.0, 1.0), (0.0, 0.0)])).is_err());
    let ring = Ring::close(coords(&[(0.0, 0.0), (0.0, 1.0), (1.0, 1.0)])).unwrap();
    assert_eq!(ring.coords().first(), ring.coords().last());
}

#[test]
fn centroid_and_bounds_need_three_points() {
    let pts = coords(&[(0.0, 0.0), (2.0, 0.0), (2.0, 2.0), (0.0, 2.0)]);
    assert_eq!(centroid(&pts).unwrap(), Coordinate::new(1.0, 1.0));
    let b = bounds(&pts).unwrap();
    assert_eq!(b.min, Coordinate::new(0.0, 0.0));
    assert_eq!(b.max, Coordinate::new(2.0, 2.0));
    assert!(centroid(&coords(&[(0.0, 0.0), (1.0, 1.0)])).is_err());
    assert!(bounds(&coords(&[(1.0, 1.0), (1.0, 1.0), (1.0, 1.0)])).is_err());
}

#[test]
fn caveats_flag_latitude_and_extent() {
    let north = Ring::close(coords(&[(10.0, 60.0), (10.0, 60.5), (10.5, 60.5)])).unwrap();
    let caveats = area_caveats(&north);
    assert!(caveats.contains(&AreaCaveat::PlanarApproximation));
    assert!(caveats.contains(&AreaCaveat::HighLatitude));
    assert!(caveats.contains(&AreaCaveat::LargeExtent));
    assert!(!caveats.contains(&AreaCaveat::SelfIntersecting));
}
