use nalgebra::{Point3, Vector3};
use proptest::prelude::*;
use unipart::bbox::Axis;
use unipart::cell::Region;
use unipart::geometry::{CellInput, Geometry, GeometryInput};
use unipart::partitioner::UniversePartitioner;
use unipart::plane_partitioner::PlanePartitioner;
use unipart::surface::{Surface, SurfaceKind};

const OVERLAPPING: &str = r#"
[[surfaces]]
id = 1
type = "z-plane"
z0 = 0.0

[[surfaces]]
id = 2
type = "z-plane"
z0 = 4.0

[[surfaces]]
id = 3
type = "z-plane"
z0 = 5.0

[[surfaces]]
id = 4
type = "z-plane"
z0 = 9.0

[[surfaces]]
id = 5
type = "z-plane"
z0 = 10.0

[[surfaces]]
id = 6
type = "z-plane"
z0 = 20.0

[[cells]]
id = 1
region = [1, -3]

[[cells]]
id = 2
region = [2, -5]

[[cells]]
id = 3
region = [4, -6]
"#;

fn cell_ids(geom: &Geometry, z: f64, u: Vector3<f64>) -> Vec<i32> {
    geom.root_universe()
        .candidates(&Point3::new(0.0, 0.0, z), &u)
        .iter()
        .map(|&i| geom.cells[i].id)
        .collect()
}

#[test]
fn overlapping_cells_along_z() {
    let input: GeometryInput = toml::from_str(OVERLAPPING).unwrap();
    let mut geom = Geometry::from_input(input).unwrap();
    geom.finalize(Axis::Z, 1);

    let partitioner = geom.root_universe().partitioner().unwrap();
    assert_eq!(partitioner.planes(), &[0.0, 4.0, 5.0, 9.0, 10.0, 20.0]);
    assert_eq!(partitioner.num_slabs(), 5);

    let up = Vector3::z();
    let down = -Vector3::z();
    assert_eq!(cell_ids(&geom, 4.5, up), vec![1, 2]);
    assert_eq!(cell_ids(&geom, 9.0, up), vec![2, 3]);
    // going down from z = 9 selects [5, 9], which cell 3 touches
    assert_eq!(cell_ids(&geom, 9.0, down), vec![1, 2, 3]);
    // beyond the last plane the top slab is used
    assert_eq!(cell_ids(&geom, 25.0, up), vec![2, 3]);
    assert_eq!(cell_ids(&geom, -3.0, up), vec![1, 2]);

    let r = Point3::new(0.0, 0.0, 9.0);
    assert_eq!(geom.find_cell(&r, &up).map(|i| geom.cells[i].id), Some(2));
    assert_eq!(geom.find_cell(&r, &down).map(|i| geom.cells[i].id), Some(2));
    let r = Point3::new(0.0, 0.0, 12.0);
    assert_eq!(geom.find_cell(&r, &down).map(|i| geom.cells[i].id), Some(3));
}

#[test]
fn partitioning_along_x() {
    let text = OVERLAPPING.replace("z-plane", "x-plane").replace("z0", "x0");
    let input: GeometryInput = toml::from_str(&text).unwrap();
    let mut geom = Geometry::from_input(input).unwrap();
    geom.finalize(Axis::X, 1);

    let r = Point3::new(4.5, 100.0, -100.0);
    let ids: Vec<i32> = geom
        .root_universe()
        .candidates(&r, &Vector3::x())
        .iter()
        .map(|&i| geom.cells[i].id)
        .collect();
    assert_eq!(ids, vec![1, 2]);
}

#[test]
fn point_just_above_a_large_plane() {
    let text = r#"
[[surfaces]]
id = 1
type = "z-plane"
z0 = 0.0

[[surfaces]]
id = 2
type = "z-plane"
z0 = 1000.0

[[surfaces]]
id = 3
type = "z-plane"
z0 = 2000.0

[[cells]]
id = 1
region = [1, -2]

[[cells]]
id = 2
region = [2, -3]
"#;
    let input: GeometryInput = toml::from_str(text).unwrap();
    let mut geom = Geometry::from_input(input).unwrap();
    geom.finalize(Axis::Z, 1);

    let r = Point3::new(0.0, 0.0, 1000.0000000005);
    for u in [-Vector3::z(), Vector3::z(), Vector3::x()] {
        let found = geom.find_cell(&r, &u);
        assert_eq!(found, geom.find_cell_linear(&r, &u), "u = {:?}", u);
        assert_eq!(found.map(|i| geom.cells[i].id), Some(2), "u = {:?}", u);
    }
    let r = Point3::new(0.0, 0.0, 999.9999999995);
    for u in [-Vector3::z(), Vector3::z(), Vector3::x()] {
        let found = geom.find_cell(&r, &u);
        assert_eq!(found.map(|i| geom.cells[i].id), Some(1), "u = {:?}", u);
    }
}

/// Layered geometry over planes `z = 0, s, 2s, ..., 29s` for scale `s`.
///
/// Each cell is `(kind, lo, len)`: kind 0 spans `[lo, lo + len]`, kind 1 is
/// everything below `lo`, kind 2 everything above `lo` and kind 3 all space.
fn layered(cells: &[(u8, i32, i32)], scale: f64) -> Geometry {
    let surfaces = (0..30)
        .map(|k| Surface {
            id: k + 1,
            kind: SurfaceKind::ZPlane { z0: k as f64 * scale },
        })
        .collect();
    let cells = cells
        .iter()
        .enumerate()
        .map(|(i, &(kind, lo, len))| CellInput {
            id: i as i32 + 1,
            universe: 0,
            material: None,
            region: match kind {
                0 => vec![lo + 1, -(lo + len + 1)],
                1 => vec![-(lo + 1)],
                2 => vec![lo + 1],
                _ => vec![],
            },
        })
        .collect();
    Geometry::from_input(GeometryInput {
        root: 0,
        surfaces,
        cells,
        universes: vec![],
    })
    .unwrap()
}

fn cell_strategy() -> impl Strategy<Value = Vec<(u8, i32, i32)>> {
    prop::collection::vec(
        (
            prop_oneof![8 => Just(0u8), 1 => Just(1u8), 1 => Just(2u8), 1 => Just(3u8)],
            0i32..20,
            0i32..8,
        ),
        1..30,
    )
}

fn coordinate() -> impl Strategy<Value = f64> {
    prop_oneof![(-2i32..32).prop_map(|k| k as f64), -2.0f64..32.0]
}

fn scale() -> impl Strategy<Value = f64> {
    prop_oneof![Just(1e3), Just(1e4), Just(1e5), Just(1e6)]
}

/// `x` moved by `n` units in the last place.
fn ulps(x: f64, n: i64) -> f64 {
    if x > 0.0 {
        f64::from_bits((x.to_bits() as i64 + n) as u64)
    } else {
        n as f64 * f64::EPSILON
    }
}

/// Coordinates within tolerance of plane `k * scale` without sitting on it:
/// offsets of `n * 1e-13` relative to the plane, or of `n` ulps.
fn near_plane(k: i32, n: i64, relative: bool, scale: f64) -> f64 {
    let plane = k as f64 * scale;
    if relative {
        plane + n as f64 * 1e-13 * plane.abs().max(1.0)
    } else {
        ulps(plane, n)
    }
}

fn direction() -> impl Strategy<Value = Vector3<f64>> {
    prop_oneof![
        Just(Vector3::z()),
        Just(-Vector3::z()),
        Just(Vector3::x()),
        (-1.0f64..1.0, -1.0f64..1.0, -1.0f64..1.0).prop_map(|(x, y, z)| Vector3::new(x, y, z)),
    ]
}

proptest! {
    #[test]
    fn candidates_contain_every_containing_cell(
        cells in cell_strategy(),
        z in coordinate(),
        u in direction(),
    ) {
        let mut geom = layered(&cells, 1.0);
        geom.finalize(Axis::Z, 1);
        let r = Point3::new(0.25, -0.5, z);
        let candidates = geom.root_universe().candidates(&r, &u);
        for (i, cell) in geom.cells.iter().enumerate() {
            if cell.contains(&r, &u) {
                prop_assert!(candidates.contains(&i), "cell {} missing at z = {}", cell.id, z);
            }
        }
        prop_assert_eq!(geom.find_cell(&r, &u), geom.find_cell_linear(&r, &u));
    }

    #[test]
    fn near_plane_queries_at_large_scale(
        cells in cell_strategy(),
        scale in scale(),
        k in 0i32..30,
        n in -10i64..=10,
        relative in any::<bool>(),
        u in direction(),
    ) {
        let mut geom = layered(&cells, scale);
        geom.finalize(Axis::Z, 1);
        let z = near_plane(k, n, relative, scale);
        let r = Point3::new(0.25, -0.5, z);
        let candidates = geom.root_universe().candidates(&r, &u);
        for (i, cell) in geom.cells.iter().enumerate() {
            if cell.contains(&r, &u) {
                prop_assert!(candidates.contains(&i), "cell {} missing at z = {:e}", cell.id, z);
            }
        }
        prop_assert_eq!(geom.find_cell(&r, &u), geom.find_cell_linear(&r, &u));
    }

    #[test]
    fn unpartitioned_universe_lists_every_cell(
        cells in cell_strategy(),
        z in coordinate(),
        u in direction(),
    ) {
        let geom = layered(&cells, 1.0);
        let root = geom.root_universe();
        prop_assert!(root.partitioner().is_none());
        prop_assert_eq!(root.candidates(&Point3::new(0.0, 0.0, z), &u), root.cells());
    }

    #[test]
    fn queries_are_repeatable(
        cells in cell_strategy(),
        z in coordinate(),
        u in direction(),
    ) {
        let mut geom = layered(&cells, 1.0);
        geom.finalize(Axis::Z, 1);
        let r = Point3::new(0.0, 0.0, z);
        let first = geom.root_universe().candidates(&r, &u);
        let second = geom.root_universe().candidates(&r, &u);
        prop_assert_eq!(first.as_ptr(), second.as_ptr());
        prop_assert_eq!(first, second);
    }

    #[test]
    fn both_sides_of_a_plane_cover_touching_cells(
        extents in prop::collection::vec((0i32..20, 0i32..8), 1..30),
        k in 0i32..28,
    ) {
        let p = PlanePartitioner::from_extents(
            Axis::Z,
            extents
                .iter()
                .enumerate()
                .map(|(i, &(lo, len))| (i, (lo as f64, (lo + len) as f64))),
        );
        let z = k as f64;
        let r = Point3::new(0.0, 0.0, z);
        let above = p.get_cells(&r, &Vector3::z());
        let below = p.get_cells(&r, &-Vector3::z());
        for (i, &(lo, len)) in extents.iter().enumerate() {
            if lo <= k && k <= lo + len {
                prop_assert!(above.contains(&i) || below.contains(&i), "cell {} at z = {}", i, z);
            }
        }
    }

    #[test]
    fn build_matches_cell_extents(cells in cell_strategy()) {
        let geom = layered(&cells, 1.0);
        let ids: Vec<usize> = (0..geom.cells.len()).collect();
        let built = PlanePartitioner::build(&ids, &geom.cells, Axis::Z);
        let direct = PlanePartitioner::from_extents(
            Axis::Z,
            geom.cells
                .iter()
                .enumerate()
                .map(|(i, c)| (i, c.bounding_box().extent(Axis::Z))),
        );
        prop_assert_eq!(built, direct);
    }
}
