//! Fixtures shared by the integration tests:
//! fractured grids built by duplicating nodes along the fractures,
//! and helpers for checking operator compositions.

#![allow(dead_code)]

use std::collections::HashMap;

use mdexterior::{nas, simplex_grid, Grid, MdGrid, Tolerances, Vec3};

/// Check that `first * second` is defined and exactly zero.
pub fn assert_zero_product(
    first: &nas::CsrMatrix<f64>,
    second: &nas::CsrMatrix<f64>,
    context: &str,
) {
    assert_eq!(
        first.ncols(),
        second.nrows(),
        "{context}: operators don't compose"
    );
    let product = first * second;
    if let Some((row, col, val)) = product.triplet_iter().find(|(_, _, &v)| v != 0.0) {
        panic!("{context}: nonzero entry {val} at ({row}, {col})");
    }
}

fn center_of(grid: &Grid, nodes: &[usize]) -> Vec3 {
    nodes.iter().map(|&n| grid.nodes()[n]).sum::<Vec3>() / nodes.len() as f64
}

/// Find the mortar sides of `lower` on `higher` by matching coordinates.
///
/// Every lower cell must coincide with exactly one higher face on each side,
/// where the side of a face is decided by `side_of` applied to the center of its cell.
pub fn sides_by_coordinates(
    higher: &Grid,
    lower: &Grid,
    side_count: usize,
    side_of: impl Fn(&Vec3) -> usize,
) -> Vec<Vec<usize>> {
    let tol = Tolerances::default();
    let mut face_cell = vec![usize::MAX; higher.num_faces()];
    for (face, cell, _) in higher.cell_faces().triplet_iter() {
        face_cell[face] = cell;
    }

    let mut sides = vec![vec![usize::MAX; lower.num_cells()]; side_count];
    for cell in 0..lower.num_cells() {
        let points: Vec<Vec3> = lower
            .cell_nodes(cell)
            .iter()
            .map(|&n| lower.nodes()[n])
            .collect();
        for (face, face_nodes) in higher.face_nodes().iter().enumerate() {
            let coincides = face_nodes.len() == points.len()
                && face_nodes.iter().all(|&n| {
                    points
                        .iter()
                        .any(|p| tol.coincident(&higher.nodes()[n], p))
                });
            if !coincides {
                continue;
            }
            let higher_cell = face_cell[face];
            let side = side_of(&center_of(higher, &higher.cell_nodes(higher_cell)));
            assert_eq!(
                sides[side][cell],
                usize::MAX,
                "lower cell {cell} has two faces on side {side}"
            );
            sides[side][cell] = face;
        }
    }
    for (side, faces) in sides.iter().enumerate() {
        assert!(
            faces.iter().all(|&f| f != usize::MAX),
            "side {side} doesn't cover every lower cell"
        );
    }
    sides
}

/// Node indices of a structured point lattice
/// where some lattice points have a separate copy for every region touching them.
struct SplitLattice {
    nodes: Vec<Vec3>,
    indices: HashMap<(Vec<usize>, usize), usize>,
}

impl SplitLattice {
    fn new() -> Self {
        Self {
            nodes: Vec::new(),
            indices: HashMap::new(),
        }
    }

    /// Index of the copy of a lattice point belonging to a region,
    /// creating it on first use.
    fn node(&mut self, lattice: &[usize], region: usize, h: f64) -> usize {
        let nodes = &mut self.nodes;
        *self
            .indices
            .entry((lattice.to_vec(), region))
            .or_insert_with(|| {
                let mut p = Vec3::zeros();
                for (axis, &i) in lattice.iter().enumerate() {
                    p[axis] = i as f64 * h;
                }
                nodes.push(p);
                nodes.len() - 1
            })
    }
}

/// The unit square meshed with `n × n` squares,
/// each split into two triangles along its anti-diagonal,
/// and cut by a fracture from (0, 1) to (1, 0).
///
/// Subdomain 0 is the square and 1 the fracture.
pub fn diagonally_fractured_square(n: usize) -> MdGrid {
    let h = 1.0 / n as f64;
    let mut lattice = SplitLattice::new();
    // points on the fracture get a separate copy for the upper half
    let mut node = |i: usize, j: usize, upper: bool| {
        let region = usize::from(upper && i + j == n);
        lattice.node(&[i, j], region, h)
    };

    let mut indices = Vec::with_capacity(6 * n * n);
    for j in 0..n {
        for i in 0..n {
            // the squares with i + j == n - 1 are cut along their anti-diagonal
            let upper = i + j >= n;
            indices.extend_from_slice(&[
                node(i, j, upper),
                node(i + 1, j, upper),
                node(i, j + 1, upper),
            ]);
            let upper = i + j + 1 >= n;
            indices.extend_from_slice(&[
                node(i + 1, j, upper),
                node(i + 1, j + 1, upper),
                node(i, j + 1, upper),
            ]);
        }
    }
    let square = simplex_grid(2, lattice.nodes, indices).unwrap();

    let fracture_nodes = (0..=n)
        .map(|k| Vec3::new(k as f64 * h, 1.0 - k as f64 * h, 0.0))
        .collect();
    let fracture_cells = (0..n).flat_map(|k| [k, k + 1]).collect();
    let fracture = simplex_grid(1, fracture_nodes, fracture_cells).unwrap();

    let sides = sides_by_coordinates(&square, &fracture, 2, |c| {
        usize::from(c.x + c.y > 1.0)
    });

    let mut mdg = MdGrid::new();
    let square = mdg.add_subdomain(square);
    let fracture = mdg.add_subdomain(fracture);
    mdg.couple(fracture, square, sides).unwrap();
    mdg
}

/// The unit square cut by a horizontal and a vertical fracture through its center,
/// with `n × n` (n even) squares split into triangles.
///
/// Subdomains are the square, the horizontal fracture, the vertical fracture
/// and their intersection point, in that order.
pub fn cross_fractured_square(n: usize) -> MdGrid {
    assert!(n % 2 == 0, "fractures must follow grid lines");
    let h = 1.0 / n as f64;
    let half = n / 2;

    // quadrants, numbered by which side of each fracture they're on
    let quadrant = |i: usize, j: usize| usize::from(i >= half) + 2 * usize::from(j >= half);
    let mut lattice = SplitLattice::new();
    let mut indices = Vec::with_capacity(6 * n * n);
    for j in 0..n {
        for i in 0..n {
            let q = quadrant(i, j);
            let mut node = |di: usize, dj: usize| lattice.node(&[i + di, j + dj], q, h);
            let corners = [node(0, 0), node(1, 0), node(1, 1), node(0, 1)];
            indices.extend_from_slice(&[corners[0], corners[1], corners[2]]);
            indices.extend_from_slice(&[corners[0], corners[2], corners[3]]);
        }
    }
    let square = simplex_grid(2, lattice.nodes, indices).unwrap();

    // a fracture along one axis, split in two at the intersection
    let fracture = |axis: usize| {
        let mut lattice = SplitLattice::new();
        let mut cells = Vec::with_capacity(2 * n);
        for k in 0..n {
            let piece = usize::from(k >= half);
            for end in [k, k + 1] {
                let mut point = [half, half];
                point[axis] = end;
                cells.push(lattice.node(&point, piece, h));
            }
        }
        simplex_grid(1, lattice.nodes, cells).unwrap()
    };
    let horizontal = fracture(0);
    let vertical = fracture(1);
    let point = mdexterior::point_grid(Vec3::new(0.5, 0.5, 0.0)).unwrap();

    let below = |c: &Vec3| usize::from(c.y > 0.5);
    let left = |c: &Vec3| usize::from(c.x > 0.5);
    let h_sides = sides_by_coordinates(&square, &horizontal, 2, below);
    let v_sides = sides_by_coordinates(&square, &vertical, 2, left);
    let ph_sides = sides_by_coordinates(&horizontal, &point, 2, left);
    let pv_sides = sides_by_coordinates(&vertical, &point, 2, below);

    let mut mdg = MdGrid::new();
    let square = mdg.add_subdomain(square);
    let horizontal = mdg.add_subdomain(horizontal);
    let vertical = mdg.add_subdomain(vertical);
    let point = mdg.add_subdomain(point);
    mdg.couple(horizontal, square, h_sides).unwrap();
    mdg.couple(vertical, square, v_sides).unwrap();
    mdg.couple(point, horizontal, ph_sides).unwrap();
    mdg.couple(point, vertical, pv_sides).unwrap();
    mdg
}

/// The unit square with `n × n` (n even) squares split into triangles,
/// and a horizontal fracture from the left boundary to the center, where it ends.
///
/// Fracture nodes are split in the square except the one at the tip.
/// Subdomain 0 is the square and 1 the fracture,
/// whose faces are its nodes from left to right so that the last one is the tip.
pub fn immersed_fracture(n: usize) -> MdGrid {
    assert!(n % 2 == 0, "the fracture must end on a grid node");
    let h = 1.0 / n as f64;
    let half = n / 2;

    let mut lattice = SplitLattice::new();
    let mut indices = Vec::with_capacity(6 * n * n);
    for j in 0..n {
        for i in 0..n {
            let above = usize::from(j >= half);
            let mut node = |di: usize, dj: usize| {
                let (x, y) = (i + di, j + dj);
                let region = if y == half && x < half { above } else { 0 };
                lattice.node(&[x, y], region, h)
            };
            let corners = [node(0, 0), node(1, 0), node(1, 1), node(0, 1)];
            indices.extend_from_slice(&[corners[0], corners[1], corners[2]]);
            indices.extend_from_slice(&[corners[0], corners[2], corners[3]]);
        }
    }
    let square = simplex_grid(2, lattice.nodes, indices).unwrap();

    let fracture_nodes = (0..=half)
        .map(|k| Vec3::new(k as f64 * h, 0.5, 0.0))
        .collect();
    let fracture_cells = (0..half).flat_map(|k| [k, k + 1]).collect();
    let fracture = simplex_grid(1, fracture_nodes, fracture_cells).unwrap();

    let sides = sides_by_coordinates(&square, &fracture, 2, |c| usize::from(c.y > 0.5));

    let mut mdg = MdGrid::new();
    let square = mdg.add_subdomain(square);
    let fracture = mdg.add_subdomain(fracture);
    mdg.couple(fracture, square, sides).unwrap();
    mdg
}

/// The unit cube meshed with `n × n × n` (n even) boxes split into tetrahedra,
/// and cut in half by a fracture in the plane x = 1/2.
///
/// Subdomain 0 is the cube and 1 the fracture.
pub fn cut_cube(n: usize) -> MdGrid {
    assert!(n % 2 == 0, "the fracture must follow grid planes");
    let h = 1.0 / n as f64;
    let half = n / 2;

    // the six monotone paths through a box, one per tetrahedron
    const AXIS_ORDERS: [[usize; 3]; 6] = [
        [0, 1, 2],
        [0, 2, 1],
        [1, 0, 2],
        [1, 2, 0],
        [2, 0, 1],
        [2, 1, 0],
    ];

    let mut lattice = SplitLattice::new();
    let mut indices = Vec::with_capacity(24 * n * n * n);
    for k in 0..n {
        for j in 0..n {
            for i in 0..n {
                let region = usize::from(i >= half);
                for order in AXIS_ORDERS {
                    let mut corner = [i, j, k];
                    indices.push(lattice.node(&corner, region, h));
                    for axis in order {
                        corner[axis] += 1;
                        indices.push(lattice.node(&corner, region, h));
                    }
                }
            }
        }
    }
    // only points on the fracture plane need two copies
    let cube = simplex_grid(3, lattice.nodes, indices).unwrap();

    // the fracture's triangles match the diagonals of the boxes' faces
    let node = |j: usize, k: usize| j + (n + 1) * k;
    let mut fracture_nodes = Vec::with_capacity((n + 1) * (n + 1));
    for k in 0..=n {
        for j in 0..=n {
            fracture_nodes.push(Vec3::new(0.5, j as f64 * h, k as f64 * h));
        }
    }
    let mut fracture_cells = Vec::with_capacity(6 * n * n);
    for k in 0..n {
        for j in 0..n {
            fracture_cells.extend_from_slice(&[node(j, k), node(j + 1, k), node(j + 1, k + 1)]);
            fracture_cells.extend_from_slice(&[node(j, k), node(j + 1, k + 1), node(j, k + 1)]);
        }
    }
    let fracture = simplex_grid(2, fracture_nodes, fracture_cells).unwrap();

    let sides = sides_by_coordinates(&cube, &fracture, 2, |c| usize::from(c.x > 0.5));

    let mut mdg = MdGrid::new();
    let cube = mdg.add_subdomain(cube);
    let fracture = mdg.add_subdomain(fracture);
    mdg.couple(fracture, cube, sides).unwrap();
    mdg
}
