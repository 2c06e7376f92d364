use nalgebra_sparse as nas;

use itertools::{izip, Itertools};

use super::{FaceNodes, Grid};
use crate::{geometry, Error, Result, Vec3};

/// The orders in which a monotone path from the lowest to the highest corner of a box
/// can step along the axes. Each one traces the edges of one Kuhn tetrahedron.
const AXIS_ORDERS: [[usize; 3]; 6] = [
    [0, 1, 2],
    [0, 2, 1],
    [1, 0, 2],
    [1, 2, 0],
    [2, 0, 1],
    [2, 1, 0],
];

/// Build a grid from nodes, ordered face nodes, and the faces of every cell.
///
/// Face normals are computed from the geometry
/// and the signs of `cell_faces` are chosen so that +1 means the normal points out of the cell.
fn build_grid(
    dim: usize,
    nodes: Vec<Vec3>,
    face_nodes: FaceNodes,
    cells: &[Vec<usize>],
) -> Result<Grid> {
    // the geometry below indexes through these
    if dim > 3 {
        return Err(Error::InvalidGrid(format!("dimension {dim} is above 3")));
    }
    let node_count = nodes.len();
    for (face, face_nodes) in face_nodes.iter().enumerate() {
        if let Some(&node) = face_nodes.iter().find(|&&n| n >= node_count) {
            return Err(Error::InvalidGrid(format!(
                "face {face} refers to node {node} outside 0..{node_count}"
            )));
        }
        if dim == 2 && face_nodes.len() != 2 {
            return Err(Error::NonUniformFaces {
                face,
                expected: 2,
                found: face_nodes.len(),
            });
        }
    }
    let face_count = face_nodes.len();
    for (cell, faces) in cells.iter().enumerate() {
        if let Some(&face) = faces.iter().find(|&&f| f >= face_count) {
            return Err(Error::InvalidGrid(format!(
                "cell {cell} refers to face {face} outside 0..{face_count}"
            )));
        }
    }

    let face_centers: Vec<Vec3> = face_nodes
        .iter()
        .map(|face| geometry::centroid(face.iter().map(|&n| &nodes[n])))
        .collect();

    let face_normals: Vec<Vec3> = match dim {
        0 => Vec::new(),
        1 => {
            // all faces are points on a line and share its direction as their normal
            let dir = geometry::line_direction(&nodes);
            vec![dir; face_nodes.len()]
        }
        2 => {
            let plane = geometry::plane_normal(&nodes);
            face_nodes
                .iter()
                .map(|face| (nodes[face[1]] - nodes[face[0]]).cross(&plane))
                .collect()
        }
        _ => face_nodes
            .iter()
            .map(|face| {
                let verts: Vec<Vec3> = face.iter().map(|&n| nodes[n]).collect();
                geometry::polygon_normal(&verts)
            })
            .collect(),
    };

    let mut cell_faces = nas::CooMatrix::new(face_nodes.len(), cells.len());
    for (cell_idx, faces) in cells.iter().enumerate() {
        let cell_center = geometry::centroid(
            faces
                .iter()
                .flat_map(|&f| face_nodes.face(f))
                .unique()
                .map(|&n| &nodes[n]),
        );
        for &f in faces {
            let outward = face_normals[f].dot(&(face_centers[f] - cell_center));
            if outward == 0.0 {
                return Err(Error::InvalidGrid(format!(
                    "face {f} has no well-defined side relative to cell {cell_idx}"
                )));
            }
            cell_faces.push(f, cell_idx, if outward > 0.0 { 1 } else { -1 });
        }
    }

    Grid::new(
        dim,
        nodes,
        face_nodes,
        nas::CscMatrix::from(&cell_faces),
        face_normals,
    )
}

/// A 0-dimensional grid: one node and one cell, no faces.
///
/// Typically the intersection point of lower-dimensional subdomains.
pub fn point_grid(point: Vec3) -> Result<Grid> {
    Grid::new(
        0,
        vec![point],
        FaceNodes::new(),
        nas::CscMatrix::zeros(0, 1),
        Vec::new(),
    )
}

/// A Cartesian grid of `cells[i]` cells along each axis,
/// covering the box `[0, extent[0]] × ...`.
///
/// The dimension of the grid is the length of `cells`, which must be 1, 2 or 3.
/// Nodes are numbered x-first, then y, then z.
pub fn cart_grid(cells: &[usize], extent: &[f64]) -> Result<Grid> {
    if cells.len() != extent.len() {
        return Err(Error::InvalidGrid(format!(
            "{} cell counts for {} extents",
            cells.len(),
            extent.len()
        )));
    }
    if cells.iter().any(|&c| c == 0) {
        return Err(Error::InvalidGrid("every axis needs at least one cell".into()));
    }
    match cells.len() {
        1 => cart_grid_1d(cells[0], extent[0]),
        2 => cart_grid_2d([cells[0], cells[1]], [extent[0], extent[1]]),
        3 => cart_grid_3d(
            [cells[0], cells[1], cells[2]],
            [extent[0], extent[1], extent[2]],
        ),
        d => Err(Error::InvalidGrid(format!(
            "Cartesian grids of dimension {d} are not supported"
        ))),
    }
}

fn cart_grid_1d(n: usize, length: f64) -> Result<Grid> {
    let h = length / n as f64;
    let nodes = (0..=n).map(|i| Vec3::new(i as f64 * h, 0.0, 0.0)).collect();
    // faces of a 1D grid are its nodes
    let face_nodes = FaceNodes::from_uniform(1, (0..=n).collect());
    let cells: Vec<Vec<usize>> = (0..n).map(|i| vec![i, i + 1]).collect();
    build_grid(1, nodes, face_nodes, &cells)
}

fn cart_grid_2d([nx, ny]: [usize; 2], [lx, ly]: [f64; 2]) -> Result<Grid> {
    let (hx, hy) = (lx / nx as f64, ly / ny as f64);
    let node = |i: usize, j: usize| i + j * (nx + 1);

    let mut nodes = Vec::with_capacity((nx + 1) * (ny + 1));
    for j in 0..=ny {
        for i in 0..=nx {
            nodes.push(Vec3::new(i as f64 * hx, j as f64 * hy, 0.0));
        }
    }

    // faces normal to x first, then faces normal to y
    let x_face = |i: usize, j: usize| i + j * (nx + 1);
    let x_face_count = (nx + 1) * ny;
    let y_face = |i: usize, j: usize| x_face_count + i + j * nx;

    let mut face_nodes = FaceNodes::new();
    for j in 0..ny {
        for i in 0..=nx {
            face_nodes.push(&[node(i, j), node(i, j + 1)]);
        }
    }
    for j in 0..=ny {
        for i in 0..nx {
            face_nodes.push(&[node(i, j), node(i + 1, j)]);
        }
    }

    let mut cells = Vec::with_capacity(nx * ny);
    for j in 0..ny {
        for i in 0..nx {
            cells.push(vec![x_face(i, j), x_face(i + 1, j), y_face(i, j), y_face(i, j + 1)]);
        }
    }

    build_grid(2, nodes, face_nodes, &cells)
}

fn cart_grid_3d([nx, ny, nz]: [usize; 3], [lx, ly, lz]: [f64; 3]) -> Result<Grid> {
    let (hx, hy, hz) = (lx / nx as f64, ly / ny as f64, lz / nz as f64);
    let node = |i: usize, j: usize, k: usize| i + (nx + 1) * (j + (ny + 1) * k);

    let mut nodes = Vec::with_capacity((nx + 1) * (ny + 1) * (nz + 1));
    for k in 0..=nz {
        for j in 0..=ny {
            for i in 0..=nx {
                nodes.push(Vec3::new(i as f64 * hx, j as f64 * hy, k as f64 * hz));
            }
        }
    }

    let x_face = |i: usize, j: usize, k: usize| i + (nx + 1) * (j + ny * k);
    let x_face_count = (nx + 1) * ny * nz;
    let y_face = |i: usize, j: usize, k: usize| x_face_count + i + nx * (j + (ny + 1) * k);
    let y_face_count = nx * (ny + 1) * nz;
    let z_face = |i: usize, j: usize, k: usize| x_face_count + y_face_count + i + nx * (j + ny * k);

    // quadrilateral faces with nodes listed in a cycle around the face
    let mut face_nodes = FaceNodes::new();
    for k in 0..nz {
        for j in 0..ny {
            for i in 0..=nx {
                face_nodes.push(&[
                    node(i, j, k),
                    node(i, j + 1, k),
                    node(i, j + 1, k + 1),
                    node(i, j, k + 1),
                ]);
            }
        }
    }
    for k in 0..nz {
        for j in 0..=ny {
            for i in 0..nx {
                face_nodes.push(&[
                    node(i, j, k),
                    node(i + 1, j, k),
                    node(i + 1, j, k + 1),
                    node(i, j, k + 1),
                ]);
            }
        }
    }
    for k in 0..=nz {
        for j in 0..ny {
            for i in 0..nx {
                face_nodes.push(&[
                    node(i, j, k),
                    node(i + 1, j, k),
                    node(i + 1, j + 1, k),
                    node(i, j + 1, k),
                ]);
            }
        }
    }

    let mut cells = Vec::with_capacity(nx * ny * nz);
    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                cells.push(vec![
                    x_face(i, j, k),
                    x_face(i + 1, j, k),
                    y_face(i, j, k),
                    y_face(i, j + 1, k),
                    z_face(i, j, k),
                    z_face(i, j, k + 1),
                ]);
            }
        }
    }

    build_grid(3, nodes, face_nodes, &cells)
}

/// Build a grid of `dim`-simplices from raw nodes and indices.
///
/// The indices are given as a flat array,
/// where every `dim + 1` indices correspond to one cell.
/// Faces are inferred as the deduplicated boundary simplices of the cells,
/// ordered lexicographically by their (sorted) node indices.
pub fn simplex_grid(dim: usize, nodes: Vec<Vec3>, mut indices: Vec<usize>) -> Result<Grid> {
    if !(1..=3).contains(&dim) {
        return Err(Error::InvalidGrid(format!(
            "simplex grids must have dimension 1, 2 or 3, got {dim}"
        )));
    }
    let simplex_size = dim + 1;
    if indices.len() % simplex_size != 0 {
        return Err(Error::InvalidGrid(format!(
            "{} indices don't divide into simplices of {simplex_size} nodes",
            indices.len()
        )));
    }
    if let Some(&node) = indices.iter().find(|&&n| n >= nodes.len()) {
        return Err(Error::InvalidGrid(format!(
            "simplex refers to node {node} outside 0..{}",
            nodes.len()
        )));
    }
    let cell_count = indices.len() / simplex_size;

    // by convention, sort simplices to have their indices in ascending order
    // so that a face can be identified with its sorted node list
    for simplex in indices.chunks_exact_mut(simplex_size) {
        simplex.sort_unstable();
    }

    // every combination of `dim` vertices in a cell is a face on its boundary
    let face_size = dim;
    let mut boundary_vert_indices: Vec<usize> =
        Vec::with_capacity(cell_count * simplex_size * face_size);
    let mut boundary_cells: Vec<usize> = Vec::with_capacity(cell_count * simplex_size);
    let mut curr_face: Vec<usize> = Vec::with_capacity(face_size);
    for (cell_idx, simplex) in indices.chunks_exact(simplex_size).enumerate() {
        for exclude_idx in 0..simplex_size {
            curr_face.clear();
            curr_face.extend(
                simplex
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != exclude_idx)
                    .map(|(_, v)| *v),
            );
            boundary_vert_indices.extend_from_slice(&curr_face);
            boundary_cells.push(cell_idx);
        }
    }

    // sort the boundary simplices in lexicographic order by vertex indices
    // so that duplicates end up next to each other
    let mut face_nodes = FaceNodes::new();
    let mut cells: Vec<Vec<usize>> = vec![Vec::with_capacity(simplex_size); cell_count];
    let mut sorted_iter = izip!(
        boundary_vert_indices.chunks_exact(face_size),
        &boundary_cells
    )
    .sorted_unstable_by_key(|(face, _)| *face)
    .peekable();
    while let Some((face, &cell_idx)) = sorted_iter.next() {
        cells[cell_idx].push(face_nodes.len());
        // a duplicate means the face is shared by another cell;
        // stay on the same face until the next distinct one
        if matches!(sorted_iter.peek(), Some((next, _)) if *next == face) {
            continue;
        }
        face_nodes.push(face);
    }

    build_grid(dim, nodes, face_nodes, &cells)
}

/// A triangle grid of `nx × ny` rectangles, each split in two
/// along the diagonal from its lower left to its upper right corner.
pub fn structured_triangle_grid([nx, ny]: [usize; 2], [lx, ly]: [f64; 2]) -> Result<Grid> {
    let (hx, hy) = (lx / nx as f64, ly / ny as f64);
    let node = |i: usize, j: usize| i + j * (nx + 1);

    let mut nodes = Vec::with_capacity((nx + 1) * (ny + 1));
    for j in 0..=ny {
        for i in 0..=nx {
            nodes.push(Vec3::new(i as f64 * hx, j as f64 * hy, 0.0));
        }
    }

    let mut indices = Vec::with_capacity(6 * nx * ny);
    for j in 0..ny {
        for i in 0..nx {
            indices.extend_from_slice(&[node(i, j), node(i + 1, j), node(i + 1, j + 1)]);
            indices.extend_from_slice(&[node(i, j), node(i + 1, j + 1), node(i, j + 1)]);
        }
    }

    simplex_grid(2, nodes, indices)
}

/// A tetrahedral grid of `nx × ny × nz` boxes,
/// each split into six tetrahedra sharing the box diagonal
/// from its lowest to its highest corner (Kuhn subdivision).
///
/// The subdivision is conforming:
/// neighboring boxes split their shared rectangle along the same diagonal.
pub fn structured_tetrahedral_grid(
    [nx, ny, nz]: [usize; 3],
    [lx, ly, lz]: [f64; 3],
) -> Result<Grid> {
    let (hx, hy, hz) = (lx / nx as f64, ly / ny as f64, lz / nz as f64);
    let node = |[i, j, k]: [usize; 3]| i + (nx + 1) * (j + (ny + 1) * k);

    let mut nodes = Vec::with_capacity((nx + 1) * (ny + 1) * (nz + 1));
    for k in 0..=nz {
        for j in 0..=ny {
            for i in 0..=nx {
                nodes.push(Vec3::new(i as f64 * hx, j as f64 * hy, k as f64 * hz));
            }
        }
    }

    let mut indices = Vec::with_capacity(24 * nx * ny * nz);
    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                for order in AXIS_ORDERS {
                    let mut corner = [i, j, k];
                    indices.push(node(corner));
                    for axis in order {
                        corner[axis] += 1;
                        indices.push(node(corner));
                    }
                }
            }
        }
    }

    simplex_grid(3, nodes, indices)
}
