//! Derivation of edges and their signed incidences from a grid's faces.
//!
//! What an "edge" is depends on the dimension of the grid:
//! in 3D edges are the segments bounding the polygonal faces,
//! in 2D the faces are segments and their boundaries (the edges) are nodes,
//! and below that there are no edges at all.
//! The matrices for grids of dimension 0 and 1 are zero placeholders
//! that only exist so that operators of every codimension compose.

use itertools::{izip, Itertools};
use nalgebra_sparse as nas;

use super::{EdgeTopology, Grid};
use crate::{geometry, Error, Result, Tolerances};

/// Compute the edge topology of a grid with default tolerances.
///
/// This doesn't modify the grid; see [`Grid::compute_edges`]
/// for the version that stores the result.
pub fn compute_edges(grid: &Grid) -> Result<EdgeTopology> {
    compute_edges_with(grid, &Tolerances::default())
}

/// Compute the edge topology of a grid.
///
/// The tolerances are only used in 2D,
/// where face orientation is decided geometrically.
pub fn compute_edges_with(grid: &Grid, tol: &Tolerances) -> Result<EdgeTopology> {
    let topology = match grid.dim() {
        0 => EdgeTopology {
            edge_nodes: nas::CscMatrix::zeros(1, 1),
            face_edges: nas::CscMatrix::zeros(1, 1),
        },
        1 => EdgeTopology {
            edge_nodes: nas::CscMatrix::zeros(grid.num_nodes(), 1),
            face_edges: nas::CscMatrix::zeros(1, grid.num_faces()),
        },
        2 => edges_2d(grid, tol)?,
        _ => edges_3d(grid)?,
    };
    log::debug!(
        "Computed {} edges for a {}D grid with {} faces",
        topology.num_edges(),
        grid.dim(),
        grid.num_faces(),
    );
    Ok(topology)
}

/// In 2D every face is a segment between two nodes, and the nodes act as edges.
/// Each face is oriented along its normal rotated a quarter turn within the grid's plane.
fn edges_2d(grid: &Grid, tol: &Tolerances) -> Result<EdgeTopology> {
    let nodes = grid.nodes();
    let plane = geometry::plane_normal(nodes);
    log::trace!("Plane normal of 2D grid: {plane:?}");

    let face_count = grid.num_faces();
    let mut col_offsets = Vec::with_capacity(face_count + 1);
    let mut row_indices = Vec::with_capacity(2 * face_count);
    let mut values: Vec<i8> = Vec::with_capacity(2 * face_count);
    col_offsets.push(0);

    let faces = izip!(grid.face_nodes().iter(), grid.face_normals());
    for (face, (face_nodes, normal)) in faces.enumerate() {
        let &[a, b] = face_nodes else {
            return Err(Error::NonUniformFaces {
                face,
                expected: 2,
                found: face_nodes.len(),
            });
        };
        let (lo, hi) = if a < b { (a, b) } else { (b, a) };

        let tangent = nodes[hi] - nodes[lo];
        let tangential = geometry::rotate_in_plane(&plane, normal);
        let alignment = tangential.dot(&tangent);
        if tangent.norm() <= tol.geometric
            || alignment.abs() <= tol.geometric * tangent.norm() * tangential.norm()
        {
            return Err(Error::DegenerateTangent { face });
        }
        let sign: i8 = if alignment > 0.0 { 1 } else { -1 };

        row_indices.extend_from_slice(&[lo, hi]);
        values.extend_from_slice(&[-sign, sign]);
        col_offsets.push(row_indices.len());
    }

    let face_edges = nas::CscMatrix::try_from_csc_data(
        grid.num_nodes(),
        face_count,
        col_offsets,
        row_indices,
        values,
    )?;
    // a node has no boundary; the ones are a formal stand-in
    // that makes the gradient of a 2D grid vanish under the curl
    let mut edge_nodes_coo = nas::CooMatrix::new(1, grid.num_nodes());
    for node in 0..grid.num_nodes() {
        edge_nodes_coo.push(0, node, 1);
    }

    Ok(EdgeTopology {
        edge_nodes: nas::CscMatrix::from(&edge_nodes_coo),
        face_edges,
    })
}

/// In 3D every face is a polygon whose nodes are ordered by the right-hand rule.
/// Edges are the deduplicated segments between consecutive nodes,
/// each pointing from its lower to its higher node index.
fn edges_3d(grid: &Grid) -> Result<EdgeTopology> {
    let face_nodes = grid.face_nodes();
    let nodes_per_face = if face_nodes.is_empty() {
        0
    } else {
        face_nodes.face(0).len()
    };

    // every face contributes one edge per node,
    // going from that node to the next one around the face.
    // edges are stored with their lower index first,
    // remembering whether that flipped the direction of the traversal
    let raw_count = nodes_per_face * face_nodes.len();
    let mut raw_edges: Vec<[usize; 2]> = Vec::with_capacity(raw_count);
    let mut raw_orientations: Vec<i8> = Vec::with_capacity(raw_count);
    for (face, nodes) in face_nodes.iter().enumerate() {
        if nodes.len() != nodes_per_face {
            return Err(Error::NonUniformFaces {
                face,
                expected: nodes_per_face,
                found: nodes.len(),
            });
        }
        for (tail, head) in nodes.iter().copied().circular_tuple_windows() {
            if tail < head {
                raw_edges.push([tail, head]);
                raw_orientations.push(1);
            } else {
                raw_edges.push([head, tail]);
                raw_orientations.push(-1);
            }
        }
    }

    // sort the raw edges lexicographically so that duplicates end up next to each other,
    // and give every raw edge the index of its unique representative
    let mut unique_edges: Vec<[usize; 2]> = Vec::new();
    let mut edge_of_raw: Vec<usize> = vec![0; raw_edges.len()];
    let mut sorted_iter = raw_edges
        .iter()
        .enumerate()
        .sorted_unstable_by_key(|(_, edge)| **edge)
        .peekable();
    while let Some((raw_idx, edge)) = sorted_iter.next() {
        edge_of_raw[raw_idx] = unique_edges.len();
        if matches!(sorted_iter.peek(), Some((_, next)) if *next == edge) {
            continue;
        }
        unique_edges.push(*edge);
    }
    let edge_count = unique_edges.len();

    // every edge goes from its lower node (-1) to its higher node (+1),
    // and the row indices are already sorted within each column
    let edge_nodes = nas::CscMatrix::try_from_csc_data(
        grid.num_nodes(),
        edge_count,
        (0..=edge_count).map(|e| 2 * e).collect(),
        unique_edges.iter().flatten().copied().collect(),
        std::iter::repeat([-1i8, 1]).take(edge_count).flatten().collect(),
    )?;

    // raw edges are already grouped by face in face order,
    // so they form the columns of the face-edge incidence directly
    let face_edges = nas::CscMatrix::try_from_unsorted_csc_data(
        edge_count,
        face_nodes.len(),
        (0..=face_nodes.len()).map(|f| f * nodes_per_face).collect(),
        edge_of_raw,
        raw_orientations,
    )?;

    Ok(EdgeTopology {
        edge_nodes,
        face_edges,
    })
}
