//! Mortar grids coupling a subdomain to one of dimension one higher.
//!
//! A mortar grid doesn't have topology of its own in the usual sense.
//! Its incidence matrices hold the jump operators
//! that carry quantities of the higher-dimensional grid
//! onto the lower-dimensional one across the coupling surface.

use fixedbitset as fb;
use nalgebra_sparse as nas;

use crate::{
    grid::{EdgeTopology, Grid},
    Error, Result, Tolerances, Vec3,
};

/// The coupling between a lower-dimensional grid
/// and the faces of a higher-dimensional grid it lies on.
///
/// A mortar cell is a pair of a lower cell and a higher face that coincides with it.
/// There is one such pair per lower cell on each *side* of the lower grid;
/// a fracture has two sides, a subdomain touching the higher one from outside has one.
#[derive(Clone, Debug)]
pub struct MortarGrid {
    dim: usize,
    /// For each side, the higher face coinciding with every lower cell.
    sides: Vec<Vec<usize>>,
    /// Jump of face quantities, `higher.num_faces × lower.num_cells`.
    cell_faces: nas::CscMatrix<i8>,
    /// Jumps of edge and node quantities, computed after both grids have edges.
    edges: Option<EdgeTopology>,
}

impl MortarGrid {
    /// Couple `lower` to the faces of `higher`.
    ///
    /// `sides[s][k]` is the face of `higher` that coincides with cell `k` of `lower` on side `s`.
    /// Every such face must lie on the boundary of exactly one higher cell,
    /// i.e. the higher grid must already be split along the lower one.
    pub fn new(higher: &Grid, lower: &Grid, sides: Vec<Vec<usize>>) -> Result<Self> {
        if lower.dim() + 1 != higher.dim() {
            return Err(Error::InvalidGrid(format!(
                "a mortar grid couples consecutive dimensions, got {}D to {}D",
                lower.dim(),
                higher.dim()
            )));
        }

        // row access to find the single cell of a face
        let face_cells = nas::CsrMatrix::from(higher.cell_faces());

        let mut cell_faces = nas::CooMatrix::new(higher.num_faces(), lower.num_cells());
        for (side_idx, side) in sides.iter().enumerate() {
            if side.len() != lower.num_cells() {
                return Err(Error::MortarSide {
                    side: side_idx,
                    expected: lower.num_cells(),
                    found: side.len(),
                });
            }
            for (cell, &face) in side.iter().enumerate() {
                if face >= higher.num_faces() {
                    return Err(Error::MortarFace { cell, face });
                }
                let &[orientation] = face_cells.row(face).values() else {
                    return Err(Error::MortarFace { cell, face });
                };
                // a flux leaving the higher cell enters the lower one
                cell_faces.push(face, cell, -orientation);
            }
        }

        log::debug!(
            "Coupled {} lower cells to {}D grid on {} sides",
            lower.num_cells(),
            higher.dim(),
            sides.len()
        );

        Ok(Self {
            dim: lower.dim(),
            sides,
            cell_faces: nas::CscMatrix::from(&cell_faces),
            edges: None,
        })
    }

    /// Dimension of the mortar grid, equal to that of the lower grid.
    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// The higher faces coinciding with each lower cell, per side.
    #[inline]
    pub fn sides(&self) -> &[Vec<usize>] {
        &self.sides
    }

    /// Number of mortar cells, i.e. lower cells times sides.
    #[inline]
    pub fn num_cells(&self) -> usize {
        self.sides.iter().map(Vec::len).sum()
    }

    /// Jump from higher faces to lower cells, `higher.num_faces × lower.num_cells`.
    #[inline]
    pub fn cell_faces(&self) -> &nas::CscMatrix<i8> {
        &self.cell_faces
    }

    /// Jumps of edge and node quantities, if they've been computed.
    ///
    /// `face_edges` is `higher.num_edges × lower.num_faces`
    /// and `edge_nodes` is `higher.num_nodes × lower.num_edges`,
    /// with both counts in the sense of the respective grids' edge topology.
    #[inline]
    pub fn edges(&self) -> Option<&EdgeTopology> {
        self.edges.as_ref()
    }

    pub(crate) fn require_edges(&self) -> Result<&EdgeTopology> {
        self.edges
            .as_ref()
            .ok_or_else(|| Error::MissingEdges(format!("{}D mortar grid", self.dim)))
    }

    /// Compute the edge and node jumps with default tolerances.
    ///
    /// Both grids must be the ones this mortar grid was built from
    /// and must have their edges computed.
    pub fn compute_edges(&mut self, higher: &Grid, lower: &Grid) -> Result<&EdgeTopology> {
        self.compute_edges_with(higher, lower, &Tolerances::default())
    }

    /// Compute the edge and node jumps.
    ///
    /// Lower entities are identified with higher ones
    /// by matching node coordinates within the geometric tolerance.
    /// The edge jump of a lower face is the sum over sides
    /// of the higher edge it coincides with on each side,
    /// so an edge that isn't split along the lower grid jumps by zero.
    /// The same goes for node jumps, which only exist for a 3D higher grid.
    pub fn compute_edges_with(
        &mut self,
        higher: &Grid,
        lower: &Grid,
        tol: &Tolerances,
    ) -> Result<&EdgeTopology> {
        let higher_edges = higher.require_edges()?;
        let lower_edges = lower.require_edges()?;

        let mut face_edges = nas::CooMatrix::new(
            higher_edges.face_edges.nrows(),
            lower_edges.face_edges.ncols(),
        );
        let mut edge_nodes = nas::CooMatrix::new(
            higher_edges.edge_nodes.nrows(),
            lower_edges.edge_nodes.ncols(),
        );

        if higher.dim() >= 2 {
            for side in 0..self.sides.len() {
                let jumps = self.edge_jumps(side, higher, lower, tol)?;

                let mut face_done = fb::FixedBitSet::with_capacity(lower.num_faces());
                for jump in &jumps {
                    // a lower face is shared by two lower cells
                    // which agree on its jump
                    if face_done.put(jump.lower_face) {
                        continue;
                    }
                    face_edges.push(jump.higher_edge, jump.lower_face, jump.value);
                }

                if higher.dim() == 3 {
                    let mut node_done = fb::FixedBitSet::with_capacity(lower.num_nodes());
                    for jump in &jumps {
                        Self::push_node_jumps(
                            jump,
                            higher,
                            lower,
                            tol,
                            &mut node_done,
                            &mut edge_nodes,
                        )?;
                    }
                }
            }
        }

        self.edges = Some(EdgeTopology {
            edge_nodes: nas::CscMatrix::from(&edge_nodes),
            face_edges: nas::CscMatrix::from(&face_edges),
        });
        log::debug!("Computed edge jumps of {}D mortar grid", self.dim);
        self.require_edges()
    }

    /// The jump of every (lower cell, lower face) pair on one side,
    /// together with the higher edge the face coincides with.
    fn edge_jumps(
        &self,
        side: usize,
        higher: &Grid,
        lower: &Grid,
        tol: &Tolerances,
    ) -> Result<Vec<EdgeJump>> {
        let higher_edges = higher.require_edges()?;
        let mut jumps = Vec::new();

        for (cell, &face) in self.sides[side].iter().enumerate() {
            let face_jump = entry(&self.cell_faces, face, cell);
            let lower_faces = lower.cell_faces().col(cell);
            for (&lower_face, &cell_orientation) in
                lower_faces.row_indices().iter().zip(lower_faces.values())
            {
                let higher_edge = match higher.dim() {
                    2 => {
                        // edges are nodes and a lower face is a single node
                        let &[node] = lower.face_nodes().face(lower_face) else {
                            return Err(Error::NonUniformFaces {
                                face: lower_face,
                                expected: 1,
                                found: lower.face_nodes().face(lower_face).len(),
                            });
                        };
                        match_node(higher, face, lower, node, tol)
                            .ok_or(Error::UnmatchedNode { cell, node, face })?
                    }
                    _ => find_higher_edge(
                        higher,
                        higher_edges,
                        face,
                        lower,
                        cell,
                        lower_face,
                        tol,
                    )?,
                };
                let value = -face_jump
                    * entry(&higher_edges.face_edges, higher_edge, face)
                    * cell_orientation;
                jumps.push(EdgeJump {
                    higher_face: face,
                    cell,
                    lower_face,
                    higher_edge,
                    value,
                });
            }
        }
        Ok(jumps)
    }

    fn push_node_jumps(
        jump: &EdgeJump,
        higher: &Grid,
        lower: &Grid,
        tol: &Tolerances,
        node_done: &mut fb::FixedBitSet,
        edge_nodes: &mut nas::CooMatrix<i8>,
    ) -> Result<()> {
        let higher_edges = higher.require_edges()?;
        let lower_edges = lower.require_edges()?;

        // in a 2D lower grid, edges are nodes
        let lower_nodes = lower_edges.face_edges.col(jump.lower_face);
        for (&lower_node, &face_orientation) in
            lower_nodes.row_indices().iter().zip(lower_nodes.values())
        {
            if node_done.put(lower_node) {
                continue;
            }
            let higher_node = match_node(higher, jump.higher_face, lower, lower_node, tol)
                .ok_or(Error::UnmatchedNode {
                    cell: jump.cell,
                    node: lower_node,
                    face: jump.higher_face,
                })?;
            let value = -jump.value
                * entry(&higher_edges.edge_nodes, higher_node, jump.higher_edge)
                * face_orientation;
            edge_nodes.push(higher_node, lower_node, value);
        }
        Ok(())
    }
}

/// A lower face, the higher edge it coincides with on one side, and its jump.
#[derive(Clone, Copy, Debug)]
struct EdgeJump {
    higher_face: usize,
    cell: usize,
    lower_face: usize,
    higher_edge: usize,
    value: i8,
}

/// Value of a signed incidence at a position, zero if not present.
fn entry(mat: &nas::CscMatrix<i8>, row: usize, col: usize) -> i8 {
    mat.get_entry(row, col).map_or(0, |e| e.into_value())
}

/// The node of a higher face that coincides with a lower node.
fn match_node(
    higher: &Grid,
    higher_face: usize,
    lower: &Grid,
    lower_node: usize,
    tol: &Tolerances,
) -> Option<usize> {
    let point: &Vec3 = &lower.nodes()[lower_node];
    higher
        .face_nodes()
        .face(higher_face)
        .iter()
        .copied()
        .find(|&n| tol.coincident(&higher.nodes()[n], point))
}

/// The edge of a higher 3D face that coincides with a (segment) face of a lower cell.
fn find_higher_edge(
    higher: &Grid,
    higher_edges: &EdgeTopology,
    higher_face: usize,
    lower: &Grid,
    cell: usize,
    lower_face: usize,
    tol: &Tolerances,
) -> Result<usize> {
    let lower_nodes = lower.face_nodes().face(lower_face);
    let mut ends = Vec::with_capacity(lower_nodes.len());
    for &node in lower_nodes {
        ends.push(
            match_node(higher, higher_face, lower, node, tol).ok_or(Error::UnmatchedNode {
                cell,
                node,
                face: higher_face,
            })?,
        );
    }
    ends.sort_unstable();

    higher_edges
        .face_edges
        .col(higher_face)
        .row_indices()
        .iter()
        .copied()
        .find(|&e| higher_edges.edge_nodes.col(e).row_indices() == ends.as_slice())
        .ok_or(Error::UnmatchedEdge {
            cell,
            lower_face,
            face: higher_face,
        })
}
