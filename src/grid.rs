//! The grid of a single subdomain:
//! nodes, faces and cells of one dimension,
//! plus the edge topology derived from them.

/// Construction of structured and simplicial grids.
mod grid_construction;
pub use grid_construction::{
    cart_grid, point_grid, simplex_grid, structured_tetrahedral_grid, structured_triangle_grid,
};

pub mod edges;

//

use fixedbitset as fb;
use nalgebra_sparse as nas;

use std::collections::HashMap;

use crate::{Error, Result, Tolerances, Vec3};

/// Name of the tag flagging faces at the tip of a lower-dimensional subdomain.
pub const TIP_FACES: &str = "tip_faces";
/// Name of the tag flagging edges at the tip of a lower-dimensional subdomain.
/// Derived from the face and node tips when edges are computed.
pub const TIP_EDGES: &str = "tip_edges";
/// Name of the tag flagging nodes at the tip of a lower-dimensional subdomain.
pub const TIP_NODES: &str = "tip_nodes";

/// Ordered node lists of every face, stored in a flat Vec with offsets.
///
/// Unlike a sparse incidence matrix, this keeps the order the nodes were given in,
/// which for 3D grids encodes the right-hand-rule traversal of each face.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FaceNodes {
    /// `offsets[f]..offsets[f + 1]` is the range of face `f` in `indices`.
    offsets: Vec<usize>,
    indices: Vec<usize>,
}

impl Default for FaceNodes {
    fn default() -> Self {
        Self {
            offsets: vec![0],
            indices: Vec::new(),
        }
    }
}

impl FaceNodes {
    /// Create an empty set of faces.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create faces that all have the same number of nodes
    /// from a flat list of node indices.
    /// Trailing indices that don't fill a whole face are dropped.
    pub fn from_uniform(nodes_per_face: usize, mut indices: Vec<usize>) -> Self {
        let face_count = indices.len().checked_div(nodes_per_face).unwrap_or(0);
        indices.truncate(face_count * nodes_per_face);
        let offsets = (0..=face_count).map(|f| f * nodes_per_face).collect();
        Self { offsets, indices }
    }

    /// Append a face with the given ordered nodes.
    pub fn push(&mut self, nodes: &[usize]) {
        self.indices.extend_from_slice(nodes);
        self.offsets.push(self.indices.len());
    }

    /// Number of faces.
    #[inline]
    pub fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Whether there are no faces.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The ordered nodes of face `f`.
    #[inline]
    pub fn face(&self, f: usize) -> &[usize] {
        &self.indices[self.offsets[f]..self.offsets[f + 1]]
    }

    /// Iterate over the node lists of all faces.
    pub fn iter(&self) -> impl '_ + Iterator<Item = &[usize]> {
        self.offsets
            .windows(2)
            .map(|range| &self.indices[range[0]..range[1]])
    }

    /// Boolean node-to-face incidence, `num_nodes × num_faces`.
    /// Node order within a face is lost in this form.
    pub fn incidence(&self, num_nodes: usize) -> nas::CscMatrix<i8> {
        let mut coo = nas::CooMatrix::new(num_nodes, self.len());
        for (face, nodes) in self.iter().enumerate() {
            for &node in nodes {
                coo.push(node, face, 1);
            }
        }
        nas::CscMatrix::from(&coo)
    }
}

impl<A: AsRef<[usize]>> FromIterator<A> for FaceNodes {
    fn from_iter<T: IntoIterator<Item = A>>(iter: T) -> Self {
        let mut faces = Self::new();
        for nodes in iter {
            faces.push(nodes.as_ref());
        }
        faces
    }
}

/// Edges of a grid, given by their signed incidence to nodes and faces.
///
/// Both matrices are stored transposed relative to the operators built from them,
/// i.e. the gradient is `edge_nodes^T` and the curl is `face_edges^T`.
#[derive(Clone, Debug, PartialEq)]
pub struct EdgeTopology {
    /// `num_nodes × num_edges`; entry (n, e) is -1 if edge e points away from node n
    /// and +1 if it points into it.
    pub edge_nodes: nas::CscMatrix<i8>,
    /// `num_edges × num_faces`; entry (e, f) is +1 if face f traverses edge e
    /// in the edge's direction and -1 if in the opposite direction.
    pub face_edges: nas::CscMatrix<i8>,
}

impl EdgeTopology {
    /// Number of edges (placeholder edges included for grids below dimension 2).
    #[inline]
    pub fn num_edges(&self) -> usize {
        self.edge_nodes.ncols()
    }
}

/// A grid of a single dimension between 0 and 3.
///
/// Topology is immutable after construction,
/// with the exception of the edge topology
/// which is computed once with [`compute_edges`][Self::compute_edges]
/// and read afterwards.
#[derive(Clone, Debug)]
pub struct Grid {
    dim: usize,
    nodes: Vec<Vec3>,
    face_nodes: FaceNodes,
    /// `num_faces × num_cells`, +1 where the face normal points out of the cell.
    cell_faces: nas::CscMatrix<i8>,
    face_normals: Vec<Vec3>,
    tags: HashMap<String, fb::FixedBitSet>,
    edges: Option<EdgeTopology>,
}

impl Grid {
    /// Construct a grid from its raw topology and geometry.
    ///
    /// `cell_faces` must be `face_nodes.len() × num_cells`
    /// and there must be one normal per face.
    /// The tags [`TIP_FACES`] and [`TIP_NODES`] are initialized to all-false.
    pub fn new(
        dim: usize,
        nodes: Vec<Vec3>,
        face_nodes: FaceNodes,
        cell_faces: nas::CscMatrix<i8>,
        face_normals: Vec<Vec3>,
    ) -> Result<Self> {
        if dim > 3 {
            return Err(Error::InvalidGrid(format!("dimension {dim} is above 3")));
        }
        if cell_faces.nrows() != face_nodes.len() {
            return Err(Error::InvalidGrid(format!(
                "cell_faces has {} rows for {} faces",
                cell_faces.nrows(),
                face_nodes.len()
            )));
        }
        if face_normals.len() != face_nodes.len() {
            return Err(Error::InvalidGrid(format!(
                "{} face normals for {} faces",
                face_normals.len(),
                face_nodes.len()
            )));
        }
        let node_count = nodes.len();
        if let Some(face) = face_nodes
            .iter()
            .position(|face| face.iter().any(|&n| n >= node_count))
        {
            return Err(Error::InvalidGrid(format!(
                "face {face} refers to a node outside 0..{node_count}"
            )));
        }

        let mut tags = HashMap::new();
        tags.insert(
            TIP_FACES.to_string(),
            fb::FixedBitSet::with_capacity(face_nodes.len()),
        );
        tags.insert(TIP_NODES.to_string(), fb::FixedBitSet::with_capacity(node_count));

        Ok(Self {
            dim,
            nodes,
            face_nodes,
            cell_faces,
            face_normals,
            tags,
            edges: None,
        })
    }

    /// Dimension of the grid.
    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of nodes.
    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Number of faces, i.e. entities of codimension 1.
    #[inline]
    pub fn num_faces(&self) -> usize {
        self.face_nodes.len()
    }

    /// Number of cells.
    #[inline]
    pub fn num_cells(&self) -> usize {
        self.cell_faces.ncols()
    }

    /// Number of edges, if they've been computed.
    #[inline]
    pub fn num_edges(&self) -> Option<usize> {
        self.edges.as_ref().map(EdgeTopology::num_edges)
    }

    /// Node coordinates.
    #[inline]
    pub fn nodes(&self) -> &[Vec3] {
        &self.nodes
    }

    /// Ordered node lists of the faces.
    #[inline]
    pub fn face_nodes(&self) -> &FaceNodes {
        &self.face_nodes
    }

    /// Boolean `num_nodes × num_faces` incidence of nodes to faces.
    pub fn face_node_incidence(&self) -> nas::CscMatrix<i8> {
        self.face_nodes.incidence(self.num_nodes())
    }

    /// Signed `num_faces × num_cells` incidence of faces to cells.
    #[inline]
    pub fn cell_faces(&self) -> &nas::CscMatrix<i8> {
        &self.cell_faces
    }

    /// One normal vector per face.
    #[inline]
    pub fn face_normals(&self) -> &[Vec3] {
        &self.face_normals
    }

    /// Sorted, deduplicated nodes of a cell, gathered through its faces.
    /// A 0-dimensional cell has no faces and is made of all the grid's nodes.
    pub fn cell_nodes(&self, cell: usize) -> Vec<usize> {
        if self.dim == 0 {
            return (0..self.num_nodes()).collect();
        }
        let mut nodes: Vec<usize> = self
            .cell_faces
            .col(cell)
            .row_indices()
            .iter()
            .flat_map(|&f| self.face_nodes.face(f).iter().copied())
            .collect();
        nodes.sort_unstable();
        nodes.dedup();
        nodes
    }

    /// Edge topology, if it has been computed.
    #[inline]
    pub fn edges(&self) -> Option<&EdgeTopology> {
        self.edges.as_ref()
    }

    /// Edge topology, or an error naming this grid if it hasn't been computed.
    pub(crate) fn require_edges(&self) -> Result<&EdgeTopology> {
        self.edges
            .as_ref()
            .ok_or_else(|| Error::MissingEdges(format!("{}D grid", self.dim)))
    }

    /// Compute the edge topology with default tolerances and store it in the grid.
    ///
    /// Recomputing overwrites the stored topology with an identical one.
    pub fn compute_edges(&mut self) -> Result<&EdgeTopology> {
        self.compute_edges_with(&Tolerances::default())
    }

    /// Compute the edge topology with the given tolerances and store it in the grid.
    pub fn compute_edges_with(&mut self, tol: &Tolerances) -> Result<&EdgeTopology> {
        let topology = edges::compute_edges_with(self, tol)?;
        self.set_edges(topology)?;
        self.require_edges()
    }

    /// Attach an externally computed edge topology to this grid.
    ///
    /// Also derives the [`TIP_EDGES`] tag:
    /// in 3D the edges of tip faces, in 2D (where edges are nodes) the tip nodes,
    /// and nothing below that.
    pub fn set_edges(&mut self, topology: EdgeTopology) -> Result<()> {
        let num_edges = topology.num_edges();
        if topology.face_edges.nrows() != num_edges
            || (self.dim > 0 && topology.face_edges.ncols() != self.num_faces())
        {
            return Err(Error::InvalidGrid(format!(
                "edge topology of shape {}x{} doesn't fit a {}D grid with {} faces",
                topology.face_edges.nrows(),
                topology.face_edges.ncols(),
                self.dim,
                self.num_faces(),
            )));
        }
        // 2D edges are nodes and have a single placeholder row
        let node_rows = if self.dim == 2 { 1 } else { self.num_nodes() };
        if topology.edge_nodes.nrows() != node_rows {
            return Err(Error::InvalidGrid(format!(
                "edge_nodes has {} rows, expected {node_rows} for a {}D grid with {} nodes",
                topology.edge_nodes.nrows(),
                self.dim,
                self.num_nodes(),
            )));
        }

        let mut tip_edges = fb::FixedBitSet::with_capacity(num_edges);
        match self.dim {
            3 => {
                for face in self.tags[TIP_FACES].ones() {
                    tip_edges.extend(topology.face_edges.col(face).row_indices().iter().copied());
                }
            }
            2 => tip_edges.union_with(&self.tags[TIP_NODES]),
            _ => {}
        }
        self.tags.insert(TIP_EDGES.to_string(), tip_edges);
        self.edges = Some(topology);
        Ok(())
    }

    /// Look up a tag by name.
    #[inline]
    pub fn tag(&self, name: &str) -> Option<&fb::FixedBitSet> {
        self.tags.get(name)
    }

    /// Number of entities a tag with this name must have one entry for,
    /// judging from the suffix of the name.
    /// Returns None for names without a known entity suffix.
    fn entity_count(&self, name: &str) -> Option<usize> {
        if name.ends_with("_nodes") {
            Some(self.num_nodes())
        } else if name.ends_with("_edges") {
            self.num_edges()
        } else if name.ends_with("_faces") {
            Some(self.num_faces())
        } else if name.ends_with("_cells") {
            Some(self.num_cells())
        } else {
            None
        }
    }

    /// Set a tag, checking that its length matches the tagged entity kind.
    ///
    /// Note that [`TIP_EDGES`] is overwritten whenever edges are (re)computed;
    /// set [`TIP_FACES`] and [`TIP_NODES`] before that.
    pub fn set_tag(&mut self, name: impl Into<String>, bits: fb::FixedBitSet) -> Result<()> {
        let name = name.into();
        if let Some(expected) = self.entity_count(&name) {
            if bits.len() != expected {
                return Err(Error::TagLength {
                    tag: name,
                    expected,
                    found: bits.len(),
                });
            }
        }
        self.tags.insert(name, bits);
        Ok(())
    }

    /// Set a tag from the indices of the entities it contains.
    pub fn set_tag_from_indices(
        &mut self,
        name: impl Into<String>,
        indices: impl IntoIterator<Item = usize>,
    ) -> Result<()> {
        let name = name.into();
        let len = self.entity_count(&name).unwrap_or(0);
        let mut bits = fb::FixedBitSet::with_capacity(len);
        for idx in indices {
            if idx >= bits.len() {
                // grow so that the length check in `set_tag` reports the problem
                bits.grow(idx + 1);
            }
            bits.insert(idx);
        }
        self.set_tag(name, bits)
    }
}
