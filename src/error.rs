//! The error type shared by every fallible operation in the crate.

use nalgebra_sparse as nas;

/// Errors produced while deriving edge topology or assembling operators.
///
/// Every variant is unrecoverable at the point of detection;
/// they carry enough context (grid, face, interface indices)
/// to locate the offending input.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The requested codimension is not one of 1 (div), 2 (curl) or 3 (grad).
    #[error("(n - k) needs to be between 1 and 3, got {0}")]
    InvalidCodim(usize),

    //
    // precondition violations
    //
    /// A grid was constructed with inconsistent fields.
    #[error("Invalid grid: {0}")]
    InvalidGrid(String),
    /// An edge-based operator was requested before edges were computed.
    #[error("Edge topology of {0} has not been computed")]
    MissingEdges(String),
    /// A face has a different number of nodes than the dimension requires.
    #[error("Face {face} has {found} nodes, expected {expected}")]
    NonUniformFaces {
        /// Index of the offending face.
        face: usize,
        /// Node count taken from the first face (3D) or the 2D requirement.
        expected: usize,
        /// Node count of the offending face.
        found: usize,
    },
    /// The orientation of a 2D face could not be decided
    /// because its tangent is zero or orthogonal to the rotated normal.
    #[error("Degenerate tangent on face {face}")]
    DegenerateTangent {
        /// Index of the offending face.
        face: usize,
    },
    /// A tag needed for tip masking is not present on a grid.
    #[error("Tag {tag:?} is missing on subdomain {node_number}")]
    MissingTag {
        /// Name of the missing tag.
        tag: &'static str,
        /// Node number of the subdomain lacking the tag.
        node_number: usize,
    },
    /// A tag does not have one entry per entity.
    #[error("Tag {tag:?} has length {found}, expected {expected}")]
    TagLength {
        /// Name of the tag.
        tag: String,
        /// Number of entities of the tagged kind.
        expected: usize,
        /// Length of the given bitset.
        found: usize,
    },

    //
    // structural integrity of mixed-dimensional grids
    //
    /// Two subdomains were given the same node number.
    #[error("Node number {0} is assigned to more than one subdomain")]
    DuplicateNodeNumber(usize),
    /// Node numbers do not cover the range `0..subdomain_count`.
    #[error("Node number {found} is out of range for {count} subdomains")]
    NodeNumberGap {
        /// The out-of-range node number.
        found: usize,
        /// Number of subdomains in the collection.
        count: usize,
    },
    /// An interface refers to a subdomain that isn't in the collection.
    #[error("Interface {interface} refers to missing subdomain {node_number}")]
    DanglingInterface {
        /// Index of the interface.
        interface: usize,
        /// The node number that could not be found.
        node_number: usize,
    },
    /// An interface couples a subdomain to itself.
    #[error("Interface {interface} couples subdomain {node_number} to itself")]
    SelfInterface {
        /// Index of the interface.
        interface: usize,
        /// Node number of the subdomain on both sides.
        node_number: usize,
    },
    /// An interface's lower subdomain has a higher dimension than its higher subdomain.
    #[error("Interface {interface} couples dimension {lower} to {higher}")]
    InterfaceDimension {
        /// Index of the interface.
        interface: usize,
        /// Dimension of the lower subdomain.
        lower: usize,
        /// Dimension of the higher subdomain.
        higher: usize,
    },
    /// A block of the global operator doesn't fit the blocks around it.
    #[error("Block ({row}, {col}) has shape {found:?}, expected {expected:?}")]
    BlockShape {
        /// Block row (node number of the output subdomain).
        row: usize,
        /// Block column (node number of the input subdomain).
        col: usize,
        /// Shape implied by the diagonal blocks.
        expected: (usize, usize),
        /// Shape of the given block.
        found: (usize, usize),
    },
    /// A mortar side doesn't map every lower cell to a higher face.
    #[error("Mortar side {side} has {found} entries for {expected} lower cells")]
    MortarSide {
        /// Index of the side.
        side: usize,
        /// Number of cells in the lower grid.
        expected: usize,
        /// Number of entries given for the side.
        found: usize,
    },
    /// A higher face used by a mortar grid is not a valid interface face.
    #[error("Higher face {face} of lower cell {cell} is not a boundary face of the higher grid")]
    MortarFace {
        /// The lower-dimensional cell.
        cell: usize,
        /// The higher-dimensional face.
        face: usize,
    },
    /// A node of a lower cell has no coinciding node on its higher face.
    #[error("Node {node} of lower cell {cell} doesn't coincide with any node of higher face {face}")]
    UnmatchedNode {
        /// The lower-dimensional cell.
        cell: usize,
        /// The lower-dimensional node.
        node: usize,
        /// The higher-dimensional face.
        face: usize,
    },
    /// The nodes of a lower face all coincide with nodes of a higher face,
    /// but no edge of the higher face joins them.
    #[error("Face {lower_face} of lower cell {cell} matches no edge of higher face {face}")]
    UnmatchedEdge {
        /// The lower-dimensional cell.
        cell: usize,
        /// The face of the lower cell.
        lower_face: usize,
        /// The higher-dimensional face.
        face: usize,
    },

    /// Building a sparse matrix failed.
    #[error("Sparse matrix construction failed")]
    Sparse(#[from] nas::SparseFormatError),
}

/// Shorthand for results with the crate's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
