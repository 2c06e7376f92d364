//! Discrete exterior derivatives (gradient, curl and divergence)
//! on polytopal grids and on mixed-dimensional collections of them.
//!
//! A [`Grid`] carries the node, face and cell topology of one dimension.
//! Edges are derived from it with [`Grid::compute_edges`],
//! after which [`grad`], [`curl`] and [`div`] return sparse operators
//! that compose to exactly zero.
//!
//! An [`MdGrid`] joins grids of different dimensions,
//! e.g. a rock matrix and the fractures cutting through it,
//! through [`MortarGrid`]s holding the jumps between them.
//! Its exterior derivatives are assembled block by block
//! and still form a chain complex.
//!
//! ```
//! use mdexterior::{cart_grid, curl, div, grad};
//!
//! let mut grid = cart_grid(&[3, 3, 3], &[1.0, 1.0, 1.0])?;
//! grid.compute_edges()?;
//!
//! let curl_grad = &curl(&grid)? * &grad(&grid)?;
//! assert!(curl_grad.values().iter().all(|&v| v == 0.0));
//! let div_curl = &div(&grid)? * &curl(&grid)?;
//! assert!(div_curl.values().iter().all(|&v| v == 0.0));
//! # Ok::<(), mdexterior::Error>(())
//! ```

#![warn(missing_docs)]

pub mod error;
#[doc(inline)]
pub use error::{Error, Result};

pub mod geometry;
#[doc(inline)]
pub use geometry::Tolerances;

pub mod grid;
#[doc(inline)]
pub use grid::{
    cart_grid, point_grid, simplex_grid, structured_tetrahedral_grid, structured_triangle_grid,
    EdgeTopology, FaceNodes, Grid,
};

pub mod md_grid;
#[doc(inline)]
pub use md_grid::{Interface, MdGrid, MortarGrid, Subdomain};

pub mod operator;
#[doc(inline)]
pub use operator::{
    curl, div, exterior_derivative, grad, tip_mask, Codim, ExteriorDerivative, TipMask,
};

// nalgebra re-exports of common types for convenience

pub use nalgebra as na;
pub use nalgebra_sparse as nas;
/// Type alias for a 3D `nalgebra` vector.
pub type Vec3 = na::Vector3<f64>;
