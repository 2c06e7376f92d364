//! Exterior derivatives of grids, mortar grids and mixed-dimensional grids.
//!
//! The derivatives are the (transposed) signed incidence matrices of the grid,
//! returned as floating-point CSR matrices ready for composition
//! with mass matrices and other operators:
//!
//! | codimension | operator | input   | output |
//! |-------------|----------|---------|--------|
//! | 1           | [`div`]  | faces   | cells  |
//! | 2           | [`curl`] | edges   | faces  |
//! | 3           | [`grad`] | nodes   | edges  |
//!
//! Composing consecutive derivatives gives exactly zero,
//! on single grids as well as on mixed-dimensional ones.

use fixedbitset as fb;
use nalgebra as na;
use nalgebra_sparse as nas;

use crate::{
    grid::{EdgeTopology, Grid, TIP_EDGES, TIP_FACES, TIP_NODES},
    md_grid::{MdGrid, MortarGrid, Subdomain},
    Error, Result,
};

/// Codimension of the input entities of an exterior derivative,
/// i.e. the grid dimension minus the degree `k` of the input form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Codim {
    /// Codimension 1: the divergence, from faces to cells.
    Div = 1,
    /// Codimension 2: the curl, from edges to faces.
    Curl = 2,
    /// Codimension 3: the gradient, from nodes to edges.
    Grad = 3,
}

impl Codim {
    /// The codimension as a number.
    #[inline]
    pub fn get(self) -> usize {
        self as usize
    }

    /// Name of the tag flagging the tip entities among this operator's inputs.
    pub fn tip_tag(self) -> &'static str {
        match self {
            Self::Div => TIP_FACES,
            Self::Curl => TIP_EDGES,
            Self::Grad => TIP_NODES,
        }
    }
}

impl TryFrom<usize> for Codim {
    type Error = Error;

    fn try_from(n_minus_k: usize) -> Result<Self> {
        match n_minus_k {
            1 => Ok(Self::Div),
            2 => Ok(Self::Curl),
            3 => Ok(Self::Grad),
            _ => Err(Error::InvalidCodim(n_minus_k)),
        }
    }
}

/// Trait implemented by everything an exterior derivative can be taken of.
pub trait ExteriorDerivative {
    /// The exterior derivative acting on entities of the given codimension,
    /// as a matrix of shape (output count × input count).
    fn exterior_derivative(&self, codim: Codim) -> Result<nas::CsrMatrix<f64>>;
}

/// Exterior derivative by numeric codimension `n_minus_k`, which must be 1, 2 or 3.
pub fn exterior_derivative<G>(grid: &G, n_minus_k: usize) -> Result<nas::CsrMatrix<f64>>
where
    G: ExteriorDerivative + ?Sized,
{
    grid.exterior_derivative(Codim::try_from(n_minus_k)?)
}

/// The divergence, mapping face quantities to cells.
pub fn div<G: ExteriorDerivative + ?Sized>(grid: &G) -> Result<nas::CsrMatrix<f64>> {
    grid.exterior_derivative(Codim::Div)
}

/// The curl, mapping edge quantities to faces.
pub fn curl<G: ExteriorDerivative + ?Sized>(grid: &G) -> Result<nas::CsrMatrix<f64>> {
    grid.exterior_derivative(Codim::Curl)
}

/// The gradient, mapping node quantities to edges.
pub fn grad<G: ExteriorDerivative + ?Sized>(grid: &G) -> Result<nas::CsrMatrix<f64>> {
    grid.exterior_derivative(Codim::Grad)
}

/// Transpose a signed incidence matrix into a floating-point operator.
fn transposed(incidence: &nas::CscMatrix<i8>) -> Result<nas::CsrMatrix<f64>> {
    // the compressed arrays of a CSC matrix
    // are those of the CSR form of its transpose
    let values = incidence.values().iter().map(|&v| f64::from(v)).collect();
    Ok(nas::CsrMatrix::try_from_pattern_and_values(
        incidence.pattern().clone(),
        values,
    )?)
}

/// The incidence matrix matching a codimension, transposed.
/// Edges are only looked up for the operators that need them.
fn incidence_operator<'a>(
    cell_faces: &nas::CscMatrix<i8>,
    edges: impl FnOnce() -> Result<&'a EdgeTopology>,
    codim: Codim,
) -> Result<nas::CsrMatrix<f64>> {
    match codim {
        Codim::Div => transposed(cell_faces),
        Codim::Curl => transposed(&edges()?.face_edges),
        Codim::Grad => transposed(&edges()?.edge_nodes),
    }
}

impl ExteriorDerivative for Grid {
    fn exterior_derivative(&self, codim: Codim) -> Result<nas::CsrMatrix<f64>> {
        incidence_operator(self.cell_faces(), || self.require_edges(), codim)
    }
}

/// The jump operator from the higher subdomain to the lower one.
impl ExteriorDerivative for MortarGrid {
    fn exterior_derivative(&self, codim: Codim) -> Result<nas::CsrMatrix<f64>> {
        incidence_operator(self.cell_faces(), || self.require_edges(), codim)
    }
}

/// The global operator over all subdomains,
/// in blocks ordered by node number.
///
/// Diagonal blocks are the subdomains' own derivatives,
/// and each interface whose higher subdomain has dimension at least `codim`
/// contributes its jump operator at (lower, higher).
/// A subdomain of dimension lower than `codim` has no inputs for the operator,
/// so its block has no columns;
/// one of dimension lower than `codim - 1` has no outputs either.
/// Finally, columns of tip entities are zeroed (see [`tip_mask`]).
impl ExteriorDerivative for MdGrid {
    fn exterior_derivative(&self, codim: Codim) -> Result<nas::CsrMatrix<f64>> {
        let subdomains = self.ordered_subdomains()?;
        if subdomains.is_empty() {
            log::warn!("Taking an exterior derivative of a mixed-dimensional grid with no subdomains");
        }

        let blocks: Vec<nas::CsrMatrix<f64>> = subdomains
            .iter()
            .map(|sd| local_block(&sd.grid, codim))
            .collect::<Result<_>>()?;

        // offsets of each block in the global matrix
        let mut row_offsets = vec![0];
        let mut col_offsets = vec![0];
        for block in &blocks {
            row_offsets.push(row_offsets.last().copied().unwrap_or(0) + block.nrows());
            col_offsets.push(col_offsets.last().copied().unwrap_or(0) + block.ncols());
        }
        let row_count = row_offsets.last().copied().unwrap_or(0);
        let col_count = col_offsets.last().copied().unwrap_or(0);

        let mut global = nas::CooMatrix::new(row_count, col_count);
        for (nn, block) in blocks.iter().enumerate() {
            push_block(&mut global, row_offsets[nn], col_offsets[nn], block);
        }

        for interface in self.interfaces() {
            // validated above, so node numbers index the ordered subdomains
            let higher = &subdomains[interface.higher].grid;
            if higher.dim() < codim.get() {
                continue;
            }
            let (row, col) = (interface.lower, interface.higher);
            let jump = interface.mortar.exterior_derivative(codim)?;
            let expected = (blocks[row].nrows(), blocks[col].ncols());
            let found = (jump.nrows(), jump.ncols());
            if found != expected {
                return Err(Error::BlockShape {
                    row,
                    col,
                    expected,
                    found,
                });
            }
            push_block(&mut global, row_offsets[row], col_offsets[col], &jump);
        }

        log::debug!(
            "Assembled {row_count}x{col_count} exterior derivative of codimension {} over {} subdomains",
            codim.get(),
            subdomains.len(),
        );

        let mask = tip_mask_of(&subdomains, codim)?;
        if mask.len() != col_count {
            return Err(Error::TagLength {
                tag: codim.tip_tag().to_string(),
                expected: col_count,
                found: mask.len(),
            });
        }
        Ok(mask.mask_columns(nas::CsrMatrix::from(&global)))
    }
}

/// A subdomain's diagonal block in the global operator.
fn local_block(grid: &Grid, codim: Codim) -> Result<nas::CsrMatrix<f64>> {
    let local = grid.exterior_derivative(codim)?;
    Ok(if grid.dim() >= codim.get() {
        local
    } else if grid.dim() + 1 == codim.get() {
        // outputs are real entities, the inputs are placeholders
        nas::CsrMatrix::zeros(local.nrows(), 0)
    } else {
        nas::CsrMatrix::zeros(0, 0)
    })
}

fn push_block(
    global: &mut nas::CooMatrix<f64>,
    row_offset: usize,
    col_offset: usize,
    block: &nas::CsrMatrix<f64>,
) {
    for (row, col, &val) in block.triplet_iter() {
        global.push(row_offset + row, col_offset + col, val);
    }
}

/// A {0, 1} diagonal projector removing tip entities from the inputs of an operator.
///
/// This works like a diagonal matrix
/// and is converted into one with [`into_csr`][Self::into_csr],
/// but can also be applied to a matrix directly
/// with [`mask_columns`][Self::mask_columns].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TipMask {
    keep: fb::FixedBitSet,
}

impl TipMask {
    /// Number of entities (diagonal entries) covered by the mask.
    #[inline]
    pub fn len(&self) -> usize {
        self.keep.len()
    }

    /// Whether the mask covers no entities.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keep.len() == 0
    }

    /// Whether the entity at a global index is kept, i.e. not a tip.
    #[inline]
    pub fn keeps(&self, idx: usize) -> bool {
        self.keep.contains(idx)
    }

    /// Multiply a vector with the mask, zeroing tip entries.
    pub fn apply(&self, values: &na::DVector<f64>) -> na::DVector<f64> {
        na::DVector::from_iterator(
            values.len(),
            values
                .iter()
                .enumerate()
                .map(|(i, &v)| if self.keeps(i) { v } else { 0.0 }),
        )
    }

    /// Right-multiply a matrix with the mask, zeroing the columns of tip entities.
    /// The sparsity pattern is left as it is.
    pub fn mask_columns(&self, mut mat: nas::CsrMatrix<f64>) -> nas::CsrMatrix<f64> {
        for (_, col, val) in mat.triplet_iter_mut() {
            if !self.keeps(col) {
                *val = 0.0;
            }
        }
        mat
    }

    /// Convert the mask into a diagonal CSR matrix.
    pub fn into_csr(self) -> nas::CsrMatrix<f64> {
        // nalgebra doesn't have a method to construct CSR directly from a diagonal.
        // construct an identity matrix to get the right sparsity pattern
        // and then replace the entries
        let mut csr = nas::CsrMatrix::identity(self.len());
        for (idx, diag) in csr.values_mut().iter_mut().enumerate() {
            if !self.keep.contains(idx) {
                *diag = 0.0;
            }
        }
        csr
    }
}

/// The mask removing tip entities from the inputs of an operator of the given codimension.
///
/// Subdomains contribute the negation of their tip tag for the codimension
/// in node number order, skipping those with dimension below `codim`.
pub fn tip_mask(mdg: &MdGrid, codim: Codim) -> Result<TipMask> {
    tip_mask_of(&mdg.ordered_subdomains()?, codim)
}

fn tip_mask_of(subdomains: &[&Subdomain], codim: Codim) -> Result<TipMask> {
    let tag_name = codim.tip_tag();
    let tags: Vec<&fb::FixedBitSet> = subdomains
        .iter()
        .filter(|sd| sd.grid.dim() >= codim.get())
        .map(|sd| {
            sd.grid.tag(tag_name).ok_or(Error::MissingTag {
                tag: tag_name,
                node_number: sd.node_number,
            })
        })
        .collect::<Result<_>>()?;

    let mut keep = fb::FixedBitSet::with_capacity(tags.iter().map(|t| t.len()).sum());
    let mut offset = 0;
    for tag in tags {
        for idx in (0..tag.len()).filter(|&i| !tag.contains(i)) {
            keep.insert(offset + idx);
        }
        offset += tag.len();
    }
    Ok(TipMask { keep })
}
