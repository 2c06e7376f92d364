//! Mixed-dimensional grids:
//! collections of subdomains of different dimensions coupled by mortar grids.

pub mod mortar;
pub use mortar::MortarGrid;

//

use fixedbitset as fb;
use itertools::Itertools;

use std::collections::HashMap;

use crate::{grid::Grid, Error, Result, Tolerances};

/// A grid in a mixed-dimensional collection,
/// with its position in the block structure of global operators.
#[derive(Clone, Debug)]
pub struct Subdomain {
    /// The subdomain's grid.
    pub grid: Grid,
    /// Index of the subdomain's block in global operators.
    pub node_number: usize,
}

/// A coupling between two subdomains.
#[derive(Clone, Debug)]
pub struct Interface {
    /// Node number of the lower-dimensional subdomain.
    pub lower: usize,
    /// Node number of the higher-dimensional subdomain.
    pub higher: usize,
    /// The coupling surface, carrying the jump operators.
    pub mortar: MortarGrid,
}

/// A collection of subdomains joined by interfaces,
/// e.g. a rock matrix with fractures, fracture intersections
/// and the intersection points of those.
///
/// Node numbers are assigned by the caller and must be unique and dense,
/// i.e. a bijection onto `0..num_subdomains`.
/// [`add_subdomain`][Self::add_subdomain] hands them out in insertion order,
/// and [`assign_node_numbers`][Self::assign_node_numbers] reorders them by dimension.
#[derive(Clone, Debug, Default)]
pub struct MdGrid {
    subdomains: Vec<Subdomain>,
    interfaces: Vec<Interface>,
}

impl MdGrid {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subdomain, giving it the next unused node number, which is returned.
    pub fn add_subdomain(&mut self, grid: Grid) -> usize {
        let node_number = self.subdomains.len();
        self.subdomains.push(Subdomain { grid, node_number });
        node_number
    }

    /// Add a subdomain with an explicitly chosen node number.
    ///
    /// Uniqueness is checked when the collection is validated.
    pub fn add_subdomain_numbered(&mut self, grid: Grid, node_number: usize) {
        self.subdomains.push(Subdomain { grid, node_number });
    }

    /// Add an interface with a prebuilt mortar grid.
    /// Returns the index of the interface.
    pub fn add_interface(&mut self, lower: usize, higher: usize, mortar: MortarGrid) -> usize {
        self.interfaces.push(Interface {
            lower,
            higher,
            mortar,
        });
        self.interfaces.len() - 1
    }

    /// Couple two subdomains, building the mortar grid between them.
    ///
    /// `sides` maps each cell of the lower subdomain
    /// to the face of the higher one it coincides with, once per side;
    /// see [`MortarGrid::new`].
    /// Returns the index of the new interface.
    pub fn couple(&mut self, lower: usize, higher: usize, sides: Vec<Vec<usize>>) -> Result<usize> {
        let interface = self.interfaces.len();
        let find = |node_number| {
            self.grid(node_number).ok_or(Error::DanglingInterface {
                interface,
                node_number,
            })
        };
        let mortar = MortarGrid::new(find(higher)?, find(lower)?, sides)?;
        Ok(self.add_interface(lower, higher, mortar))
    }

    /// Number of subdomains.
    #[inline]
    pub fn num_subdomains(&self) -> usize {
        self.subdomains.len()
    }

    /// All subdomains in insertion order.
    #[inline]
    pub fn subdomains(&self) -> &[Subdomain] {
        &self.subdomains
    }

    /// All subdomains in insertion order, mutably.
    ///
    /// Intended for setting tags; changing node numbers here
    /// leaves interfaces pointing to the old ones.
    #[inline]
    pub fn subdomains_mut(&mut self) -> &mut [Subdomain] {
        &mut self.subdomains
    }

    /// All interfaces.
    #[inline]
    pub fn interfaces(&self) -> &[Interface] {
        &self.interfaces
    }

    /// The subdomain with the given node number.
    pub fn subdomain(&self, node_number: usize) -> Option<&Subdomain> {
        self.subdomains
            .iter()
            .find(|sd| sd.node_number == node_number)
    }

    /// The grid of the subdomain with the given node number.
    pub fn grid(&self, node_number: usize) -> Option<&Grid> {
        self.subdomain(node_number).map(|sd| &sd.grid)
    }

    /// The grid of the subdomain with the given node number, mutably.
    pub fn grid_mut(&mut self, node_number: usize) -> Option<&mut Grid> {
        self.subdomains
            .iter_mut()
            .find(|sd| sd.node_number == node_number)
            .map(|sd| &mut sd.grid)
    }

    /// Renumber subdomains in order of descending dimension,
    /// keeping insertion order among subdomains of the same dimension,
    /// and update the interfaces to match.
    pub fn assign_node_numbers(&mut self) -> Result<()> {
        let renumbering: HashMap<usize, usize> = self
            .subdomains
            .iter()
            .sorted_by_key(|sd| std::cmp::Reverse(sd.grid.dim()))
            .enumerate()
            .map(|(new, sd)| (sd.node_number, new))
            .collect();

        for (idx, interface) in self.interfaces.iter_mut().enumerate() {
            for node_number in [&mut interface.lower, &mut interface.higher] {
                *node_number = *renumbering
                    .get(&*node_number)
                    .ok_or(Error::DanglingInterface {
                        interface: idx,
                        node_number: *node_number,
                    })?;
            }
        }
        for sd in &mut self.subdomains {
            // duplicates collapse to one entry in the map
            // and are caught by validation afterwards
            sd.node_number = renumbering[&sd.node_number];
        }
        log::debug!("Assigned node numbers to {} subdomains", self.subdomains.len());
        Ok(())
    }

    /// Check the structural integrity of the collection:
    /// node numbers are a bijection onto `0..num_subdomains`,
    /// and every interface couples two distinct members,
    /// the lower of which has at most the dimension of the higher.
    pub fn validate(&self) -> Result<()> {
        let count = self.subdomains.len();
        let mut seen = fb::FixedBitSet::with_capacity(count);
        for sd in &self.subdomains {
            if sd.node_number >= count {
                return Err(Error::NodeNumberGap {
                    found: sd.node_number,
                    count,
                });
            }
            if seen.put(sd.node_number) {
                return Err(Error::DuplicateNodeNumber(sd.node_number));
            }
        }

        for (idx, interface) in self.interfaces.iter().enumerate() {
            let lookup = |node_number| {
                self.grid(node_number).ok_or(Error::DanglingInterface {
                    interface: idx,
                    node_number,
                })
            };
            let lower = lookup(interface.lower)?;
            let higher = lookup(interface.higher)?;
            if interface.lower == interface.higher {
                return Err(Error::SelfInterface {
                    interface: idx,
                    node_number: interface.lower,
                });
            }
            if lower.dim() > higher.dim() || interface.mortar.dim() != lower.dim() {
                return Err(Error::InterfaceDimension {
                    interface: idx,
                    lower: lower.dim(),
                    higher: higher.dim(),
                });
            }
        }
        Ok(())
    }

    /// Validated subdomains in ascending node number order.
    pub(crate) fn ordered_subdomains(&self) -> Result<Vec<&Subdomain>> {
        self.validate()?;
        Ok(self
            .subdomains
            .iter()
            .sorted_unstable_by_key(|sd| sd.node_number)
            .collect())
    }

    /// Compute edges on every subdomain with default tolerances.
    ///
    /// Interfaces are not touched; see [`compute_mortar_edges`][Self::compute_mortar_edges].
    pub fn compute_edges(&mut self) -> Result<()> {
        self.compute_edges_with(&Tolerances::default())
    }

    /// Compute edges on every subdomain.
    pub fn compute_edges_with(&mut self, tol: &Tolerances) -> Result<()> {
        for sd in &mut self.subdomains {
            sd.grid.compute_edges_with(tol)?;
        }
        Ok(())
    }

    /// Compute the edge jumps of every interface with default tolerances.
    /// Subdomain edges must have been computed first.
    pub fn compute_mortar_edges(&mut self) -> Result<()> {
        self.compute_mortar_edges_with(&Tolerances::default())
    }

    /// Compute the edge jumps of every interface.
    pub fn compute_mortar_edges_with(&mut self, tol: &Tolerances) -> Result<()> {
        let Self {
            subdomains,
            interfaces,
        } = self;
        let find = |interface: usize, node_number: usize| {
            subdomains
                .iter()
                .find(|sd| sd.node_number == node_number)
                .map(|sd| &sd.grid)
                .ok_or(Error::DanglingInterface {
                    interface,
                    node_number,
                })
        };
        for (idx, interface) in interfaces.iter_mut().enumerate() {
            let lower = find(idx, interface.lower)?;
            let higher = find(idx, interface.higher)?;
            interface.mortar.compute_edges_with(higher, lower, tol)?;
        }
        Ok(())
    }
}
