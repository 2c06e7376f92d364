//! Exterior derivatives of single grids.

mod common;
use common::assert_zero_product;

use mdexterior::{
    cart_grid, curl, div, exterior_derivative, grad, na, nas, point_grid,
    structured_tetrahedral_grid, structured_triangle_grid, Grid, Vec3,
};
use proptest::prelude::*;

fn with_edges(mut grid: Grid) -> Grid {
    grid.compute_edges().unwrap();
    grid
}

fn assert_chain_complex(grid: &Grid) {
    for n_minus_k in [1, 2] {
        let first = exterior_derivative(grid, n_minus_k).unwrap();
        let second = exterior_derivative(grid, n_minus_k + 1).unwrap();
        assert_zero_product(
            &first,
            &second,
            &format!("{}D grid, codimensions {n_minus_k} and {}", grid.dim(), n_minus_k + 1),
        );
    }
}

#[test]
fn cartesian_grids_are_chain_complexes() {
    for dim in 1..=3 {
        let grid = with_edges(cart_grid(&vec![3; dim], &vec![1.0; dim]).unwrap());
        assert_chain_complex(&grid);
    }
}

#[test]
fn simplicial_grids_are_chain_complexes() {
    let grids = [
        with_edges(structured_triangle_grid([3, 3], [1.0, 1.0]).unwrap()),
        with_edges(structured_tetrahedral_grid([3, 3, 3], [1.0, 1.0, 1.0]).unwrap()),
    ];
    for grid in &grids {
        assert_chain_complex(grid);
    }
}

#[test]
fn point_grid_gradient_is_curl_free() {
    // a point has no faces, so only the placeholder operators compose
    let grid = with_edges(point_grid(Vec3::zeros()).unwrap());
    let c = curl(&grid).unwrap();
    let g = grad(&grid).unwrap();
    assert_eq!((c.nrows(), c.ncols()), (1, 1));
    assert_eq!((g.nrows(), g.ncols()), (1, 1));
    assert_zero_product(&c, &g, "point grid");
    let d = div(&grid).unwrap();
    assert_eq!((d.nrows(), d.ncols()), (1, 0));
}

/// div * curl and curl * grad vanish on a 3x3x3 grid of cubes.
#[test]
fn cube_grid_scenario() {
    let grid = with_edges(cart_grid(&[3, 3, 3], &[1.0, 1.0, 1.0]).unwrap());
    let d = div(&grid).unwrap();
    let c = curl(&grid).unwrap();
    let g = grad(&grid).unwrap();

    assert_eq!((d.nrows(), d.ncols()), (27, 108));
    assert_eq!((c.nrows(), c.ncols()), (108, 144));
    assert_eq!((g.nrows(), g.ncols()), (144, 64));

    assert_zero_product(&d, &c, "div * curl");
    assert_zero_product(&c, &g, "curl * grad");
}

/// With an identity edge mass, grad^T grad is the graph Laplacian of the grid's edges.
#[test]
fn tetrahedral_grid_stiffness_pattern() {
    let grid = with_edges(structured_tetrahedral_grid([4, 4, 4], [1.0, 1.0, 1.0]).unwrap());
    let g = grad(&grid).unwrap();
    assert_eq!((g.nrows(), g.ncols()), (604, 125));

    let stiffness: nas::CsrMatrix<f64> = &g.transpose() * &g;
    assert_eq!(stiffness.transpose(), stiffness);

    let edges = grid.edges().unwrap();
    let mut degree = vec![0.0; grid.num_nodes()];
    for (node, _, _) in edges.edge_nodes.triplet_iter() {
        degree[node] += 1.0;
    }

    let dense = na::DMatrix::from(&stiffness);
    for (row, row_values) in dense.row_iter().enumerate() {
        approx::assert_abs_diff_eq!(row_values.sum(), 0.0);
        assert_eq!(dense[(row, row)], degree[row]);
    }
    for edge in edges.edge_nodes.col_iter() {
        let &[a, b] = edge.row_indices() else {
            panic!("edge without two ends");
        };
        assert_eq!(dense[(a, b)], -1.0);
        assert_eq!(dense[(b, a)], -1.0);
    }
    // only nodes joined by an edge interact
    let coupled = stiffness.triplet_iter().filter(|(r, c, _)| r != c).count();
    assert_eq!(coupled, 2 * 604);

    let eigenvalues = dense.symmetric_eigenvalues();
    assert!(eigenvalues.iter().all(|&ev| ev > -1e-10));
}

#[test]
fn derivatives_need_edges() {
    let grid = cart_grid(&[2, 2, 2], &[1.0; 3]).unwrap();
    assert!(div(&grid).is_ok());
    assert!(matches!(curl(&grid), Err(mdexterior::Error::MissingEdges(_))));
    assert!(matches!(grad(&grid), Err(mdexterior::Error::MissingEdges(_))));
    assert!(matches!(
        exterior_derivative(&grid, 4),
        Err(mdexterior::Error::InvalidCodim(4))
    ));
}

proptest! {
    #[test]
    fn chain_property_on_box_grids(nx in 1usize..4, ny in 1usize..4, nz in 1usize..4) {
        let extent = [1.0, 0.5 * ny as f64, 2.0];
        let grids = [
            cart_grid(&[nx], &extent[..1]).unwrap(),
            cart_grid(&[nx, ny], &extent[..2]).unwrap(),
            cart_grid(&[nx, ny, nz], &extent).unwrap(),
            structured_triangle_grid([nx, ny], [extent[0], extent[1]]).unwrap(),
            structured_tetrahedral_grid([nx, ny, nz], extent).unwrap(),
        ];
        for mut grid in grids {
            grid.compute_edges().unwrap();
            for n_minus_k in [1, 2] {
                let product = &exterior_derivative(&grid, n_minus_k).unwrap()
                    * &exterior_derivative(&grid, n_minus_k + 1).unwrap();
                prop_assert!(product.values().iter().all(|&v| v == 0.0));
            }
        }
    }

    #[test]
    fn edge_counts_follow_euler_characteristic(nx in 1usize..4, ny in 1usize..4, nz in 1usize..4) {
        // a box is contractible: V - E + F - C = 1
        for mut grid in [
            cart_grid(&[nx, ny, nz], &[1.0; 3]).unwrap(),
            structured_tetrahedral_grid([nx, ny, nz], [1.0; 3]).unwrap(),
        ] {
            let edges = grid.compute_edges().unwrap().num_edges();
            let euler = grid.num_nodes() as i64 - edges as i64 + grid.num_faces() as i64
                - grid.num_cells() as i64;
            prop_assert_eq!(euler, 1);
        }
    }
}
