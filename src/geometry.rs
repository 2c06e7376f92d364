//! The small amount of geometry needed to orient entities:
//! plane fitting for 2D grids, line directions for 1D grids
//! and normals of faces given by ordered node lists.

use nalgebra as na;

use crate::Vec3;

/// Tolerances used where geometric quantities decide combinatorial ones.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tolerances {
    /// Absolute distance below which two points are considered coincident,
    /// and below which a tangent or a projection counts as zero.
    pub geometric: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self { geometric: 1e-10 }
    }
}

impl Tolerances {
    /// Check whether two points coincide within the geometric tolerance.
    #[inline]
    pub fn coincident(&self, a: &Vec3, b: &Vec3) -> bool {
        (a - b).norm() <= self.geometric
    }
}

/// Covariance-like scatter matrix of a point cloud around its centroid.
fn scatter(points: &[Vec3]) -> na::SymmetricEigen<f64, na::U3> {
    let centroid = centroid(points.iter());
    let mut scatter = na::Matrix3::zeros();
    for p in points {
        let d = p - centroid;
        scatter += d * d.transpose();
    }
    scatter.symmetric_eigen()
}

/// Flip a direction so that its largest component is positive.
/// Makes directions from eigenvectors deterministic.
fn canonical_sign(v: Vec3) -> Vec3 {
    if v[v.iamax()] < 0.0 {
        -v
    } else {
        v
    }
}

/// Unit normal of the plane best fitting the given points.
///
/// The sign is chosen so that the normal's largest component is positive,
/// e.g. a grid in the xy-plane gets `+z`.
pub fn plane_normal(points: &[Vec3]) -> Vec3 {
    let eig = scatter(points);
    let normal = eig.eigenvectors.column(eig.eigenvalues.imin()).into_owned();
    canonical_sign(normal.normalize())
}

/// Unit direction of the line best fitting the given points.
pub fn line_direction(points: &[Vec3]) -> Vec3 {
    let eig = scatter(points);
    let dir = eig.eigenvectors.column(eig.eigenvalues.imax()).into_owned();
    canonical_sign(dir.normalize())
}

/// Rotate a vector by 90 degrees around the given plane normal.
///
/// The in-plane part of `v` is rotated counterclockwise
/// (seen from the tip of `normal`), the out-of-plane part is kept.
#[inline]
pub fn rotate_in_plane(normal: &Vec3, v: &Vec3) -> Vec3 {
    normal.cross(v) + normal.dot(v) * normal
}

/// Area-weighted normal of a planar polygon with ordered vertices
/// (Newell's method). Points along the right-hand rule of the ordering.
pub fn polygon_normal(vertices: &[Vec3]) -> Vec3 {
    let mut normal = Vec3::zeros();
    for (i, p) in vertices.iter().enumerate() {
        let q = &vertices[(i + 1) % vertices.len()];
        normal += p.cross(q);
    }
    0.5 * normal
}

/// Mean of a set of points.
pub fn centroid<'a>(points: impl Iterator<Item = &'a Vec3>) -> Vec3 {
    let (sum, count) = points.fold((Vec3::zeros(), 0usize), |(s, n), p| (s + p, n + 1));
    if count == 0 {
        sum
    } else {
        sum / count as f64
    }
}
