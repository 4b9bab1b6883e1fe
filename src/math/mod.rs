//! Mathematical utilities for 2D beam calculations

pub mod sparse;

use nalgebra::{DMatrix, DVector, Matrix2x6, Matrix3, SMatrix, SVector, Vector3};

pub use sparse::SparseMatrixBuilder;

pub type Mat = DMatrix<f64>;
pub type Vec = DVector<f64>;
pub type Mat3 = Matrix3<f64>;
pub type Vec3 = Vector3<f64>;

/// 6x6 matrix for beam element stiffness (3 DOFs per node)
pub type Mat6 = SMatrix<f64, 6, 6>;
/// 6-element vector for beam element forces/displacements
pub type Vec6 = SVector<f64, 6>;
/// 3x6 Jacobian from element DOFs to natural deformations
pub type Mat3x6 = SMatrix<f64, 3, 6>;
/// 2x6 shape function / strain-displacement matrix
pub type Mat2x6 = Matrix2x6<f64>;

/// Two-point Gauss-Legendre abscissae on [-1, 1]
pub const GAUSS_POINTS: [f64; 2] = [-0.577_350_269_189_625_8, 0.577_350_269_189_625_8];
/// Two-point Gauss-Legendre weights
pub const GAUSS_WEIGHTS: [f64; 2] = [1.0, 1.0];

/// Compute the transformation matrix for a 2D frame element
///
/// # Arguments
/// * `angle` - Chord angle from global X (radians)
///
/// # Returns
/// 6x6 rotation from global to local element coordinates
pub fn beam_transformation_matrix(angle: f64) -> Mat6 {
    let c = angle.cos();
    let s = angle.sin();

    #[rustfmt::skip]
    let data = [
         c,   s,   0.0, 0.0, 0.0, 0.0,
        -s,   c,   0.0, 0.0, 0.0, 0.0,
         0.0, 0.0, 1.0, 0.0, 0.0, 0.0,
         0.0, 0.0, 0.0,  c,   s,  0.0,
         0.0, 0.0, 0.0, -s,   c,  0.0,
         0.0, 0.0, 0.0, 0.0, 0.0, 1.0,
    ];

    Mat6::from_row_slice(&data)
}

/// Compute the local stiffness matrix for a 2D Euler-Bernoulli frame element
///
/// # Arguments
/// * `ea` - Axial rigidity
/// * `ei` - Bending rigidity
/// * `length` - Element length
///
/// # Returns
/// 6x6 local stiffness matrix ordered [u1, v1, θ1, u2, v2, θ2]
pub fn beam_local_stiffness(ea: f64, ei: f64, length: f64) -> Mat6 {
    let l = length;
    let l2 = l * l;
    let l3 = l2 * l;

    let ea_l = ea / l;
    let ei_l3 = ei / l3;
    let ei_l2 = ei / l2;
    let ei_l = ei / l;

    #[rustfmt::skip]
    let data = [
        // Row 0: axial at i
        ea_l,   0.0,           0.0,          -ea_l,  0.0,           0.0,
        // Row 1: shear at i
        0.0,    12.0*ei_l3,    6.0*ei_l2,    0.0,    -12.0*ei_l3,   6.0*ei_l2,
        // Row 2: moment at i
        0.0,    6.0*ei_l2,     4.0*ei_l,     0.0,    -6.0*ei_l2,    2.0*ei_l,
        // Row 3: axial at j
        -ea_l,  0.0,           0.0,          ea_l,   0.0,           0.0,
        // Row 4: shear at j
        0.0,    -12.0*ei_l3,   -6.0*ei_l2,   0.0,    12.0*ei_l3,    -6.0*ei_l2,
        // Row 5: moment at j
        0.0,    6.0*ei_l2,     2.0*ei_l,     0.0,    -6.0*ei_l2,    4.0*ei_l,
    ];

    Mat6::from_row_slice(&data)
}

/// Hermitian shape functions of a 2-node beam at distance `x` from node i
///
/// Row 0 interpolates axial displacement, row 1 transverse displacement.
pub fn beam_shape_functions(x: f64, length: f64) -> Mat2x6 {
    let l = length;
    let xi = x / l;
    let mut n = Mat2x6::zeros();

    n[(0, 0)] = 1.0 - xi;
    n[(0, 3)] = xi;
    n[(1, 1)] = 1.0 - 3.0 * xi.powi(2) + 2.0 * xi.powi(3);
    n[(1, 2)] = x - 2.0 * x * xi + x * xi.powi(2);
    n[(1, 4)] = 3.0 * xi.powi(2) - 2.0 * xi.powi(3);
    n[(1, 5)] = -x * xi + x * xi.powi(2);

    n
}

/// Strain-displacement matrix: row 0 gives axial strain, row 1 curvature
pub fn beam_strain_displacement(x: f64, length: f64) -> Mat2x6 {
    let l = length;
    let l2 = l * l;
    let l3 = l2 * l;
    let mut b = Mat2x6::zeros();

    b[(0, 0)] = -1.0 / l;
    b[(0, 3)] = 1.0 / l;
    b[(1, 1)] = -6.0 / l2 + 12.0 * x / l3;
    b[(1, 2)] = -4.0 / l + 6.0 * x / l2;
    b[(1, 4)] = 6.0 / l2 - 12.0 * x / l3;
    b[(1, 5)] = -2.0 / l + 6.0 * x / l2;

    b
}

/// Map a Gauss abscissa on [-1, 1] to a position along an element of `length`
#[inline]
pub fn gauss_position(xi: f64, length: f64) -> f64 {
    0.5 * length * (xi + 1.0)
}

/// Outcome of a guarded LU solve
#[derive(Debug, Clone)]
pub enum LinearSolve {
    /// Solution vector and the pivot-ratio conditioning estimate
    Solved { x: Vec, condition_estimate: f64 },
    /// Factorisation broke down or the pivots fell under the threshold
    Singular { condition_estimate: f64 },
}

/// Solve a linear system using LU decomposition with a singularity guard
///
/// The conditioning estimate is the ratio of the smallest to the largest
/// absolute pivot of U. It is 0 for an exactly singular matrix.
pub fn solve_guarded(a: &Mat, b: &Vec, threshold: f64) -> LinearSolve {
    let lu = a.clone().lu();
    let u = lu.u();

    let (min_pivot, max_pivot) = u
        .diagonal()
        .iter()
        .fold((f64::INFINITY, 0.0_f64), |(lo, hi), p| {
            (lo.min(p.abs()), hi.max(p.abs()))
        });

    let condition_estimate = if max_pivot > 0.0 && max_pivot.is_finite() {
        min_pivot / max_pivot
    } else {
        0.0
    };

    if !(condition_estimate > threshold) {
        return LinearSolve::Singular { condition_estimate };
    }

    match lu.solve(b) {
        Some(x) if x.iter().all(|v| v.is_finite()) => LinearSolve::Solved {
            x,
            condition_estimate,
        },
        _ => LinearSolve::Singular { condition_estimate },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_transformation_matrix_vertical() {
        let t = beam_transformation_matrix(std::f64::consts::FRAC_PI_2);

        // local x = global Y, local y = -global X
        assert_relative_eq!(t[(0, 1)], 1.0, epsilon = 1e-12);
        assert_relative_eq!(t[(1, 0)], -1.0, epsilon = 1e-12);
        assert_relative_eq!(t[(2, 2)], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_local_stiffness_symmetry() {
        let k = beam_local_stiffness(2.0e9, 8.0e6, 3.0);

        for i in 0..6 {
            for j in 0..6 {
                assert_relative_eq!(k[(i, j)], k[(j, i)], epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn test_gauss_integration_matches_closed_form() {
        let (ea, ei, l) = (1.0e4, 250.0, 2.0);
        let mut k = Mat6::zeros();
        for (xi, w) in GAUSS_POINTS.iter().zip(GAUSS_WEIGHTS.iter()) {
            let b = beam_strain_displacement(gauss_position(*xi, l), l);
            let d = nalgebra::Matrix2::new(ea, 0.0, 0.0, ei);
            k += b.transpose() * d * b * (0.5 * l * w);
        }

        let closed = beam_local_stiffness(ea, ei, l);
        for i in 0..6 {
            for j in 0..6 {
                assert_relative_eq!(k[(i, j)], closed[(i, j)], epsilon = 1e-8, max_relative = 1e-10);
            }
        }
    }

    #[test]
    fn test_shape_functions_partition_of_unity() {
        let n = beam_shape_functions(0.7, 2.0);
        assert_relative_eq!(n[(0, 0)] + n[(0, 3)], 1.0, epsilon = 1e-12);
        assert_relative_eq!(n[(1, 1)] + n[(1, 4)], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_guarded_solve_flags_zero_column() {
        let a = Mat::from_row_slice(2, 2, &[4.0, 0.0, 0.0, 0.0]);
        let b = Vec::from_vec(vec![1.0, 0.0]);
        assert!(matches!(solve_guarded(&a, &b, 1e-12), LinearSolve::Singular { .. }));
    }

    #[test]
    fn test_guarded_solve() {
        let a = Mat::from_row_slice(2, 2, &[4.0, 1.0, 1.0, 3.0]);
        let b = Vec::from_vec(vec![1.0, 2.0]);
        match solve_guarded(&a, &b, 1e-12) {
            LinearSolve::Solved { x, .. } => {
                let r = &a * &x - &b;
                assert!(r.norm() < 1e-12);
            }
            LinearSolve::Singular { .. } => panic!("expected a solution"),
        }
    }
}
