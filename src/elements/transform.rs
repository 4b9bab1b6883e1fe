//! Corotational transformation for 2-node planar beams
//!
//! The element chord is tracked through its rigid-body motion so that the
//! deformational part of the displacement field can be expressed in three
//! natural modes: extension `e`, and the end rotations `θ1`, `θ2` measured
//! from the rotated chord. Element formulations work in natural space and
//! use this transform to map forces and stiffness to the 6 global DOFs
//! `[ux1, uy1, rz1, ux2, uy2, rz2]`.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, NlFrameResult};
use crate::math::{Mat3, Mat3x6, Mat6, Vec3, Vec6};

/// Chords shorter than this are treated as collapsed
const MIN_CHORD_LENGTH: f64 = 1e-12;

/// Natural deformation modes of a beam element
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NaturalDeformations {
    /// Chord extension L - L0
    pub e: f64,
    /// End rotation at node i relative to the chord
    pub theta1: f64,
    /// End rotation at node j relative to the chord
    pub theta2: f64,
}

impl NaturalDeformations {
    /// Symmetric bending mode (θ1 + θ2) / 2
    pub fn symmetric(&self) -> f64 {
        0.5 * (self.theta1 + self.theta2)
    }

    /// Antisymmetric bending mode (θ1 - θ2) / 2
    pub fn antisymmetric(&self) -> f64 {
        0.5 * (self.theta1 - self.theta2)
    }

    pub fn as_vector(&self) -> Vec3 {
        Vec3::new(self.e, self.theta1, self.theta2)
    }
}

/// Forces conjugate to the natural deformations
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NaturalForces {
    /// Axial force, tension positive
    pub n: f64,
    /// End moment at node i
    pub m1: f64,
    /// End moment at node j
    pub m2: f64,
}

impl NaturalForces {
    pub fn new(n: f64, m1: f64, m2: f64) -> Self {
        Self { n, m1, m2 }
    }

    pub fn from_vector(v: &Vec3) -> Self {
        Self::new(v[0], v[1], v[2])
    }

    pub fn as_vector(&self) -> Vec3 {
        Vec3::new(self.n, self.m1, self.m2)
    }

    /// End shear implied by moment equilibrium over a chord of `length`
    pub fn shear(&self, length: f64) -> f64 {
        (self.m1 + self.m2) / length
    }
}

/// Reference chord frozen at initialisation together with the current chord
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NonlinearTransform {
    element: usize,

    /// Initial chord projections X21, Y21
    x21_0: f64,
    y21_0: f64,
    /// Initial length L0
    l0: f64,
    /// Initial chord angle θ0
    theta0: f64,

    /// Current chord projections x21, y21
    x21: f64,
    y21: f64,
    /// Current length L
    l: f64,
    /// Current chord angle θ
    theta: f64,
    /// Rigid rotation β = θ - θ0
    beta: f64,

    deformations: NaturalDeformations,
}

impl NonlinearTransform {
    /// Freeze the reference geometry of the chord from `p1` to `p2`
    pub fn new(element: usize, p1: [f64; 2], p2: [f64; 2]) -> NlFrameResult<Self> {
        let x21_0 = p2[0] - p1[0];
        let y21_0 = p2[1] - p1[1];
        let l0 = x21_0.hypot(y21_0);

        if !(l0 > MIN_CHORD_LENGTH) {
            return Err(ConfigurationError::DegenerateElement {
                id: element,
                length: l0,
            }
            .into());
        }

        let theta0 = y21_0.atan2(x21_0);

        Ok(Self {
            element,
            x21_0,
            y21_0,
            l0,
            theta0,
            x21: x21_0,
            y21: y21_0,
            l: l0,
            theta: theta0,
            beta: 0.0,
            deformations: NaturalDeformations::default(),
        })
    }

    /// Move the chord to the displaced configuration `u`
    pub fn update(&mut self, u: &Vec6) -> NlFrameResult<()> {
        let x21 = self.x21_0 + u[3] - u[0];
        let y21 = self.y21_0 + u[4] - u[1];
        let l = x21.hypot(y21);

        if !(l > MIN_CHORD_LENGTH) {
            return Err(ConfigurationError::DegenerateElement {
                id: self.element,
                length: l,
            }
            .into());
        }

        // Angle between reference and current chord, valid past ±π/2
        let beta = (self.x21_0 * y21 - self.y21_0 * x21).atan2(self.x21_0 * x21 + self.y21_0 * y21);

        self.x21 = x21;
        self.y21 = y21;
        self.l = l;
        self.theta = y21.atan2(x21);
        self.beta = beta;
        self.deformations = NaturalDeformations {
            e: l - self.l0,
            theta1: u[2] - beta,
            theta2: u[5] - beta,
        };

        Ok(())
    }

    pub fn element(&self) -> usize {
        self.element
    }

    pub fn initial_length(&self) -> f64 {
        self.l0
    }

    pub fn initial_angle(&self) -> f64 {
        self.theta0
    }

    pub fn length(&self) -> f64 {
        self.l
    }

    pub fn angle(&self) -> f64 {
        self.theta
    }

    pub fn rigid_rotation(&self) -> f64 {
        self.beta
    }

    /// Direction cosines (c, s) of the current chord
    #[inline]
    fn cs(&self) -> (f64, f64) {
        (self.x21 / self.l, self.y21 / self.l)
    }

    pub fn natural_deformations(&self) -> NaturalDeformations {
        self.deformations
    }

    /// Jacobian ∂[e, θ1, θ2]/∂U at the current configuration
    pub fn jacobian(&self) -> Mat3x6 {
        let (c, s) = self.cs();
        let l = self.l;

        #[rustfmt::skip]
        let data = [
            -c,      -s,      0.0,  c,      s,      0.0,
            -s / l,   c / l,  1.0,  s / l, -c / l,  0.0,
            -s / l,   c / l,  0.0,  s / l, -c / l,  1.0,
        ];

        Mat3x6::from_row_slice(&data)
    }

    /// Map natural forces to the 6 global end forces
    pub fn global_forces(&self, natural: &NaturalForces) -> Vec6 {
        self.jacobian().transpose() * natural.as_vector()
    }

    /// Least-squares inverse of [`global_forces`](Self::global_forces)
    pub fn natural_forces(&self, global: &Vec6) -> NlFrameResult<NaturalForces> {
        let j = self.jacobian();
        let jjt: Mat3 = j * j.transpose();
        let inv = jjt.try_inverse().ok_or(ConfigurationError::DegenerateElement {
            id: self.element,
            length: self.l,
        })?;
        Ok(NaturalForces::from_vector(&(inv * (j * global))))
    }

    /// Global tangent stiffness from a natural tangent `k` and the current forces
    ///
    /// Includes the geometric terms N ∂²e/∂U² and (M1 + M2) ∂²θ/∂U², the
    /// latter shared by both end rotations since each is αi - β.
    pub fn tangent(&self, k: &Mat3, natural: &NaturalForces) -> Mat6 {
        let j = self.jacobian();
        let mut kt = j.transpose() * k * j;

        let (c, s) = self.cs();
        let l = self.l;
        let g1 = 2.0 * c * s / (l * l);
        let g2 = (c * c - s * s) / (l * l);
        let g3 = c * c / l;
        let g4 = c * s / l;
        let g5 = s * s / l;

        let d2e = second_derivative_block(g5, -g4, g3);
        let d2theta = second_derivative_block(-g1, g2, g1);

        kt += d2e * natural.n + d2theta * (natural.m1 + natural.m2);
        kt
    }
}

/// Expand the 2x2 chord block [[xx, xy], [xy, yy]] (taken w.r.t. node j
/// translations) into the 6x6 pattern over both nodes; rotations drop out.
fn second_derivative_block(xx: f64, xy: f64, yy: f64) -> Mat6 {
    let mut m = Mat6::zeros();
    let block = [[xx, xy], [xy, yy]];
    let translations = [(0usize, -1.0), (3usize, 1.0)];

    for &(oi, si) in &translations {
        for &(oj, sj) in &translations {
            for a in 0..2 {
                for b in 0..2 {
                    m[(oi + a, oj + b)] = si * sj * block[a][b];
                }
            }
        }
    }

    m
}
