//! Material properties

use serde::{Deserialize, Serialize};

/// Linear elastic material
///
/// Only the modulus enters a shear-rigid beam.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Material {
    /// Modulus of elasticity (Young's modulus) in Pa
    pub e: f64,
}

impl Material {
    /// Create a new material with given modulus
    pub fn new(e: f64) -> Self {
        Self { e }
    }

    /// Create a standard steel material
    pub fn steel() -> Self {
        Self { e: 200e9 } // 200 GPa
    }

    /// Create an aluminum material (6061-T6)
    pub fn aluminum() -> Self {
        Self { e: 68.9e9 } // 68.9 GPa
    }

    /// Create a concrete material from its compressive strength in Pa
    pub fn concrete(fc: f64) -> Self {
        // ACI: E = 4700 * sqrt(f'c in MPa) MPa
        let fc_mpa = fc / 1e6;
        Self {
            e: 4700.0 * fc_mpa.sqrt() * 1e6,
        }
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::steel()
    }
}
