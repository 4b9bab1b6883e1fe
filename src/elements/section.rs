//! Section properties for planar beam elements

use serde::{Deserialize, Serialize};

use super::material::Material;

/// Elastic beam section: modulus, area and second moment of area
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Section {
    /// Modulus of elasticity
    pub e: f64,
    /// Cross-sectional area
    pub a: f64,
    /// Second moment of area about the out-of-plane axis
    pub i: f64,
}

impl Section {
    /// Create a new section with basic properties
    pub fn new(e: f64, a: f64, i: f64) -> Self {
        Self { e, a, i }
    }

    /// Section of the given material and geometric properties
    pub fn with_material(material: &Material, a: f64, i: f64) -> Self {
        Self::new(material.e, a, i)
    }

    /// Solid rectangle bending about its strong axis when `depth > width`
    pub fn rectangular(material: &Material, width: f64, depth: f64) -> Self {
        let a = width * depth;
        let i = width * depth.powi(3) / 12.0;
        Self::with_material(material, a, i)
    }

    /// Solid circle
    pub fn circular(material: &Material, diameter: f64) -> Self {
        let r = diameter / 2.0;
        let a = std::f64::consts::PI * r.powi(2);
        let i = std::f64::consts::PI * r.powi(4) / 4.0;
        Self::with_material(material, a, i)
    }

    /// Hollow circular (pipe) section
    pub fn pipe(material: &Material, outer_diameter: f64, wall_thickness: f64) -> Self {
        let r_o = outer_diameter / 2.0;
        let r_i = r_o - wall_thickness;

        let a = std::f64::consts::PI * (r_o.powi(2) - r_i.powi(2));
        let i = std::f64::consts::PI * (r_o.powi(4) - r_i.powi(4)) / 4.0;
        Self::with_material(material, a, i)
    }

    /// Wide flange (I-beam) bending about the strong axis
    ///
    /// # Arguments
    /// * `depth` - Total depth of section
    /// * `flange_width` - Width of flange
    /// * `flange_thickness` - Thickness of flange
    /// * `web_thickness` - Thickness of web
    pub fn wide_flange(
        material: &Material,
        depth: f64,
        flange_width: f64,
        flange_thickness: f64,
        web_thickness: f64,
    ) -> Self {
        let bf = flange_width;
        let tf = flange_thickness;
        let tw = web_thickness;
        let hw = depth - 2.0 * tf;

        let a = 2.0 * bf * tf + hw * tw;
        let i = (bf * depth.powi(3) - (bf - tw) * hw.powi(3)) / 12.0;
        Self::with_material(material, a, i)
    }

    /// Axial rigidity EA
    #[inline]
    pub fn ea(&self) -> f64 {
        self.e * self.a
    }

    /// Bending rigidity EI
    #[inline]
    pub fn ei(&self) -> f64 {
        self.e * self.i
    }
}
