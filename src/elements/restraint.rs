//! Restraint conditions

use serde::{Deserialize, Serialize};

use super::node::{Dof, NODE_DOFS};

/// Fixity pattern applied to a node
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Restraint {
    /// Restrained in X translation
    #[serde(default)]
    pub dx: bool,
    /// Restrained in Y translation
    #[serde(default)]
    pub dy: bool,
    /// Restrained in Z rotation
    #[serde(default)]
    pub rz: bool,
}

impl Restraint {
    /// Create a new restraint with every DOF free
    pub fn new() -> Self {
        Self::default()
    }

    /// Fully fixed (all DOFs restrained)
    pub fn fixed() -> Self {
        Self::with_restraints(true, true, true)
    }

    /// Pinned (translations restrained, rotation free)
    pub fn pinned() -> Self {
        Self::with_restraints(true, true, false)
    }

    /// Roller carrying vertical reaction only
    pub fn roller_y() -> Self {
        Self::with_restraints(false, true, false)
    }

    /// Roller carrying horizontal reaction only
    pub fn roller_x() -> Self {
        Self::with_restraints(true, false, false)
    }

    /// Create a restraint with specific flags
    pub fn with_restraints(dx: bool, dy: bool, rz: bool) -> Self {
        Self { dx, dy, rz }
    }

    /// Flags in canonical DOF order
    pub fn flags(&self) -> [bool; NODE_DOFS] {
        [self.dx, self.dy, self.rz]
    }

    pub fn is_restrained(&self, dof: Dof) -> bool {
        self.flags()[dof.index()]
    }

    /// Restrained DOFs in canonical order
    pub fn restrained_dofs(&self) -> Vec<Dof> {
        Dof::ALL
            .into_iter()
            .filter(|&dof| self.is_restrained(dof))
            .collect()
    }

    /// Check if any DOF is restrained
    pub fn is_supported(&self) -> bool {
        self.dx || self.dy || self.rz
    }

    pub fn num_restrained(&self) -> usize {
        self.restrained_dofs().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_restraint() {
        let r = Restraint::fixed();
        assert_eq!(r.num_restrained(), 3);
        assert_eq!(r.restrained_dofs(), vec![Dof::Ux, Dof::Uy, Dof::Rz]);
    }

    #[test]
    fn test_pinned_restraint() {
        let r = Restraint::pinned();
        assert!(r.is_restrained(Dof::Ux) && r.is_restrained(Dof::Uy));
        assert!(!r.is_restrained(Dof::Rz));
        assert_eq!(r.num_restrained(), 2);
    }

    #[test]
    fn test_free_restraint() {
        assert!(!Restraint::new().is_supported());
        assert_eq!(Restraint::roller_y().restrained_dofs(), vec![Dof::Uy]);
    }
}
