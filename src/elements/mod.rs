//! Structural elements module

mod beam;
mod material;
mod node;
mod restraint;
mod section;
mod transform;

pub use beam::{BeamElement, ElementKind, ElementState, SectionState};
pub use material::Material;
pub use node::{Dof, Node, NODE_DOFS};
pub use restraint::Restraint;
pub use section::Section;
pub use transform::{NaturalDeformations, NaturalForces, NonlinearTransform};
