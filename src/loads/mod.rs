//! Nodal loads and their incremental application

mod load_manager;
mod nodal_load;

pub use load_manager::{LoadManager, LoadSchedule};
pub use nodal_load::NodalLoad;
