//! Handle and element-type primitives shared by all reconciliation stages.

pub mod element_type;
pub mod handle;

pub use element_type::{ElementType, Sense, SideSpec};
pub use handle::{EntityHandle, EntityRange};
