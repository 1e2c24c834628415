pub mod array3;
pub mod graph;

pub use array3::Array3;
pub use graph::{CostParams, Dir, EdgeData, GridGraph, GridLayer};
