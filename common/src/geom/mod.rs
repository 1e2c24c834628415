pub mod coord;
pub mod point;
pub mod rect;
pub mod rtree;
pub mod transform;

pub use coord::GridCoord;
pub use point::Point;
pub use rect::Rect;
pub use transform::{Orientation, Transform};

/// Database units. All layout coordinates are integers at DEF resolution.
pub type Dbu = i64;
