//! Placement transforms for macro geometry.

use super::Dbu;
use super::point::Point;
use super::rect::Rect;
use serde::{Deserialize, Serialize};

/// DEF orientations. Rotations are counter-clockwise; the `F*` variants
/// mirror about the y axis before rotating.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Orientation {
    #[default]
    N,
    W,
    S,
    E,
    FN,
    FW,
    FS,
    FE,
}

impl Orientation {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "N" | "R0" => Self::N,
            "W" | "R90" => Self::W,
            "S" | "R180" => Self::S,
            "E" | "R270" => Self::E,
            "FN" | "MY" => Self::FN,
            "FW" | "MX90" => Self::FW,
            "FS" | "MX" => Self::FS,
            "FE" | "MY90" => Self::FE,
            _ => return None,
        })
    }

    fn apply(&self, p: Point) -> Point {
        let (x, y) = (p.x, p.y);
        match self {
            Self::N => Point::new(x, y),
            Self::W => Point::new(-y, x),
            Self::S => Point::new(-x, -y),
            Self::E => Point::new(y, -x),
            Self::FN => Point::new(-x, y),
            Self::FW => Point::new(-y, -x),
            Self::FS => Point::new(x, -y),
            Self::FE => Point::new(y, x),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transform {
    pub offset: Point,
    pub orient: Orientation,
}

impl Transform {
    pub fn new(offset: Point, orient: Orientation) -> Self {
        Self { offset, orient }
    }

    pub fn translate(offset: Point) -> Self {
        Self::new(offset, Orientation::N)
    }

    /// DEF placement semantics: `loc` is the lower-left corner of the
    /// macro's bounding box *after* orientation is applied.
    pub fn from_placement(loc: Point, orient: Orientation, width: Dbu, height: Dbu) -> Self {
        let bbox = Transform::new(Point::default(), orient)
            .apply_rect(&Rect::from_coords(0, 0, width, height));
        Self::new(loc - bbox.min, orient)
    }

    pub fn apply(&self, p: Point) -> Point {
        self.orient.apply(p) + self.offset
    }

    pub fn apply_rect(&self, r: &Rect) -> Rect {
        Rect::new(self.apply(r.min), self.apply(r.max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placement_keeps_lower_left_at_location() {
        let all = [
            Orientation::N,
            Orientation::W,
            Orientation::S,
            Orientation::E,
            Orientation::FN,
            Orientation::FW,
            Orientation::FS,
            Orientation::FE,
        ];
        for orient in all {
            let tf = Transform::from_placement(Point::new(1000, 2000), orient, 400, 300);
            let bbox = tf.apply_rect(&Rect::from_coords(0, 0, 400, 300));
            assert_eq!(bbox.min, Point::new(1000, 2000), "orientation {:?}", orient);
        }
    }

    #[test]
    fn south_rotates_pin_to_opposite_corner() {
        let tf = Transform::from_placement(Point::new(0, 0), Orientation::S, 100, 50);
        let pin = tf.apply_rect(&Rect::from_coords(0, 0, 10, 10));
        assert_eq!(pin, Rect::from_coords(90, 40, 100, 50));
    }
}
