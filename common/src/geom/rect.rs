use super::Dbu;
use super::point::Point;
use serde::{Deserialize, Serialize};

/// Axis-aligned box. `min` is always the lower-left corner.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Rect {
    pub min: Point,
    pub max: Point,
}

impl Rect {
    pub fn new(a: Point, b: Point) -> Self {
        Self {
            min: Point::new(a.x.min(b.x), a.y.min(b.y)),
            max: Point::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    pub fn from_coords(x0: Dbu, y0: Dbu, x1: Dbu, y1: Dbu) -> Self {
        Self::new(Point::new(x0, y0), Point::new(x1, y1))
    }

    pub fn width(&self) -> Dbu {
        self.max.x - self.min.x
    }
    pub fn height(&self) -> Dbu {
        self.max.y - self.min.y
    }
    pub fn area(&self) -> Dbu {
        self.width() * self.height()
    }

    /// Width in the DRC sense: the smaller side.
    pub fn min_dim(&self) -> Dbu {
        self.width().min(self.height())
    }

    pub fn max_dim(&self) -> Dbu {
        self.width().max(self.height())
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.min.x + self.max.x) / 2,
            (self.min.y + self.max.y) / 2,
        )
    }

    /// Interiors share positive area.
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.min.x < other.max.x
            && self.max.x > other.min.x
            && self.min.y < other.max.y
            && self.max.y > other.min.y
    }

    /// Closed-box intersection; abutting boxes intersect.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    pub fn contains_rect(&self, other: &Rect) -> bool {
        self.contains(other.min) && self.contains(other.max)
    }

    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        if !self.intersects(other) {
            return None;
        }
        Some(Rect {
            min: Point::new(self.min.x.max(other.min.x), self.min.y.max(other.min.y)),
            max: Point::new(self.max.x.min(other.max.x), self.max.y.min(other.max.y)),
        })
    }

    pub fn merge(&self, other: &Rect) -> Rect {
        Rect {
            min: Point::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            max: Point::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        }
    }

    pub fn bloat(&self, d: Dbu) -> Rect {
        Rect {
            min: Point::new(self.min.x - d, self.min.y - d),
            max: Point::new(self.max.x + d, self.max.y + d),
        }
    }

    /// Gap between the x projections, 0 when they touch or overlap.
    pub fn gap_x(&self, other: &Rect) -> Dbu {
        (other.min.x - self.max.x).max(self.min.x - other.max.x).max(0)
    }

    pub fn gap_y(&self, other: &Rect) -> Dbu {
        (other.min.y - self.max.y).max(self.min.y - other.max.y).max(0)
    }

    /// Length over which the x projections overlap. Negative when apart.
    pub fn prl_x(&self, other: &Rect) -> Dbu {
        self.max.x.min(other.max.x) - self.min.x.max(other.min.x)
    }

    pub fn prl_y(&self, other: &Rect) -> Dbu {
        self.max.y.min(other.max.y) - self.min.y.max(other.min.y)
    }

    /// The box spanning the space between two boxes (or their overlap).
    pub fn span_between(&self, other: &Rect) -> Rect {
        let xs = [
            self.min.x.max(other.min.x),
            self.max.x.min(other.max.x),
        ];
        let ys = [
            self.min.y.max(other.min.y),
            self.max.y.min(other.max.y),
        ];
        Rect::from_coords(xs[0], ys[0], xs[1], ys[1])
    }
}
