//! Axis-aligned rectangle utilities used as the quadtree's cell shape.

use crate::vector2::Vector2;

/// An axis-aligned rectangle, given by its top-left and bottom-right
/// corners. `top_left.x <= bottom_right.x` and `top_left.y <=
/// bottom_right.y` always hold. Must be square (`width == height`) to
/// serve as a quadtree root.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub top_left: Vector2,
    pub bottom_right: Vector2,
}

impl BoundingBox {
    pub fn new(top_left: Vector2, bottom_right: Vector2) -> Self {
        debug_assert!(top_left.x <= bottom_right.x);
        debug_assert!(top_left.y <= bottom_right.y);
        Self {
            top_left,
            bottom_right,
        }
    }

    /// Construct the minimal square bounding box covering every position
    /// in `points`. Returns `None` for an empty slice. The shorter axis is
    /// inflated and the box re-centered so the result is always square,
    /// since a quadtree root must be square (spec §4.6 step 2).
    pub fn from_points(points: &[Vector2]) -> Option<Self> {
        let mut iter = points.iter();
        let first = *iter.next()?;

        let mut x_min = first.x;
        let mut x_max = first.x;
        let mut y_min = first.y;
        let mut y_max = first.y;

        for p in iter {
            x_min = x_min.min(p.x);
            x_max = x_max.max(p.x);
            y_min = y_min.min(p.y);
            y_max = y_max.max(p.y);
        }

        let width = x_max - x_min;
        let height = y_max - y_min;
        let side = width.max(height);
        // A single point (or a column/row of coincident points) yields a
        // zero-width square; nudge it open so `subdivide` can still act.
        let side = if side <= 0. { 1. } else { side };

        let cx = (x_min + x_max) / 2.;
        let cy = (y_min + y_max) / 2.;
        let half = side / 2.;

        Some(Self::new(
            Vector2::new(cx - half, cy - half),
            Vector2::new(cx + half, cy + half),
        ))
    }

    pub fn width(&self) -> f64 {
        self.bottom_right.x - self.top_left.x
    }

    pub fn height(&self) -> f64 {
        self.bottom_right.y - self.top_left.y
    }

    pub fn center(&self) -> Vector2 {
        Vector2::new(
            (self.top_left.x + self.bottom_right.x) / 2.,
            (self.top_left.y + self.bottom_right.y) / 2.,
        )
    }

    /// Closed half-plane inclusion on both axes.
    pub fn contains(&self, p: Vector2) -> bool {
        p.x >= self.top_left.x
            && p.x <= self.bottom_right.x
            && p.y >= self.top_left.y
            && p.y <= self.bottom_right.y
    }

    /// Split into four equal quadrants: NW, NE, SW, SE, in that order.
    /// `quadrant_of` must remain consistent with this ordering and split
    /// point.
    pub fn subdivide(&self) -> [Self; 4] {
        let c = self.center();
        let tl = self.top_left;
        let br = self.bottom_right;

        let nw = Self::new(tl, c);
        let ne = Self::new(Vector2::new(c.x, tl.y), Vector2::new(br.x, c.y));
        let sw = Self::new(Vector2::new(tl.x, c.y), Vector2::new(c.x, br.y));
        let se = Self::new(c, br);

        [nw, ne, sw, se]
    }

    /// Squared length of the diagonal, `(bottom_right - top_left).length_squared()`.
    pub fn squared_diagonal(&self) -> f64 {
        (self.bottom_right - self.top_left).length_squared()
    }

    /// Squared side length, `width()^2`. A quadtree root and every cell it
    /// subdivides into is square, so this is the `s²` term the opening-angle
    /// criterion uses (spec §4.4, §9 Open Question 2 fixes the criterion to
    /// the side-length form, not the diagonal).
    pub fn side_squared(&self) -> f64 {
        self.width() * self.width()
    }

    /// Index of the child quadrant (0=NW, 1=NE, 2=SW, 3=SE) that contains
    /// `p`, per `subdivide`'s ordering. Ties at the splitting lines are
    /// resolved by first match: NW, NE, SW, SE.
    pub fn quadrant_of(&self, p: Vector2) -> usize {
        let c = self.center();
        let west = p.x <= c.x;
        let north = p.y <= c.y;
        match (north, west) {
            (true, true) => 0,  // NW
            (true, false) => 1, // NE
            (false, true) => 2, // SW
            (false, false) => 3, // SE
        }
    }
}
