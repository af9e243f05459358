use std::ops::{Add, Mul, Sub};

use rstar::{PointDistance, RTreeObject, AABB};

use crate::graph::VertexId;

pub trait PointLike {
    fn x(&self) -> f64;
    fn y(&self) -> f64;

    fn as_point(&self) -> Point {
        Point {
            x: self.x(),
            y: self.y(),
        }
    }
}

pub trait BoundingBox {
    fn top_left(&self) -> Point;
    fn bottom_right(&self) -> Point;

    fn bounding_box(&self) -> Rect {
        Rect::from_corners(self.top_left(), self.bottom_right())
    }
}

#[derive(Clone, Debug, PartialEq, Copy, Default)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Size { width, height }
    }
}

/// A 2D location. Graph coordinates, not screen pixels.
#[derive(Clone, Debug, PartialEq, Copy, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        let x_diff = self.x - other.x;
        let y_diff = self.y - other.y;
        (x_diff.powi(2) + y_diff.powi(2)).sqrt()
    }

    pub fn length_as_vector(&self) -> f64 {
        (self.x.powi(2) + self.y.powi(2)).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, other: Point) -> Point {
        Point {
            x: self.x - other.x,
            y: self.y - other.y,
        }
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, other: Point) -> Point {
        Point {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }
}

impl Mul<f64> for Point {
    type Output = Point;

    fn mul(self, other: f64) -> Point {
        Point {
            x: self.x * other,
            y: self.y * other,
        }
    }
}

impl PointLike for Point {
    fn x(&self) -> f64 {
        self.x
    }

    fn y(&self) -> f64 {
        self.y
    }
}

impl rstar::Point for Point {
    type Scalar = f64;
    const DIMENSIONS: usize = 2;

    fn generate(mut generator: impl FnMut(usize) -> Self::Scalar) -> Self {
        Point {
            x: generator(0),
            y: generator(1),
        }
    }

    fn nth(&self, index: usize) -> Self::Scalar {
        match index {
            0 => self.x,
            1 => self.y,
            _ => panic!("Index out of bounds"),
        }
    }

    fn nth_mut(&mut self, index: usize) -> &mut Self::Scalar {
        match index {
            0 => &mut self.x,
            1 => &mut self.y,
            _ => panic!("Index out of bounds"),
        }
    }
}

/// Axis-aligned rectangle given by origin and extent. Extents may be zero;
/// all helpers stay total for degenerate rectangles.
#[derive(Clone, Debug, PartialEq, Copy)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Rect {
            x,
            y,
            width: width.max(0.0),
            height: height.max(0.0),
        }
    }

    pub fn from_corners(top_left: Point, bottom_right: Point) -> Self {
        Rect::new(
            top_left.x,
            top_left.y,
            bottom_right.x - top_left.x,
            bottom_right.y - top_left.y,
        )
    }

    pub fn center(&self) -> Point {
        Point {
            x: self.x + self.width / 2.0,
            y: self.y + self.height / 2.0,
        }
    }

    pub fn is_degenerate(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Shrink the rectangle on all four sides. Never inverts; a margin larger
    /// than half an extent collapses that axis onto the center line.
    pub fn inset(&self, margin: f64) -> Rect {
        let margin = margin.max(0.0);
        let width = (self.width - 2.0 * margin).max(0.0);
        let height = (self.height - 2.0 * margin).max(0.0);
        Rect {
            x: self.x + (self.width - width) / 2.0,
            y: self.y + (self.height - height) / 2.0,
            width,
            height,
        }
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x
            && point.x <= self.x + self.width
            && point.y >= self.y
            && point.y <= self.y + self.height
    }

    /// Clamp a point into the rectangle. Total: a zero-extent axis clamps to
    /// its single coordinate instead of panicking like `f64::clamp` would.
    pub fn clamp_point(&self, point: Point) -> Point {
        let x = if self.width > 0.0 {
            point.x.clamp(self.x, self.x + self.width)
        } else {
            self.x
        };
        let y = if self.height > 0.0 {
            point.y.clamp(self.y, self.y + self.height)
        } else {
            self.y
        };
        Point { x, y }
    }
}

impl BoundingBox for Rect {
    fn top_left(&self) -> Point {
        Point {
            x: self.x,
            y: self.y,
        }
    }

    fn bottom_right(&self) -> Point {
        Point {
            x: self.x + self.width,
            y: self.y + self.height,
        }
    }
}

/// The geometric footprint a vertex occupies once placed. Used for
/// point-containment during hit-testing.
#[derive(Clone, Debug, PartialEq, Copy)]
pub enum VertexShape {
    Circle { radius: f64 },
    Rectangle { size: Size },
}

impl VertexShape {
    pub fn default_circle() -> Self {
        VertexShape::Circle { radius: 5.0 }
    }
}

/// A vertex shape pinned at its layout location; the unit stored in the
/// drawer's spatial index.
#[derive(Clone, Debug, PartialEq, Copy)]
pub struct PlacedVertex {
    pub id: VertexId,
    pub center: Point,
    pub shape: VertexShape,
}

impl PlacedVertex {
    pub fn contains(&self, point: Point) -> bool {
        match self.shape {
            VertexShape::Circle { radius } => self.center.distance(&point) <= radius,
            VertexShape::Rectangle { .. } => self.bounding_box().contains(point),
        }
    }
}

impl BoundingBox for PlacedVertex {
    fn top_left(&self) -> Point {
        match self.shape {
            VertexShape::Circle { radius } => Point {
                x: self.center.x - radius,
                y: self.center.y - radius,
            },
            VertexShape::Rectangle { size } => Point {
                x: self.center.x - size.width / 2.0,
                y: self.center.y - size.height / 2.0,
            },
        }
    }

    fn bottom_right(&self) -> Point {
        match self.shape {
            VertexShape::Circle { radius } => Point {
                x: self.center.x + radius,
                y: self.center.y + radius,
            },
            VertexShape::Rectangle { size } => Point {
                x: self.center.x + size.width / 2.0,
                y: self.center.y + size.height / 2.0,
            },
        }
    }
}

impl RTreeObject for PlacedVertex {
    type Envelope = AABB<Point>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.top_left(), self.bottom_right())
    }
}

impl PointDistance for PlacedVertex {
    fn distance_2(&self, point: &Point) -> f64 {
        match self.shape {
            VertexShape::Circle { radius } => {
                let gap = (self.center.distance(point) - radius).max(0.0);
                gap * gap
            }
            VertexShape::Rectangle { .. } => {
                let top_left = self.top_left();
                let bottom_right = self.bottom_right();
                let dx = (top_left.x - point.x).max(point.x - bottom_right.x).max(0.0);
                let dy = (top_left.y - point.y).max(point.y - bottom_right.y).max(0.0);
                dx * dx + dy * dy
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inset_never_inverts() {
        let rect = Rect::new(0.0, 0.0, 10.0, 4.0);
        let inner = rect.inset(3.0);
        assert_eq!(inner.width, 4.0);
        assert_eq!(inner.height, 0.0);
        assert_eq!(inner.y, 2.0);
    }

    #[test]
    fn clamp_point_handles_degenerate_axis() {
        let rect = Rect::new(5.0, 5.0, 0.0, 0.0);
        let clamped = rect.clamp_point(Point::new(100.0, -3.0));
        assert_eq!(clamped, Point::new(5.0, 5.0));
    }

    #[test]
    fn circle_containment() {
        let placed = PlacedVertex {
            id: VertexId::from_index(0),
            center: Point::new(10.0, 10.0),
            shape: VertexShape::Circle { radius: 2.0 },
        };
        assert!(placed.contains(Point::new(11.0, 10.0)));
        assert!(!placed.contains(Point::new(13.0, 10.0)));
        assert_eq!(placed.distance_2(&Point::new(14.0, 10.0)), 4.0);
    }

    #[test]
    fn rectangle_distance_is_zero_inside() {
        let placed = PlacedVertex {
            id: VertexId::from_index(0),
            center: Point::new(0.0, 0.0),
            shape: VertexShape::Rectangle {
                size: Size::new(4.0, 2.0),
            },
        };
        assert_eq!(placed.distance_2(&Point::new(1.0, 0.5)), 0.0);
        assert!(placed.distance_2(&Point::new(4.0, 0.0)) > 0.0);
    }
}
