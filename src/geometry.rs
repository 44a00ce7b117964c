//! Points, sizes, rectangles and affine transforms in window coordinates

use nalgebra::{Matrix3, Point2, Vector2};

pub type Point = Point2<f64>;

/// Homogeneous 2D affine transform, applied to column vectors.
pub type Transform = Matrix3<f64>;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn zero() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub origin: Point,
    pub size: Size,
}

impl Default for Rect {
    fn default() -> Self {
        Self::zero()
    }
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            origin: Point::new(x, y),
            size: Size::new(width, height),
        }
    }

    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0, 0.0)
    }

    pub fn with_size(size: Size) -> Self {
        Self::new(0.0, 0.0, size.width, size.height)
    }

    pub fn min_x(&self) -> f64 {
        self.origin.x.min(self.origin.x + self.size.width)
    }

    pub fn min_y(&self) -> f64 {
        self.origin.y.min(self.origin.y + self.size.height)
    }

    pub fn max_x(&self) -> f64 {
        self.origin.x.max(self.origin.x + self.size.width)
    }

    pub fn max_y(&self) -> f64 {
        self.origin.y.max(self.origin.y + self.size.height)
    }

    pub fn mid_x(&self) -> f64 {
        self.origin.x + self.size.width / 2.0
    }

    pub fn mid_y(&self) -> f64 {
        self.origin.y + self.size.height / 2.0
    }

    pub fn center(&self) -> Point {
        Point::new(self.mid_x(), self.mid_y())
    }

    pub fn is_empty(&self) -> bool {
        self.size.width == 0.0 || self.size.height == 0.0
    }

    /// Half-open containment: the max edges are outside.
    /// NaN coordinates are never contained.
    pub fn contains(&self, point: &Point) -> bool {
        point.x >= self.min_x()
            && point.x < self.max_x()
            && point.y >= self.min_y()
            && point.y < self.max_y()
    }

    pub fn union(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let min_x = self.min_x().min(other.min_x());
        let min_y = self.min_y().min(other.min_y());
        let max_x = self.max_x().max(other.max_x());
        let max_y = self.max_y().max(other.max_y());
        Rect::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }

    pub fn scaled(&self, factor: f64) -> Rect {
        Rect::new(
            self.origin.x * factor,
            self.origin.y * factor,
            self.size.width * factor,
            self.size.height * factor,
        )
    }

    /// Bounding box of the four corners after `transform`.
    pub fn applying(&self, transform: &Transform) -> Rect {
        let corners = [
            Point::new(self.min_x(), self.min_y()),
            Point::new(self.max_x(), self.min_y()),
            Point::new(self.min_x(), self.max_y()),
            Point::new(self.max_x(), self.max_y()),
        ]
        .map(|p| transform.transform_point(&p));

        let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
        let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for p in corners {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Rect::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }
}

pub fn identity() -> Transform {
    Transform::identity()
}

pub fn translation(dx: f64, dy: f64) -> Transform {
    Transform::new_translation(&Vector2::new(dx, dy))
}

pub fn scaling(sx: f64, sy: f64) -> Transform {
    Transform::new_nonuniform_scaling(&Vector2::new(sx, sy))
}

pub fn rotation(angle: f64) -> Transform {
    Transform::new_rotation(angle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_is_half_open() {
        let rect = Rect::new(10.0, 10.0, 20.0, 20.0);
        assert!(rect.contains(&Point::new(10.0, 10.0)));
        assert!(rect.contains(&Point::new(29.9, 29.9)));
        assert!(!rect.contains(&Point::new(30.0, 15.0)));
        assert!(!rect.contains(&Point::new(f64::NAN, 15.0)));
    }

    #[test]
    fn test_union_skips_empty() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(20.0, 5.0, 5.0, 10.0);
        assert_eq!(a.union(&b), Rect::new(0.0, 0.0, 25.0, 15.0));
        assert_eq!(Rect::zero().union(&b), b);
    }

    #[test]
    fn test_applying_rotation_bounding_box() {
        let rect = Rect::new(-10.0, -5.0, 20.0, 10.0);
        let rotated = rect.applying(&rotation(std::f64::consts::FRAC_PI_2));
        assert!((rotated.size.width - 10.0).abs() < 1e-9);
        assert!((rotated.size.height - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_translation_then_scaling() {
        let t = translation(5.0, 5.0) * scaling(2.0, 2.0);
        let p = t.transform_point(&Point::new(1.0, 2.0));
        assert_eq!(p, Point::new(7.0, 9.0));
    }
}
