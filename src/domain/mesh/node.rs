use std::fmt;

/// A location in the 2D cross-section
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn dist(&self, other: &Self) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// Point halfway between `self` and `other`
    pub fn midpoint(&self, other: &Self) -> Self {
        Self::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }

    /// Centroid of a set of points (the origin for an empty set)
    pub fn centroid<'a>(points: impl Iterator<Item = &'a Point>) -> Self {
        let (mut x, mut y, mut n) = (0.0, 0.0, 0usize);
        for p in points {
            x += p.x;
            y += p.y;
            n += 1;
        }
        if n == 0 {
            Self::default()
        } else {
            Self::new(x / n as f64, y / n as f64)
        }
    }
}

impl Default for Point {
    fn default() -> Self {
        Self { x: 0.0, y: 0.0 }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.x, self.y)
    }
}

/// A mesh vertex.
///
/// IDs are 1-based and contiguous across the mesh; `Node` `n` lives at index `n - 1`.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: usize,
    pub coords: Point,
}

impl Node {
    pub fn new(id: usize, coords: Point) -> Self {
        Self { id, coords }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centroid_and_distance() {
        let pts = [Point::new(0.0, 0.0), Point::new(2.0, 0.0), Point::new(1.0, 3.0)];
        let c = Point::centroid(pts.iter());

        assert!((c.x - 1.0).abs() < 1e-14);
        assert!((c.y - 1.0).abs() < 1e-14);
        assert!((pts[0].dist(&pts[1]) - 2.0).abs() < 1e-14);

        let m = pts[0].midpoint(&pts[2]);
        assert!((m.x - 0.5).abs() < 1e-14);
        assert!((m.y - 1.5).abs() < 1e-14);
    }
}
