use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};

use crate::units::{Length, METRES};

/// A position on the road plane, in metres.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: Length,
    pub y: Length,
}

impl Point {
    pub const ZERO: Point = Point {
        x: Length::from_metres(0.0),
        y: Length::from_metres(0.0),
    };

    pub fn new(x: f64, y: f64) -> Point {
        Point {
            x: x * METRES,
            y: y * METRES,
        }
    }

    pub fn from_angle_mag(angle: f64, mag: Length) -> Point {
        Point {
            x: angle.cos() * mag,
            y: angle.sin() * mag,
        }
    }

    pub fn mag(self) -> Length {
        (self.x.powi(2) + self.y.powi(2)).sqrt()
    }

    pub fn distance_to(self, other: Point) -> Length {
        distance(self, other)
    }

    /// Returns a copy of `self` with each coordinate clamped into `[0, side_len]`.
    pub fn clamp_square(self, side_len: Length) -> Point {
        Point {
            x: self.x.min(side_len).max(Length::ZERO),
            y: self.y.min(side_len).max(Length::ZERO),
        }
    }
}

/// Euclidean distance between two positions.
///
/// The differences are squared so the result is exactly the same whichever
/// way round the arguments are given.
pub fn distance(a: Point, b: Point) -> Length {
    let diff_x = a.x - b.x;
    let diff_y = a.y - b.y;

    (diff_x.powi(2) + diff_y.powi(2)).sqrt()
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Self) -> Self::Output {
        Point {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Self) -> Self::Output {
        Point {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl Mul<f64> for Point {
    type Output = Point;

    fn mul(self, rhs: f64) -> Self::Output {
        Point {
            x: self.x * rhs,
            y: self.y * rhs,
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha12Rng;

    use super::*;
    use crate::assert_close;

    #[test]
    fn pythagoras() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);

        assert_close(distance(a, b), 5.0 * METRES);
        assert_close(a.distance_to(b), 5.0 * METRES);
        assert_eq!(distance(a, a), Length::ZERO);
    }

    #[test]
    fn symmetric() {
        let mut rng = ChaCha12Rng::seed_from_u64(7);

        for _ in 0..500 {
            let a = Point::new(rng.random_range(-1e4..1e4), rng.random_range(-1e4..1e4));
            let b = Point::new(rng.random_range(-1e4..1e4), rng.random_range(-1e4..1e4));

            // Exact equality, not just close.
            assert_eq!(distance(a, b), distance(b, a));
        }
    }

    #[test]
    fn clamp_square() {
        let side = 100.0 * METRES;
        assert_eq!(Point::new(-5.0, 120.0).clamp_square(side), Point::new(0.0, 100.0));
        assert_eq!(Point::new(30.0, 40.0).clamp_square(side), Point::new(30.0, 40.0));
    }
}
