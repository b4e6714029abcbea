use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::error::{Error, Result};

/// An immutable point in the plane.
///
/// Points are ordered by `x` first and then by `y`, and two points are equal
/// only when both coordinates are bit-for-bit identical. The same order is
/// used when a point serves as a grouping key, so a [`Centroid`] groups
/// exactly the pairs whose keys compare `Equal`.
///
/// Construction rejects NaN and infinite coordinates, which keeps the order
/// total.
///
/// # Example
///
/// ```
/// use kmeans_step::cluster::Point;
///
/// let a = Point::new(1.0, 2.0).unwrap();
/// let b = Point::new(1.0, 3.0).unwrap();
/// assert!(a < b);
/// assert_eq!(a.to_string(), "1.0,2.0");
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Point {
    x: f64,
    y: f64,
}

/// A point used as a cluster representative.
pub type Centroid = Point;

impl Point {
    /// Creates a point, failing with [`Error::InvalidPoint`] if either
    /// coordinate is not finite.
    pub fn new(x: f64, y: f64) -> Result<Self> {
        if !x.is_finite() || !y.is_finite() {
            return Err(Error::InvalidPoint { x, y });
        }
        Ok(Self { x, y })
    }

    /// The x coordinate.
    pub fn x(&self) -> f64 {
        self.x
    }

    /// The y coordinate.
    pub fn y(&self) -> f64 {
        self.y
    }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: &Point) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dy * dy + dx * dx).sqrt()
    }
}

impl Ord for Point {
    fn cmp(&self, other: &Self) -> Ordering {
        self.x
            .total_cmp(&other.x)
            .then_with(|| self.y.total_cmp(&other.y))
    }
}

impl PartialOrd for Point {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Point {
    fn eq(&self, other: &Self) -> bool {
        self.x.to_bits() == other.x.to_bits() && self.y.to_bits() == other.y.to_bits()
    }
}

impl Eq for Point {}

impl Hash for Point {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.x.to_bits().hash(state);
        self.y.to_bits().hash(state);
    }
}

impl fmt::Display for Point {
    // `{:?}` keeps the fractional part on whole numbers: `1.0,1.5`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?},{:?}", self.x, self.y)
    }
}

impl FromStr for Point {
    type Err = Error;

    /// Parses `x,y`. Surrounding whitespace on either field is ignored.
    fn from_str(s: &str) -> Result<Self> {
        let mut fields = s.split(',');
        let (Some(x), Some(y), None) = (fields.next(), fields.next(), fields.next()) else {
            return Err(Error::Parse(s.to_string()));
        };
        let x: f64 = x.trim().parse().map_err(|_| Error::Parse(s.to_string()))?;
        let y: f64 = y.trim().parse().map_err(|_| Error::Parse(s.to_string()))?;
        Point::new(x, y)
    }
}
