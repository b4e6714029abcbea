use rayon::prelude::*;

use super::point::{Centroid, Point};
use crate::error::{Error, Result};

/// Coordinate sums and a count over some subset of a cluster.
///
/// Partial sums over disjoint subsets merge by addition, so a large cluster
/// can be summed in pieces on separate threads and divided once at the end.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PartialSum {
    pub sum_x: f64,
    pub sum_y: f64,
    pub count: usize,
}

impl PartialSum {
    pub fn from_points(points: &[Point]) -> Self {
        points.iter().fold(Self::default(), |mut acc, p| {
            acc.sum_x += p.x();
            acc.sum_y += p.y();
            acc.count += 1;
            acc
        })
    }

    pub fn merge(self, other: Self) -> Self {
        Self {
            sum_x: self.sum_x + other.sum_x,
            sum_y: self.sum_y + other.sum_y,
            count: self.count + other.count,
        }
    }

    /// The mean point, or `None` when nothing has been summed.
    pub fn mean(&self) -> Option<Result<Point>> {
        if self.count == 0 {
            return None;
        }
        let n = self.count as f64;
        Some(Point::new(self.sum_x / n, self.sum_y / n))
    }
}

/// Recomputes a centroid as the mean of its members.
///
/// Clusters longer than `split_threshold` are summed in chunks of that size
/// on the rayon pool.
#[derive(Debug, Clone, Copy)]
pub struct Aggregator {
    split_threshold: usize,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self {
            split_threshold: DEFAULT_SPLIT_THRESHOLD,
        }
    }
}

pub(crate) const DEFAULT_SPLIT_THRESHOLD: usize = 1 << 16;

impl Aggregator {
    /// A threshold of zero is treated as one.
    pub fn new(split_threshold: usize) -> Self {
        Self {
            split_threshold: split_threshold.max(1),
        }
    }

    pub fn split_threshold(&self) -> usize {
        self.split_threshold
    }

    /// The coordinate-wise mean of `members`.
    ///
    /// # Errors
    ///
    /// [`Error::EmptyCluster`] if `members` is empty.
    pub fn aggregate(&self, key: &Centroid, members: &[Point]) -> Result<Centroid> {
        let total = if members.len() > self.split_threshold {
            members
                .par_chunks(self.split_threshold)
                .map(PartialSum::from_points)
                .reduce(PartialSum::default, PartialSum::merge)
        } else {
            PartialSum::from_points(members)
        };
        finish(key, members, total)
    }
}

/// Turns the sums over `members` into their mean.
///
/// Sums of finite coordinates can still overflow; in that case each
/// coordinate is divided by the count before adding, which keeps every
/// partial result within the magnitude of the largest member.
fn finish(key: &Centroid, members: &[Point], total: PartialSum) -> Result<Centroid> {
    if total.sum_x.is_finite() && total.sum_y.is_finite() {
        return total
            .mean()
            .unwrap_or_else(|| Err(Error::EmptyCluster { key: *key }));
    }
    let n = total.count as f64;
    let (x, y) = members
        .iter()
        .fold((0.0, 0.0), |(x, y), p| (x + p.x() / n, y + p.y() / n));
    Point::new(x, y)
}

/// Aggregates `members` on the calling thread.
///
/// # Example
///
/// ```
/// use kmeans_step::cluster::{aggregate, Point};
///
/// let key = Point::new(0.0, 0.0).unwrap();
/// let members: Vec<Point> = [(1.0, 1.0), (3.0, 3.0), (2.0, 2.0)]
///     .into_iter()
///     .map(|(x, y)| Point::new(x, y).unwrap())
///     .collect();
/// assert_eq!(aggregate(&key, &members).unwrap(), Point::new(2.0, 2.0).unwrap());
/// ```
pub fn aggregate(key: &Centroid, members: &[Point]) -> Result<Centroid> {
    finish(key, members, PartialSum::from_points(members))
}
