use super::point::{Centroid, Point};
use super::table::CentroidTable;
use crate::error::{Error, Result};

/// A point together with the centroid it was assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    pub centroid: Centroid,
    pub point: Point,
}

/// Assigns points to their nearest centroid in a borrowed [`CentroidTable`].
///
/// An `Assigner` holds nothing but a view of the table, so one instance can be
/// shared by any number of worker threads.
#[derive(Debug, Clone, Copy)]
pub struct Assigner<'a> {
    first: &'a Centroid,
    rest: &'a [Centroid],
}

impl<'a> Assigner<'a> {
    /// Fails with [`Error::EmptyCentroidTable`] if `table` has no centroids.
    pub fn new(table: &'a CentroidTable) -> Result<Self> {
        match table.as_slice().split_first() {
            Some((first, rest)) => Ok(Self { first, rest }),
            None => Err(Error::EmptyCentroidTable),
        }
    }

    /// Returns the centroid closest to `point`.
    ///
    /// Every centroid is visited once, in table order. A later centroid
    /// replaces the current best only when strictly closer, so among
    /// equidistant centroids the earliest one wins.
    pub fn nearest(&self, point: &Point) -> Centroid {
        let mut closest = self.first;
        let mut minimum = point.distance(closest);
        for centroid in self.rest {
            let distance = point.distance(centroid);
            if distance < minimum {
                minimum = distance;
                closest = centroid;
            }
        }
        *closest
    }

    pub fn assign(&self, point: Point) -> Assignment {
        Assignment {
            centroid: self.nearest(&point),
            point,
        }
    }
}

/// Assigns a single point against `table`.
///
/// # Example
///
/// ```
/// use kmeans_step::cluster::{assign, CentroidTable, Point};
///
/// let table = CentroidTable::new(vec![
///     Point::new(0.0, 0.0).unwrap(),
///     Point::new(10.0, 0.0).unwrap(),
/// ]);
/// let pair = assign(Point::new(5.0, 0.0).unwrap(), &table).unwrap();
/// assert_eq!(pair.centroid, Point::new(0.0, 0.0).unwrap());
/// ```
pub fn assign(point: Point, table: &CentroidTable) -> Result<Assignment> {
    Ok(Assigner::new(table)?.assign(point))
}
