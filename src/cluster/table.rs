use std::collections::BTreeSet;

use super::point::Centroid;

/// The centroids of one iteration, in table order.
///
/// A table is built once and then only read: workers borrow it for the
/// length of the iteration, and the next iteration gets a fresh table.
/// Table order matters, since the first of several equidistant centroids
/// wins an assignment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CentroidTable {
    centroids: Vec<Centroid>,
}

impl CentroidTable {
    /// Wraps `centroids`, keeping their order.
    pub fn new(centroids: Vec<Centroid>) -> Self {
        Self { centroids }
    }

    /// Number of centroids, duplicates included.
    pub fn len(&self) -> usize {
        self.centroids.len()
    }

    /// True when there is nothing to assign to.
    pub fn is_empty(&self) -> bool {
        self.centroids.is_empty()
    }

    /// The centroids in table order.
    pub fn as_slice(&self) -> &[Centroid] {
        &self.centroids
    }

    /// Iterates in table order.
    pub fn iter(&self) -> std::slice::Iter<'_, Centroid> {
        self.centroids.iter()
    }

    /// Centroids with duplicates removed, in the point total order.
    pub fn distinct(&self) -> BTreeSet<Centroid> {
        self.centroids.iter().copied().collect()
    }
}

impl From<Vec<Centroid>> for CentroidTable {
    fn from(centroids: Vec<Centroid>) -> Self {
        Self::new(centroids)
    }
}

impl FromIterator<Centroid> for CentroidTable {
    fn from_iter<I: IntoIterator<Item = Centroid>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a CentroidTable {
    type Item = &'a Centroid;
    type IntoIter = std::slice::Iter<'a, Centroid>;

    fn into_iter(self) -> Self::IntoIter {
        self.centroids.iter()
    }
}
