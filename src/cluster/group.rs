use std::collections::{BTreeMap, HashMap};

use super::assign::Assignment;
use super::point::{Centroid, Point};

/// All points assigned to one centroid.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterGroup {
    key: Centroid,
    members: Vec<Point>,
}

impl ClusterGroup {
    /// Builds a group; emptiness is checked later by the aggregator.
    pub fn new(key: Centroid, members: Vec<Point>) -> Self {
        Self { key, members }
    }

    /// The centroid every member was assigned to.
    pub fn key(&self) -> &Centroid {
        &self.key
    }

    /// The assigned points, in no particular order.
    pub fn members(&self) -> &[Point] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Gathers assignment pairs into groups keyed by centroid.
///
/// Implementations receive the complete set of pairs for an iteration and
/// must return every pair in exactly one group, with one group per distinct
/// key under [`Point`] equality. No group may be empty. Group order is up to
/// the implementation; member order within a group is irrelevant.
pub trait Grouper {
    fn group(&self, pairs: Vec<Assignment>) -> Vec<ClusterGroup>;
}

/// Groups through a `BTreeMap`, yielding groups in ascending key order.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderedGrouper;

impl Grouper for OrderedGrouper {
    fn group(&self, pairs: Vec<Assignment>) -> Vec<ClusterGroup> {
        let mut groups: BTreeMap<Centroid, Vec<Point>> = BTreeMap::new();
        for Assignment { centroid, point } in pairs {
            groups.entry(centroid).or_default().push(point);
        }
        groups
            .into_iter()
            .map(|(key, members)| ClusterGroup::new(key, members))
            .collect()
    }
}

/// Groups through a `HashMap`; group order is unspecified.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashGrouper;

impl Grouper for HashGrouper {
    fn group(&self, pairs: Vec<Assignment>) -> Vec<ClusterGroup> {
        let mut groups: HashMap<Centroid, Vec<Point>> = HashMap::new();
        for Assignment { centroid, point } in pairs {
            groups.entry(centroid).or_default().push(point);
        }
        groups
            .into_iter()
            .map(|(key, members)| ClusterGroup::new(key, members))
            .collect()
    }
}
