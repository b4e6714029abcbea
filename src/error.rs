use thiserror::Error;

use crate::cluster::Centroid;

/// Errors produced while assigning points to centroids or recomputing centroids.
#[derive(Debug, Error)]
pub enum Error {
    /// A coordinate was NaN or infinite.
    #[error("invalid point ({x}, {y}): coordinates must be finite")]
    InvalidPoint { x: f64, y: f64 },

    /// The assign phase was started without any centroid to assign to.
    #[error("centroid table is empty")]
    EmptyCentroidTable,

    /// The aggregator was handed a group with no members.
    #[error("cluster {key} has no members")]
    EmptyCluster { key: Centroid },

    /// One assign-phase partition could not be completed.
    #[error("partition {partition} failed: {source}")]
    PartitionFailure {
        partition: usize,
        #[source]
        source: Box<Error>,
    },

    /// Text that is not an `x,y` pair of numbers.
    #[error("malformed point {0:?}: expected `x,y`")]
    Parse(String),

    /// A failure tied to a line of text input (1-based).
    #[error("line {line}: {source}")]
    AtLine {
        line: usize,
        #[source]
        source: Box<Error>,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
