pub mod aggregate;
pub mod assign;
pub mod group;
pub mod pipeline;
pub mod point;
pub mod table;

pub use aggregate::{aggregate, Aggregator, PartialSum};
pub use assign::{assign, Assigner, Assignment};
pub use group::{ClusterGroup, Grouper, HashGrouper, OrderedGrouper};
pub use pipeline::{IterationReport, PartitionOutcome, Pipeline, PipelineConfig, PointPartition};
pub use point::{Centroid, Point};
pub use table::CentroidTable;
