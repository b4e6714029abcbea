//! One iteration of k-means over 2-D points.
//!
//! Points are assigned to their nearest centroid in parallel, grouped by
//! centroid, and each group is averaged into a new centroid. Seeding,
//! convergence checks and repeated iteration belong to the caller.
//!
//! ```
//! use kmeans_step::{CentroidTable, Pipeline, PipelineConfig, Point};
//!
//! let p = |x, y| Point::new(x, y).unwrap();
//! let table = CentroidTable::new(vec![p(0.0, 0.0), p(5.0, 5.0)]);
//! let pipeline = Pipeline::new(PipelineConfig::new()).unwrap();
//! let report = pipeline
//!     .run(&[p(1.0, 1.0), p(1.0, 2.0), p(4.0, 4.0), p(4.0, 5.0)], &table)
//!     .unwrap();
//! assert_eq!(report.centroids(), &[p(1.0, 1.5), p(4.0, 4.5)]);
//! ```

pub mod cluster;
pub mod error;
pub mod io;

pub use cluster::{
    aggregate, assign, Aggregator, Assigner, Assignment, Centroid, CentroidTable, ClusterGroup,
    Grouper, IterationReport, Pipeline, PipelineConfig, Point,
};
pub use error::{Error, Result};
