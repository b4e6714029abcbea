use log::{debug, info, trace, warn};
use rayon::prelude::*;

use super::aggregate::{Aggregator, DEFAULT_SPLIT_THRESHOLD};
use super::assign::{Assigner, Assignment};
use super::group::{ClusterGroup, Grouper, OrderedGrouper};
use super::point::{Centroid, Point};
use super::table::CentroidTable;
use crate::error::{Error, Result};
use crate::io;

/// Configuration for one [`Pipeline`].
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Number of chunks the input is split into for the assign phase.
    pub partitions: usize,
    /// Cluster size above which aggregation is split into parallel partial sums.
    pub split_threshold: usize,
    /// Sort the new centroids by the point order before returning them.
    pub sort_output: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineConfig {
    /// One partition per rayon worker thread, a split threshold of 65536
    /// points, and sorted output.
    pub fn new() -> Self {
        Self {
            partitions: rayon::current_num_threads(),
            split_threshold: DEFAULT_SPLIT_THRESHOLD,
            sort_output: true,
        }
    }

    /// Sets the number of assign-phase partitions.
    pub fn with_partitions(mut self, partitions: usize) -> Self {
        self.partitions = partitions;
        self
    }

    /// Sets the cluster size above which aggregation runs in parallel.
    pub fn with_split_threshold(mut self, split_threshold: usize) -> Self {
        self.split_threshold = split_threshold;
        self
    }

    /// Chooses whether new centroids come back sorted.
    pub fn with_sort_output(mut self, sort_output: bool) -> Self {
        self.sort_output = sort_output;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.partitions == 0 {
            return Err(Error::InvalidConfig("partitions must be > 0".into()));
        }
        if self.split_threshold == 0 {
            return Err(Error::InvalidConfig("split_threshold must be > 0".into()));
        }
        Ok(())
    }
}

/// A chunk of assign-phase input.
///
/// Already-parsed points can never fail; text chunks yield one result per
/// non-blank line.
pub trait PointPartition {
    fn points(&self) -> Box<dyn Iterator<Item = Result<Point>> + '_>;
}

impl PointPartition for [Point] {
    fn points(&self) -> Box<dyn Iterator<Item = Result<Point>> + '_> {
        Box::new(self.iter().copied().map(Ok))
    }
}

impl PointPartition for Vec<Point> {
    fn points(&self) -> Box<dyn Iterator<Item = Result<Point>> + '_> {
        self.as_slice().points()
    }
}

impl PointPartition for str {
    fn points(&self) -> Box<dyn Iterator<Item = Result<Point>> + '_> {
        Box::new(io::parse_lines(self))
    }
}

impl PointPartition for String {
    fn points(&self) -> Box<dyn Iterator<Item = Result<Point>> + '_> {
        self.as_str().points()
    }
}

impl<T: PointPartition + ?Sized> PointPartition for &T {
    fn points(&self) -> Box<dyn Iterator<Item = Result<Point>> + '_> {
        (**self).points()
    }
}

/// Assignment pairs from one partition, or the reason it could not finish.
pub type PartitionOutcome = Result<Vec<Assignment>>;

/// The result of one iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationReport {
    centroids: Vec<Centroid>,
    assigned: usize,
    degenerate: Vec<Centroid>,
}

impl IterationReport {
    /// One new centroid per input centroid that received at least one point.
    pub fn centroids(&self) -> &[Centroid] {
        &self.centroids
    }

    /// Consumes the report, keeping only the new centroids.
    pub fn into_centroids(self) -> Vec<Centroid> {
        self.centroids
    }

    /// Number of points assigned in this iteration.
    pub fn assigned(&self) -> usize {
        self.assigned
    }

    /// Distinct input centroids that received no points, in point order.
    /// These produce no output; what to do about them is left to the caller.
    pub fn degenerate(&self) -> &[Centroid] {
        &self.degenerate
    }

    pub fn has_degenerate(&self) -> bool {
        !self.degenerate.is_empty()
    }
}

/// Runs one k-means iteration: a parallel assign phase, a barrier while all
/// pairs are grouped by centroid, then a parallel aggregate phase.
///
/// The centroid table is the only state shared between workers and is only
/// ever borrowed immutably. A failure anywhere abandons the iteration
/// without returning partial centroids.
///
/// # Example
///
/// ```
/// use kmeans_step::cluster::{CentroidTable, Pipeline, PipelineConfig, Point};
///
/// let p = |x, y| Point::new(x, y).unwrap();
/// let points = vec![p(1.0, 1.0), p(1.0, 2.0), p(4.0, 4.0), p(4.0, 5.0)];
/// let table = CentroidTable::new(vec![p(0.0, 0.0), p(5.0, 5.0)]);
///
/// let pipeline = Pipeline::new(PipelineConfig::new().with_partitions(2)).unwrap();
/// let report = pipeline.run(&points, &table).unwrap();
/// assert_eq!(report.centroids(), &[p(1.0, 1.5), p(4.0, 4.5)]);
/// ```
#[derive(Debug, Clone)]
pub struct Pipeline<G = OrderedGrouper> {
    config: PipelineConfig,
    grouper: G,
}

impl Pipeline<OrderedGrouper> {
    /// A pipeline that groups with [`OrderedGrouper`].
    pub fn new(config: PipelineConfig) -> Result<Self> {
        Self::with_grouper(config, OrderedGrouper)
    }
}

impl<G: Grouper> Pipeline<G> {
    /// A pipeline with a caller-supplied [`Grouper`]. Fails on an invalid config.
    pub fn with_grouper(config: PipelineConfig, grouper: G) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, grouper })
    }

    /// The configuration this pipeline was built with.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Splits `points` into at most `partitions` contiguous, disjoint slices.
    pub fn partition<'a>(&self, points: &'a [Point]) -> Vec<&'a [Point]> {
        if points.is_empty() {
            return Vec::new();
        }
        let chunk = points.len().div_ceil(self.config.partitions);
        points.chunks(chunk).collect()
    }

    /// Assigns every partition concurrently against `table`.
    ///
    /// Returns one outcome per partition, in partition order. A partition
    /// that hits a bad point reports [`Error::PartitionFailure`] while the
    /// others still complete, so the caller can retry just that chunk.
    ///
    /// # Errors
    ///
    /// [`Error::EmptyCentroidTable`] before any point is assigned.
    pub fn assign_phase<P>(
        &self,
        partitions: &[P],
        table: &CentroidTable,
    ) -> Result<Vec<PartitionOutcome>>
    where
        P: PointPartition + Sync,
    {
        let assigner = Assigner::new(table)?;
        debug!(
            "assign phase: {} partitions against {} centroids",
            partitions.len(),
            table.len()
        );
        Ok(partitions
            .par_iter()
            .enumerate()
            .map(|(index, partition)| assign_partition(&assigner, index, partition))
            .collect())
    }

    /// Aggregates complete groups concurrently into new centroids.
    ///
    /// `table` is only consulted to report which centroids received no points.
    pub fn aggregate_phase(
        &self,
        groups: Vec<ClusterGroup>,
        table: &CentroidTable,
    ) -> Result<IterationReport> {
        debug!("aggregate phase: {} groups", groups.len());
        let aggregator = Aggregator::new(self.config.split_threshold);
        let mut centroids: Vec<Centroid> = groups
            .par_iter()
            .map(|group| aggregator.aggregate(group.key(), group.members()))
            .collect::<Result<Vec<_>>>()?;
        if self.config.sort_output {
            centroids.sort();
        }

        let assigned = groups.iter().map(ClusterGroup::len).sum();
        let mut degenerate = table.distinct();
        for group in &groups {
            degenerate.remove(group.key());
        }
        let degenerate: Vec<Centroid> = degenerate.into_iter().collect();
        if !degenerate.is_empty() {
            warn!(
                "{} of {} centroids received no points",
                degenerate.len(),
                table.len()
            );
        }

        Ok(IterationReport {
            centroids,
            assigned,
            degenerate,
        })
    }

    /// Runs a full iteration over pre-partitioned input.
    ///
    /// Stops at the first failed partition, in partition order.
    pub fn run_partitions<P>(
        &self,
        partitions: &[P],
        table: &CentroidTable,
    ) -> Result<IterationReport>
    where
        P: PointPartition + Sync,
    {
        let outcomes = self.assign_phase(partitions, table)?;

        let mut pairs = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(mut chunk) => pairs.append(&mut chunk),
                Err(e) => {
                    warn!("abandoning iteration: {}", e);
                    return Err(e);
                }
            }
        }

        debug!("barrier: {} pairs collected", pairs.len());
        let groups = self.grouper.group(pairs);
        let report = self.aggregate_phase(groups, table)?;
        info!(
            "iteration complete: {} points, {} centroids in, {} centroids out",
            report.assigned(),
            table.len(),
            report.centroids().len()
        );
        Ok(report)
    }

    /// Runs a full iteration over `points`, split by [`Pipeline::partition`].
    pub fn run(&self, points: &[Point], table: &CentroidTable) -> Result<IterationReport> {
        self.run_partitions(&self.partition(points), table)
    }

    /// Runs a full iteration over chunks of `x,y` text.
    pub fn run_lines<S>(&self, chunks: &[S], table: &CentroidTable) -> Result<IterationReport>
    where
        S: AsRef<str> + Sync,
    {
        let chunks: Vec<&str> = chunks.iter().map(AsRef::as_ref).collect();
        self.run_partitions(&chunks, table)
    }
}

fn assign_partition<P>(assigner: &Assigner<'_>, index: usize, partition: &P) -> PartitionOutcome
where
    P: PointPartition + ?Sized,
{
    let mut pairs = Vec::new();
    for point in partition.points() {
        let point = point.map_err(|source| Error::PartitionFailure {
            partition: index,
            source: Box::new(source),
        })?;
        pairs.push(assigner.assign(point));
    }
    trace!("partition {} assigned {} points", index, pairs.len());
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::HashGrouper;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::BTreeMap;

    fn p(x: f64, y: f64) -> Point {
        Point::new(x, y).unwrap()
    }

    fn scenario() -> (Vec<Point>, CentroidTable) {
        (
            vec![p(1.0, 1.0), p(1.0, 2.0), p(4.0, 4.0), p(4.0, 5.0)],
            CentroidTable::new(vec![p(0.0, 0.0), p(5.0, 5.0)]),
        )
    }

    fn random_points(rng: &mut StdRng, n: usize) -> Vec<Point> {
        (0..n)
            .map(|_| p(rng.gen_range(-100.0..100.0), rng.gen_range(-100.0..100.0)))
            .collect()
    }

    #[test]
    fn test_end_to_end_scenario() {
        let (points, table) = scenario();
        let pipeline = Pipeline::new(PipelineConfig::new().with_partitions(3)).unwrap();

        let outcomes = pipeline
            .assign_phase(&pipeline.partition(&points), &table)
            .unwrap();
        let pairs: Vec<Assignment> = outcomes.into_iter().flat_map(|o| o.unwrap()).collect();
        let groups = OrderedGrouper.group(pairs);
        assert_eq!(
            groups,
            vec![
                ClusterGroup::new(p(0.0, 0.0), vec![p(1.0, 1.0), p(1.0, 2.0)]),
                ClusterGroup::new(p(5.0, 5.0), vec![p(4.0, 4.0), p(4.0, 5.0)]),
            ]
        );

        let report = pipeline.run(&points, &table).unwrap();
        assert_eq!(report.centroids(), &[p(1.0, 1.5), p(4.0, 4.5)]);
        assert_eq!(report.assigned(), 4);
        assert!(!report.has_degenerate());
    }

    #[test]
    fn test_empty_table_assigns_nothing() {
        let (points, _) = scenario();
        let pipeline = Pipeline::new(PipelineConfig::new()).unwrap();
        let empty = CentroidTable::default();

        assert!(matches!(
            pipeline.assign_phase(&pipeline.partition(&points), &empty),
            Err(Error::EmptyCentroidTable)
        ));
        assert!(matches!(
            pipeline.run(&points, &empty),
            Err(Error::EmptyCentroidTable)
        ));
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(
            Pipeline::new(PipelineConfig::new().with_partitions(0)),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            Pipeline::new(PipelineConfig::new().with_split_threshold(0)),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_partition_is_disjoint_and_complete() {
        let mut rng = StdRng::seed_from_u64(1);
        let points = random_points(&mut rng, 103);
        for partitions in [1, 2, 4, 7, 103, 500] {
            let pipeline =
                Pipeline::new(PipelineConfig::new().with_partitions(partitions)).unwrap();
            let chunks = pipeline.partition(&points);
            assert!(chunks.len() <= partitions);
            let rejoined: Vec<Point> = chunks.concat();
            assert_eq!(rejoined, points);
        }
        let pipeline = Pipeline::new(PipelineConfig::new()).unwrap();
        assert!(pipeline.partition(&[]).is_empty());
    }

    #[test]
    fn test_total_coverage() {
        let mut rng = StdRng::seed_from_u64(2);
        let points = random_points(&mut rng, 2_000);
        let table: CentroidTable = random_points(&mut rng, 9).into_iter().collect();
        let pipeline = Pipeline::new(PipelineConfig::new().with_partitions(8)).unwrap();

        let outcomes = pipeline
            .assign_phase(&pipeline.partition(&points), &table)
            .unwrap();
        let pairs: Vec<Assignment> = outcomes.into_iter().flat_map(|o| o.unwrap()).collect();
        assert_eq!(pairs.len(), points.len());

        let mut seen: Vec<Point> = pairs.iter().map(|a| a.point).collect();
        let mut expected = points.clone();
        seen.sort();
        expected.sort();
        assert_eq!(seen, expected);

        let assigner = Assigner::new(&table).unwrap();
        for pair in &pairs {
            assert_eq!(pair.centroid, assigner.nearest(&pair.point));
        }
    }

    #[test]
    fn test_matches_sequential_reference() {
        let mut rng = StdRng::seed_from_u64(5);
        let points = random_points(&mut rng, 5_000);
        let table: CentroidTable = random_points(&mut rng, 6).into_iter().collect();

        let assigner = Assigner::new(&table).unwrap();
        let mut sums: BTreeMap<Centroid, (f64, f64, usize)> = BTreeMap::new();
        for point in &points {
            let entry = sums.entry(assigner.nearest(point)).or_default();
            entry.0 += point.x();
            entry.1 += point.y();
            entry.2 += 1;
        }
        let mut expected: Vec<(f64, f64)> = sums
            .values()
            .map(|&(sx, sy, n)| (sx / n as f64, sy / n as f64))
            .collect();
        expected.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));

        let config = PipelineConfig::new()
            .with_partitions(6)
            .with_split_threshold(100);
        for report in [
            Pipeline::new(config.clone()).unwrap().run(&points, &table),
            Pipeline::with_grouper(config, HashGrouper)
                .unwrap()
                .run(&points, &table),
        ] {
            let report = report.unwrap();
            assert_eq!(report.centroids().len(), expected.len());
            for (got, want) in report.centroids().iter().zip(&expected) {
                assert_relative_eq!(got.x(), want.0, epsilon = 1e-9);
                assert_relative_eq!(got.y(), want.1, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_single_cluster_fixpoint() {
        let points = vec![p(0.0, 0.0), p(2.0, 0.0), p(2.0, 4.0), p(0.0, 4.0)];
        let table = CentroidTable::new(vec![p(1.0, 2.0)]);
        let pipeline = Pipeline::new(PipelineConfig::new().with_partitions(2)).unwrap();
        let report = pipeline.run(&points, &table).unwrap();
        assert_eq!(report.centroids(), &[p(1.0, 2.0)]);
    }

    #[test]
    fn test_degenerate_centroids_are_reported() {
        let (points, _) = scenario();
        let table = CentroidTable::new(vec![p(0.0, 0.0), p(100.0, 100.0), p(5.0, 5.0)]);
        let pipeline = Pipeline::new(PipelineConfig::new()).unwrap();
        let report = pipeline.run(&points, &table).unwrap();
        assert_eq!(report.centroids().len(), 2);
        assert_eq!(report.degenerate(), &[p(100.0, 100.0)]);
    }

    #[test]
    fn test_duplicate_centroids_form_one_key() {
        let (points, _) = scenario();
        let table = CentroidTable::new(vec![p(0.0, 0.0), p(0.0, 0.0), p(5.0, 5.0)]);
        let pipeline = Pipeline::new(PipelineConfig::new()).unwrap();
        let report = pipeline.run(&points, &table).unwrap();
        assert_eq!(report.centroids(), &[p(1.0, 1.5), p(4.0, 4.5)]);
        assert!(!report.has_degenerate());
    }

    #[test]
    fn test_empty_input_yields_no_centroids() {
        let (_, table) = scenario();
        let pipeline = Pipeline::new(PipelineConfig::new()).unwrap();
        let report = pipeline.run(&[], &table).unwrap();
        assert!(report.centroids().is_empty());
        assert_eq!(report.assigned(), 0);
        assert_eq!(report.degenerate().len(), 2);
    }

    #[test]
    fn test_run_lines() {
        let (_, table) = scenario();
        let pipeline = Pipeline::new(PipelineConfig::new()).unwrap();
        let chunks = ["1,1\n1,2\n", "\n4,4\n4,5"];
        let report = pipeline.run_lines(&chunks, &table).unwrap();
        assert_eq!(report.centroids(), &[p(1.0, 1.5), p(4.0, 4.5)]);
    }

    #[test]
    fn test_bad_line_fails_only_its_partition() {
        let (_, table) = scenario();
        let pipeline = Pipeline::new(PipelineConfig::new()).unwrap();
        let chunks = vec![
            "1,1\n1,2".to_string(),
            "4,4\nfour,5".to_string(),
            "4,5".to_string(),
        ];

        let outcomes = pipeline.assign_phase(&chunks, &table).unwrap();
        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].as_ref().unwrap().len(), 2);
        assert_eq!(outcomes[2].as_ref().unwrap().len(), 1);
        match &outcomes[1] {
            Err(Error::PartitionFailure { partition, source }) => {
                assert_eq!(*partition, 1);
                assert!(matches!(**source, Error::AtLine { line: 2, .. }));
            }
            other => panic!("expected PartitionFailure, got {:?}", other),
        }

        assert!(matches!(
            pipeline.run_lines(&chunks, &table),
            Err(Error::PartitionFailure { partition: 1, .. })
        ));
    }

    #[test]
    fn test_unsorted_output_still_complete() {
        let (points, table) = scenario();
        let pipeline = Pipeline::with_grouper(
            PipelineConfig::new().with_sort_output(false),
            HashGrouper,
        )
        .unwrap();
        let mut centroids = pipeline.run(&points, &table).unwrap().into_centroids();
        centroids.sort();
        assert_eq!(centroids, vec![p(1.0, 1.5), p(4.0, 4.5)]);
    }

    /// Emits an empty group for every key it sees, on top of the real groups.
    struct PaddingGrouper;

    impl Grouper for PaddingGrouper {
        fn group(&self, pairs: Vec<Assignment>) -> Vec<ClusterGroup> {
            let mut groups = OrderedGrouper.group(pairs);
            let padding: Vec<ClusterGroup> = groups
                .iter()
                .map(|g| ClusterGroup::new(*g.key(), Vec::new()))
                .collect();
            groups.extend(padding);
            groups
        }
    }

    #[test]
    fn test_empty_group_abandons_aggregate_phase() {
        let (_, table) = scenario();
        let pipeline = Pipeline::new(PipelineConfig::new()).unwrap();
        let groups = vec![
            ClusterGroup::new(p(0.0, 0.0), Vec::new()),
            ClusterGroup::new(p(5.0, 5.0), vec![p(1.0, 1.0)]),
        ];
        match pipeline.aggregate_phase(groups, &table) {
            Err(Error::EmptyCluster { key }) => assert_eq!(key, p(0.0, 0.0)),
            other => panic!("expected EmptyCluster, got {:?}", other),
        }
    }

    #[test]
    fn test_grouper_emitting_empty_group_fails_iteration() {
        let (points, table) = scenario();
        let pipeline = Pipeline::with_grouper(PipelineConfig::new(), PaddingGrouper).unwrap();
        assert!(matches!(
            pipeline.run(&points, &table),
            Err(Error::EmptyCluster { .. })
        ));
    }

    #[test]
    fn test_overflowing_cluster_sum_keeps_finite_mean() {
        let points = vec![p(f64::MAX, 1.0), p(f64::MAX, 3.0)];
        let table = CentroidTable::new(vec![p(f64::MAX, 0.0)]);
        for threshold in [1, DEFAULT_SPLIT_THRESHOLD] {
            let pipeline =
                Pipeline::new(PipelineConfig::new().with_split_threshold(threshold)).unwrap();
            let report = pipeline.run(&points, &table).unwrap();
            assert_eq!(report.centroids(), &[p(f64::MAX, 2.0)]);
        }
    }
}
