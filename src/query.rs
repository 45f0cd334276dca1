//! Query processors driving the operator chain
//!
//! A query processor is the façade between the storage scan and the
//! operator chain: the scan pushes samples into `put`, reads the time
//! range and direction to plan its cursor, and calls `stop` (or
//! `set_error`) when the cursor is exhausted. Two variants exist:
//!
//! - [`ScanQuery`] routes a time-ordered sample stream through the
//!   group-by-time window driver into the chain head.
//! - [`MetadataQuery`] replays a list of series ids as synthetic
//!   metadata samples; no window driver is involved.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::error::PipelineError;
use crate::pipeline::{BoxedOperator, GroupByTime};
use crate::types::{Sample, SeriesId, Timestamp};

/// Scan direction, inferred from the `(begin, end)` pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Ascending timestamps
    Forward,
    /// Descending timestamps
    Backward,
}

/// Common façade the storage scan drives
pub trait QueryProcessor: Send {
    /// Prepare the query; `false` aborts the scan before it starts
    fn start(&mut self) -> bool;

    /// Push one scan sample; `false` stops the scan promptly
    fn put(&mut self, sample: &Sample) -> bool;

    /// End of scan; completes the operator chain
    fn stop(&mut self);

    /// Propagate a scan failure into the chain
    fn set_error(&mut self, status: PipelineError);

    /// Smallest timestamp of the scanned range
    fn lowerbound(&self) -> Timestamp;

    /// Largest timestamp of the scanned range
    fn upperbound(&self) -> Timestamp;

    /// Scan direction
    fn direction(&self) -> Direction;
}

// ============================================================================
// Scan Query
// ============================================================================

/// Counters kept by a [`ScanQuery`]
#[derive(Debug, Default)]
struct ScanStats {
    samples_processed: AtomicU64,
}

/// Snapshot of a scan query's counters
#[derive(Debug, Clone, Copy)]
pub struct ScanQueryStats {
    /// Samples pushed through `put`
    pub samples_processed: u64,
    /// Barriers injected by the window driver
    pub barriers_injected: u64,
}

/// Time-range scan through the window driver into the chain
pub struct ScanQuery {
    head: BoxedOperator,
    metrics: Vec<String>,
    lowerbound: Timestamp,
    upperbound: Timestamp,
    direction: Direction,
    group_by: GroupByTime,
    stats: ScanStats,
}

impl ScanQuery {
    /// Create a scan query
    ///
    /// `begin > end` selects a backward scan. The metric names are
    /// carried for the embedder's metadata and not interpreted here.
    pub fn new(
        head: BoxedOperator,
        metrics: Vec<String>,
        begin: Timestamp,
        end: Timestamp,
        group_by: GroupByTime,
    ) -> Self {
        Self {
            head,
            metrics,
            lowerbound: begin.min(end),
            upperbound: begin.max(end),
            direction: if begin > end {
                Direction::Backward
            } else {
                Direction::Forward
            },
            group_by,
            stats: ScanStats::default(),
        }
    }

    /// Metric names this query was built for
    pub fn metric_names(&self) -> &[String] {
        &self.metrics
    }

    /// Snapshot of the query's counters
    pub fn stats(&self) -> ScanQueryStats {
        ScanQueryStats {
            samples_processed: self.stats.samples_processed.load(Ordering::Relaxed),
            barriers_injected: self.group_by.barriers_emitted(),
        }
    }
}

impl QueryProcessor for ScanQuery {
    fn start(&mut self) -> bool {
        true
    }

    fn put(&mut self, sample: &Sample) -> bool {
        self.stats.samples_processed.fetch_add(1, Ordering::Relaxed);
        self.group_by.put(sample, self.head.as_mut())
    }

    fn stop(&mut self) {
        debug!(
            samples = self.stats.samples_processed.load(Ordering::Relaxed),
            barriers = self.group_by.barriers_emitted(),
            "scan query stopped"
        );
        self.head.complete();
    }

    fn set_error(&mut self, status: PipelineError) {
        self.head.set_error(status);
    }

    fn lowerbound(&self) -> Timestamp {
        self.lowerbound
    }

    fn upperbound(&self) -> Timestamp {
        self.upperbound
    }

    fn direction(&self) -> Direction {
        self.direction
    }
}

// ============================================================================
// Metadata Query
// ============================================================================

/// Replays a list of series ids as synthetic metadata samples
pub struct MetadataQuery {
    ids: Vec<SeriesId>,
    head: BoxedOperator,
}

impl MetadataQuery {
    /// Create a metadata query over the given ids
    pub fn new(ids: Vec<SeriesId>, head: BoxedOperator) -> Self {
        Self { ids, head }
    }
}

impl QueryProcessor for MetadataQuery {
    fn start(&mut self) -> bool {
        for &id in &self.ids {
            let sample = Sample::param_id(id);
            if !self.head.put(&sample) {
                return false;
            }
        }
        true
    }

    fn put(&mut self, _sample: &Sample) -> bool {
        // ids are replayed by start(); a put here is a driver bug and
        // the false stops the scan immediately
        false
    }

    fn stop(&mut self) {
        debug!(ids = self.ids.len(), "metadata query stopped");
        self.head.complete();
    }

    fn set_error(&mut self, status: PipelineError) {
        self.head.set_error(status);
    }

    fn lowerbound(&self) -> Timestamp {
        Timestamp::MAX
    }

    fn upperbound(&self) -> Timestamp {
        Timestamp::MAX
    }

    fn direction(&self) -> Direction {
        Direction::Forward
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::CollectingSink;
    use crate::types::SeriesId;

    #[test]
    fn test_scan_bounds_and_direction() {
        let forward = ScanQuery::new(
            Box::new(CollectingSink::new()),
            vec![],
            100,
            200,
            GroupByTime::new(0),
        );
        assert_eq!(forward.lowerbound(), 100);
        assert_eq!(forward.upperbound(), 200);
        assert_eq!(forward.direction(), Direction::Forward);

        let backward = ScanQuery::new(
            Box::new(CollectingSink::new()),
            vec![],
            200,
            100,
            GroupByTime::new(0),
        );
        assert_eq!(backward.lowerbound(), 100);
        assert_eq!(backward.upperbound(), 200);
        assert_eq!(backward.direction(), Direction::Backward);
    }

    #[test]
    fn test_scan_routes_through_window_driver() {
        let sink = CollectingSink::new();
        let handle = sink.handle();
        let mut query = ScanQuery::new(
            Box::new(sink),
            vec!["cpu".to_string()],
            0,
            100,
            GroupByTime::new(10),
        );

        assert!(query.start());
        for ts in [1u64, 5, 11] {
            assert!(query.put(&Sample::float(1, ts, 1.0)));
        }
        query.stop();

        let record = handle.lock();
        assert_eq!(record.barrier_count(), 1);
        assert_eq!(record.values().len(), 3);
        assert!(record.completed);

        let stats = query.stats();
        assert_eq!(stats.samples_processed, 3);
        assert_eq!(stats.barriers_injected, 1);
        assert_eq!(query.metric_names(), ["cpu".to_string()]);
    }

    #[test]
    fn test_metadata_query_replays_ids() {
        let sink = CollectingSink::new();
        let handle = sink.handle();
        let mut query = MetadataQuery::new(vec![3, 1, 4], Box::new(sink));

        assert!(query.start());
        assert!(!query.put(&Sample::float(1, 1, 1.0)));
        query.stop();

        let record = handle.lock();
        let ids: Vec<SeriesId> = record.values().iter().map(|s| s.series_id).collect();
        assert_eq!(ids, vec![3, 1, 4]);
        assert!(record
            .values()
            .iter()
            .all(|s| s.payload.kind.has_param_id() && !s.payload.kind.has_float()));
        assert!(record.completed);

        assert_eq!(query.lowerbound(), Timestamp::MAX);
        assert_eq!(query.upperbound(), Timestamp::MAX);
        assert_eq!(query.direction(), Direction::Forward);
    }

    #[test]
    fn test_metadata_query_short_circuits() {
        let sink = CollectingSink::with_limit(1);
        let mut query = MetadataQuery::new(vec![1, 2, 3], Box::new(sink));
        assert!(!query.start());
    }

    #[test]
    fn test_error_forwarded_to_chain() {
        let sink = CollectingSink::new();
        let handle = sink.handle();
        let mut query = ScanQuery::new(Box::new(sink), vec![], 0, 10, GroupByTime::new(0));

        query.set_error(PipelineError::NegativeAnomalyInput);

        assert_eq!(
            handle.lock().errors,
            vec![PipelineError::NegativeAnomalyInput]
        );
    }
}
