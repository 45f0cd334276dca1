//! Spate TSDB - streaming query-processing pipeline for time-series data
//!
//! This library provides the query-side pipeline of a time-series store:
//! a chain of composable operators that consume a time-ordered stream of
//! samples produced by a storage scan, transform or summarize it online,
//! and deliver results to a terminal sink:
//!
//! - Id filtering (allow/deny predicates over series ids)
//! - Reservoir sampling with bounded memory
//! - Sliding-window mean and median aggregation
//! - Space-Saving frequent-items and heavy-hitters sketches
//! - Count-min-backed anomaly detection (SMA/EWMA forecasting)
//!
//! Operators share one contract (sample, barrier, completion, error) and
//! compose into move-only linear chains; the group-by-time window driver
//! injects the barriers that make windowed operators emit at the right
//! instants, for both forward and backward scans.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod detector;
pub mod error;
pub mod pipeline;
pub mod query;
pub mod types;

// Re-export main types
pub use error::{PipelineError, Result};
pub use pipeline::{build_sampler, CollectingSink, GroupByTime, Operator, OperatorKind};
pub use query::{Direction, MetadataQuery, QueryProcessor, ScanQuery};
pub use types::{PayloadKind, Sample, SeriesId, Timestamp};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_composes_from_reexports() {
        let sink = CollectingSink::new();
        let handle = sink.handle();
        let head = pipeline::filter_by_id(1, Box::new(sink));
        let mut query = ScanQuery::new(head, vec![], 0, 100, GroupByTime::new(0));

        assert!(query.start());
        assert!(query.put(&Sample::float(1, 10, 1.0)));
        query.stop();

        assert_eq!(handle.lock().values().len(), 1);
    }
}
