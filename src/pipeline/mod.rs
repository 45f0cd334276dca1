//! Streaming operator chain for query processing
//!
//! This module provides the building blocks of the query pipeline:
//! single-input/single-output operators composed into a linear chain that
//! consumes a time-ordered sample stream and delivers results to a
//! terminal sink.
//!
//! # Architecture
//!
//! ```text
//! storage scan → query processor → window driver → op₀ → op₁ → … → sink
//! ```
//!
//! Every node implements the same [`Operator`] contract:
//!
//! - `put(sample) -> bool` consumes one sample or barrier; `false` means
//!   the chain wants to terminate, and is propagated upstream so the scan
//!   stops promptly.
//! - `complete()` signals end of stream; pending state (residual windows,
//!   sketch summaries) is flushed before the signal moves on.
//! - `set_error(status)` propagates a terminal failure verbatim; nothing
//!   is emitted after it.
//!
//! Barriers (samples with an empty payload) divide the stream into
//! windows. An operator that cannot act on a barrier still forwards it;
//! the reservoir sampler is the one documented exception, consuming the
//! barrier and letting its flushed samples stand in its place.
//!
//! Each operator exclusively owns its state and its downstream; chains
//! are move-only compositions of boxed nodes. Within one query the chain
//! runs single-threaded in the caller's thread; distinct queries are
//! independent and may run in parallel.

pub mod anomaly;
pub mod builder;
pub mod filter;
pub mod group_by;
pub mod reservoir;
pub mod space_saving;
pub mod window;

// Re-export commonly used types
pub use anomaly::AnomalySampler;
pub use builder::build_sampler;
pub use filter::{filter_by_id, filter_by_id_list, filter_out_by_id_list, IdFilter};
pub use group_by::GroupByTime;
pub use reservoir::ReservoirSampler;
pub use space_saving::SpaceSaver;
pub use window::{MeanAccumulator, MedianAccumulator, MovingAverage, MovingMedian, SlidingWindow};

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::PipelineError;
use crate::types::Sample;

// ============================================================================
// Operator Contract
// ============================================================================

/// Discriminant for operator introspection and logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorKind {
    /// Id filter (allow/deny predicates)
    IdFilter,
    /// Reservoir sampler
    Reservoir,
    /// Sliding-window mean
    MovingAverage,
    /// Sliding-window median
    MovingMedian,
    /// Space-Saving sketch (frequent items / heavy hitters)
    SpaceSaving,
    /// Anomaly detector
    AnomalyDetector,
    /// Terminal sink
    Sink,
}

/// Common interface for all chain nodes, the sink included
///
/// Implementations must stop emitting as soon as any downstream `put`
/// returns `false`, and must forward `set_error` without swallowing it.
pub trait Operator: Send {
    /// Consume one sample or barrier; `false` iff the chain terminates
    fn put(&mut self, sample: &Sample) -> bool;

    /// Signal end of stream, flushing pending state first
    ///
    /// Called exactly once per chain lifetime.
    fn complete(&mut self);

    /// Propagate a terminal failure downstream
    fn set_error(&mut self, status: PipelineError);

    /// Operator discriminant
    fn kind(&self) -> OperatorKind;
}

/// Boxed chain node; each operator owns its downstream as one of these
pub type BoxedOperator = Box<dyn Operator>;

// ============================================================================
// Collecting Sink
// ============================================================================

/// Everything a [`CollectingSink`] observed
#[derive(Debug, Clone, Default)]
pub struct SinkRecord {
    /// Samples and barriers in arrival order
    pub samples: Vec<Sample>,
    /// Whether `complete` was called
    pub completed: bool,
    /// Errors received via `set_error`, in arrival order
    pub errors: Vec<PipelineError>,
}

impl SinkRecord {
    /// Non-barrier samples in arrival order
    pub fn values(&self) -> Vec<Sample> {
        self.samples
            .iter()
            .filter(|s| !s.is_barrier())
            .copied()
            .collect()
    }

    /// Number of barriers observed
    pub fn barrier_count(&self) -> usize {
        self.samples.iter().filter(|s| s.is_barrier()).count()
    }
}

/// Simple in-memory terminal sink
///
/// Records everything it receives behind a shared handle, so the chain
/// can own the sink while the driver inspects the outcome. An optional
/// accept limit makes the sink refuse further non-barrier samples,
/// exercising the early-termination path of upstream operators.
pub struct CollectingSink {
    record: Arc<Mutex<SinkRecord>>,
    limit: Option<usize>,
    accepted: usize,
}

impl CollectingSink {
    /// Create a sink that accepts everything
    pub fn new() -> Self {
        Self {
            record: Arc::new(Mutex::new(SinkRecord::default())),
            limit: None,
            accepted: 0,
        }
    }

    /// Create a sink that returns `false` after `limit` non-barrier samples
    pub fn with_limit(limit: usize) -> Self {
        Self {
            record: Arc::new(Mutex::new(SinkRecord::default())),
            limit: Some(limit),
            accepted: 0,
        }
    }

    /// Shared handle onto the sink's record
    pub fn handle(&self) -> Arc<Mutex<SinkRecord>> {
        Arc::clone(&self.record)
    }
}

impl Default for CollectingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl Operator for CollectingSink {
    fn put(&mut self, sample: &Sample) -> bool {
        if let Some(limit) = self.limit {
            if !sample.is_barrier() && self.accepted >= limit {
                return false;
            }
        }
        if !sample.is_barrier() {
            self.accepted += 1;
        }
        self.record.lock().samples.push(*sample);
        true
    }

    fn complete(&mut self) {
        self.record.lock().completed = true;
    }

    fn set_error(&mut self, status: PipelineError) {
        self.record.lock().errors.push(status);
    }

    fn kind(&self) -> OperatorKind {
        OperatorKind::Sink
    }
}
