//! Id filter operator
//!
//! Filters non-barrier samples by a predicate over the series id.
//! Barriers always pass through: the filter never disturbs window
//! boundaries for the operators downstream.

use std::collections::HashSet;

use tracing::trace;

use crate::error::PipelineError;
use crate::pipeline::{BoxedOperator, Operator, OperatorKind};
use crate::types::{Sample, SeriesId};

/// Filter samples by series id
///
/// Non-barrier samples are forwarded iff the predicate accepts their id;
/// rejected samples are dropped silently (the chain keeps running).
pub struct IdFilter<P> {
    predicate: P,
    next: BoxedOperator,
}

impl<P> IdFilter<P>
where
    P: Fn(SeriesId) -> bool + Send,
{
    /// Create a filter from an arbitrary predicate
    pub fn new(predicate: P, next: BoxedOperator) -> Self {
        Self { predicate, next }
    }
}

impl<P> Operator for IdFilter<P>
where
    P: Fn(SeriesId) -> bool + Send,
{
    fn put(&mut self, sample: &Sample) -> bool {
        if sample.is_barrier() {
            return self.next.put(sample);
        }
        if (self.predicate)(sample.series_id) {
            self.next.put(sample)
        } else {
            true
        }
    }

    fn complete(&mut self) {
        self.next.complete();
    }

    fn set_error(&mut self, status: PipelineError) {
        self.next.set_error(status);
    }

    fn kind(&self) -> OperatorKind {
        OperatorKind::IdFilter
    }
}

/// Filter that passes a single series id
pub fn filter_by_id(id: SeriesId, next: BoxedOperator) -> BoxedOperator {
    trace!(series_id = id, "creating id filter node");
    Box::new(IdFilter::new(move |candidate| candidate == id, next))
}

/// Filter that passes ids present in the list
pub fn filter_by_id_list(ids: &[SeriesId], next: BoxedOperator) -> BoxedOperator {
    trace!(ids = ids.len(), "creating id-list filter node");
    let idset: HashSet<SeriesId> = ids.iter().copied().collect();
    Box::new(IdFilter::new(move |id| idset.contains(&id), next))
}

/// Filter that drops ids present in the list
pub fn filter_out_by_id_list(ids: &[SeriesId], next: BoxedOperator) -> BoxedOperator {
    trace!(ids = ids.len(), "creating id-list filter out node");
    let idset: HashSet<SeriesId> = ids.iter().copied().collect();
    Box::new(IdFilter::new(move |id| !idset.contains(&id), next))
}
