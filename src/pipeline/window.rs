//! Sliding-window aggregation framework
//!
//! A generic operator that accumulates float samples per series between
//! barriers and emits one aggregate per ready series when a barrier
//! arrives. The two concrete accumulators are the windowed mean and the
//! windowed median.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::error::PipelineError;
use crate::pipeline::{BoxedOperator, Operator, OperatorKind};
use crate::types::{Sample, SeriesId, Timestamp};

// ============================================================================
// Accumulators
// ============================================================================

/// Per-series window state driven by [`SlidingWindow`]
pub trait WindowAccumulator: Default + Send {
    /// Fold one float value into the window
    fn add(&mut self, value: f64);

    /// True iff the window has something to emit
    fn ready(&self) -> bool;

    /// Aggregate value of the window; call only when `ready()`
    fn value(&mut self) -> f64;

    /// Clear the window for the next interval
    fn reset(&mut self);

    /// Discriminant of the operator built from this accumulator
    fn operator_kind() -> OperatorKind;
}

/// Windowed arithmetic mean
#[derive(Debug, Clone, Default)]
pub struct MeanAccumulator {
    sum: f64,
    count: u64,
}

impl WindowAccumulator for MeanAccumulator {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn ready(&self) -> bool {
        self.count != 0
    }

    fn value(&mut self) -> f64 {
        self.sum / self.count as f64
    }

    fn reset(&mut self) {
        self.sum = 0.0;
        self.count = 0;
    }

    fn operator_kind() -> OperatorKind {
        OperatorKind::MovingAverage
    }
}

/// Windowed median over an unsorted buffer
///
/// The middle element (index `n / 2`, 0-based) is found by partial
/// selection, so everything left of the middle compares less or equal.
#[derive(Debug, Clone, Default)]
pub struct MedianAccumulator {
    values: Vec<f64>,
}

impl WindowAccumulator for MedianAccumulator {
    fn add(&mut self, value: f64) {
        self.values.push(value);
    }

    fn ready(&self) -> bool {
        !self.values.is_empty()
    }

    fn value(&mut self) -> f64 {
        if self.values.len() < 2 {
            return self.values[0];
        }
        let middle = self.values.len() / 2;
        let (_, median, _) = self
            .values
            .select_nth_unstable_by(middle, |a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        *median
    }

    fn reset(&mut self) {
        self.values = Vec::new();
    }

    fn operator_kind() -> OperatorKind {
        OperatorKind::MovingMedian
    }
}

// ============================================================================
// Sliding Window Operator
// ============================================================================

/// Generic sliding-window operator
///
/// Keeps one accumulator per series id. Non-float samples never reach
/// the accumulator; blobs and metadata pass by unobserved. On a barrier
/// every ready series emits `(series_id, barrier_timestamp, aggregate)`
/// as a float sample (cross-series order unspecified) and resets, then
/// the barrier is forwarded. On completion any still-ready state is
/// emitted with the last observed timestamp before the signal moves on.
pub struct SlidingWindow<A: WindowAccumulator> {
    counters: HashMap<SeriesId, A>,
    last_timestamp: Timestamp,
    next: BoxedOperator,
}

/// Sliding-window mean operator
pub type MovingAverage = SlidingWindow<MeanAccumulator>;

/// Sliding-window median operator
pub type MovingMedian = SlidingWindow<MedianAccumulator>;

impl<A: WindowAccumulator> SlidingWindow<A> {
    /// Create the operator with the given downstream
    pub fn new(next: BoxedOperator) -> Self {
        Self {
            counters: HashMap::new(),
            last_timestamp: 0,
            next,
        }
    }

    fn flush(&mut self, timestamp: Timestamp) -> bool {
        for (&series_id, state) in self.counters.iter_mut() {
            if state.ready() {
                let sample = Sample::float(series_id, timestamp, state.value());
                state.reset();
                if !self.next.put(&sample) {
                    return false;
                }
            }
        }
        true
    }
}

impl<A: WindowAccumulator> Operator for SlidingWindow<A> {
    fn put(&mut self, sample: &Sample) -> bool {
        self.last_timestamp = sample.timestamp;
        if sample.is_barrier() {
            if !self.flush(sample.timestamp) {
                return false;
            }
            return self.next.put(sample);
        }
        if sample.payload.kind.has_float() {
            self.counters
                .entry(sample.series_id)
                .or_default()
                .add(sample.payload.value);
        }
        true
    }

    fn complete(&mut self) {
        // residual window: whatever is still ready surfaces at stream end
        let timestamp = self.last_timestamp;
        self.flush(timestamp);
        self.next.complete();
    }

    fn set_error(&mut self, status: PipelineError) {
        self.next.set_error(status);
    }

    fn kind(&self) -> OperatorKind {
        A::operator_kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::CollectingSink;
    use crate::types::PayloadKind;

    #[test]
    fn test_mean_accumulator() {
        let mut acc = MeanAccumulator::default();
        assert!(!acc.ready());
        acc.add(2.0);
        acc.add(4.0);
        assert!(acc.ready());
        assert_eq!(acc.value(), 3.0);
        acc.reset();
        assert!(!acc.ready());
    }

    #[test]
    fn test_median_single_element() {
        let mut acc = MedianAccumulator::default();
        acc.add(7.5);
        assert_eq!(acc.value(), 7.5);
    }

    #[test]
    fn test_median_selection() {
        let mut acc = MedianAccumulator::default();
        for v in [9.0, 1.0, 5.0, 3.0, 7.0] {
            acc.add(v);
        }
        // middle of the sorted order [1, 3, 5, 7, 9]
        assert_eq!(acc.value(), 5.0);
    }

    #[test]
    fn test_median_even_count_takes_upper_middle() {
        let mut acc = MedianAccumulator::default();
        for v in [4.0, 1.0, 3.0, 2.0] {
            acc.add(v);
        }
        // index n/2 = 2 of [1, 2, 3, 4]
        assert_eq!(acc.value(), 3.0);
    }

    #[test]
    fn test_window_emits_per_series_on_barrier() {
        let sink = CollectingSink::new();
        let handle = sink.handle();
        let mut window: MovingAverage = SlidingWindow::new(Box::new(sink));

        window.put(&Sample::float(1, 1, 2.0));
        window.put(&Sample::float(1, 5, 4.0));
        window.put(&Sample::float(2, 6, 10.0));
        window.put(&Sample::barrier(10));

        let record = handle.lock();
        let mut emitted: Vec<(SeriesId, Timestamp, f64)> = record
            .values()
            .iter()
            .map(|s| (s.series_id, s.timestamp, s.payload.value))
            .collect();
        emitted.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(emitted, vec![(1, 10, 3.0), (2, 10, 10.0)]);
        // the barrier is forwarded after the flush
        assert_eq!(record.barrier_count(), 1);
        assert!(record.samples.last().unwrap().is_barrier());
    }

    #[test]
    fn test_window_resets_between_barriers() {
        let sink = CollectingSink::new();
        let handle = sink.handle();
        let mut window: MovingAverage = SlidingWindow::new(Box::new(sink));

        window.put(&Sample::float(1, 1, 2.0));
        window.put(&Sample::barrier(10));
        window.put(&Sample::float(1, 11, 8.0));
        window.put(&Sample::barrier(20));

        let values: Vec<f64> = handle.lock().values().iter().map(|s| s.payload.value).collect();
        assert_eq!(values, vec![2.0, 8.0]);
    }

    #[test]
    fn test_empty_window_forwards_barrier_only() {
        let sink = CollectingSink::new();
        let handle = sink.handle();
        let mut window: MovingMedian = SlidingWindow::new(Box::new(sink));

        window.put(&Sample::barrier(10));

        let record = handle.lock();
        assert!(record.values().is_empty());
        assert_eq!(record.barrier_count(), 1);
    }

    #[test]
    fn test_non_float_samples_are_ignored() {
        let sink = CollectingSink::new();
        let handle = sink.handle();
        let mut window: MovingAverage = SlidingWindow::new(Box::new(sink));

        let mut blob = Sample::float(1, 1, 0.0);
        blob.payload.kind = PayloadKind::PARAMID | PayloadKind::BLOB;
        window.put(&blob);
        window.put(&Sample::barrier(10));

        assert!(handle.lock().values().is_empty());
    }

    #[test]
    fn test_residual_window_emitted_on_complete() {
        let sink = CollectingSink::new();
        let handle = sink.handle();
        let mut window: MovingAverage = SlidingWindow::new(Box::new(sink));

        window.put(&Sample::float(1, 11, 10.0));
        window.complete();

        let record = handle.lock();
        let emitted = record.values();
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].payload.value, 10.0);
        assert_eq!(emitted[0].timestamp, 11);
        assert!(record.completed);
    }
}
