//! Reservoir sampler operator
//!
//! Maintains a fixed-capacity uniform sample of the stream between
//! barriers (Algorithm R). On each barrier the buffer is flushed in
//! `(timestamp, series_id)` order and the barrier itself is consumed:
//! the flushed samples stand in its place downstream.

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use crate::error::PipelineError;
use crate::pipeline::{BoxedOperator, Operator, OperatorKind};
use crate::types::Sample;

/// Fixed-capacity random sample of the stream
///
/// Each sample seen since the last flush has equal probability of being
/// in the buffer at flush time. The randomness source is injectable so
/// tests can run deterministic traces.
pub struct ReservoirSampler {
    capacity: usize,
    seen: u64,
    buffer: Vec<Sample>,
    rng: Box<dyn RngCore + Send>,
    next: BoxedOperator,
}

impl ReservoirSampler {
    /// Create a sampler with a thread-seeded RNG
    pub fn new(capacity: usize, next: BoxedOperator) -> Self {
        Self::with_rng(capacity, Box::new(StdRng::from_entropy()), next)
    }

    /// Create a sampler with a caller-supplied RNG
    pub fn with_rng(capacity: usize, rng: Box<dyn RngCore + Send>, next: BoxedOperator) -> Self {
        Self {
            capacity,
            seen: 0,
            buffer: Vec::with_capacity(capacity),
            rng,
            next,
        }
    }

    /// Number of samples currently buffered
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    fn flush(&mut self) -> bool {
        self.buffer
            .sort_by_key(|sample| (sample.timestamp, sample.series_id));
        for sample in &self.buffer {
            if !self.next.put(sample) {
                return false;
            }
        }
        self.buffer.clear();
        self.seen = 0;
        true
    }
}

impl Operator for ReservoirSampler {
    fn put(&mut self, sample: &Sample) -> bool {
        if sample.is_barrier() {
            // barrier is consumed; the flushed samples stand in its place
            return self.flush();
        }
        self.seen += 1;
        if self.buffer.len() < self.capacity {
            self.buffer.push(*sample);
        } else {
            let slot = (self.rng.next_u32() as u64 % self.seen) as usize;
            if slot < self.capacity {
                self.buffer[slot] = *sample;
            }
        }
        true
    }

    fn complete(&mut self) {
        self.flush();
        self.next.complete();
    }

    fn set_error(&mut self, status: PipelineError) {
        self.next.set_error(status);
    }

    fn kind(&self) -> OperatorKind {
        OperatorKind::Reservoir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::CollectingSink;
    use crate::types::SeriesId;

    fn seeded(capacity: usize, next: BoxedOperator) -> ReservoirSampler {
        ReservoirSampler::with_rng(capacity, Box::new(StdRng::seed_from_u64(42)), next)
    }

    #[test]
    fn test_flush_ordering() {
        let sink = CollectingSink::new();
        let handle = sink.handle();
        let mut reservoir = seeded(4, Box::new(sink));

        reservoir.put(&Sample::float(1, 10, 0.0));
        reservoir.put(&Sample::float(2, 5, 0.0));
        reservoir.put(&Sample::float(1, 20, 0.0));
        reservoir.put(&Sample::float(3, 7, 0.0));
        reservoir.put(&Sample::barrier(100));

        let record = handle.lock();
        let order: Vec<(u64, SeriesId)> = record
            .values()
            .iter()
            .map(|s| (s.timestamp, s.series_id))
            .collect();
        assert_eq!(order, vec![(5, 2), (7, 3), (10, 1), (20, 1)]);
        // the barrier is consumed, not forwarded
        assert_eq!(record.barrier_count(), 0);
    }

    #[test]
    fn test_buffer_never_exceeds_capacity() {
        let mut reservoir = seeded(8, Box::new(CollectingSink::new()));

        for i in 0..1000u64 {
            reservoir.put(&Sample::float(1, i, i as f64));
            assert!(reservoir.buffered() <= 8);
        }
    }

    #[test]
    fn test_flush_size_is_min_of_stream_and_capacity() {
        let sink = CollectingSink::new();
        let handle = sink.handle();
        let mut reservoir = seeded(16, Box::new(sink));

        for i in 0..5u64 {
            reservoir.put(&Sample::float(1, i, 0.0));
        }
        reservoir.put(&Sample::barrier(10));

        assert_eq!(handle.lock().values().len(), 5);
        assert_eq!(reservoir.buffered(), 0);
    }

    #[test]
    fn test_zero_capacity_emits_nothing() {
        let sink = CollectingSink::new();
        let handle = sink.handle();
        let mut reservoir = seeded(0, Box::new(sink));

        for i in 0..100u64 {
            assert!(reservoir.put(&Sample::float(1, i, 0.0)));
        }
        reservoir.complete();

        let record = handle.lock();
        assert!(record.values().is_empty());
        assert!(record.completed);
    }

    #[test]
    fn test_late_samples_can_replace() {
        // every seen sample must have positive replacement probability:
        // over many runs, samples past the first k must appear at flush
        let mut seen_late_sample = false;
        for seed in 0..32u64 {
            let sink = CollectingSink::new();
            let handle = sink.handle();
            let mut reservoir =
                ReservoirSampler::with_rng(4, Box::new(StdRng::seed_from_u64(seed)), Box::new(sink));

            for i in 0..64u64 {
                reservoir.put(&Sample::float(1, i, 0.0));
            }
            reservoir.put(&Sample::barrier(1000));

            if handle.lock().values().iter().any(|s| s.timestamp >= 4) {
                seen_late_sample = true;
                break;
            }
        }
        assert!(seen_late_sample);
    }

    #[test]
    fn test_complete_flushes_then_forwards() {
        let sink = CollectingSink::new();
        let handle = sink.handle();
        let mut reservoir = seeded(4, Box::new(sink));

        reservoir.put(&Sample::float(1, 3, 0.0));
        reservoir.put(&Sample::float(1, 1, 0.0));
        reservoir.complete();

        let record = handle.lock();
        let timestamps: Vec<u64> = record.values().iter().map(|s| s.timestamp).collect();
        assert_eq!(timestamps, vec![1, 3]);
        assert!(record.completed);
    }

    #[test]
    fn test_downstream_stop_propagates_from_flush() {
        let sink = CollectingSink::with_limit(1);
        let mut reservoir = seeded(4, Box::new(sink));

        reservoir.put(&Sample::float(1, 1, 0.0));
        reservoir.put(&Sample::float(1, 2, 0.0));
        assert!(!reservoir.put(&Sample::barrier(10)));
    }
}
