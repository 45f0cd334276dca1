//! Space-Saving sketch operator (frequent items / heavy hitters)
//!
//! Bounded counter table tracking the most frequent (or heaviest) series
//! in the stream. With error bound `ε` the table holds at most
//! `M = ⌈1/ε⌉` counters; an item with true frequency above `ε·N` is
//! guaranteed a counter, and every counter overestimates by at most its
//! recorded error. On barrier or completion the counters whose estimate
//! clears the reporting support `N·φ` are emitted in descending count
//! order.

use std::collections::HashMap;

use crate::error::{PipelineError, Result};
use crate::pipeline::{BoxedOperator, Operator, OperatorKind};
use crate::types::{PayloadKind, Sample, SeriesId, Timestamp};

#[derive(Debug, Clone, Copy)]
struct Counter {
    count: f64,
    error: f64,
}

/// Space-Saving operator over series ids
///
/// The unweighted variant counts occurrences (weight 1 per sample); the
/// weighted variant counts `sample.value` and drops non-float samples.
pub struct SpaceSaver {
    weighted: bool,
    counters: HashMap<SeriesId, Counter>,
    /// Total stream weight since the last flush
    total_weight: f64,
    /// Counter table capacity, `⌈1/ε⌉`
    capacity: usize,
    /// Reporting portion `φ`
    portion: f64,
    next: BoxedOperator,
}

impl SpaceSaver {
    /// Frequent-items variant: every sample weighs 1
    pub fn frequent_items(error: f64, portion: f64, next: BoxedOperator) -> Result<Self> {
        Self::build(false, error, portion, next)
    }

    /// Heavy-hitters variant: samples weigh their float value
    pub fn heavy_hitters(error: f64, portion: f64, next: BoxedOperator) -> Result<Self> {
        Self::build(true, error, portion, next)
    }

    fn build(weighted: bool, error: f64, portion: f64, next: BoxedOperator) -> Result<Self> {
        if !(error > 0.0 && error <= 1.0) {
            return Err(PipelineError::InvalidSamplerSpec(format!(
                "error must be in (0, 1], got {}",
                error
            )));
        }
        if !(0.0..=1.0).contains(&portion) {
            return Err(PipelineError::InvalidSamplerSpec(format!(
                "portion must be in [0, 1], got {}",
                portion
            )));
        }
        Ok(Self {
            weighted,
            counters: HashMap::new(),
            total_weight: 0.0,
            capacity: (1.0 / error).ceil() as usize,
            portion,
            next,
        })
    }

    /// Number of live counters
    pub fn counter_count(&self) -> usize {
        self.counters.len()
    }

    /// Total weight observed since the last flush
    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }

    /// Emit qualifying counters in descending count order, then reset
    fn flush(&mut self, timestamp: Timestamp) -> bool {
        let support = self.total_weight * self.portion;
        let mut emitted: Vec<Sample> = self
            .counters
            .iter()
            .filter(|(_, counter)| counter.count - counter.error > support)
            .map(|(&series_id, counter)| Sample {
                series_id,
                timestamp,
                payload: crate::types::Payload {
                    kind: PayloadKind::PARAMID | PayloadKind::FLOAT,
                    value: counter.count,
                },
            })
            .collect();
        emitted.sort_by(|a, b| {
            b.payload
                .value
                .partial_cmp(&a.payload.value)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        for sample in &emitted {
            if !self.next.put(sample) {
                return false;
            }
        }
        self.counters.clear();
        self.total_weight = 0.0;
        true
    }
}

impl Operator for SpaceSaver {
    fn put(&mut self, sample: &Sample) -> bool {
        if sample.is_barrier() {
            // flush, then keep downstream window boundaries aligned
            if !self.flush(sample.timestamp) {
                return false;
            }
            return self.next.put(sample);
        }
        if self.weighted && !sample.payload.kind.has_float() {
            return true;
        }
        let weight = if self.weighted {
            sample.payload.value
        } else {
            1.0
        };
        let id = sample.series_id;
        if let Some(counter) = self.counters.get_mut(&id) {
            counter.count += weight;
        } else if self.counters.len() < self.capacity {
            self.counters.insert(
                id,
                Counter {
                    count: weight,
                    error: 0.0,
                },
            );
        } else {
            // evict the smallest counter; its count becomes the new
            // entry's error bound. Count ties prefer the entry with the
            // larger error (the weaker estimate).
            let (&victim, &victim_counter) = self
                .counters
                .iter()
                .min_by(|a, b| {
                    a.1.count
                        .partial_cmp(&b.1.count)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then_with(|| {
                            b.1.error
                                .partial_cmp(&a.1.error)
                                .unwrap_or(std::cmp::Ordering::Equal)
                        })
                })
                .expect("counter table is non-empty at capacity");
            self.counters.remove(&victim);
            self.counters.insert(
                id,
                Counter {
                    count: victim_counter.count + weight,
                    error: victim_counter.count,
                },
            );
        }
        self.total_weight += weight;
        true
    }

    fn complete(&mut self) {
        self.flush(0);
        self.next.complete();
    }

    fn set_error(&mut self, status: PipelineError) {
        self.next.set_error(status);
    }

    fn kind(&self) -> OperatorKind {
        OperatorKind::SpaceSaving
    }
}
