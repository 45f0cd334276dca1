//! Group-by-time window driver
//!
//! Rewrites the raw scan stream into `(sample, …, barrier, sample, …)`
//! with barriers aligned to a configurable step. It is the only producer
//! of barriers into the operator chain; every windowed operator
//! downstream keys its flushes off these boundaries.
//!
//! The driver maintains a half-open interval `[lowerbound, upperbound)`
//! with `upperbound - lowerbound = step` and `lowerbound % step = 0`
//! once initialized. Forward scans emit one barrier per crossed step;
//! backward scans mirror the same rule below the lower bound.

use crate::pipeline::Operator;
use crate::types::{Sample, Timestamp};

/// Barrier-injecting front of the operator chain
///
/// With `step = 0` the driver is a pass-through.
#[derive(Debug, Clone)]
pub struct GroupByTime {
    step: Timestamp,
    first_hit: bool,
    lowerbound: Timestamp,
    upperbound: Timestamp,
    barriers_emitted: u64,
}

impl GroupByTime {
    /// Create a driver with the given step
    pub fn new(step: Timestamp) -> Self {
        Self {
            step,
            first_hit: true,
            lowerbound: 0,
            upperbound: 0,
            barriers_emitted: 0,
        }
    }

    /// Configured step
    pub fn step(&self) -> Timestamp {
        self.step
    }

    /// Number of barriers injected so far
    pub fn barriers_emitted(&self) -> u64 {
        self.barriers_emitted
    }

    /// Feed one scan sample into the chain, injecting barriers as needed
    ///
    /// Returns `false` as soon as any downstream `put` does.
    pub fn put(&mut self, sample: &Sample, next: &mut dyn Operator) -> bool {
        if self.step != 0 && !sample.is_barrier() {
            let ts = sample.timestamp;
            if self.first_hit {
                self.first_hit = false;
                let aligned = ts / self.step * self.step;
                self.lowerbound = aligned;
                self.upperbound = aligned + self.step;
            }
            // forward scan: one barrier per crossed step, so gap
            // boundaries keep truthful timestamps
            while ts >= self.upperbound {
                let barrier = Sample::barrier(self.upperbound);
                if !next.put(&barrier) {
                    return false;
                }
                self.barriers_emitted += 1;
                self.lowerbound += self.step;
                self.upperbound += self.step;
            }
            // backward scan
            while ts < self.lowerbound {
                let barrier = Sample::barrier(self.upperbound);
                if !next.put(&barrier) {
                    return false;
                }
                self.barriers_emitted += 1;
                self.lowerbound -= self.step;
                self.upperbound -= self.step;
            }
        }
        next.put(sample)
    }
}
