//! Anomaly detection operator
//!
//! Screens the float stream through a forecasting detector: values that
//! deviate from the per-series forecast are forwarded with the URGENT
//! flag, everything else is suppressed. Barriers advance the detector's
//! sliding window and pass through.

use crate::detector::Detector;
use crate::error::PipelineError;
use crate::pipeline::{BoxedOperator, Operator, OperatorKind};
use crate::types::{PayloadKind, Sample};

/// Operator wrapping a forecasting [`Detector`]
///
/// Input values must be non-negative; a negative float raises
/// [`PipelineError::NegativeAnomalyInput`] down the chain and stops the
/// scan.
pub struct AnomalySampler {
    detector: Box<dyn Detector>,
    failed: bool,
    next: BoxedOperator,
}

impl AnomalySampler {
    /// Create the operator around a constructed detector
    pub fn new(detector: Box<dyn Detector>, next: BoxedOperator) -> Self {
        Self {
            detector,
            failed: false,
            next,
        }
    }
}

impl Operator for AnomalySampler {
    fn put(&mut self, sample: &Sample) -> bool {
        if self.failed {
            return false;
        }
        if sample.is_barrier() {
            self.detector.move_sliding_window();
            return self.next.put(sample);
        }
        if sample.payload.kind.has_float() {
            if sample.payload.value < 0.0 {
                self.failed = true;
                self.set_error(PipelineError::NegativeAnomalyInput);
                return false;
            }
            self.detector.add(sample.series_id, sample.payload.value);
            if self.detector.is_anomaly_candidate(sample.series_id) {
                let mut anomaly = *sample;
                anomaly.payload.kind |= PayloadKind::URGENT;
                return self.next.put(&anomaly);
            }
        }
        // non-float payloads pass by unobserved
        true
    }

    fn complete(&mut self) {
        self.next.complete();
    }

    fn set_error(&mut self, status: PipelineError) {
        self.next.set_error(status);
    }

    fn kind(&self) -> OperatorKind {
        OperatorKind::AnomalyDetector
    }
}
