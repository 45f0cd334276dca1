//! Forecasting anomaly detectors
//!
//! The pipeline's anomaly operator drives an opaque detector through a
//! three-call interface: record a value, classify the most recent
//! recording, and advance the sliding window at each barrier. This
//! module provides the detector implementations:
//!
//! - **Precise** variants keep exact per-series values for every window
//!   frame; memory grows with series cardinality.
//! - **Sketch** variants replace each frame with a count-min sketch of
//!   `hashes` rows by `2^bits` columns; memory is bounded by the sketch
//!   dimensions at the cost of (one-sided) estimation error.
//!
//! Either representation is combined with one of two forecasts over the
//! closed frames: simple moving average, or exponentially weighted
//! moving average with `alpha = 2 / (depth + 1)`. A recorded value is an
//! anomaly candidate when the window is warmed up and the value deviates
//! from the forecast by more than the threshold.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::hash::Hasher;

use crate::error::{PipelineError, Result};
use crate::types::SeriesId;

// ============================================================================
// Detector Contract
// ============================================================================

/// Forecasting method selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForecastMethod {
    /// Simple moving average over exact frames
    Sma,
    /// Exponentially weighted moving average over exact frames
    Ewma,
    /// Simple moving average over count-min frames
    SmaSketch,
    /// Exponentially weighted moving average over count-min frames
    EwmaSketch,
    /// Reserved; construction fails with `UnimplementedMethod`
    DoubleHoltWinters,
    /// Reserved; construction fails with `UnimplementedMethod`
    DoubleHoltWintersSketch,
}

/// Interface between the anomaly operator and a detector implementation
pub trait Detector: Send {
    /// Record a value for a series within the current window frame
    fn add(&mut self, id: SeriesId, value: f64);

    /// Classify the most recent `add` for this series
    fn is_anomaly_candidate(&self, id: SeriesId) -> bool;

    /// Close the current frame and advance the window by one step
    fn move_sliding_window(&mut self);
}

/// Build a detector for the given method
///
/// `hashes` and `bits` size the count-min sketch and are ignored by the
/// precise variants. Double-Holt-Winters tags are reserved but
/// unsupported.
pub fn build_detector(
    method: ForecastMethod,
    threshold: f64,
    window_depth: u32,
    hashes: u32,
    bits: u32,
) -> Result<Box<dyn Detector>> {
    if matches!(method, ForecastMethod::SmaSketch | ForecastMethod::EwmaSketch) && bits >= 32 {
        return Err(PipelineError::InvalidSamplerSpec(format!(
            "sketch bits must be below 32, got {}",
            bits
        )));
    }
    let depth = window_depth.max(1) as usize;
    match method {
        ForecastMethod::Sma => Ok(Box::new(WindowedDetector::new(
            ExactFrame::default(),
            Smoothing::Sma,
            threshold,
            depth,
        ))),
        ForecastMethod::Ewma => Ok(Box::new(WindowedDetector::new(
            ExactFrame::default(),
            Smoothing::ewma(depth),
            threshold,
            depth,
        ))),
        ForecastMethod::SmaSketch => Ok(Box::new(WindowedDetector::new(
            SketchFrame::new(hashes as usize, 1usize << bits),
            Smoothing::Sma,
            threshold,
            depth,
        ))),
        ForecastMethod::EwmaSketch => Ok(Box::new(WindowedDetector::new(
            SketchFrame::new(hashes as usize, 1usize << bits),
            Smoothing::ewma(depth),
            threshold,
            depth,
        ))),
        ForecastMethod::DoubleHoltWinters | ForecastMethod::DoubleHoltWintersSketch => Err(
            PipelineError::UnimplementedMethod("double-hw".to_string()),
        ),
    }
}

// ============================================================================
// Frame Stores
// ============================================================================

/// One window frame of accumulated per-series values
trait Frame: Clone + Send {
    /// Accumulate a value for the series
    fn add(&mut self, id: SeriesId, value: f64);

    /// Estimated accumulated value for the series
    fn estimate(&self, id: SeriesId) -> f64;

    /// In-place blend: `self = self * self_scale + other * other_scale`
    fn merge_scaled(&mut self, other: &Self, self_scale: f64, other_scale: f64);
}

/// Exact per-series frame
#[derive(Debug, Clone, Default)]
struct ExactFrame {
    values: HashMap<SeriesId, f64>,
}

impl Frame for ExactFrame {
    fn add(&mut self, id: SeriesId, value: f64) {
        *self.values.entry(id).or_insert(0.0) += value;
    }

    fn estimate(&self, id: SeriesId) -> f64 {
        self.values.get(&id).copied().unwrap_or(0.0)
    }

    fn merge_scaled(&mut self, other: &Self, self_scale: f64, other_scale: f64) {
        for value in self.values.values_mut() {
            *value *= self_scale;
        }
        for (&id, &value) in &other.values {
            *self.values.entry(id).or_insert(0.0) += value * other_scale;
        }
    }
}

/// Count-min sketch frame: `depth` hash rows of `width` cells
///
/// Point queries return the minimum cell across rows, so estimates never
/// undercount within one frame.
#[derive(Debug, Clone)]
pub(crate) struct SketchFrame {
    width: usize,
    rows: Vec<Vec<f64>>,
}

impl SketchFrame {
    pub(crate) fn new(depth: usize, width: usize) -> Self {
        let depth = depth.max(1);
        let width = width.max(1);
        Self {
            width,
            rows: vec![vec![0.0; width]; depth],
        }
    }

    fn cell(&self, row: usize, id: SeriesId) -> usize {
        let mut hasher = DefaultHasher::new();
        hasher.write_u64(row as u64 ^ 0x9e37_79b9_7f4a_7c15);
        hasher.write_u64(id);
        (hasher.finish() as usize) % self.width
    }
}

impl Frame for SketchFrame {
    fn add(&mut self, id: SeriesId, value: f64) {
        for row in 0..self.rows.len() {
            let cell = self.cell(row, id);
            self.rows[row][cell] += value;
        }
    }

    fn estimate(&self, id: SeriesId) -> f64 {
        (0..self.rows.len())
            .map(|row| self.rows[row][self.cell(row, id)])
            .fold(f64::INFINITY, f64::min)
    }

    fn merge_scaled(&mut self, other: &Self, self_scale: f64, other_scale: f64) {
        for (self_row, other_row) in self.rows.iter_mut().zip(&other.rows) {
            for (self_cell, other_cell) in self_row.iter_mut().zip(other_row) {
                *self_cell = *self_cell * self_scale + *other_cell * other_scale;
            }
        }
    }
}

// ============================================================================
// Windowed Detector
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum Smoothing {
    Sma,
    Ewma { alpha: f64 },
}

impl Smoothing {
    fn ewma(depth: usize) -> Self {
        Smoothing::Ewma {
            alpha: 2.0 / (depth as f64 + 1.0),
        }
    }
}

/// Detector engine: a current frame plus a forecast over closed frames
struct WindowedDetector<F: Frame> {
    threshold: f64,
    depth: usize,
    smoothing: Smoothing,
    template: F,
    current: F,
    /// Closed frames, newest at the back; SMA only
    window: VecDeque<F>,
    /// Smoothed baseline; EWMA only
    baseline: F,
    frames_closed: usize,
}

impl<F: Frame> WindowedDetector<F> {
    fn new(template: F, smoothing: Smoothing, threshold: f64, depth: usize) -> Self {
        Self {
            threshold,
            depth,
            smoothing,
            current: template.clone(),
            baseline: template.clone(),
            template,
            window: VecDeque::with_capacity(depth),
            frames_closed: 0,
        }
    }

    fn forecast(&self, id: SeriesId) -> f64 {
        match self.smoothing {
            Smoothing::Sma => {
                if self.window.is_empty() {
                    return 0.0;
                }
                let sum: f64 = self.window.iter().map(|frame| frame.estimate(id)).sum();
                sum / self.window.len() as f64
            }
            Smoothing::Ewma { .. } => self.baseline.estimate(id),
        }
    }

    fn warmed_up(&self) -> bool {
        self.frames_closed >= self.depth
    }
}

impl<F: Frame> Detector for WindowedDetector<F> {
    fn add(&mut self, id: SeriesId, value: f64) {
        self.current.add(id, value);
    }

    fn is_anomaly_candidate(&self, id: SeriesId) -> bool {
        if !self.warmed_up() {
            return false;
        }
        let observed = self.current.estimate(id);
        (observed - self.forecast(id)).abs() > self.threshold
    }

    fn move_sliding_window(&mut self) {
        let closed = std::mem::replace(&mut self.current, self.template.clone());
        match self.smoothing {
            Smoothing::Sma => {
                self.window.push_back(closed);
                if self.window.len() > self.depth {
                    self.window.pop_front();
                }
            }
            Smoothing::Ewma { alpha } => {
                if self.frames_closed == 0 {
                    self.baseline = closed;
                } else {
                    self.baseline.merge_scaled(&closed, 1.0 - alpha, alpha);
                }
            }
        }
        self.frames_closed += 1;
    }
}
