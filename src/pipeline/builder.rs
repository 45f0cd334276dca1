//! Operator construction from a configuration tree
//!
//! The query parser hands the pipeline a string-keyed configuration tree
//! (JSON); this module turns one node of that tree plus an already-built
//! downstream into a new chain head. Every malformation (unknown
//! algorithm name, missing key, non-numeric scalar, out-of-range
//! parameter) maps to [`PipelineError::InvalidSamplerSpec`].

use serde_json::Value;
use tracing::trace;

use crate::detector::{build_detector, ForecastMethod};
use crate::error::{PipelineError, Result};
use crate::pipeline::{
    AnomalySampler, BoxedOperator, MovingAverage, MovingMedian, ReservoirSampler, SlidingWindow,
    SpaceSaver,
};

/// Build one sampler node from its configuration
///
/// Recognized `name` values: `reservoir`, `moving-average`,
/// `moving-median`, `frequent-items`, `heavy-hitters`,
/// `anomaly-detector`. Scalar parameters are accepted as JSON numbers or
/// numeric strings.
pub fn build_sampler(config: &Value, next: BoxedOperator) -> Result<BoxedOperator> {
    let name = get_str(config, "name")?;
    match name {
        "reservoir" => {
            let size = get_u32(config, "size")?;
            trace!(size, "creating reservoir sampler node");
            Ok(Box::new(ReservoirSampler::new(size as usize, next)))
        }
        "moving-average" => {
            trace!("creating moving average node");
            let window: MovingAverage = SlidingWindow::new(next);
            Ok(Box::new(window))
        }
        "moving-median" => {
            trace!("creating moving median node");
            let window: MovingMedian = SlidingWindow::new(next);
            Ok(Box::new(window))
        }
        "frequent-items" => {
            let error = get_f64(config, "error")?;
            let portion = get_f64(config, "portion")?;
            trace!(error, portion, "creating frequent items node");
            Ok(Box::new(SpaceSaver::frequent_items(error, portion, next)?))
        }
        "heavy-hitters" => {
            let error = get_f64(config, "error")?;
            let portion = get_f64(config, "portion")?;
            trace!(error, portion, "creating heavy hitters node");
            Ok(Box::new(SpaceSaver::heavy_hitters(error, portion, next)?))
        }
        "anomaly-detector" => {
            let threshold = get_f64(config, "threshold")?;
            let method = parse_forecast_method(config)?;
            let bits = get_u32_or(config, "bits", 10)?;
            let hashes = get_u32_or(config, "hashes", 3)?;
            let window = get_u32(config, "window")?;
            trace!(threshold, window, "creating anomaly detector node");
            let detector = build_detector(method, threshold, window, hashes, bits)?;
            Ok(Box::new(AnomalySampler::new(detector, next)))
        }
        other => Err(PipelineError::InvalidSamplerSpec(format!(
            "unknown algorithm name: {}",
            other
        ))),
    }
}

fn parse_forecast_method(config: &Value) -> Result<ForecastMethod> {
    let approx = get_bool(config, "approx")?;
    let method = get_str(config, "method")?;
    match method {
        "sma" => Ok(if approx {
            ForecastMethod::SmaSketch
        } else {
            ForecastMethod::Sma
        }),
        "ewma" => Ok(if approx {
            ForecastMethod::EwmaSketch
        } else {
            ForecastMethod::Ewma
        }),
        "double-hw" => Ok(if approx {
            ForecastMethod::DoubleHoltWintersSketch
        } else {
            ForecastMethod::DoubleHoltWinters
        }),
        other => Err(PipelineError::InvalidSamplerSpec(format!(
            "unknown forecasting method: {}",
            other
        ))),
    }
}

// ============================================================================
// Configuration Tree Accessors
// ============================================================================

fn missing(key: &str) -> PipelineError {
    PipelineError::InvalidSamplerSpec(format!("missing key: {}", key))
}

fn get_str<'a>(config: &'a Value, key: &str) -> Result<&'a str> {
    config
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| missing(key))
}

fn get_f64(config: &Value, key: &str) -> Result<f64> {
    let value = config.get(key).ok_or_else(|| missing(key))?;
    lexical_f64(value).ok_or_else(|| {
        PipelineError::InvalidSamplerSpec(format!("key {} expects a number, got {}", key, value))
    })
}

fn get_u32(config: &Value, key: &str) -> Result<u32> {
    let value = config.get(key).ok_or_else(|| missing(key))?;
    lexical_u32(value).ok_or_else(|| {
        PipelineError::InvalidSamplerSpec(format!(
            "key {} expects a valid integer, got {}",
            key, value
        ))
    })
}

fn get_u32_or(config: &Value, key: &str, default: u32) -> Result<u32> {
    match config.get(key) {
        None => Ok(default),
        Some(value) => lexical_u32(value).ok_or_else(|| {
            PipelineError::InvalidSamplerSpec(format!(
                "key {} expects a valid integer, got {}",
                key, value
            ))
        }),
    }
}

fn get_bool(config: &Value, key: &str) -> Result<bool> {
    let value = config.get(key).ok_or_else(|| missing(key))?;
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::String(text) => text.parse().ok(),
        _ => None,
    }
    .ok_or_else(|| {
        PipelineError::InvalidSamplerSpec(format!("key {} expects a boolean, got {}", key, value))
    })
}

fn lexical_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.parse().ok(),
        _ => None,
    }
}

fn lexical_u32(value: &Value) -> Option<u32> {
    match value {
        Value::Number(number) => number.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(text) => text.parse().ok(),
        _ => None,
    }
}
