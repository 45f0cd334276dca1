//! Error types for the query pipeline

use thiserror::Error;

/// Main error type for pipeline construction and execution
///
/// The same enum doubles as the status value carried down the operator
/// chain by `set_error`: runtime failures are forwarded verbatim to the
/// sink, which is the sole reporter to the embedder.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// Sampler configuration malformed: unknown algorithm name, missing
    /// key, out-of-range parameter, or non-numeric where numeric expected
    #[error("invalid sampler specification: {0}")]
    InvalidSamplerSpec(String),

    /// Well-formed but unsupported forecasting method
    #[error("unimplemented forecasting method: {0}")]
    UnimplementedMethod(String),

    /// The anomaly detector received a negative float value
    #[error("anomaly detector received negative value")]
    NegativeAnomalyInput,
}

/// Result type alias
pub type Result<T> = std::result::Result<T, PipelineError>;
