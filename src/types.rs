//! Core data types flowing through the query pipeline
//!
//! This module defines the sample record consumed and produced by every
//! pipeline operator:
//!
//! # Key Types
//!
//! - **`Sample`**: a single stream element (series id + timestamp + payload)
//! - **`SeriesId`**: unique identifier for a time-series
//! - **`Timestamp`**: unsigned 64-bit, monotone per series
//! - **`PayloadKind`**: bitset describing what the payload carries
//!
//! A sample whose payload kind is [`PayloadKind::EMPTY`] is a **barrier**:
//! it carries no value, only a timestamp, and marks a window boundary for
//! the operators downstream.
//!
//! # Example
//!
//! ```rust
//! use spate_tsdb::types::{PayloadKind, Sample};
//!
//! let value = Sample::float(1, 1000, 42.5);
//! assert!(value.payload.kind.has_float());
//!
//! let barrier = Sample::barrier(2000);
//! assert!(barrier.is_barrier());
//! assert_eq!(barrier.payload.kind, PayloadKind::EMPTY);
//! ```

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

/// Unique identifier for a time-series
pub type SeriesId = u64;

/// Timestamp in arbitrary user units; monotone per series
pub type Timestamp = u64;

/// Bitset describing the contents of a sample payload
///
/// An all-zero kind ([`PayloadKind::EMPTY`]) marks the sample as a barrier
/// regardless of any other field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PayloadKind(u8);

impl PayloadKind {
    /// No bits set; the sample is a barrier
    pub const EMPTY: PayloadKind = PayloadKind(0);
    /// The sample identifies a series (metadata replay)
    pub const PARAMID: PayloadKind = PayloadKind(1);
    /// The payload value holds a 64-bit float
    pub const FLOAT: PayloadKind = PayloadKind(2);
    /// The payload references an opaque blob
    pub const BLOB: PayloadKind = PayloadKind(4);
    /// The sample was flagged urgent by the anomaly detector
    pub const URGENT: PayloadKind = PayloadKind(8);

    /// True iff no bits are set, i.e. the sample is a barrier
    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True iff the FLOAT bit is set
    #[inline]
    pub fn has_float(self) -> bool {
        self.0 & Self::FLOAT.0 != 0
    }

    /// True iff the PARAMID bit is set
    #[inline]
    pub fn has_param_id(self) -> bool {
        self.0 & Self::PARAMID.0 != 0
    }

    /// True iff the BLOB bit is set
    #[inline]
    pub fn has_blob(self) -> bool {
        self.0 & Self::BLOB.0 != 0
    }

    /// True iff the URGENT bit is set
    #[inline]
    pub fn is_urgent(self) -> bool {
        self.0 & Self::URGENT.0 != 0
    }

    /// Raw bit representation
    #[inline]
    pub fn bits(self) -> u8 {
        self.0
    }
}

impl BitOr for PayloadKind {
    type Output = PayloadKind;

    fn bitor(self, rhs: PayloadKind) -> PayloadKind {
        PayloadKind(self.0 | rhs.0)
    }
}

impl BitOrAssign for PayloadKind {
    fn bitor_assign(&mut self, rhs: PayloadKind) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "EMPTY");
        }
        let mut parts = Vec::new();
        if self.has_param_id() {
            parts.push("PARAMID");
        }
        if self.has_float() {
            parts.push("FLOAT");
        }
        if self.has_blob() {
            parts.push("BLOB");
        }
        if self.is_urgent() {
            parts.push("URGENT");
        }
        write!(f, "{}", parts.join("|"))
    }
}

/// Sample payload: kind bitset plus a value slot
///
/// The value slot is meaningful only when the FLOAT bit is set; it is
/// zero otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    /// What the payload carries
    pub kind: PayloadKind,
    /// The float value, valid iff `kind.has_float()`
    pub value: f64,
}

/// A single element of the sample stream
///
/// Produced by the storage scan, rewritten by the window driver, and
/// consumed by the operator chain down to the sink.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Series the sample belongs to (0 for barriers)
    pub series_id: SeriesId,
    /// Sample timestamp
    pub timestamp: Timestamp,
    /// Payload kind and value
    pub payload: Payload,
}

impl Sample {
    /// Create a float-valued sample
    pub fn float(series_id: SeriesId, timestamp: Timestamp, value: f64) -> Self {
        Self {
            series_id,
            timestamp,
            payload: Payload {
                kind: PayloadKind::PARAMID | PayloadKind::FLOAT,
                value,
            },
        }
    }

    /// Create a barrier carrying only a timestamp
    pub fn barrier(timestamp: Timestamp) -> Self {
        Self {
            series_id: 0,
            timestamp,
            payload: Payload {
                kind: PayloadKind::EMPTY,
                value: 0.0,
            },
        }
    }

    /// Create a metadata sample identifying a series (timestamp 0)
    pub fn param_id(series_id: SeriesId) -> Self {
        Self {
            series_id,
            timestamp: 0,
            payload: Payload {
                kind: PayloadKind::PARAMID,
                value: 0.0,
            },
        }
    }

    /// True iff this sample is a barrier
    #[inline]
    pub fn is_barrier(&self) -> bool {
        self.payload.kind.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_bits() {
        let kind = PayloadKind::PARAMID | PayloadKind::FLOAT;
        assert!(kind.has_param_id());
        assert!(kind.has_float());
        assert!(!kind.has_blob());
        assert!(!kind.is_empty());
        assert_eq!(kind.bits(), 3);
    }

    #[test]
    fn test_empty_is_barrier_regardless_of_value() {
        let mut sample = Sample::barrier(100);
        sample.payload.value = 42.0;
        assert!(sample.is_barrier());
    }

    #[test]
    fn test_urgent_flag_composes() {
        let mut sample = Sample::float(7, 10, 1.0);
        sample.payload.kind |= PayloadKind::URGENT;
        assert!(sample.payload.kind.is_urgent());
        assert!(sample.payload.kind.has_float());
        assert!(!sample.is_barrier());
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(PayloadKind::EMPTY.to_string(), "EMPTY");
        let kind = PayloadKind::FLOAT | PayloadKind::URGENT;
        assert_eq!(kind.to_string(), "FLOAT|URGENT");
    }
}
