//! values.rs
//! Self-validating scalar types shared by the whole crate.
//!
//! These are deliberately small: each one enforces its own invariant at
//! construction so the graph model never has to re-check them.

use serde::{Deserialize, Serialize};
use std::fmt;

pub use self::error::ValueError;
mod error {
    use thiserror::Error;

    #[derive(Error, Debug, Clone, PartialEq)]
    pub enum ValueError {
        #[error("point code must not be empty")]
        EmptyPointCode,
        #[error("distance must be non-negative, got {0}")]
        NegativeDistance(f64),
        #[error("height arithmetic requires two known heights")]
        UnknownHeight,
    }
}

/// A normalized point identifier.
///
/// Codes are trimmed and case-folded on construction, so `" bm1 "` and
/// `"BM1"` compare equal. Equality, ordering and hashing all use the
/// normalized value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PointCode(String);

impl PointCode {
    pub fn new(raw: &str) -> Result<Self, ValueError> {
        let normalized = raw.trim().to_uppercase();
        if normalized.is_empty() {
            return Err(ValueError::EmptyPointCode);
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PointCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A point's elevation in meters, possibly not yet determined.
///
/// Modelled as a sum type rather than a nullable float so that arithmetic on
/// an unknown height is an explicitly handled case, not a runtime surprise.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum Height {
    Known(f64),
    #[default]
    Unknown,
}

impl Height {
    pub fn is_known(&self) -> bool {
        matches!(self, Height::Known(_))
    }

    /// The elevation value, if determined.
    pub fn value(&self) -> Option<f64> {
        match self {
            Height::Known(v) => Some(*v),
            Height::Unknown => None,
        }
    }

    /// `self - other`, valid only between two known heights.
    pub fn diff(&self, other: &Height) -> Result<f64, ValueError> {
        match (self, other) {
            (Height::Known(a), Height::Known(b)) => Ok(a - b),
            _ => Err(ValueError::UnknownHeight),
        }
    }
}

/// A horizontal sight length in meters. Never negative.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Distance(f64);

impl Distance {
    pub const ZERO: Distance = Distance(0.0);

    pub fn new(meters: f64) -> Result<Self, ValueError> {
        if meters < 0.0 || meters.is_nan() {
            return Err(ValueError::NegativeDistance(meters));
        }
        Ok(Self(meters))
    }

    pub fn meters(&self) -> f64 {
        self.0
    }

    /// Subtraction floored at zero, so a `Distance` can never go negative.
    pub fn saturating_sub(&self, other: Distance) -> Distance {
        Distance((self.0 - other.0).max(0.0))
    }
}

impl std::ops::Add for Distance {
    type Output = Distance;
    fn add(self, rhs: Distance) -> Distance {
        Distance(self.0 + rhs.0)
    }
}

/// A raw staff reading in meters. May be negative (inverted staff).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Reading(pub f64);

/// A run's (or section's) misclosure evaluated against an absolute
/// tolerance, both in millimeters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Closure {
    pub value_mm: f64,
    pub tolerance_mm: f64,
}

impl Closure {
    pub fn new(value_mm: f64, tolerance_mm: f64) -> Self {
        Self {
            value_mm,
            tolerance_mm: tolerance_mm.abs(),
        }
    }

    pub fn within_tolerance(&self) -> bool {
        self.value_mm.abs() <= self.tolerance_mm
    }
}

impl fmt::Display for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:+.1} mm (tol {:.1} mm, {})",
            self.value_mm,
            self.tolerance_mm,
            if self.within_tolerance() { "OK" } else { "EXCEEDED" }
        )
    }
}

/// The default tolerance policy: `10 × sqrt(length in km)` millimeters.
///
/// Callers pass the result (or any alternative formula's result) into
/// closure evaluation; the graph model never hard-codes a policy.
pub fn standard_tolerance_mm(length_km: f64) -> f64 {
    10.0 * length_km.max(0.0).sqrt()
}
