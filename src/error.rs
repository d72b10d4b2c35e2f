//! Error types for affinity construction and fusion.

use thiserror::Error;

/// Errors raised before any fusion work starts.
///
/// Degenerate rows (zero total affinity) are not errors: they are normalised
/// against a denominator of 1 and stay all-zero.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FusionError {
    /// Two matrices supplied together do not share the same shape,
    /// or a matrix that must be square is not.
    #[error("Shape mismatch: expected {expected:?}, actual {actual:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    /// A scalar parameter is out of its valid range.
    #[error("Invalid parameter: {message}")]
    InvalidParameter { message: String },

    /// Cross-diffusion needs at least two features to average "the others".
    #[error("Insufficient features: required {required}, actual {actual}")]
    InsufficientFeatures { required: usize, actual: usize },
}

impl FusionError {
    pub fn shape_mismatch(expected: (usize, usize), actual: (usize, usize)) -> Self {
        Self::ShapeMismatch { expected, actual }
    }

    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            message: message.into(),
        }
    }

    pub fn insufficient_features(required: usize, actual: usize) -> Self {
        Self::InsufficientFeatures { required, actual }
    }
}

pub type FusionResult<T> = Result<T, FusionError>;
