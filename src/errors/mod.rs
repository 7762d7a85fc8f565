//! Error types returned by histogram construction, recording, queries and addition.

use std::error::Error;
use std::fmt;

/// Errors that can occur when creating a histogram.
#[derive(Debug, Eq, PartialEq, Clone, Copy)]
pub enum CreationError {
    /// Lowest discernible value must be >= 1.
    LowIsZero,
    /// Lowest discernible value must be <= `u64::max_value() / 2` because the highest value is
    /// a `u64` and the lowest value must be no bigger than half the highest.
    LowExceedsMax,
    /// Highest trackable value must be >= 2 * lowest discernible value for some internal
    /// calculations to work out. In practice, high is typically much higher than 2 * low.
    HighLessThanTwiceLow,
    /// Number of significant digits must be in the range `[0, 5]`. It is capped at 5 because 5
    /// significant digits is already more than almost anyone needs, and memory usage scales
    /// exponentially as this increases.
    SigFigExceedsMax,
    /// Cannot represent sigfig worth of values beyond the lowest discernible value. Decrease the
    /// significant figures, lowest discernible value, or both.
    ///
    /// This could happen if low is very large (like 2^60) and sigfigs is 5, which requires 18
    /// additional bits, which would then require more bits than will fit in a u64. Specifically,
    /// the exponent of the largest power of two that is smaller than the lowest value and the bits
    /// needed to represent the requested significant figures must sum to 63 or less.
    CannotRepresentSigFigBeyondLow,
    /// The `usize` type is too small to represent the desired configuration. Use fewer significant
    /// figures or a lower max.
    UsizeTypeTooSmall,
}

impl fmt::Display for CreationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CreationError::LowIsZero => write!(f, "Lowest discernible value must be >= 1"),
            CreationError::LowExceedsMax => {
                write!(f, "Lowest discernible value must be <= `u64::max_value() / 2`")
            }
            CreationError::HighLessThanTwiceLow => write!(
                f,
                "Highest trackable value must be >= 2 * lowest discernible value"
            ),
            CreationError::SigFigExceedsMax => {
                write!(f, "Number of significant digits must be in the range `[0, 5]`")
            }
            CreationError::CannotRepresentSigFigBeyondLow => write!(
                f,
                "Cannot represent sigfig worth of values beyond the lowest discernible value"
            ),
            CreationError::UsizeTypeTooSmall => write!(
                f,
                "The `usize` type is too small to represent the desired configuration"
            ),
        }
    }
}

impl Error for CreationError {}

/// Errors that can occur while recording a value and its associated count.
#[derive(Debug, Eq, PartialEq, Clone, Copy)]
pub enum RecordError {
    /// The value maps to a bucket beyond the histogram's bucket count. Configure a higher
    /// highest trackable value, or filter inputs before recording.
    ValueOutOfRange,
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RecordError::ValueOutOfRange => write!(
                f,
                "The value to record is beyond the histogram's highest trackable value"
            ),
        }
    }
}

impl Error for RecordError {}

/// Errors that can occur when looking up counts by value.
#[derive(Debug, Eq, PartialEq, Clone, Copy)]
pub enum QueryError {
    /// A queried value maps to a bucket beyond the histogram's bucket count.
    ValueOutOfRange,
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            QueryError::ValueOutOfRange => {
                write!(f, "The queried value is outside the tracked value range")
            }
        }
    }
}

impl Error for QueryError {}

/// Errors that can occur when adding another histogram.
#[derive(Debug, Eq, PartialEq, Clone, Copy)]
pub enum AdditionError {
    /// The other histogram's highest trackable value is larger than this one's, so it may hold
    /// values this histogram cannot represent. Nothing was added.
    OtherHighestExceedsRange,
    /// While re-recording a differently laid out histogram value by value, a value did not fit in
    /// this histogram. Counts for lower values may already have been added.
    OtherAddendValueExceedsRange,
}

impl fmt::Display for AdditionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AdditionError::OtherHighestExceedsRange => {
                write!(f, "The other histogram covers a wider range than this one")
            }
            AdditionError::OtherAddendValueExceedsRange => write!(
                f,
                "The other histogram includes values that do not fit in this histogram's range"
            ),
        }
    }
}

impl Error for AdditionError {}

impl From<RecordError> for AdditionError {
    fn from(_: RecordError) -> Self {
        AdditionError::OtherAddendValueExceedsRange
    }
}
