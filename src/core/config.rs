use serde::{Deserialize, Serialize};

use crate::errors::CreationError;

/// The immutable bounds a histogram is created with.
///
/// This is the shape in which bounds usually live in an application's own configuration, so it
/// can be (de)serialized with serde and handed to `Histogram::new_from_config`.
///
/// ```
/// use hdr_histogram::{Histogram, HistogramConfig};
///
/// let config = HistogramConfig::new(1, 60 * 60 * 1000, 2);
/// let h = Histogram::<u32>::new_from_config(&config).unwrap();
/// assert_eq!(config, h.config());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistogramConfig {
    /// Lowest value that can be discerned from 0. Smaller values are still recorded, quantized to
    /// this unit.
    pub lowest_discernible_value: u64,
    /// Highest value that can be recorded.
    pub highest_trackable_value: u64,
    /// Decimal digits of resolution maintained across the whole range, in `[0, 5]`.
    pub significant_value_digits: u8,
}

impl Default for HistogramConfig {
    /// One unit to an hour of microseconds, 3 significant digits.
    fn default() -> Self {
        HistogramConfig {
            lowest_discernible_value: 1,
            highest_trackable_value: 3_600_000_000,
            significant_value_digits: 3,
        }
    }
}

impl HistogramConfig {
    /// Bundle the three construction parameters.
    pub fn new(low: u64, high: u64, sigfig: u8) -> HistogramConfig {
        HistogramConfig {
            lowest_discernible_value: low,
            highest_trackable_value: high,
            significant_value_digits: sigfig,
        }
    }

    /// Check the parameters without allocating a histogram.
    ///
    /// Returns the same error `Histogram::new_from_config` would.
    pub fn validate(&self) -> Result<(), CreationError> {
        let low = self.lowest_discernible_value;
        let high = self.highest_trackable_value;
        if low < 1 {
            return Err(CreationError::LowIsZero);
        }
        if low > u64::max_value() / 2 {
            // avoid overflow in 2 * low
            return Err(CreationError::LowExceedsMax);
        }
        if high < 2 * low {
            return Err(CreationError::HighLessThanTwiceLow);
        }
        if self.significant_value_digits > 5 {
            return Err(CreationError::SigFigExceedsMax);
        }
        Ok(())
    }
}
