//! `hdr_histogram` provides a High Dynamic Range histogram: recording and analysis of sampled
//! integer values across a large, configurable value range with configurable precision within
//! that range. The resulting histogram allows fast and accurate analysis of the extreme ranges of
//! data with non-normal distributions, like latency.
//!
//! # Precision and footprint
//!
//! A histogram is configured with the lowest value it can discern from zero, the highest value it
//! can track, and a number of significant decimal digits. Value quantization is bounded by that
//! number of digits across the whole range. For example, a histogram tracking `1` to
//! `3_600_000_000` with 3 significant digits could record response times from 1 microsecond to 1
//! hour with a resolution of 1 microsecond up to 1 millisecond, 1 millisecond (or better) up to 1
//! second, and still 3.6 seconds (or better) at its maximum of 1 hour.
//!
//! The memory footprint is fixed at construction and depends solely on range and precision, not
//! on how many samples are recorded. Recording computes the storage index directly, with no
//! searching and no allocation.
//!
//! # Recording samples
//!
//! ```
//! use hdr_histogram::Histogram;
//! let mut hist = Histogram::<u64>::new_with_bounds(1, 60 * 60 * 1000, 2).unwrap();
//!
//! // samples can be recorded using .record, which will error if the value is too large
//! hist.record(54321).expect("value 54321 should be in range");
//!
//! // for ergonomics, samples can also be recorded with +=
//! // this call will panic if the value is out of range!
//! hist += 54321;
//!
//! // if the code that generates the values is subject to Coordinated Omission,
//! // the self-correcting record method should be used instead.
//! // for example, if the expected sampling interval is 10 msec:
//! hist.record_correct(54321, 10).expect("value 54321 should be in range");
//! ```
//!
//! The counter type (`u64` above) can be `u16`, `u32` or `u64`. Narrower counters use less memory
//! at the risk of a slot overflowing when many samples land in the same bin. Slots wrap silently
//! when that happens; use `has_overflowed` to detect it after the fact.
//!
//! # Querying samples
//!
//! ```
//! use hdr_histogram::Histogram;
//! let mut hist = Histogram::<u64>::new_with_max(3_600_000_000, 3).unwrap();
//! hist.record(4).unwrap();
//! println!("# of samples: {}", hist.len());
//! println!("99.9'th percentile: {}", hist.value_at_percentile(99.9));
//! ```
//!
//! Several iterators are provided for getting an overview of the dataset. The simplest one is
//! `iter_recorded()`, which yields one item for every non-empty bin.
//!
//! ```
//! use hdr_histogram::Histogram;
//! let mut hist = Histogram::<u64>::new_with_max(1000, 2).unwrap();
//! hist.record_n(100, 5).unwrap();
//! for v in hist.iter_recorded() {
//!     println!("{}'th percentile of data is {} with {} samples",
//!         v.percentile(), v.value_iterated_to(), v.count_at_value());
//! }
//! ```
//!
//! # Persistence
//!
//! With the default `serialization` feature, histograms can be encoded into a compact binary form
//! (raw or zlib-compressed) and written into interval logs. See the `serialization` module.
//!
//! # Limitations
//!
//! Histograms are single-writer. There are no atomic or locked variants, and no `Recorder`
//! double-buffering helper. Values are `u64`; there is no floating point histogram.

#![deny(
    missing_docs,
    trivial_casts,
    unused_extern_crates,
    unused_import_braces
)]

use std::borrow::Borrow;
use std::cmp;
use std::ops::{AddAssign, Index};
use std::sync::atomic::{AtomicU64, Ordering};

use log::debug;

mod core;
pub mod errors;
pub mod iterators;
pub mod output;
#[cfg(feature = "serialization")]
pub mod serialization;

pub use crate::core::config::HistogramConfig;
pub use crate::core::counter::Counter;
pub use crate::errors::*;

/// Size of the fixed part of a histogram's footprint: configuration, derived constants and
/// bookkeeping.
const FOOTPRINT_OVERHEAD_BYTES: usize = 512;

/// Source of the process-wide histogram identity. Never reset.
static NEXT_IDENTITY: AtomicU64 = AtomicU64::new(0);

fn next_identity() -> u64 {
    NEXT_IDENTITY.fetch_add(1, Ordering::Relaxed)
}

/// `Histogram` is the core data structure in HdrHistogram. It records values, and performs
/// analytics.
///
/// At its heart, it keeps the count for recorded samples in "buckets" of values. The resolution
/// and distribution of these buckets is tuned based on the desired highest trackable value, as
/// well as the user-specified number of significant decimal digits to preserve. The values for the
/// buckets are kept in a way that resembles floats and doubles: there is a mantissa and an
/// exponent, and each bucket represents a different exponent. The "sub-buckets" within a bucket
/// represent different values for the mantissa.
///
/// To a first approximation, the sub-buckets of the first bucket would hold the values `0`, `1`,
/// `2`, `3`, …, the sub-buckets of the second bucket would hold `0`, `2`, `4`, `6`, …, the third
/// would hold `0`, `4`, `8`, and so on. However, the low half of each bucket (except bucket 0) is
/// unnecessary, since those values are already covered by the sub-buckets of all the preceeding
/// buckets. Thus, `Histogram` keeps the top half of every such bucket.
///
/// For the purposes of explanation, consider a `Histogram` with 2048 sub-buckets for every bucket,
/// and a lowest discernible value of 1:
///
/// <pre>
/// The 0th bucket covers 0...2047 in multiples of 1, using all 2048 sub-buckets
/// The 1st bucket covers 2048..4097 in multiples of 2, using only the top 1024 sub-buckets
/// The 2nd bucket covers 4096..8191 in multiple of 4, using only the top 1024 sub-buckets
/// ...
/// </pre>
///
/// Bucket 0 is "special" here. It is the only one that has 2048 entries. All the rest have
/// 1024 entries (because their bottom half overlaps with and is already covered by the all of
/// the previous buckets put together). In other words, the `k`'th bucket could represent `0 *
/// 2^k` to `2048 * 2^k` in 2048 buckets with `2^k` precision, but the midpoint of `1024 * 2^k
/// = 2048 * 2^(k-1)`, which is the k-1'th bucket's end. So, we would use the previous bucket
/// for those lower values as it has better precision.
#[derive(Debug)]
pub struct Histogram<T: Counter> {
    highest_trackable_value: u64,
    lowest_discernible_value: u64,
    significant_value_digits: u8,

    // in [1, 64]
    bucket_count: u8,
    // 2^(sub_bucket_half_count_magnitude + 1) in [2, 2^18]
    sub_bucket_count: u32,
    // sub_bucket_count / 2
    sub_bucket_half_count: u32,
    // In [0, 17]
    sub_bucket_half_count_magnitude: u8,
    // The bottom sub bucket's bits set, shifted by unit magnitude.
    // The highest bit will be (one-indexed) sub bucket count magnitude + unit_magnitude.
    sub_bucket_mask: u64,

    // Number of leading zeros that would be used by the largest value in bucket 0.
    // in [1, 63]
    leading_zero_count_base: u8,

    // Largest exponent of 2 that's smaller than the lowest discernible value. In [0, 62].
    unit_magnitude: u8,

    total_count: u64,
    start_timestamp: u64,
    end_timestamp: u64,
    tag: Option<String>,
    identity: u64,

    counts: Vec<T>,
}

// construction

impl<T: Counter> Histogram<T> {
    /// Construct a `Histogram` given a known maximum value to be tracked, and a number of
    /// significant decimal digits. The histogram will be constructed to implicitly track
    /// (distinguish from 0) values as low as 1.
    ///
    /// See `new_with_bounds` for info on `high` and `sigfig`.
    pub fn new_with_max(high: u64, sigfig: u8) -> Result<Histogram<T>, CreationError> {
        Self::new_with_bounds(1, high, sigfig)
    }

    /// Construct a `Histogram` with known upper and lower bounds for recorded sample values.
    ///
    /// `low` is the lowest value that can be discerned (distinguished from 0) by the histogram,
    /// and must be a positive integer that is >= 1. It may be internally rounded down to nearest
    /// power of 2. Providing a lowest discernible value (`low`) is useful is situations where the
    /// units used for the histogram's values are much smaller that the minimal accuracy required.
    /// E.g. when tracking time values stated in nanosecond units, where the minimal accuracy
    /// required is a microsecond, the proper value for `low` would be 1000. If you're not sure,
    /// use 1.
    ///
    /// `high` is the highest value to be tracked by the histogram, and must be a
    /// positive integer that is `>= (2 * low)`. If you're not sure, use `u64::max_value()`.
    ///
    /// `sigfig` Specifies the number of significant figures to maintain. This is the number of
    /// significant decimal digits to which the histogram will maintain value resolution and
    /// separation. Must be in the range [0, 5]. If you're not sure, use 3. As `sigfig` increases,
    /// memory usage grows exponentially, so choose carefully if there will be many histograms in
    /// memory at once or if storage is constrained.
    pub fn new_with_bounds(low: u64, high: u64, sigfig: u8) -> Result<Histogram<T>, CreationError> {
        Self::new_from_config(&HistogramConfig::new(low, high, sigfig))
    }

    /// Construct a `Histogram` from bounds kept in a `HistogramConfig`.
    pub fn new_from_config(config: &HistogramConfig) -> Result<Histogram<T>, CreationError> {
        config.validate()?;
        let low = config.lowest_discernible_value;
        let high = config.highest_trackable_value;
        let sigfig = config.significant_value_digits;

        // Given a 3 decimal point accuracy, the expectation is obviously for "+/- 1 unit at 1000".
        // It also means that it's "ok to be +/- 2 units at 2000". The "tricky" thing is that it is
        // NOT ok to be +/- 2 units at 1999. Only starting at 2000. So internally, we need to
        // maintain single unit resolution to 2x 10^decimal_points.

        // largest value with single unit resolution, in [2, 200_000].
        let largest = 2 * 10_u32.pow(u32::from(sigfig));

        // floor(log2(low)); low >= 1 so this is in [0, 62]
        let unit_magnitude = (63 - low.leading_zeros()) as u8;

        // ceil(log2(largest)), in [1, 18]
        let sub_bucket_count_magnitude = (32 - (largest - 1).leading_zeros()) as u8;
        let sub_bucket_half_count_magnitude = sub_bucket_count_magnitude - 1;
        let sub_bucket_count = 1_u32 << u32::from(sub_bucket_count_magnitude);

        if unit_magnitude + sub_bucket_count_magnitude > 63 {
            // sub_bucket_count entries can't be represented, with unit_magnitude applied, in a
            // u64. Technically it still sort of works if their sum is 64: you can represent all
            // but the last number in the shifted sub_bucket_count. However, the utility of such a
            // histogram vs ones whose magnitude here fits in 63 bits is debatable, and it makes it
            // harder to work through the logic. Sums larger than 64 are totally broken as you
            // can't even shift a 1 to be the highest bit.
            return Err(CreationError::CannotRepresentSigFigBeyondLow);
        }

        let sub_bucket_half_count = sub_bucket_count / 2;
        // sub_bucket_count is always at least 2, so subtraction won't underflow
        let sub_bucket_mask = (u64::from(sub_bucket_count) - 1) << unit_magnitude;

        let bucket_count = buckets_to_cover(high, sub_bucket_count, unit_magnitude);
        let counts_len = (usize::from(bucket_count) + 1)
            .checked_mul(sub_bucket_half_count as usize)
            .ok_or(CreationError::UsizeTypeTooSmall)?;

        Ok(Histogram {
            highest_trackable_value: high,
            lowest_discernible_value: low,
            significant_value_digits: sigfig,

            bucket_count,
            sub_bucket_count,
            sub_bucket_half_count,
            sub_bucket_half_count_magnitude,
            sub_bucket_mask,
            leading_zero_count_base: 64 - unit_magnitude - sub_bucket_count_magnitude,

            unit_magnitude,

            total_count: 0,
            start_timestamp: 0,
            end_timestamp: 0,
            tag: None,
            identity: next_identity(),

            counts: vec![T::zero(); counts_len],
        })
    }

    /// Construct an empty `Histogram` with the same dimensions as `source`.
    ///
    /// The counter type may differ. Timestamps and tag are not carried over.
    pub fn new_from<F: Counter>(source: &Histogram<F>) -> Histogram<T> {
        Histogram {
            highest_trackable_value: source.highest_trackable_value,
            lowest_discernible_value: source.lowest_discernible_value,
            significant_value_digits: source.significant_value_digits,

            bucket_count: source.bucket_count,
            sub_bucket_count: source.sub_bucket_count,
            sub_bucket_half_count: source.sub_bucket_half_count,
            sub_bucket_half_count_magnitude: source.sub_bucket_half_count_magnitude,
            sub_bucket_mask: source.sub_bucket_mask,
            leading_zero_count_base: source.leading_zero_count_base,

            unit_magnitude: source.unit_magnitude,

            total_count: 0,
            start_timestamp: 0,
            end_timestamp: 0,
            tag: None,
            identity: next_identity(),

            counts: vec![T::zero(); source.counts.len()],
        }
    }
}

/// Number of buckets needed so that the top bucket can hold `value`.
///
/// Shared between construction and encoding, where it sizes the relevant prefix of the counts.
fn buckets_to_cover(value: u64, sub_bucket_count: u32, unit_magnitude: u8) -> u8 {
    // the k'th bucket can express from 0 * 2^k to sub_bucket_count * 2^k in units of 2^k
    let mut smallest_untrackable_value = u64::from(sub_bucket_count) << unit_magnitude;

    // always have at least 1 bucket
    let mut buckets_needed = 1;
    while smallest_untrackable_value <= value {
        if smallest_untrackable_value > u64::max_value() / 2 {
            // next shift will overflow, meaning that bucket could represent values up to ones
            // greater than u64::max_value, so it's the last bucket
            return buckets_needed + 1;
        }
        smallest_untrackable_value <<= 1;
        buckets_needed += 1;
    }
    buckets_needed
}

// accessors

impl<T: Counter> Histogram<T> {
    /// Get the current number of distinct values that can be represented in the histogram.
    ///
    /// This is the length of the counts array.
    pub fn distinct_values(&self) -> usize {
        self.counts.len()
    }

    /// Get the lowest discernible value for the histogram in its current configuration.
    pub fn low(&self) -> u64 {
        self.lowest_discernible_value
    }

    /// Get the highest trackable value for the histogram in its current configuration.
    pub fn high(&self) -> u64 {
        self.highest_trackable_value
    }

    /// Get the number of significant value digits kept by this histogram.
    pub fn sigfig(&self) -> u8 {
        self.significant_value_digits
    }

    /// The bounds this histogram was created with.
    pub fn config(&self) -> HistogramConfig {
        HistogramConfig::new(
            self.lowest_discernible_value,
            self.highest_trackable_value,
            self.significant_value_digits,
        )
    }

    /// Get the total number of samples recorded.
    pub fn len(&self) -> u64 {
        self.total_count
    }

    /// Returns true if this histogram has no recorded values.
    pub fn is_empty(&self) -> bool {
        self.total_count == 0
    }

    /// Get the number of buckets used by the histogram to cover the highest trackable value.
    ///
    /// This method differs from `.len()` in that it does not count the sub buckets within each
    /// bucket.
    pub fn buckets(&self) -> u8 {
        self.bucket_count
    }

    /// Get the number of sub buckets in each bucket.
    pub fn sub_buckets(&self) -> u32 {
        self.sub_bucket_count
    }

    /// Start of the recording period, in milliseconds since the epoch. Set by the caller.
    pub fn start_timestamp(&self) -> u64 {
        self.start_timestamp
    }

    /// Set the start of the recording period, in milliseconds since the epoch.
    pub fn set_start_timestamp(&mut self, millis: u64) {
        self.start_timestamp = millis;
    }

    /// End of the recording period, in milliseconds since the epoch. Set by the caller.
    pub fn end_timestamp(&self) -> u64 {
        self.end_timestamp
    }

    /// Set the end of the recording period, in milliseconds since the epoch.
    pub fn set_end_timestamp(&mut self, millis: u64) {
        self.end_timestamp = millis;
    }

    /// Optional label, written alongside the histogram in interval logs.
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Replace the label.
    pub fn set_tag(&mut self, tag: Option<String>) {
        self.tag = tag;
    }

    /// Process-wide unique id, assigned in increasing order as histograms are created, copied or
    /// decoded.
    pub fn identity(&self) -> u64 {
        self.identity
    }

    /// Rough memory use of this histogram: a fixed overhead plus one counter word per slot.
    pub fn estimated_footprint_in_bytes(&self) -> usize {
        FOOTPRINT_OVERHEAD_BYTES + T::WORD_SIZE * self.counts.len()
    }

    /// Bytes needed to hold the raw encoding of this histogram with every slot present.
    ///
    /// Encoding writes at most this many bytes.
    pub fn needed_byte_buffer_capacity(&self) -> usize {
        encoded_header_len() + T::WORD_SIZE * self.counts.len()
    }

    /// Number of leading slots that must be encoded to include the largest recorded value.
    pub(crate) fn relevant_len(&self) -> usize {
        let buckets = usize::from(buckets_to_cover(
            self.max(),
            self.sub_bucket_count,
            self.unit_magnitude,
        ));
        cmp::min(
            self.counts.len(),
            (buckets + 1) * self.sub_bucket_half_count as usize,
        )
    }
}

const fn encoded_header_len() -> usize {
    // cookie, digits, lowest, highest, total
    4 + 4 + 8 + 8 + 8
}

// recording

impl<T: Counter> Histogram<T> {
    /// Record `value` in the histogram.
    ///
    /// Returns an error if `value` exceeds the highest trackable value.
    pub fn record(&mut self, value: u64) -> Result<(), RecordError> {
        self.record_n(value, T::one())
    }

    /// Record multiple samples for a value in the histogram, adding to the value's current count.
    ///
    /// `count` is the number of occurrences of this value to record.
    ///
    /// Returns an error if `value` exceeds the highest trackable value. A slot that overflows its
    /// counter type wraps around; see `has_overflowed`.
    pub fn record_n(&mut self, value: u64, count: T) -> Result<(), RecordError> {
        self.record_n_wide(value, count.as_u64())
    }

    /// Record a count that may be wider than `T`. The slot keeps only the low bits of `count`
    /// while the total takes all of it, so a wrapped slot shows up in `has_overflowed`.
    fn record_n_wide(&mut self, value: u64, count: u64) -> Result<(), RecordError> {
        let index = self.index_for(value).ok_or(RecordError::ValueOutOfRange)?;
        let slot = &mut self.counts[index];
        *slot = slot.wrapping_add(&T::truncate_from_u64(count));
        self.total_count = self.total_count.wrapping_add(count);
        Ok(())
    }

    /// Record a value in the histogram while correcting for coordinated omission.
    ///
    /// See `record_n_correct` for further documentation.
    pub fn record_correct(&mut self, value: u64, interval: u64) -> Result<(), RecordError> {
        self.record_n_correct(value, T::one(), interval)
    }

    /// Record multiple values in the histogram while correcting for coordinated omission.
    ///
    /// To compensate for the loss of sampled values when a recorded value is larger than the
    /// expected interval between value samples, this method will auto-generate and record an
    /// additional series of decreasingly-smaller (down to `interval`) value records.
    ///
    /// Note: This is a at-recording correction method, as opposed to the post-recording correction
    /// method provided by `clone_correct`. The two methods are mutually exclusive, and only one of
    /// the two should be be used on a given data set to correct for the same coordinated omission
    /// issue.
    ///
    /// An interval of 0 disables the correction.
    pub fn record_n_correct(&mut self, value: u64, count: T, interval: u64) -> Result<(), RecordError> {
        self.record_n_correct_wide(value, count.as_u64(), interval)
    }

    fn record_n_correct_wide(
        &mut self,
        value: u64,
        count: u64,
        interval: u64,
    ) -> Result<(), RecordError> {
        self.record_n_wide(value, count)?;
        if interval == 0 || value <= interval {
            return Ok(());
        }

        let mut missing_value = value - interval;
        while missing_value >= interval {
            self.record_n_wide(missing_value, count)?;
            missing_value -= interval;
        }

        Ok(())
    }

    /// Reset the contents and statistics of this histogram, preserving configuration, timestamps
    /// and tag.
    pub fn reset(&mut self) {
        for c in self.counts.iter_mut() {
            *c = T::zero();
        }
        self.total_count = 0;
    }

    /// Determine if any slot has wrapped around its counter type.
    ///
    /// This walks the whole counts array, so it is not meant for the recording path.
    pub fn has_overflowed(&self) -> bool {
        let mut sum = 0_u64;
        for c in &self.counts {
            match sum.checked_add(c.as_u64()) {
                Some(s) => sum = s,
                None => return true,
            }
        }
        sum != self.total_count
    }

    /// Recompute the total count by summing the counts array.
    ///
    /// Gives a self-consistent view after `has_overflowed` reports trouble, at the cost of
    /// whatever counts were lost to wraparound.
    pub fn reestablish_total_count(&mut self) {
        self.total_count = self
            .counts
            .iter()
            .fold(0_u64, |total, c| total.wrapping_add(c.as_u64()));
    }
}

// adding and copying

impl<T: Counter> Histogram<T> {
    /// Add the contents of another histogram to this one.
    ///
    /// Returns an error if values in the other histogram cannot be stored; see `AdditionError`.
    ///
    /// When both histograms have the same dimensions the counts are summed slot by slot.
    /// Otherwise every non-empty slot of `source` is re-recorded here at its value.
    pub fn add<B: Borrow<Histogram<U>>, U: Counter>(&mut self, source: B) -> Result<(), AdditionError> {
        let source = source.borrow();

        if source.highest_trackable_value > self.highest_trackable_value {
            return Err(AdditionError::OtherHighestExceedsRange);
        }

        if self.bucket_count == source.bucket_count
            && self.sub_bucket_count == source.sub_bucket_count
            && self.unit_magnitude == source.unit_magnitude
        {
            // Counts arrays are of the same length and meaning,
            // so we can just iterate and add directly:
            for (slot, other) in self.counts.iter_mut().zip(source.counts.iter()) {
                let other = other.as_u64();
                if other != 0 {
                    *slot = slot.wrapping_add(&T::truncate_from_u64(other));
                }
            }
            self.total_count = self.total_count.wrapping_add(source.total_count);
            return Ok(());
        }

        debug!(
            "re-recording {} values from a histogram with a different layout",
            source.total_count
        );
        // Arrays are not a direct match, so we can't just stream through and add them. Instead,
        // go through the array and add each non-zero value found at its proper value:
        for (index, other) in source.counts.iter().enumerate() {
            let other = other.as_u64();
            if other != 0 {
                self.record_n_wide(source.value_for(index), other)?;
            }
        }

        Ok(())
    }

    /// Add the contents of another histogram to this one, while correcting for coordinated
    /// omission.
    ///
    /// Each recorded value in `source` is re-recorded with `record_n_correct`. This is the
    /// post-recording correction; do not combine it with `record_correct` on the same data.
    pub fn add_correct<B: Borrow<Histogram<U>>, U: Counter>(
        &mut self,
        source: B,
        interval: u64,
    ) -> Result<(), RecordError> {
        let source = source.borrow();
        for v in source.iter_recorded() {
            let count = v.count_at_value().as_u64();
            self.record_n_correct_wide(v.value_iterated_to(), count, interval)?;
        }
        Ok(())
    }

    /// A deep copy of this histogram. Same as `clone`.
    pub fn copy(&self) -> Histogram<T> {
        self.clone()
    }

    /// Get a copy of this histogram, corrected for coordinated omission.
    ///
    /// To compensate for the loss of sampled values when a recorded value is larger than the
    /// expected interval between value samples, the new histogram will include an auto-generated
    /// additional series of decreasingly-smaller (down to the `interval`) value records for each
    /// count found in the current histogram that is larger than the `interval`.
    ///
    /// Note: This is a post-correction method, as opposed to the at-recording correction method
    /// provided by `record_correct`. The two methods are mutually exclusive, and only one of the
    /// two should be be used on a given data set to correct for the same coordinated omission
    /// issue.
    pub fn clone_correct(&self, interval: u64) -> Histogram<T> {
        let mut h = Histogram::new_from(self);
        for v in self.iter_recorded() {
            h.record_n_correct(v.value_iterated_to(), v.count_at_value(), interval)
                .expect("Same dimensions; all values should be representable.");
        }
        h
    }

    /// Overwrite `target` with a coordinated-omission corrected copy of this histogram.
    ///
    /// `target` keeps its own dimensions and takes this histogram's timestamps.
    pub fn copy_into_correct<U: Counter>(
        &self,
        target: &mut Histogram<U>,
        interval: u64,
    ) -> Result<(), RecordError> {
        target.reset();
        target.add_correct(self, interval)?;
        target.start_timestamp = self.start_timestamp;
        target.end_timestamp = self.end_timestamp;
        Ok(())
    }
}

impl<T: Counter> Clone for Histogram<T> {
    /// Copies counts, timestamps and tag. The copy gets its own identity.
    fn clone(&self) -> Self {
        let mut h = Histogram::new_from(self);
        h.counts.copy_from_slice(&self.counts);
        h.total_count = self.total_count;
        h.start_timestamp = self.start_timestamp;
        h.end_timestamp = self.end_timestamp;
        h.tag = self.tag.clone();
        h
    }
}

impl<'a, T: Counter, U: Counter> AddAssign<&'a Histogram<U>> for Histogram<T> {
    /// Panics if `source` does not fit; see `add`.
    fn add_assign(&mut self, source: &'a Histogram<U>) {
        self.add(source).expect("source histogram does not fit");
    }
}

impl<T: Counter> AddAssign<u64> for Histogram<T> {
    /// Panics if `value` is out of range; see `record`.
    fn add_assign(&mut self, value: u64) {
        self.record(value).expect("value out of range");
    }
}

impl<T: Counter, F: Counter> PartialEq<Histogram<F>> for Histogram<T> {
    /// Equal when configuration, total count and every slot match. Timestamps, tag and identity
    /// are not compared.
    fn eq(&self, other: &Histogram<F>) -> bool {
        if self.lowest_discernible_value != other.lowest_discernible_value
            || self.highest_trackable_value != other.highest_trackable_value
            || self.significant_value_digits != other.significant_value_digits
        {
            return false;
        }
        if self.total_count != other.total_count || self.counts.len() != other.counts.len() {
            return false;
        }
        self.counts
            .iter()
            .zip(other.counts.iter())
            .all(|(a, b)| a.as_u64() == b.as_u64())
    }
}

impl<T: Counter> Index<usize> for Histogram<T> {
    type Output = T;

    /// Count at a raw counts array index.
    fn index(&self, index: usize) -> &T {
        &self.counts[index]
    }
}

// iterators

impl<T: Counter> Histogram<T> {
    /// Iterate through histogram values by percentile levels.
    ///
    /// The iteration mechanic for this iterator may appear somewhat confusing, but it yields
    /// fairly pleasing output. The iterator starts with a *percentile step size* of
    /// `100/ticks_per_half_distance`. It will continue to take steps of that size until it
    /// reaches 50%. At that point, the step size is halved, and it continues until it is half way
    /// to 100%, the step size is halved again, and so on. The final step always reaches 100%.
    ///
    /// Each step yields the highest value reached and the percentile level it was reached at.
    ///
    /// Panics if `ticks_per_half_distance` is 0.
    pub fn iter_percentiles(
        &self,
        ticks_per_half_distance: u32,
    ) -> iterators::HistogramIterator<T, iterators::percentile::Iter<T>> {
        iterators::percentile::Iter::new(self, ticks_per_half_distance)
    }

    /// Iterates through histogram values using linear value steps. The iteration is performed in
    /// steps of size `step`, each one yielding the count for all values in the preceeding value
    /// range of size `step`. The iterator terminates when all recorded histogram values are
    /// exhausted.
    ///
    /// Panics if `step` is 0.
    pub fn iter_linear(&self, step: u64) -> iterators::HistogramIterator<T, iterators::linear::Iter<T>> {
        iterators::linear::Iter::new(self, step)
    }

    /// Iterates through histogram values at logarithmically increasing levels. The iteration is
    /// performed in steps that start at `start` and increase exponentially according to `exp`.
    /// The iterator terminates when all recorded histogram values are exhausted.
    ///
    /// Panics if `start` is 0 or `exp` is not greater than 1.
    pub fn iter_log(&self, start: u64, exp: f64) -> iterators::HistogramIterator<T, iterators::log::Iter<T>> {
        iterators::log::Iter::new(self, start, exp)
    }

    /// Iterates through all recorded histogram values using the finest granularity steps
    /// supported by the underlying representation. The iteration steps through all non-zero
    /// recorded value counts, and terminates when all recorded histogram values are exhausted.
    pub fn iter_recorded(&self) -> iterators::HistogramIterator<T, iterators::recorded::Iter> {
        iterators::recorded::Iter::new(self)
    }

    /// Iterates through all histogram values using the finest granularity steps supported by the
    /// underlying representation. The iteration steps through all possible unit value levels,
    /// regardless of whether or not there were recorded values for that value level, and
    /// terminates when all slots have been visited.
    pub fn iter_all(&self) -> iterators::HistogramIterator<T, iterators::all::Iter> {
        iterators::all::Iter::new(self)
    }
}

// minimum, maximum, and statistics

impl<T: Counter> Histogram<T> {
    /// Get the lowest recorded value level in the histogram.
    /// If the histogram has no recorded values, the value returned will be 0.
    pub fn min(&self) -> u64 {
        if self.total_count == 0 || self.counts[0] != T::zero() {
            0
        } else {
            self.min_nz()
        }
    }

    /// Get the lowest recorded non-zero value level in the histogram.
    /// If the histogram has no recorded values, the value returned is `u64::max_value()`.
    pub fn min_nz(&self) -> u64 {
        self.iter_recorded()
            .map(|v| self.lowest_equivalent(v.value_iterated_to()))
            .find(|&v| v != 0)
            .unwrap_or_else(u64::max_value)
    }

    /// Get the highest recorded value level in the histogram.
    /// If the histogram has no recorded values, the value returned is undefined.
    pub fn max(&self) -> u64 {
        self.iter_recorded()
            .last()
            .map(|v| self.highest_equivalent(v.value_iterated_to()))
            .unwrap_or(0)
    }

    /// Get the computed mean value of all recorded values in the histogram.
    ///
    /// Each slot contributes its median equivalent value. Returns 0 for an empty histogram.
    pub fn mean(&self) -> f64 {
        if self.total_count == 0 {
            return 0.0;
        }
        let total_value = self
            .iter_recorded()
            .last()
            .map(|v| v.total_value_to_this_value())
            .unwrap_or(0);
        total_value as f64 / self.total_count as f64
    }

    /// Get the computed standard deviation of all recorded values in the histogram
    pub fn stdev(&self) -> f64 {
        if self.total_count == 0 {
            return 0.0;
        }

        let mean = self.mean();
        let geom_dev_tot = self.iter_recorded().fold(0.0_f64, |gdt, v| {
            let dev = self.median_equivalent(v.value_iterated_to()) as f64 - mean;
            gdt + (dev * dev) * v.count_since_last_iteration() as f64
        });

        (geom_dev_tot / self.total_count as f64).sqrt()
    }

    /// Get the value at a given percentile.
    ///
    /// This is simply `value_at_quantile` multiplied by 100.0. For best floating-point precision,
    /// use `value_at_quantile` directly.
    pub fn value_at_percentile(&self, percentile: f64) -> u64 {
        self.value_at_quantile(percentile / 100.0)
    }

    /// Get the value at a given quantile.
    ///
    /// When the given quantile is > 0.0, the value returned is the value that the given
    /// percentage of the overall recorded value entries in the histogram are either smaller than
    /// or equivalent to. When the given quantile is 0.0, the value returned is the value that all
    /// value entries in the histogram are either larger than or equivalent to.
    ///
    /// Two values are considered "equivalent" if `self.equivalent` would return true.
    ///
    /// Quantiles above 1.0 are treated as 1.0. An empty histogram returns 0.
    pub fn value_at_quantile(&self, quantile: f64) -> u64 {
        if self.total_count == 0 {
            return 0;
        }

        // Cap at 1.0
        let quantile = if quantile > 1.0 { 1.0 } else { quantile };

        let fractional_count = quantile * self.total_count as f64;
        // round to nearest, and always look for at least one count
        let count_at_quantile = cmp::max((fractional_count + 0.5) as u64, 1);

        // Bucket 0 fills the first sub_bucket_count slots; every later bucket contributes only
        // its upper half. Walking the counts array in index order is therefore the bucket by
        // bucket, sub bucket by sub bucket scan in increasing value order.
        let mut total_to_current_index = 0_u64;
        for (i, c) in self.counts.iter().enumerate() {
            total_to_current_index = total_to_current_index.saturating_add(c.as_u64());
            if total_to_current_index >= count_at_quantile {
                return self.highest_equivalent(self.value_for(i));
            }
        }

        0
    }

    /// Get the percentile of samples at and below a given value.
    ///
    /// This is simply `quantile_below` multiplied by 100.0.
    pub fn percentile_below(&self, value: u64) -> f64 {
        self.quantile_below(value) * 100.0
    }

    /// Get the quantile of samples at and below a given value.
    ///
    /// The value returned is the fraction of recorded samples that are either smaller than or
    /// equivalent to `value`. Values beyond the tracked range, and every value of an empty
    /// histogram, give 1.0.
    pub fn quantile_below(&self, value: u64) -> f64 {
        if self.total_count == 0 {
            return 1.0;
        }

        let target_index = match self.index_for(value) {
            Some(i) => i,
            None => return 1.0,
        };
        let total_to_current_index = self.counts[..=target_index]
            .iter()
            .fold(0_u64, |t, c| t.saturating_add(c.as_u64()));

        total_to_current_index as f64 / self.total_count as f64
    }

    /// Get the count of recorded values within a range of value levels (inclusive to within the
    /// histogram's resolution).
    ///
    /// `low` gives the lower value bound on the range for which to provide the recorded count.
    /// Will be rounded down with `lowest_equivalent`. Similarly, `high` gives the higher value
    /// bound on the range, and will be rounded up with `highest_equivalent`. The function
    /// returns the total count of values recorded in the histogram within the value range that is
    /// `>= lowest_equivalent(low)` and `<= highest_equivalent(high)`.
    ///
    /// Returns an error if either bound is beyond the tracked range. An inverted range counts 0.
    pub fn count_between(&self, low: u64, high: u64) -> Result<u64, QueryError> {
        let low_index = self.index_for(low).ok_or(QueryError::ValueOutOfRange)?;
        let high_index = self.index_for(high).ok_or(QueryError::ValueOutOfRange)?;
        if low_index > high_index {
            return Ok(0);
        }

        Ok(self.counts[low_index..=high_index]
            .iter()
            .fold(0_u64, |t, c| t.saturating_add(c.as_u64())))
    }

    /// Get the count of recorded values at a specific value (to within the histogram resolution
    /// at the value level).
    ///
    /// The count is computed across values recorded with `record` and friends that are
    /// `equivalent` to `value`. Returns an error if `value` is beyond the tracked range.
    pub fn count_at(&self, value: u64) -> Result<T, QueryError> {
        self.index_for(value)
            .map(|i| self.counts[i])
            .ok_or(QueryError::ValueOutOfRange)
    }
}

// value equivalence and index math

impl<T: Counter> Histogram<T> {
    /// Get the lowest value that is equivalent to the given value within the histogram's
    /// resolution. Equivalent here means that value samples recorded for any two equivalent
    /// values are counted in a common total count.
    pub fn lowest_equivalent(&self, value: u64) -> u64 {
        let bucket_index = self.bucket_for(value);
        let sub_bucket_index = self.sub_bucket_for(value, bucket_index);
        self.value_from_loc(bucket_index, sub_bucket_index)
    }

    /// Get the highest value that is equivalent to the given value within the histogram's
    /// resolution. Equivalent here means that value samples recorded for any two equivalent
    /// values are counted in a common total count.
    ///
    /// This is `next_non_equivalent(value) - 1`, except in the top slot of a histogram that
    /// reaches `u64::max_value()`, where it is `u64::max_value()`.
    pub fn highest_equivalent(&self, value: u64) -> u64 {
        // lowest + range never exceeds 2^64, so this can saturate by at most one
        self.lowest_equivalent(value)
            .saturating_add(self.equivalent_range(value) - 1)
    }

    /// Get a value that lies in the middle (rounded up) of the range of values equivalent the
    /// given value. Equivalent here means that value samples recorded for any two equivalent
    /// values are counted in a common total count.
    pub fn median_equivalent(&self, value: u64) -> u64 {
        // adding half of the range to the bottom of the range shouldn't overflow
        self.lowest_equivalent(value)
            .saturating_add(self.equivalent_range(value) >> 1)
    }

    /// Get the next value that is *not* equivalent to the given value within the histogram's
    /// resolution. Equivalent means that value samples recorded for any two equivalent values are
    /// counted in a common total count.
    ///
    /// Saturates at `u64::max_value()`.
    pub fn next_non_equivalent(&self, value: u64) -> u64 {
        self.lowest_equivalent(value)
            .saturating_add(self.equivalent_range(value))
    }

    /// Get the size (in value units) of the range of values that are equivalent to the given value
    /// within the histogram's resolution. Equivalent here means that value samples recorded for
    /// any two equivalent values are counted in a common total count.
    pub fn equivalent_range(&self, value: u64) -> u64 {
        let bucket_index = self.bucket_for(value);
        let sub_bucket_index = self.sub_bucket_for(value, bucket_index);
        // calculate distance to next value
        1_u64
            << (self.unit_magnitude
                + if sub_bucket_index >= self.sub_bucket_count {
                    bucket_index + 1
                } else {
                    bucket_index
                })
    }

    /// Determine if two values are equivalent with the histogram's resolution. Equivalent here
    /// means that value samples recorded for any two equivalent values are counted in a common
    /// total count.
    pub fn equivalent(&self, value1: u64, value2: u64) -> bool {
        self.lowest_equivalent(value1) == self.lowest_equivalent(value2)
    }

    /// Compute the lowest (and therefore highest precision) bucket index whose sub-buckets can
    /// represent the value.
    #[inline]
    pub fn bucket_for(&self, value: u64) -> u8 {
        // Calculates the number of powers of two by which the value is greater than the biggest
        // value that fits in bucket 0. This is the bucket index since each successive bucket can
        // hold a value 2x greater. The mask maps small values to bucket 0.
        // Will not underflow because sub_bucket_mask caps the leading zeros to no more than
        // leading_zero_count_base.
        self.leading_zero_count_base - (value | self.sub_bucket_mask).leading_zeros() as u8
    }

    /// Compute the position inside a bucket at which the given value should be recorded, indexed
    /// from position 0 in the bucket (in the first (lower) half, which is unused except in bucket
    /// 0).
    #[inline]
    pub fn sub_bucket_for(&self, value: u64, bucket_index: u8) -> u32 {
        // Since bucket_index is simply how many powers of 2 greater value is than what will fit
        // in bucket 0 (that is, what will fit in [0, sub_bucket_count)), we shift off that many
        // powers of two, and end up with a number in [0, sub_bucket_count).
        // For bucket_index 0, this is just value. For bucket index k > 0, we know value won't fit
        // in bucket (k - 1) by definition, so this calculation won't end up in the lower half of
        // [0, sub_bucket_count) because that would mean it would also fit in bucket (k - 1).
        // As unit magnitude grows, the maximum possible bucket index should shrink because it is
        // based off of sub_bucket_mask, so this shouldn't lead to an overlarge shift.
        (value >> (bucket_index + self.unit_magnitude)) as u32
    }

    /// Linear counts array index for a bucket and a sub bucket within it.
    ///
    /// Bucket 0 uses sub buckets `[0, sub_bucket_count)`; every other bucket only stores its
    /// upper half `[sub_bucket_half_count, sub_bucket_count)`.
    pub fn counts_array_index(&self, bucket_index: u8, sub_bucket_index: u32) -> usize {
        debug_assert!(sub_bucket_index < self.sub_bucket_count);
        debug_assert!(bucket_index == 0 || (sub_bucket_index >= self.sub_bucket_half_count));

        // Calculate the index for the first entry that will be used in the bucket (halfway
        // through sub_bucket_count). For bucket_index 0, all sub_bucket_count entries may be
        // used, but bucket_base_index is still set in the middle.
        let bucket_base_index =
            (usize::from(bucket_index) + 1) << self.sub_bucket_half_count_magnitude;

        // Calculate the offset in the bucket. This subtraction will result in a positive value
        // in all buckets except the 0th bucket (since a value in that bucket may be less than
        // half the bucket's 0 to sub_bucket_count range). However, this works out since we give
        // bucket 0 twice as much space.
        bucket_base_index + sub_bucket_index as usize - self.sub_bucket_half_count as usize
    }

    /// Compute the counts array index for `value`, or `None` if it does not fit.
    #[inline]
    fn index_for(&self, value: u64) -> Option<usize> {
        let bucket_index = self.bucket_for(value);
        let sub_bucket_index = self.sub_bucket_for(value, bucket_index);
        let index = self.counts_array_index(bucket_index, sub_bucket_index);
        if index < self.counts.len() {
            Some(index)
        } else {
            None
        }
    }

    /// Compute the lowest value that maps to a counts array index. Indices beyond the counts array
    /// produce the value the next slot would have had.
    pub fn value_for(&self, index: usize) -> u64 {
        // Dividing by sub bucket half count will yield 1 in top half of first bucket, 2 in
        // in the top half (i.e., the only half that's used) of the 2nd bucket, etc, so subtract 1
        // to get 0-indexed bucket indexes. This will be -1 for the bottom half of the first
        // bucket.
        let mut bucket_index = (index >> self.sub_bucket_half_count_magnitude) as isize - 1;

        // Calculate the remainder of dividing by sub_bucket_half_count, shifted into the top half
        // of the corresponding bucket. This will (temporarily) map indexes in the lower half of
        // first bucket into the top half.
        let mut sub_bucket_index =
            ((index as u32) & (self.sub_bucket_half_count - 1)) + self.sub_bucket_half_count;
        if bucket_index < 0 {
            // lower half of first bucket case; move sub bucket index back
            sub_bucket_index -= self.sub_bucket_half_count;
            bucket_index = 0;
        }
        self.value_from_loc(bucket_index as u8, sub_bucket_index)
    }

    /// Compute the value corresponding to the provided bucket and sub bucket indices.
    /// The indices given must map to an actual u64; providing contrived indices that would map to
    /// a value larger than u64::max_value() will saturate.
    #[inline]
    pub fn value_from_loc(&self, bucket_index: u8, sub_bucket_index: u32) -> u64 {
        let shift = u32::from(bucket_index) + u32::from(self.unit_magnitude);
        let value = u64::from(sub_bucket_index);
        match value.checked_shl(shift) {
            Some(shifted) if shifted >> shift == value => shifted,
            _ => u64::max_value(),
        }
    }
}

#[path = "tests/tests.rs"]
#[cfg(test)]
mod tests;
