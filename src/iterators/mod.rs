//! Iterators over the steps of a histogram.
//!
//! Every iterator walks the counts array in increasing value order. They differ only in when a
//! step is complete and yielded; that choice is made by a `PickyIterator`.

use crate::core::counter::Counter;
use crate::Histogram;

/// An iterator that iterates over histogram quantiles.
pub mod percentile;

/// An iterator that iterates linearly over histogram values.
pub mod linear;

/// An iterator that iterates logarithmically over histogram values.
pub mod log;

/// An iterator that iterates over recorded histogram values.
pub mod recorded;

/// An iterator that iterates over histogram values.
pub mod all;

/// Extra information about the picked point in the histogram provided by the picker.
pub struct PickMetadata {
    /// Supply the percentile iterated to in the last `pick()`, if the picker can supply a more
    /// precise value than the percentile of the running total.
    percentile_iterated_to: Option<f64>,

    /// Supply the value iterated to in the last `pick()`, if the picker can supply a more precise
    /// value than the highest equivalent value of the current index.
    value_iterated_to: Option<u64>,
}

impl PickMetadata {
    fn new(percentile_iterated_to: Option<f64>, value_iterated_to: Option<u64>) -> PickMetadata {
        PickMetadata {
            percentile_iterated_to,
            value_iterated_to,
        }
    }
}

/// A trait for designing an subset iterator over values in a `Histogram`.
pub trait PickyIterator<T: Counter> {
    /// Return `Some` if an `IterationValue` should be emitted at this point.
    ///
    /// `index` is a valid index in the relevant histogram.
    ///
    /// This will be called with the same index until it returns `None`. This enables modes of
    /// iteration that pick different values represented by the same bucket, for instance.
    fn pick(&mut self, index: usize, total_count_to_index: u64, count_at_index: T) -> Option<PickMetadata>;

    /// Should we keep iterating even though the last index with non-zero count has already been
    /// picked at least once?
    ///
    /// This will be called on every iteration once the last index with non-zero count has been
    /// picked, even if the index was not advanced in the last iteration (because `pick()` returned
    /// `Some`).
    fn more(&mut self, index_to_pick: usize) -> bool;
}

/// `HistogramIterator` provides a base iterator for a `Histogram`.
///
/// It will iterate over all discrete values until there are no more recorded values (i.e. *not*
/// necessarily until all bins have been exhausted). To facilitate the development of more
/// sophisticated iterators, a *picker* is also provided, which is allowed to only select some bins
/// that should be yielded. The picker may also extend the iteration to include a suffix of empty
/// bins.
pub struct HistogramIterator<'a, T: 'a + Counter, P: PickyIterator<T>> {
    hist: &'a Histogram<T>,
    total_count_to_index: u64,
    total_value_to_index: u128,
    count_since_last_iteration: u64,
    value_iterated_from: u64,
    current_index: usize,
    last_picked_index: Option<usize>,
    max_value_index: Option<usize>,
    fresh: bool,
    ended: bool,
    lookahead: Option<IterationValue<T>>,
    picker: P,
}

/// The value emitted at each step when iterating over a `Histogram`.
#[derive(Debug, PartialEq)]
pub struct IterationValue<T: Counter> {
    value_iterated_to: u64,
    value_iterated_from: u64,
    percentile: f64,
    percentile_iterated_to: f64,
    count_at_value: T,
    count_since_last_iteration: u64,
    total_count_to_this_value: u64,
    total_value_to_this_value: u128,
    is_last: bool,
}

impl<T: Counter> IterationValue<T> {
    /// The value iterated to. Some iterators provide a specific value inside the bucket, while
    /// others just use the highest value in the bucket.
    pub fn value_iterated_to(&self) -> u64 {
        self.value_iterated_to
    }

    /// The value iterated to by the previous step, or 0 for the first step.
    pub fn value_iterated_from(&self) -> u64 {
        self.value_iterated_from
    }

    /// Percent of recorded values that are at or below the current bucket.
    /// This is simply the quantile multiplied by 100.0, so if you care about maintaining the best
    /// floating-point precision, use `quantile()` instead.
    pub fn percentile(&self) -> f64 {
        self.percentile
    }

    /// Quantile of recorded values that are at or below the current bucket.
    pub fn quantile(&self) -> f64 {
        self.percentile / 100.0
    }

    /// Percentile level iterated to. Percentile iterators report the level they stepped to, which
    /// may be lower than `percentile()`; other iterators report `percentile()`.
    pub fn percentile_iterated_to(&self) -> f64 {
        self.percentile_iterated_to
    }

    /// Quantile level iterated to; see `percentile_iterated_to`.
    pub fn quantile_iterated_to(&self) -> f64 {
        self.percentile_iterated_to / 100.0
    }

    /// Recorded count for values equivalent to `value_iterated_to`.
    pub fn count_at_value(&self) -> T {
        self.count_at_value
    }

    /// Number of values traversed since the last iteration step.
    pub fn count_since_last_iteration(&self) -> u64 {
        self.count_since_last_iteration
    }

    /// Running total of counts up to and including the current slot.
    pub fn total_count_to_this_value(&self) -> u64 {
        self.total_count_to_this_value
    }

    /// Running sum of `count * median_equivalent(value)` up to and including the current slot.
    pub fn total_value_to_this_value(&self) -> u128 {
        self.total_value_to_this_value
    }

    /// True for the final step of the iteration.
    pub fn is_last(&self) -> bool {
        self.is_last
    }
}

impl<'a, T: Counter, P: PickyIterator<T>> HistogramIterator<'a, T, P> {
    fn new(h: &'a Histogram<T>, picker: P) -> HistogramIterator<'a, T, P> {
        HistogramIterator {
            hist: h,
            total_count_to_index: 0,
            total_value_to_index: 0,
            count_since_last_iteration: 0,
            value_iterated_from: 0,
            current_index: 0,
            last_picked_index: None,
            max_value_index: h.counts.iter().rposition(|c| *c != T::zero()),
            fresh: true,
            ended: false,
            lookahead: None,
            picker,
        }
    }

    /// Has the slot holding the largest recorded value been picked already?
    fn past_max_value(&self) -> bool {
        match (self.last_picked_index, self.max_value_index) {
            (_, None) => true,
            (Some(picked), Some(max)) => picked >= max,
            (None, Some(_)) => false,
        }
    }

    fn advance(&mut self) -> Option<IterationValue<T>> {
        // Rust doesn't support tail call optimization, so we'd run out of stack if we simply
        // called self.advance() again at the bottom. Instead, we loop when we would have yielded
        // None unless we have ended.
        while !self.ended {
            // have we reached the end?
            if self.current_index == self.hist.distinct_values() {
                self.ended = true;
                return None;
            }

            if self.past_max_value() {
                // is the picker done?
                if !self.picker.more(self.current_index) {
                    self.ended = true;
                    return None;
                }
            } else if self.fresh {
                // at a new index, and not past the max, so there's nonzero counts to add
                let count = self.hist.counts[self.current_index].as_u64();
                self.total_count_to_index = self.total_count_to_index.saturating_add(count);
                self.count_since_last_iteration =
                    self.count_since_last_iteration.saturating_add(count);
                let value = self.hist.value_for(self.current_index);
                self.total_value_to_index +=
                    u128::from(count) * u128::from(self.hist.median_equivalent(value));

                // make sure we don't add this index again
                self.fresh = false;
            }

            // figure out if picker thinks we should yield this value
            let count_at_index = self.hist.counts[self.current_index];
            if let Some(metadata) =
                self.picker
                    .pick(self.current_index, self.total_count_to_index, count_at_index)
            {
                let percentile = if self.hist.is_empty() {
                    0.0
                } else {
                    100.0 * self.total_count_to_index as f64 / self.hist.len() as f64
                };
                let value_iterated_to = metadata.value_iterated_to.unwrap_or_else(|| {
                    self.hist
                        .highest_equivalent(self.hist.value_for(self.current_index))
                });

                let val = IterationValue {
                    value_iterated_to,
                    value_iterated_from: self.value_iterated_from,
                    percentile,
                    percentile_iterated_to: metadata.percentile_iterated_to.unwrap_or(percentile),
                    count_at_value: count_at_index,
                    count_since_last_iteration: self.count_since_last_iteration,
                    total_count_to_this_value: self.total_count_to_index,
                    total_value_to_this_value: self.total_value_to_index,
                    is_last: false,
                };

                // Note that we *don't* increment self.current_index here. The picker will be
                // exposed to the same value again after yielding. This is to allow a picker to
                // pick multiple times at the same index. An example of this is how the linear
                // picker may be using a step size smaller than the bucket size, so it should
                // step multiple times without advancing the index.

                self.value_iterated_from = value_iterated_to;
                self.count_since_last_iteration = 0;
                self.last_picked_index = Some(self.current_index);
                return Some(val);
            }

            // check the next entry
            self.current_index += 1;
            self.fresh = true;
        }
        None
    }
}

/// Value at the slot after `index`, saturating past the end of the counts array.
fn next_value_after<T: Counter>(hist: &Histogram<T>, index: usize) -> u64 {
    if index + 1 < hist.distinct_values() {
        hist.value_for(index + 1)
    } else {
        hist.highest_equivalent(hist.value_for(index)).saturating_add(1)
    }
}

impl<'a, T: 'a, P> Iterator for HistogramIterator<'a, T, P>
where
    T: Counter,
    P: PickyIterator<T>,
{
    type Item = IterationValue<T>;

    fn next(&mut self) -> Option<Self::Item> {
        // One step of lookahead tells us whether the step we hand out is the final one.
        let mut current = match self.lookahead.take() {
            Some(v) => v,
            None => self.advance()?,
        };
        self.lookahead = self.advance();
        current.is_last = self.lookahead.is_none();
        Some(current)
    }
}
