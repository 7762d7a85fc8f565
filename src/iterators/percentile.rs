use crate::core::counter::Counter;
use crate::iterators::{HistogramIterator, PickMetadata, PickyIterator};
use crate::Histogram;

/// An iterator that will yield at percentile steps through the histogram's value range.
pub struct Iter<'a, T: 'a + Counter> {
    hist: &'a Histogram<T>,

    ticks_per_half_distance: u32,
    percentile_to_iterate_to: f64,
    reached_end: bool,
}

impl<'a, T: 'a + Counter> Iter<'a, T> {
    /// Construct a new iterator. See `Histogram::iter_percentiles` for details.
    pub fn new(
        hist: &'a Histogram<T>,
        ticks_per_half_distance: u32,
    ) -> HistogramIterator<'a, T, Iter<'a, T>> {
        assert!(
            ticks_per_half_distance > 0,
            "Ticks per half distance must be > 0"
        );

        HistogramIterator::new(
            hist,
            Iter {
                hist,
                ticks_per_half_distance,
                percentile_to_iterate_to: 0.0,
                reached_end: false,
            },
        )
    }

    /// Move the target level one tick forward.
    ///
    /// The 0-100 range is divided into `ticks_per_half_distance` equal ticks up to 50%, then the
    /// same number of ticks again over the remaining half distance to 100%, and so on. Each time a
    /// half distance is crossed the tick size is cut in half.
    fn step_level(&mut self) {
        let level = self.percentile_to_iterate_to;
        let num_halvings = (100.0 / (100.0 - level)).log2().floor();
        let total_ticks = f64::from(self.ticks_per_half_distance) * 2_f64.powf(num_halvings + 1.0);
        let next = level + 100.0 / total_ticks;

        // Near 100% the increment disappears in floating point, or the level overshoots. Either
        // way the only step left is the final one.
        self.percentile_to_iterate_to = if next == level || next >= 100.0 || !next.is_finite() {
            100.0
        } else {
            next
        };
    }
}

impl<'a, T: 'a + Counter> PickyIterator<T> for Iter<'a, T> {
    fn pick(&mut self, _: usize, running_total: u64, count_at_index: T) -> Option<PickMetadata> {
        if count_at_index == T::zero() || self.reached_end {
            return None;
        }

        let current_percentile = 100.0 * running_total as f64 / self.hist.len() as f64;
        if current_percentile < self.percentile_to_iterate_to {
            return None;
        }

        // we're going to yield this as the next percentile
        let iterated_to = self.percentile_to_iterate_to;
        if iterated_to == 100.0 {
            self.reached_end = true;
        } else {
            self.step_level();
        }

        Some(PickMetadata::new(Some(iterated_to), None))
    }

    fn more(&mut self, _: usize) -> bool {
        // Once the slot with the largest value has been reached, the remaining ticks between the
        // last level yielded and 100% would all land on it. Only the final 100% step is emitted.
        if self.reached_end || self.hist.is_empty() {
            return false;
        }
        self.percentile_to_iterate_to = 100.0;
        true
    }
}
