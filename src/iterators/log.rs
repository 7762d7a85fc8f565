use crate::core::counter::Counter;
use crate::iterators::{next_value_after, HistogramIterator, PickMetadata, PickyIterator};
use crate::Histogram;

/// Yields at steps whose size grows geometrically by `base`.
pub struct Iter<'a, T: 'a + Counter> {
    hist: &'a Histogram<T>,
    // > 1.0
    base: f64,
    // first value past the current step, kept as a float so that fractional bases compound
    next_step_start: f64,
    step_end: u64,
    step_end_slot_start: u64,
}

impl<'a, T: 'a + Counter> Iter<'a, T> {
    /// Construct a new logarithmic iterator. See `Histogram::iter_log` for details.
    pub fn new(
        hist: &'a Histogram<T>,
        first_step: u64,
        base: f64,
    ) -> HistogramIterator<'a, T, Iter<'a, T>> {
        assert!(first_step > 0, "first_step must be > 0");
        assert!(base > 1.0, "base must be > 1.0");

        let step_end = first_step - 1;
        HistogramIterator::new(
            hist,
            Iter {
                hist,
                base,
                next_step_start: first_step as f64,
                step_end,
                step_end_slot_start: hist.lowest_equivalent(step_end),
            },
        )
    }
}

impl<'a, T: 'a + Counter> PickyIterator<T> for Iter<'a, T> {
    fn pick(&mut self, index: usize, _: u64, _: T) -> Option<PickMetadata> {
        let last_slot = index == self.hist.distinct_values() - 1;
        if self.hist.value_for(index) < self.step_end_slot_start && !last_slot {
            return None;
        }

        let reported = self.step_end;
        self.next_step_start *= self.base;
        // float to int casts saturate, so a runaway level pins at u64::max_value()
        self.step_end = (self.next_step_start as u64).saturating_sub(1);
        self.step_end_slot_start = self.hist.lowest_equivalent(self.step_end);
        Some(PickMetadata::new(None, Some(reported)))
    }

    fn more(&mut self, index: usize) -> bool {
        self.step_end < u64::max_value()
            && self.hist.lowest_equivalent(self.next_step_start as u64)
                < next_value_after(self.hist, index)
    }
}
