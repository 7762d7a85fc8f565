use crate::core::counter::Counter;
use crate::iterators::{next_value_after, HistogramIterator, PickMetadata, PickyIterator};
use crate::Histogram;

/// Yields one step per `step` value units, reporting at the top of each step.
pub struct Iter<'a, T: 'a + Counter> {
    hist: &'a Histogram<T>,
    // > 0
    step: u64,
    // last value covered by the current step
    step_end: u64,
    // lowest value of the slot holding `step_end`; reaching it completes the step
    step_end_slot_start: u64,
}

impl<'a, T: 'a + Counter> Iter<'a, T> {
    /// Construct a new linear iterator. See `Histogram::iter_linear` for details.
    pub fn new(hist: &'a Histogram<T>, step: u64) -> HistogramIterator<'a, T, Iter<'a, T>> {
        assert!(step > 0, "step must be > 0");

        let step_end = step - 1;
        HistogramIterator::new(
            hist,
            Iter {
                hist,
                step,
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
        self.step_end = self.step_end.saturating_add(self.step);
        self.step_end_slot_start = self.hist.lowest_equivalent(self.step_end);
        Some(PickMetadata::new(None, Some(reported)))
    }

    fn more(&mut self, index: usize) -> bool {
        // Keep stepping while the next step still ends inside the slot last picked. A slot wider
        // than a step is walked to its end, not just to the largest value recorded in it.
        self.step_end < u64::max_value()
            && self.step_end + 1 < next_value_after(self.hist, index)
    }
}
