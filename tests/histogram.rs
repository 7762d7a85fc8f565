//! Recording, adding, copying and value equivalence through the public API.

use hdr_histogram::{AdditionError, Counter, CreationError, Histogram, HistogramConfig};

macro_rules! assert_near {
    ($a: expr, $b: expr, $tolerance: expr) => {{
        let a = $a as f64;
        let b = $b as f64;
        let tol = $tolerance as f64;
        assert!(
            (a - b).abs() <= b.abs() * tol,
            "assertion failed: `(left ~= right) (left: `{}`, right: `{}`, tolerance: `{:.5}%`)",
            a,
            b,
            100.0 * tol
        );
    }};
}

const TRACKABLE_MAX: u64 = 3600 * 1000 * 1000;
const SIGFIG: u8 = 3;
const TEST_VALUE_LEVEL: u64 = 4;

fn verify_max<T: Counter>(h: &Histogram<T>) {
    let expected = h
        .iter_recorded()
        .last()
        .map(|v| h.highest_equivalent(v.value_iterated_to()))
        .unwrap_or(0);
    assert_eq!(expected, h.max());
}

fn hist() -> Histogram<u64> {
    Histogram::new_with_max(TRACKABLE_MAX, SIGFIG).unwrap()
}

#[test]
fn construction_arg_ranges() {
    assert_eq!(
        CreationError::HighLessThanTwiceLow,
        Histogram::<u64>::new_with_max(1, SIGFIG).unwrap_err()
    );
    assert_eq!(
        CreationError::SigFigExceedsMax,
        Histogram::<u64>::new_with_max(TRACKABLE_MAX, 6).unwrap_err()
    );
    assert_eq!(
        CreationError::LowIsZero,
        Histogram::<u64>::new_with_bounds(0, TRACKABLE_MAX, SIGFIG).unwrap_err()
    );
}

#[test]
fn construction_arg_gets() {
    let h = hist();
    assert_eq!(1, h.low());
    assert_eq!(TRACKABLE_MAX, h.high());
    assert_eq!(SIGFIG, h.sigfig());

    let h = Histogram::<u64>::new_with_bounds(1000, TRACKABLE_MAX, SIGFIG).unwrap();
    assert_eq!(1000, h.low());
}

#[test]
fn new_from_config_and_back() {
    let config = HistogramConfig::new(1000, TRACKABLE_MAX, 2);
    let h = Histogram::<u32>::new_from_config(&config).unwrap();
    assert_eq!(config, h.config());

    let bad = HistogramConfig::new(10, 15, 2);
    assert_eq!(
        CreationError::HighLessThanTwiceLow,
        Histogram::<u32>::new_from_config(&bad).unwrap_err()
    );
}

#[test]
fn config_from_json() {
    let config: HistogramConfig = serde_json::from_str(
        r#"{"lowest_discernible_value": 1000, "highest_trackable_value": 60000000000}"#,
    )
    .unwrap();
    assert_eq!(3, config.significant_value_digits);

    let h = Histogram::<u64>::new_from_config(&config).unwrap();
    assert_eq!(60_000_000_000, h.high());
    assert_eq!(
        config,
        serde_json::from_str(&serde_json::to_string(&h.config()).unwrap()).unwrap()
    );
}

#[test]
fn empty_histogram() {
    let h = hist();
    assert_eq!(0, h.min());
    assert_eq!(0, h.max());
    assert_eq!(u64::max_value(), h.min_nz());
    assert_eq!(0.0, h.mean());
    assert_eq!(0.0, h.stdev());
    assert_eq!(100.0, h.percentile_below(0));
    assert_eq!(0, h.value_at_percentile(50.0));
    assert!(h.is_empty());
    assert!(!h.has_overflowed());
    verify_max(&h);
}

#[test]
fn record_same_value_four_times() {
    let mut h = hist();
    for _ in 0..4 {
        h.record(TEST_VALUE_LEVEL).unwrap();
    }

    assert_eq!(4, h.len());
    assert_eq!(4, h.count_at(TEST_VALUE_LEVEL).unwrap());
    assert!(h.equivalent(TEST_VALUE_LEVEL, h.value_at_percentile(50.0)));
    verify_max(&h);
}

#[test]
fn record_with_add_assign() {
    let mut h = hist();
    h += TEST_VALUE_LEVEL;
    assert_eq!(Ok(1), h.count_at(TEST_VALUE_LEVEL));
    assert_eq!(1, h.len());
}

#[test]
fn record_n_counts_every_equivalent_value() {
    let mut h = hist();
    h.record_n(10_007, 25).unwrap();

    // 10000..=10007 share a slot
    for v in 10_000..10_008 {
        assert_eq!(25, h.count_at(v).unwrap());
    }
    assert_eq!(0, h.count_at(10_008).unwrap());
}

#[test]
fn record_beyond_range() {
    let mut h = hist();
    assert!(h.record(3 * TRACKABLE_MAX).is_err());
    h.record(TRACKABLE_MAX).unwrap();
    assert_eq!(1, h.len());
    assert!(h.count_at(3 * TRACKABLE_MAX).is_err());
}

#[test]
fn record_correct_fills_in_missing_samples() {
    let mut h = hist();
    h.record_correct(TEST_VALUE_LEVEL, TEST_VALUE_LEVEL / 4)
        .unwrap();
    let mut r = hist();
    r += TEST_VALUE_LEVEL;

    for v in 1..=TEST_VALUE_LEVEL {
        assert_eq!(Ok(1), h.count_at(v));
    }
    assert_eq!(4, h.len());

    for v in 1..TEST_VALUE_LEVEL {
        assert_eq!(Ok(0), r.count_at(v));
    }
    assert_eq!(Ok(1), r.count_at(TEST_VALUE_LEVEL));
    assert_eq!(1, r.len());

    verify_max(&h);
}

#[test]
fn record_correct_with_zero_interval_is_plain_record() {
    let mut h = hist();
    h.record_correct(1000, 0).unwrap();
    assert_eq!(1, h.len());
}

#[test]
fn reset_keeps_timestamps_and_tag() {
    let mut h = hist();
    h += TEST_VALUE_LEVEL;
    h.set_start_timestamp(10);
    h.set_end_timestamp(20);
    h.set_tag(Some("svc".to_owned()));
    h.reset();

    assert_eq!(Ok(0), h.count_at(TEST_VALUE_LEVEL));
    assert_eq!(0, h.len());
    assert_eq!((10, 20), (h.start_timestamp(), h.end_timestamp()));
    assert_eq!(Some("svc"), h.tag());
    verify_max(&h);
}

#[test]
fn add_same_layout_and_wider() {
    let mut h1 = hist();
    let mut h2 = hist();

    h1 += TEST_VALUE_LEVEL;
    h1 += 1000 * TEST_VALUE_LEVEL;
    h2 += TEST_VALUE_LEVEL;
    h2 += 1000 * TEST_VALUE_LEVEL;
    h1 += &h2;

    assert_eq!(Ok(2), h1.count_at(TEST_VALUE_LEVEL));
    assert_eq!(Ok(2), h1.count_at(1000 * TEST_VALUE_LEVEL));
    assert_eq!(4, h1.len());

    let mut big = Histogram::<u64>::new_with_max(2 * TRACKABLE_MAX, SIGFIG).unwrap();
    big += TEST_VALUE_LEVEL;
    big += 1000 * TEST_VALUE_LEVEL;
    big += 2 * TRACKABLE_MAX;

    // narrower into wider re-records value by value
    big.add(&h1).unwrap();
    assert_eq!(Ok(3), big.count_at(TEST_VALUE_LEVEL));
    assert_eq!(Ok(3), big.count_at(1000 * TEST_VALUE_LEVEL));
    assert_eq!(Ok(1), big.count_at(2 * TRACKABLE_MAX));
    assert_eq!(7, big.len());

    assert_eq!(
        Err(AdditionError::OtherHighestExceedsRange),
        h1.add(&big)
    );
    assert_eq!(4, h1.len());

    verify_max(&h1);
    verify_max(&h2);
    verify_max(&big);
}

#[test]
fn add_across_counter_types() {
    let mut wide = Histogram::<u64>::new_with_max(100_000, 3).unwrap();
    let mut narrow = Histogram::<u16>::new_from(&wide);
    narrow.record_n(5_000, 300).unwrap();
    wide.record_n(5_000, 1 << 40).unwrap();

    wide.add(&narrow).unwrap();
    assert_eq!((1 << 40) + 300, wide.count_at(5_000).unwrap());
    assert_eq!((1 << 40) + 300, wide.len());
}

#[test]
fn add_disjoint_samples_sums_counts() {
    let mut a = hist();
    let mut b = hist();
    for v in (1..1000).map(|v| v * 2) {
        a.record(v).unwrap();
        b.record(v + 1).unwrap();
    }

    let mut sum = a.clone();
    sum.add(&b).unwrap();
    assert_eq!(a.len() + b.len(), sum.len());
    for v in 1..2000 {
        assert_eq!(
            a.count_at(v).unwrap() + b.count_at(v).unwrap(),
            sum.count_at(v).unwrap()
        );
    }
}

#[test]
fn add_correct_is_post_recording_correction() {
    let mut source = hist();
    source.record(1000).unwrap();

    let mut corrected = hist();
    corrected.add_correct(&source, 100).unwrap();

    let mut expected = hist();
    expected.record_correct(1000, 100).unwrap();
    assert_eq!(expected, corrected);
    assert_eq!(10, corrected.len());
}

#[test]
fn clone_correct_matches_record_correct() {
    let mut raw = hist();
    raw.record(1000).unwrap();
    raw.record(50).unwrap();

    let post = raw.clone_correct(100);
    for v in (100..=1000).step_by(100) {
        assert_eq!(Ok(1), post.count_at(v));
    }
    assert_eq!(Ok(1), post.count_at(50));
    assert_eq!(11, post.len());
    // the source is untouched
    assert_eq!(2, raw.len());
}

#[test]
fn copy_into_correct_overwrites_target() {
    let mut source = hist();
    source.record(400).unwrap();
    source.set_start_timestamp(5);
    source.set_end_timestamp(9);

    let mut target = Histogram::<u32>::new_with_max(TRACKABLE_MAX, SIGFIG).unwrap();
    target.record(77).unwrap();

    source.copy_into_correct(&mut target, 100).unwrap();
    assert_eq!(Ok(0), target.count_at(77));
    assert_eq!(4, target.len());
    assert_eq!((5, 9), (target.start_timestamp(), target.end_timestamp()));
}

#[test]
fn equivalent_range() {
    let h = hist();
    assert_eq!(1, h.equivalent_range(1));
    assert_eq!(2, h.equivalent_range(2500));
    assert_eq!(4, h.equivalent_range(8191));
    assert_eq!(8, h.equivalent_range(8192));
    assert_eq!(8, h.equivalent_range(10_000));
}

#[test]
fn scaled_equivalent_range() {
    let h = Histogram::<u64>::new_with_bounds(1024, TRACKABLE_MAX, SIGFIG).unwrap();
    assert_eq!(1024, h.equivalent_range(1024));
    assert_eq!(2 * 1024, h.equivalent_range(2500 * 1024));
    assert_eq!(4 * 1024, h.equivalent_range(8191 * 1024));
    assert_eq!(8 * 1024, h.equivalent_range(8192 * 1024));
    assert_eq!(8 * 1024, h.equivalent_range(10_000 * 1024));
}

#[test]
fn lowest_and_highest_equivalent() {
    let h = hist();
    assert_eq!(10_000, h.lowest_equivalent(10_007));
    assert_eq!(10_008, h.lowest_equivalent(10_009));

    assert_eq!(8183, h.highest_equivalent(8180));
    assert_eq!(8191, h.highest_equivalent(8191));
    assert_eq!(8199, h.highest_equivalent(8193));
    assert_eq!(9999, h.highest_equivalent(9995));
    assert_eq!(10_007, h.highest_equivalent(10_007));
    assert_eq!(10_015, h.highest_equivalent(10_008));
}

#[test]
fn scaled_highest_equivalent() {
    let h = Histogram::<u64>::new_with_bounds(1024, TRACKABLE_MAX, SIGFIG).unwrap();
    assert_eq!(8183 * 1024 + 1023, h.highest_equivalent(8180 * 1024));
    assert_eq!(10_015 * 1024 + 1023, h.highest_equivalent(10_008 * 1024));
}

#[test]
fn median_equivalent() {
    let h = hist();
    assert_eq!(4, h.median_equivalent(4));
    assert_eq!(5, h.median_equivalent(5));
    assert_eq!(4001, h.median_equivalent(4000));
    assert_eq!(8002, h.median_equivalent(8000));
    assert_eq!(10_004, h.median_equivalent(10_007));

    let h = Histogram::<u64>::new_with_bounds(1024, TRACKABLE_MAX, SIGFIG).unwrap();
    assert_eq!(1024 * 4 + 512, h.median_equivalent(1024 * 4));
    assert_eq!(1024 * 4001, h.median_equivalent(1024 * 4000));
}

#[test]
fn equivalence_bounds_hold_across_the_range() {
    use rand::distributions::{Distribution, Uniform};
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    let h = Histogram::<u64>::new_with_bounds(1000, TRACKABLE_MAX, SIGFIG).unwrap();
    let mut rng = SmallRng::seed_from_u64(42);
    let values = Uniform::new_inclusive(h.low(), h.high());

    for _ in 0..10_000 {
        let v = values.sample(&mut rng);
        let low = h.lowest_equivalent(v);
        let high = h.highest_equivalent(v);
        assert!(low <= v && v <= high, "{} not in [{}, {}]", v, low, high);
        assert_eq!(high, h.next_non_equivalent(v) - 1);
        assert_eq!(high - low + 1, h.equivalent_range(v));
        // relative error bounded by the precision
        assert!((high - low) as f64 <= (v as f64) / 1000.0 + 1024.0);
    }
}

#[test]
fn overflow_is_silent_until_checked() {
    let mut h = Histogram::<u16>::new_with_max(TRACKABLE_MAX, 2).unwrap();
    h.record_n(TEST_VALUE_LEVEL, u16::max_value()).unwrap();
    h.record(10 * TEST_VALUE_LEVEL).unwrap();
    assert!(!h.has_overflowed());

    // wraps this slot to 0
    h.record(TEST_VALUE_LEVEL).unwrap();
    assert_eq!(Ok(0), h.count_at(TEST_VALUE_LEVEL));
    assert_eq!(u64::from(u16::max_value()) + 2, h.len());
    assert!(h.has_overflowed());

    h.reestablish_total_count();
    assert_eq!(1, h.len());
    assert!(!h.has_overflowed());
}

#[test]
fn narrow_add_across_layouts_keeps_overflow_detectable() {
    let mut wide = Histogram::<u64>::new_with_max(10_000, 2).unwrap();
    wide.record_n(100, 70_000).unwrap();

    let mut narrow = Histogram::<u16>::new_with_max(10_000, 3).unwrap();
    assert_ne!(wide.sub_buckets(), narrow.sub_buckets());
    narrow.add(&wide).unwrap();
    assert_eq!(70_000, narrow.len());
    assert_eq!(Ok((70_000 % 65_536) as u16), narrow.count_at(100));
    assert!(narrow.has_overflowed());

    let mut corrected = Histogram::<u16>::new_with_max(10_000, 3).unwrap();
    corrected.add_correct(&wide, 0).unwrap();
    assert_eq!(70_000, corrected.len());
    assert!(corrected.has_overflowed());

    // same layout sums slot by slot, and agrees
    let mut same = Histogram::<u16>::new_with_max(10_000, 2).unwrap();
    same.add(&wide).unwrap();
    assert_eq!(narrow.len(), same.len());
    assert_eq!(narrow.count_at(100), same.count_at(100));
    assert!(same.has_overflowed());
}

#[test]
fn footprint_scales_with_counter_width() {
    let h16 = Histogram::<u16>::new_with_max(TRACKABLE_MAX, SIGFIG).unwrap();
    let h64 = hist();

    assert_eq!(h16.distinct_values(), h64.distinct_values());
    assert_eq!(
        512 + 2 * h16.distinct_values(),
        h16.estimated_footprint_in_bytes()
    );
    assert_eq!(
        512 + 8 * h64.distinct_values(),
        h64.estimated_footprint_in_bytes()
    );
    assert_eq!(
        32 + 8 * h64.distinct_values(),
        h64.needed_byte_buffer_capacity()
    );
}

#[test]
fn clone_copies_metadata_with_new_identity() {
    let mut h = hist();
    h += TEST_VALUE_LEVEL;
    h += 10 * TEST_VALUE_LEVEL;
    h.record_correct(TRACKABLE_MAX - 1, 31_000).unwrap();
    h.set_start_timestamp(1);
    h.set_end_timestamp(2);
    h.set_tag(Some("a".to_owned()));

    let c = h.clone();
    assert_eq!(h, c);
    assert_eq!(h.count_at(TEST_VALUE_LEVEL), c.count_at(TEST_VALUE_LEVEL));
    assert_eq!(h.len(), c.len());
    assert_eq!(Some("a"), c.tag());
    assert_eq!((1, 2), (c.start_timestamp(), c.end_timestamp()));
    assert_ne!(h.identity(), c.identity());
    verify_max(&c);

    let copy = h.copy();
    assert_eq!(h, copy);
}

#[test]
fn scaled_clone() {
    let mut h = Histogram::<u64>::new_with_bounds(1000, TRACKABLE_MAX, SIGFIG).unwrap();
    h += TEST_VALUE_LEVEL;
    h += 10 * TEST_VALUE_LEVEL;
    h.record_correct(TRACKABLE_MAX - 1, 31_000).unwrap();

    let c = h.clone();
    assert_eq!(h, c);
    verify_max(&c);
}

#[test]
fn equality_ignores_counter_type_and_metadata() {
    let mut a = Histogram::<u16>::new_with_max(1000, 2).unwrap();
    let mut b = Histogram::<u64>::new_with_max(1000, 2).unwrap();
    a.record_n(7, 3).unwrap();
    b.record_n(7, 3).unwrap();
    b.set_tag(Some("ignored".to_owned()));
    assert!(a == b);

    b.record(8).unwrap();
    assert!(a != b);

    // different bounds are never equal
    let c = Histogram::<u16>::new_with_max(2000, 2).unwrap();
    assert!(Histogram::<u16>::new_from(&a) != c);
}

#[test]
fn create_with_large_values() {
    let mut h = Histogram::<u64>::new_with_bounds(20_000_000, 100_000_000, 5).unwrap();
    h += 100_000_000;
    h += 20_000_000;
    h += 30_000_000;

    assert!(h.equivalent(20_000_000, h.value_at_percentile(33.0)));
    assert!(h.equivalent(30_000_000, h.value_at_percentile(50.0)));
    assert!(h.equivalent(30_000_000, h.value_at_percentile(83.33)));
    assert!(h.equivalent(100_000_000, h.value_at_percentile(83.34)));
    assert!(h.equivalent(100_000_000, h.value_at_percentile(99.0)));
}

#[test]
fn count_between_is_inclusive_of_slots() {
    let mut h = hist();
    h.record(10).unwrap();
    h.record(5000).unwrap();
    h.record(5003).unwrap();
    h.record(1_000_000).unwrap();

    assert_eq!(Ok(4), h.count_between(0, TRACKABLE_MAX));
    assert_eq!(Ok(2), h.count_between(5001, 5002));
    assert_eq!(Ok(1), h.count_between(10, 10));
    assert_eq!(Ok(0), h.count_between(5000, 10));
    assert!(h.count_between(0, 2 * TRACKABLE_MAX).is_err());
}

#[test]
fn mean_and_stdev_of_two_values() {
    let mut h = hist();
    h.record(1000).unwrap();
    h.record(2000).unwrap();

    assert_near!(h.mean(), 1500.0, 0.001);
    assert_near!(h.stdev(), 500.0, 0.001);
    assert_eq!(1000, h.min());
    assert_eq!(h.highest_equivalent(2000), h.max());
}

#[test]
fn min_counts_zero_but_min_nz_does_not() {
    let mut h = hist();
    h.record(0).unwrap();
    h.record(17).unwrap();
    assert_eq!(0, h.min());
    assert_eq!(17, h.min_nz());
}

#[test]
fn index_reads_raw_slots() {
    let mut h = Histogram::<u32>::new_with_max(1000, 2).unwrap();
    h.record_n(3, 9).unwrap();
    assert_eq!(9, h[3]);
    assert_eq!(0, h[4]);
}

#[test]
fn value_at_quantile_rounds_at_half_a_count() {
    use ieee754::Ieee754;

    let mut h = Histogram::<u64>::new_with_max(1000, 3).unwrap();
    h.record(1).unwrap();
    h.record(2).unwrap();

    // 0.75 of 2 samples rounds up to the second one; anything below rounds down
    assert_eq!(2, h.value_at_quantile(0.75));
    assert_eq!(1, h.value_at_quantile(0.75_f64.prev()));
    assert_eq!(1, h.value_at_quantile(0.0));
    assert_eq!(2, h.value_at_quantile(1.0));
}

#[test]
fn value_at_quantile_of_tiny_fraction_is_the_minimum() {
    use ieee754::Ieee754;

    let mut h = Histogram::<u64>::new_with_max(1000, 3).unwrap();
    h.record_n(7, 1000).unwrap();
    h.record(900).unwrap();

    assert_eq!(7, h.value_at_quantile(0.0_f64.next()));
    assert_eq!(7, h.value_at_quantile(0.5));
    assert_eq!(h.highest_equivalent(900), h.value_at_quantile(1.0));
}
