#![cfg(feature = "serialization")]

use rand::Rng;
use rand::SeedableRng;
use std::time::{Duration, UNIX_EPOCH};

use hdr_histogram::serialization::interval_log::{
    self, HistogramLogReader, HistogramLogWriter, IntervalLogHistogram, LogEntry, LogReaderError,
};
use hdr_histogram::Histogram;

const LOG_START_MILLIS: u64 = 1_441_812_279_474;

/// 20 one-second intervals, every other one tagged.
fn random_intervals() -> Vec<Histogram<u64>> {
    let mut rng = rand::rngs::SmallRng::seed_from_u64(99);
    let mut intervals = Vec::new();
    for i in 0..20_u64 {
        let mut h = Histogram::<u64>::new_with_bounds(1, 3_600_000_000, 3).unwrap();
        for _ in 0..rng.gen_range(1..500) {
            h.record(rng.gen_range(1..10_000_000)).unwrap();
        }
        let start = LOG_START_MILLIS + i * 1000;
        h.set_start_timestamp(start);
        h.set_end_timestamp(start + 1000);
        if i % 2 == 0 {
            h.set_tag(Some(format!("t{}", i)));
        }
        intervals.push(h);
    }
    intervals
}

fn write_intervals(intervals: &[Histogram<u64>]) -> Vec<u8> {
    let mut log = Vec::new();
    {
        let mut writer = HistogramLogWriter::new(&mut log);
        writer.write_comment("load test\nrun 7").unwrap();
        writer
            .write_header(UNIX_EPOCH + Duration::from_millis(LOG_START_MILLIS))
            .unwrap();
        for h in intervals {
            writer.write_histogram(h).unwrap();
        }
    }
    log
}

fn intervals_of(log: &[u8]) -> Vec<IntervalLogHistogram> {
    HistogramLogReader::new(log)
        .map(|r| r.unwrap())
        .filter_map(|e| match e {
            LogEntry::Interval(ilh) => Some(ilh),
            _ => None,
        })
        .collect()
}

#[test]
fn header_entries_are_read_back() {
    let log = write_intervals(&random_intervals());

    let headers: Vec<LogEntry> = HistogramLogReader::new(&log)
        .map(|r| r.unwrap())
        .filter(|e| !matches!(e, LogEntry::Interval(_)))
        .collect();

    assert_eq!(
        vec![
            LogEntry::FormatVersion(interval_log::LOG_FORMAT_VERSION),
            LogEntry::StartTime(Duration::from_millis(LOG_START_MILLIS)),
        ],
        headers
    );
}

#[test]
fn interval_metadata_matches_histograms() {
    let intervals = random_intervals();
    let log = write_intervals(&intervals);
    let read = intervals_of(&log);

    assert_eq!(intervals.len(), read.len());
    assert_eq!(10, read.iter().filter(|ilh| ilh.tag().is_some()).count());

    for (h, ilh) in intervals.iter().zip(read.iter()) {
        assert_eq!(h.tag(), ilh.tag());
        assert_eq!(
            Duration::from_millis(h.start_timestamp()),
            ilh.start_timestamp()
        );
        assert_eq!(Duration::from_secs(1), ilh.duration());

        // written with three decimals, in units of the default divisor
        let expected_max = h.max() as f64 / interval_log::DEFAULT_MAX_VALUE_DIVISOR;
        assert!((expected_max - ilh.max()).abs() <= 0.0005);
    }
}

#[test]
fn write_then_read_histograms() {
    let intervals = random_intervals();
    let log = write_intervals(&intervals);

    let read = interval_log::read_histograms(&log, 0).unwrap();
    assert_eq!(intervals.len(), read.len());

    let mut sum = Histogram::<u64>::new_with_bounds(1, 3_600_000_000, 3).unwrap();
    let mut expected_sum = sum.clone();
    for (h, decoded) in intervals.iter().zip(read.into_iter()) {
        let decoded = decoded.into_u64();
        assert_eq!(h, &decoded);
        assert_eq!(h.tag(), decoded.tag());
        assert_eq!(h.start_timestamp(), decoded.start_timestamp());
        assert_eq!(h.end_timestamp(), decoded.end_timestamp());

        sum.add(&decoded).unwrap();
        expected_sum.add(h).unwrap();
    }
    assert_eq!(expected_sum, sum);
}

#[test]
fn rewriting_decoded_intervals_gives_identical_lines() {
    let log = write_intervals(&random_intervals());

    let mut rewritten = Vec::new();
    {
        let mut writer = HistogramLogWriter::new(&mut rewritten);
        for ilh in intervals_of(&log) {
            let h = ilh.decode(0).unwrap().into_u64();
            writer.write_histogram(&h).unwrap();
        }
    }

    let original_intervals: Vec<&str> = std::str::from_utf8(&log)
        .unwrap()
        .lines()
        .filter(|l| !l.starts_with('#') && !l.starts_with('"'))
        .collect();
    let rewritten = String::from_utf8(rewritten).unwrap();
    assert_eq!(original_intervals, rewritten.lines().collect::<Vec<_>>());
}

#[test]
fn syntax_error_ends_the_iteration() {
    let mut log = write_intervals(&random_intervals()[..2]);
    let offset = log.len();
    log.extend_from_slice(b"this is not an interval\n");
    log.extend_from_slice(b"0.000,1.000,0.001,HISTFAAAAA==\n");

    let entries: Vec<_> = HistogramLogReader::new(&log).collect();
    // version, start time, two intervals, then the error
    assert_eq!(5, entries.len());
    match entries.last() {
        Some(Err(LogReaderError::ParseError { offset: o })) => assert_eq!(offset, *o),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn intervals_with_different_ranges_add_with_a_min_bar() {
    let mut narrow = Histogram::<u32>::new_with_max(10_000, 3).unwrap();
    narrow.record(9_999).unwrap();
    let mut wide = Histogram::<u32>::new_with_max(10_000_000, 3).unwrap();
    wide.record(9_999_999).unwrap();

    let mut log = Vec::new();
    interval_log::write_log(&mut log, UNIX_EPOCH, &[narrow, wide]).unwrap();

    // without a min bar, the wider interval does not fit the narrower one
    let read = interval_log::read_histograms(&log, 0).unwrap();
    let mut first = read[0].clone().into_u64();
    assert!(first.add(read[1].clone().into_u64()).is_err());

    let read = interval_log::read_histograms(&log, 10_000_000).unwrap();
    let mut total = Histogram::<u64>::new_with_max(10_000_000, 3).unwrap();
    for h in read {
        total.add(h.into_u64()).unwrap();
    }
    assert_eq!(2, total.len());
    assert_eq!(Ok(1), total.count_at(9_999));
    assert!(total.equivalent(9_999_999, total.max()));
}

#[test]
fn crlf_log_reads_like_lf_log() {
    let intervals = random_intervals();
    let log = write_intervals(&intervals);
    let crlf = String::from_utf8(log).unwrap().replace('\n', "\r\n");

    let read = interval_log::read_histograms(crlf.as_bytes(), 0).unwrap();
    assert_eq!(intervals.len(), read.len());
    for (h, decoded) in intervals.iter().zip(read.into_iter()) {
        let decoded = decoded.into_u64();
        assert_eq!(h, &decoded);
        assert_eq!(h.tag(), decoded.tag());
    }
}

#[test]
fn start_time_line_carries_iso_8601() {
    let log = write_intervals(&[]);
    let text = String::from_utf8(log).unwrap();
    assert!(text
        .lines()
        .any(|l| l == "#[StartTime: 1441812279.474 (seconds since epoch), 2015-09-09T15:24:39.474Z]"));
}
