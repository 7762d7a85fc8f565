//! Interval logs: a line-oriented text framing for a sequence of histograms.
//!
//! Suppose you run a load test for an hour. Recording one histogram per minute lets you
//! correlate latency with whatever else happened at the time, and summing any span of them gives
//! exact percentiles for that span. An interval log is the usual way to keep such a series.
//!
//! A log starts with a few header lines:
//!
//! ```text
//! #[Histogram log format version 1.2]
//! #[StartTime: 1441812279.474 (seconds since epoch), 2015-09-09T15:24:39.474Z]
//! "StartTimestamp","Interval_Length","Interval_Max","Interval_Compressed_Histogram"
//! ```
//!
//! followed by one line per histogram:
//!
//! ```text
//! Tag=login,1441812279.474,60.000,3.456,HISEkAAAAC14nJNpmSzMwMDAxAABzFCaEUTLr/2fDgA8DAQo
//! ```
//!
//! The fields are the optional tag, the start timestamp and interval length in seconds, the
//! interval's maximum value divided by the writer's max value divisor, and the base64 of the
//! histogram's compressed encoding. Start and end timestamps come from the histogram's own
//! `start_timestamp` and `end_timestamp`, so set those before writing. Reading a log back
//! restores them, along with the tag.
//!
//! # Examples
//!
//! ```
//! use std::time::{Duration, UNIX_EPOCH};
//! use hdr_histogram::Histogram;
//! use hdr_histogram::serialization::interval_log::{self, HistogramLogWriter};
//!
//! let mut h = Histogram::<u32>::new_with_max(3_600_000_000, 3).unwrap();
//! h.record(1_500).unwrap();
//! h.set_start_timestamp(1_441_812_279_474);
//! h.set_end_timestamp(1_441_812_339_474);
//! h.set_tag(Some("login".to_owned()));
//!
//! let mut log = Vec::new();
//! {
//!     let mut writer = HistogramLogWriter::new(&mut log);
//!     writer.write_header(UNIX_EPOCH + Duration::from_millis(1_441_812_279_474)).unwrap();
//!     writer.write_histogram(&h).unwrap();
//! }
//!
//! let read = interval_log::read_histograms(&log, 0).unwrap();
//! assert_eq!(1, read.len());
//! let back = read.into_iter().next().unwrap().into_u64();
//! assert_eq!(h, back);
//! assert_eq!(Some("login"), back.tag());
//! assert_eq!(1_441_812_339_474, back.end_timestamp());
//! ```

use std::io::{self, Cursor};
use std::str::FromStr;
use std::{error, fmt, str, time};

use chrono::{DateTime, Utc};
use log::trace;
use nom::branch::alt;
use nom::bytes::complete::{tag, take_until, take_while, take_while1};
use nom::character::complete::char;
use nom::character::is_digit;
use nom::combinator::{complete, map_res, opt};
use nom::error::ErrorKind;
use nom::number::complete::double;
use nom::sequence::preceded;
use nom::IResult;

use super::{decode_any, encode_compressed_to_vec, AnyHistogram, DecodeError, EncodeError};
use crate::{Counter, Histogram};

/// Version written in the first line of every log.
pub const LOG_FORMAT_VERSION: &str = "1.2";

/// Interval maxima are divided by this before being written, unless the writer is told
/// otherwise. Suits microsecond recordings shown as seconds.
pub const DEFAULT_MAX_VALUE_DIVISOR: f64 = 1_000_000.0;

const LEGEND: &str =
    "\"StartTimestamp\",\"Interval_Length\",\"Interval_Max\",\"Interval_Compressed_Histogram\"";

/// Errors that can occur while writing a log.
#[derive(Debug)]
pub enum LogWriterError {
    /// The histogram could not be encoded.
    EncodeError(EncodeError),
    /// The histogram's tag contains a comma or whitespace, which would break the line format.
    InvalidTag,
    /// An i/o error occurred.
    IoError(io::Error),
}

impl From<io::Error> for LogWriterError {
    fn from(e: io::Error) -> Self {
        LogWriterError::IoError(e)
    }
}

impl From<EncodeError> for LogWriterError {
    fn from(e: EncodeError) -> Self {
        LogWriterError::EncodeError(e)
    }
}

impl fmt::Display for LogWriterError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LogWriterError::EncodeError(e) => write!(f, "Histogram encoding failed: {}", e),
            LogWriterError::InvalidTag => {
                write!(f, "Tags may not contain commas or whitespace")
            }
            LogWriterError::IoError(e) => write!(f, "An i/o error occurred: {}", e),
        }
    }
}

impl error::Error for LogWriterError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            LogWriterError::EncodeError(e) => Some(e),
            LogWriterError::IoError(e) => Some(e),
            LogWriterError::InvalidTag => None,
        }
    }
}

/// Writes interval logs.
///
/// Lines are written straight through to the underlying writer; wrap it in a `BufWriter` if it
/// is unbuffered.
pub struct HistogramLogWriter<'a, W: 'a + io::Write> {
    writer: &'a mut W,
    text_buf: String,
    max_value_divisor: f64,
}

impl<'a, W: 'a + io::Write> HistogramLogWriter<'a, W> {
    /// Create a writer with the default max value divisor.
    pub fn new(writer: &'a mut W) -> HistogramLogWriter<'a, W> {
        HistogramLogWriter {
            writer,
            text_buf: String::new(),
            max_value_divisor: DEFAULT_MAX_VALUE_DIVISOR,
        }
    }

    /// Divide interval maxima by `max_value_divisor` instead. Use 1.0 to write them unscaled.
    pub fn with_max_value_divisor(mut self, max_value_divisor: f64) -> Self {
        self.max_value_divisor = max_value_divisor;
        self
    }

    /// Write the version, start time and legend lines.
    pub fn write_header(&mut self, start_time: time::SystemTime) -> io::Result<()> {
        self.write_format_version()?;
        self.write_start_time(start_time)?;
        self.write_legend()
    }

    /// Write the `#[Histogram log format version ..]` line.
    pub fn write_format_version(&mut self) -> io::Result<()> {
        writeln!(
            self.writer,
            "#[Histogram log format version {}]",
            LOG_FORMAT_VERSION
        )
    }

    /// Write the `#[StartTime: ..]` line, in seconds since the epoch followed by the same
    /// instant as an ISO 8601 UTC timestamp.
    pub fn write_start_time(&mut self, start_time: time::SystemTime) -> io::Result<()> {
        let (sign, since_epoch) = match start_time.duration_since(time::UNIX_EPOCH) {
            Ok(d) => ("", d),
            // only possible with a clock set before 1970
            Err(e) => ("-", e.duration()),
        };
        let utc: DateTime<Utc> = start_time.into();
        writeln!(
            self.writer,
            "#[StartTime: {}{}.{:03} (seconds since epoch), {}]",
            sign,
            since_epoch.as_secs(),
            since_epoch.subsec_millis(),
            utc.format("%Y-%m-%dT%H:%M:%S%.3fZ")
        )
    }

    /// Write the CSV legend line.
    pub fn write_legend(&mut self) -> io::Result<()> {
        writeln!(self.writer, "{}", LEGEND)
    }

    /// Write a comment. Each line of `s` becomes its own `#` line.
    pub fn write_comment(&mut self, s: &str) -> io::Result<()> {
        for l in s.split('\n') {
            writeln!(self.writer, "#{}", l)?;
        }
        Ok(())
    }

    /// Write one interval line for `h`, using its timestamps and tag.
    ///
    /// A histogram whose end timestamp precedes its start is written with a zero length.
    pub fn write_histogram<T: Counter>(&mut self, h: &Histogram<T>) -> Result<(), LogWriterError> {
        self.text_buf.clear();

        if let Some(tag) = h.tag() {
            if !is_valid_tag(tag) {
                return Err(LogWriterError::InvalidTag);
            }
            self.text_buf.push_str("Tag=");
            self.text_buf.push_str(tag);
            self.text_buf.push(',');
        }

        let start = h.start_timestamp();
        let length = h.end_timestamp().saturating_sub(start);
        write!(
            self.writer,
            "{}{}.{:03},{}.{:03},{:.3},",
            self.text_buf,
            start / 1000,
            start % 1000,
            length / 1000,
            length % 1000,
            h.max() as f64 / self.max_value_divisor
        )?;

        let encoded = encode_compressed_to_vec(h)?;
        self.text_buf.clear();
        base64::encode_config_buf(&encoded, base64::STANDARD, &mut self.text_buf);
        trace!(
            "writing interval of {} samples as {} base64 chars",
            h.len(),
            self.text_buf.len()
        );

        self.writer.write_all(self.text_buf.as_bytes())?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }
}

/// Write a complete log: header lines followed by one interval line per histogram.
pub fn write_log<T: Counter, W: io::Write>(
    writer: &mut W,
    start_time: time::SystemTime,
    histograms: &[Histogram<T>],
) -> Result<(), LogWriterError> {
    let mut log_writer = HistogramLogWriter::new(writer);
    log_writer.write_header(start_time)?;
    for h in histograms {
        log_writer.write_histogram(h)?;
    }
    Ok(())
}

fn is_valid_tag(tag: &str) -> bool {
    !tag.chars().any(|c| c == ',' || c.is_whitespace())
}

/// Errors that can occur while reading a log.
#[derive(Debug)]
pub enum LogReaderError {
    /// A line could not be parsed. `offset` is the byte position where it starts.
    ParseError {
        /// Byte offset of the unparseable line.
        offset: usize,
    },
    /// The histogram field is not valid base64.
    InvalidBase64,
    /// The histogram field is not a valid encoded histogram.
    DecodeError(DecodeError),
}

impl From<DecodeError> for LogReaderError {
    fn from(e: DecodeError) -> Self {
        LogReaderError::DecodeError(e)
    }
}

impl fmt::Display for LogReaderError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LogReaderError::ParseError { offset } => {
                write!(f, "Unparseable log line at byte offset {}", offset)
            }
            LogReaderError::InvalidBase64 => write!(f, "The encoded histogram is not base64"),
            LogReaderError::DecodeError(e) => write!(f, "Histogram decoding failed: {}", e),
        }
    }
}

impl error::Error for LogReaderError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            LogReaderError::DecodeError(e) => Some(e),
            _ => None,
        }
    }
}

/// One interval line of a log, not yet decoded.
#[derive(PartialEq, Debug)]
pub struct IntervalLogHistogram<'a> {
    tag: Option<&'a str>,
    start_timestamp: time::Duration,
    duration: time::Duration,
    max: f64,
    encoded_histogram: &'a str,
}

impl<'a> IntervalLogHistogram<'a> {
    /// Tag, if the line has one.
    pub fn tag(&self) -> Option<&'a str> {
        self.tag
    }

    /// Start of the interval, since the epoch.
    pub fn start_timestamp(&self) -> time::Duration {
        self.start_timestamp
    }

    /// Length of the interval.
    pub fn duration(&self) -> time::Duration {
        self.duration
    }

    /// Maximum value in the interval, as scaled by the writer.
    pub fn max(&self) -> f64 {
        self.max
    }

    /// Base64 of the encoded histogram.
    pub fn encoded_histogram(&self) -> &'a str {
        self.encoded_histogram
    }

    /// Decode the histogram, restoring its timestamps and tag from this line.
    ///
    /// `min_bar_for_highest` raises the highest trackable value of the result, so that
    /// intervals recorded with different ranges can still be added into one histogram.
    pub fn decode(&self, min_bar_for_highest: u64) -> Result<AnyHistogram, LogReaderError> {
        let bytes =
            base64::decode(self.encoded_histogram).map_err(|_| LogReaderError::InvalidBase64)?;
        let mut h = decode_any(&mut Cursor::new(&bytes[..]), min_bar_for_highest)?;

        let start = duration_as_millis(self.start_timestamp);
        let end = start.saturating_add(duration_as_millis(self.duration));
        h.set_timestamps_and_tag(start, end, self.tag.map(str::to_owned));
        Ok(h)
    }
}

/// An entry in a log.
#[derive(PartialEq, Debug)]
pub enum LogEntry<'a> {
    /// The format version from the first header line.
    FormatVersion(&'a str),
    /// When the log began, since the epoch.
    StartTime(time::Duration),
    /// One interval histogram.
    Interval(IntervalLogHistogram<'a>),
}

/// Parses a log into its entries. Comments, the legend and blank lines are skipped.
///
/// The iterator yields a `ParseError` for the first line it cannot make sense of, and then
/// stops.
pub struct HistogramLogReader<'a> {
    orig_len: usize,
    input: &'a [u8],
    ended: bool,
}

impl<'a> HistogramLogReader<'a> {
    /// Read entries from the bytes of a complete log.
    pub fn new(input: &'a [u8]) -> HistogramLogReader<'a> {
        HistogramLogReader {
            orig_len: input.len(),
            input,
            ended: false,
        }
    }
}

impl<'a> Iterator for HistogramLogReader<'a> {
    type Item = Result<LogEntry<'a>, LogReaderError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.ended {
            if self.input.is_empty() {
                self.ended = true;
                break;
            }

            // header entries look like comments, so they have to be tried first
            if let Ok((rest, e)) = log_entry(self.input) {
                self.input = rest;
                return Some(Ok(e));
            }

            match ignored_line(self.input) {
                Ok((rest, _)) => self.input = rest,
                Err(_) => {
                    self.ended = true;
                    return Some(Err(LogReaderError::ParseError {
                        offset: self.orig_len - self.input.len(),
                    }));
                }
            }
        }
        None
    }
}

/// Decode every interval in a log, in order. See `IntervalLogHistogram::decode`.
pub fn read_histograms(
    input: &[u8],
    min_bar_for_highest: u64,
) -> Result<Vec<AnyHistogram>, LogReaderError> {
    let mut histograms = Vec::new();
    for entry in HistogramLogReader::new(input) {
        if let LogEntry::Interval(ilh) = entry? {
            histograms.push(ilh.decode(min_bar_for_highest)?);
        }
    }
    Ok(histograms)
}

fn duration_as_millis(d: time::Duration) -> u64 {
    d.as_secs()
        .saturating_mul(1000)
        .saturating_add(u64::from(d.subsec_millis()))
}

type ParseResult<'a, O> = IResult<&'a [u8], O, (&'a [u8], ErrorKind)>;

/// The rest of the current line, without its `\n` or `\r\n` ending.
fn rest_of_line(input: &[u8]) -> ParseResult<&[u8]> {
    let (input, line) = take_while(|c: u8| c != b'\n')(input)?;
    let (input, _) = opt(char('\n'))(input)?;
    let line = match line.split_last() {
        Some((b'\r', rest)) => rest,
        _ => line,
    };
    Ok((input, line))
}

fn format_version(input: &[u8]) -> ParseResult<LogEntry> {
    let (input, _) = tag("#[Histogram log format version ")(input)?;
    let (input, version) = map_res(take_until("]"), str::from_utf8)(input)?;
    let (input, _) = rest_of_line(input)?;
    Ok((input, LogEntry::FormatVersion(version)))
}

fn start_time(input: &[u8]) -> ParseResult<LogEntry> {
    let (input, _) = tag("#[StartTime: ")(input)?;
    let (input, start) = fract_secs(input)?;
    let (input, _) = char(' ')(input)?;
    let (input, _) = rest_of_line(input)?;
    Ok((input, LogEntry::StartTime(start)))
}

fn tag_field(input: &[u8]) -> ParseResult<&str> {
    let (input, _) = tag("Tag=")(input)?;
    let (input, t) = map_res(take_until(","), str::from_utf8)(input)?;
    let (input, _) = char(',')(input)?;
    Ok((input, t))
}

fn interval_hist(input: &[u8]) -> ParseResult<LogEntry> {
    let (input, tag) = opt(tag_field)(input)?;
    let (input, start_timestamp) = fract_secs(input)?;
    let (input, _) = char(',')(input)?;
    let (input, duration) = fract_secs(input)?;
    let (input, _) = char(',')(input)?;
    let (input, max) = double(input)?;
    let (input, _) = char(',')(input)?;
    let (input, encoded_histogram) = map_res(rest_of_line, str::from_utf8)(input)?;

    Ok((
        input,
        LogEntry::Interval(IntervalLogHistogram {
            tag,
            start_timestamp,
            duration,
            max,
            encoded_histogram,
        }),
    ))
}

fn log_entry(input: &[u8]) -> ParseResult<LogEntry> {
    complete(alt((format_version, start_time, interval_hist)))(input)
}

fn comment_line(input: &[u8]) -> ParseResult<()> {
    let (input, _) = tag("#")(input)?;
    let (input, _) = rest_of_line(input)?;
    Ok((input, ()))
}

fn legend(input: &[u8]) -> ParseResult<()> {
    let (input, _) = tag("\"StartTimestamp\"")(input)?;
    let (input, _) = rest_of_line(input)?;
    Ok((input, ()))
}

fn blank_line(input: &[u8]) -> ParseResult<()> {
    let (input, _) = opt(char('\r'))(input)?;
    let (input, _) = char('\n')(input)?;
    Ok((input, ()))
}

fn ignored_line(input: &[u8]) -> ParseResult<()> {
    alt((comment_line, legend, blank_line))(input)
}

/// Seconds with an optional fraction, like `1441812279.474`. Digits past nanoseconds are
/// dropped.
fn fract_secs(input: &[u8]) -> ParseResult<time::Duration> {
    let (input, secs) = map_res(
        map_res(take_while1(is_digit), str::from_utf8),
        u64::from_str,
    )(input)?;
    let (input, fraction) = opt(preceded(char('.'), take_while1(is_digit)))(input)?;

    let mut nanos = 0_u32;
    let mut scale = 100_000_000_u32;
    for d in fraction.unwrap_or(&[]).iter().take(9) {
        nanos += u32::from(d - b'0') * scale;
        scale /= 10;
    }

    Ok((input, time::Duration::new(secs, nanos)))
}
