//! Binary encodings of a histogram, and interval logs built on top of them.
//!
//! Two families of formats are supported.
//!
//! The *raw* format is a fixed 32 byte header followed by the counts array at the counter type's
//! native width, truncated to the slots needed to cover the largest recorded value. The
//! *compressed* format wraps a raw encoding in a zlib stream behind its own cookie and length.
//! Both are little-endian, and the cookie carries the counter width so that a decoder can reject
//! (or, with `decode_any`, adapt to) a mismatched counter type.
//!
//! The *packed* format is the portable big-endian encoding exchanged by other HdrHistogram
//! implementations: a 40 byte header followed by ZigZag LEB128 varints, where runs of empty slots
//! collapse to a single negative number. It has a zlib-compressed variant as well. Packed
//! histograms are independent of the counter width and always decode as `u64` via `decode_any`.
//!
//! Histograms are meant to be added up after the fact. Capture one per minute, encode it, reset
//! it; later, decode the last sixty and add them together to get correct percentiles for the
//! hour, something that stored percentiles could never give you.
//!
//! Timestamps and tags are not part of any binary format. A histogram decoded with `decode`,
//! `decode_compressed`, `decode_packed` or `decode_any` has start and end timestamps of 0 and no
//! tag, and equals the original only in configuration and counts. Interval logs carry the
//! timestamps and tag alongside each encoded histogram, and
//! `interval_log::IntervalLogHistogram::decode` is the one decoder that restores them.
//!
//! # Examples
//!
//! Encoding into a caller-provided buffer and decoding it again:
//!
//! ```
//! use std::io::Cursor;
//! use hdr_histogram::Histogram;
//! use hdr_histogram::serialization::{decode, encode_into};
//!
//! let mut h = Histogram::<u32>::new_with_max(3_600_000_000, 3).unwrap();
//! h.record_n(42, 7).unwrap();
//!
//! let mut buf = vec![0; h.needed_byte_buffer_capacity()];
//! let written = encode_into(&h, &mut Cursor::new(&mut buf[..])).unwrap();
//!
//! let decoded: Histogram<u32> = decode(&mut Cursor::new(&buf[..written]), 0).unwrap();
//! assert_eq!(h, decoded);
//! assert_eq!(7, decoded.count_at(42).unwrap());
//! ```
//!
//! Decoding without knowing the counter width up front, then summing:
//!
//! ```
//! use std::io::Cursor;
//! use hdr_histogram::Histogram;
//! use hdr_histogram::serialization::{decode_any, encode_compressed_to_vec, encode_packed};
//!
//! let mut narrow = Histogram::<u16>::new_with_max(10_000, 2).unwrap();
//! narrow.record(100).unwrap();
//! let mut wide = Histogram::<u64>::new_with_max(10_000, 2).unwrap();
//! wide.record_n(100, 1 << 40).unwrap();
//!
//! let mut packed = Vec::new();
//! encode_packed(&wide, &mut packed).unwrap();
//!
//! let mut sum = Histogram::<u64>::new_with_max(10_000, 2).unwrap();
//! for bytes in &[encode_compressed_to_vec(&narrow).unwrap(), packed] {
//!     let h = decode_any(&mut Cursor::new(&bytes[..]), 0).unwrap();
//!     sum.add(h.into_u64()).unwrap();
//! }
//! assert_eq!((1 << 40) + 1, sum.count_at(100).unwrap());
//! ```

use std::io::{self, Cursor, Read};
use std::{error, fmt};

use byteorder::{LittleEndian, ReadBytesExt};
use log::debug;

use crate::{Counter, Histogram};

mod raw;
pub use self::raw::{
    decode, decode_compressed, encode_compressed_into, encode_compressed_to_vec, encode_into,
    encode_to_vec,
};

mod packed;
pub use self::packed::{decode_packed, encode_packed, encode_packed_compressed};

pub mod interval_log;


/// Cookie of the raw format, before the word size nibble is added.
const ENCODING_COOKIE_BASE: u32 = 0x1c84_9308;
/// Cookie of the compressed format, before the word size nibble is added.
const COMPRESSED_ENCODING_COOKIE_BASE: u32 = 0x1c84_9309;

/// Cookie of the packed format. Always big-endian.
const PACKED_COOKIE: u32 = 0x1c84_9313;
/// Cookie of the compressed packed format. Always big-endian.
const PACKED_COMPRESSED_COOKIE: u32 = 0x1c84_9314;

const PACKED_HEADER_SIZE: usize = 40;

/// Raw cookie for a counter of `word_size` bytes. The size lives in bits 4..8.
fn cookie_for(base: u32, word_size: usize) -> u32 {
    base + ((word_size as u32) << 4)
}

fn cookie_base(cookie: u32) -> u32 {
    cookie & !0xf0
}

fn word_size_of(cookie: u32) -> u32 {
    (cookie & 0xf0) >> 4
}

/// Errors that can occur while encoding a histogram.
#[derive(Debug)]
pub enum EncodeError {
    /// The destination does not have room for the encoding. Nothing useful was written.
    BufferTooSmall {
        /// Bytes the encoding needs.
        needed: usize,
        /// Bytes left in the destination.
        available: usize,
    },
    /// A count above `i64::max_value()` cannot be zig-zag encoded in the packed format.
    CountNotSerializable,
    /// An i/o operation failed.
    IoError(io::Error),
}

impl From<io::Error> for EncodeError {
    fn from(e: io::Error) -> Self {
        EncodeError::IoError(e)
    }
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EncodeError::BufferTooSmall { needed, available } => write!(
                f,
                "Encoding needs {} bytes but only {} are available",
                needed, available
            ),
            EncodeError::CountNotSerializable => write!(
                f,
                "A count above i64::max_value() cannot be zig-zag encoded"
            ),
            EncodeError::IoError(e) => write!(f, "An i/o operation failed: {}", e),
        }
    }
}

impl error::Error for EncodeError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            EncodeError::IoError(e) => Some(e),
            _ => None,
        }
    }
}

/// Errors that can occur while decoding a histogram.
#[derive(Debug)]
pub enum DecodeError {
    /// The cookie (first 4 bytes) did not match that of the expected format.
    InvalidCookie,
    /// The encoded counters are `encoded` bytes wide, but the target counter type is `expected`
    /// bytes wide. Use a matching counter type, or `decode_any`.
    WordSizeMismatch {
        /// Word size found in the cookie.
        encoded: usize,
        /// Word size of the counter type being decoded into.
        expected: usize,
    },
    /// The cookie names a word size no counter type has.
    UnsupportedWordSize(u32),
    /// The histogram uses features that this implementation doesn't support, so it cannot be
    /// decoded correctly.
    UnsupportedFeature,
    /// The histogram could not be created because the encoded bounds were invalid.
    InvalidParameters,
    /// The input ended before the encoding did.
    BufferTooShort,
    /// The encoded array is longer than it should be for the histogram's value range.
    EncodedArrayTooLong,
    /// A count exceeded what can be represented in the chosen counter type.
    UnsuitableCounterType,
    /// An i/o operation failed.
    IoError(io::Error),
}

impl From<io::Error> for DecodeError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            DecodeError::BufferTooShort
        } else {
            DecodeError::IoError(e)
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DecodeError::InvalidCookie => write!(
                f,
                "The cookie (first 4 bytes) did not match that of a supported format"
            ),
            DecodeError::WordSizeMismatch { encoded, expected } => write!(
                f,
                "The encoded word size ({}) does not match the histogram's ({})",
                encoded, expected
            ),
            DecodeError::UnsupportedWordSize(w) => {
                write!(f, "Unsupported encoded word size {}", w)
            }
            DecodeError::UnsupportedFeature => write!(
                f,
                "The histogram uses features that this implementation doesn't support"
            ),
            DecodeError::InvalidParameters => write!(
                f,
                "The encoded parameters were invalid (e.g. lowest value, highest value, etc)"
            ),
            DecodeError::BufferTooShort => {
                write!(f, "The buffer does not contain the full histogram")
            }
            DecodeError::EncodedArrayTooLong => write!(
                f,
                "The encoded array is longer than it should be for the histogram's value range"
            ),
            DecodeError::UnsuitableCounterType => write!(
                f,
                "A count exceeded what can be represented in the chosen counter type"
            ),
            DecodeError::IoError(e) => write!(f, "An i/o operation failed: {}", e),
        }
    }
}

impl error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            DecodeError::IoError(e) => Some(e),
            _ => None,
        }
    }
}

/// A decoded histogram whose counter type was chosen by the encoding.
#[derive(Debug, Clone)]
pub enum AnyHistogram {
    /// Encoded with 2 byte counters.
    U16(Histogram<u16>),
    /// Encoded with 4 byte counters.
    U32(Histogram<u32>),
    /// Encoded with 8 byte counters, or in a packed format.
    U64(Histogram<u64>),
}

impl AnyHistogram {
    /// Counter width in bytes.
    pub fn word_size(&self) -> usize {
        match self {
            AnyHistogram::U16(_) => u16::WORD_SIZE,
            AnyHistogram::U32(_) => u32::WORD_SIZE,
            AnyHistogram::U64(_) => u64::WORD_SIZE,
        }
    }

    /// Total number of recorded samples.
    pub fn len(&self) -> u64 {
        match self {
            AnyHistogram::U16(h) => h.len(),
            AnyHistogram::U32(h) => h.len(),
            AnyHistogram::U64(h) => h.len(),
        }
    }

    /// True if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Widen into a `u64` histogram. Counts, timestamps and tag are kept.
    pub fn into_u64(self) -> Histogram<u64> {
        match self {
            AnyHistogram::U16(h) => widen(&h),
            AnyHistogram::U32(h) => widen(&h),
            AnyHistogram::U64(h) => h,
        }
    }

    fn set_timestamps_and_tag(&mut self, start: u64, end: u64, tag: Option<String>) {
        macro_rules! apply {
            ($h:expr) => {{
                $h.set_start_timestamp(start);
                $h.set_end_timestamp(end);
                $h.set_tag(tag);
            }};
        }
        match self {
            AnyHistogram::U16(h) => apply!(h),
            AnyHistogram::U32(h) => apply!(h),
            AnyHistogram::U64(h) => apply!(h),
        }
    }
}

fn widen<T: Counter>(h: &Histogram<T>) -> Histogram<u64> {
    let mut wide = Histogram::<u64>::new_from(h);
    for (slot, c) in wide.counts.iter_mut().zip(h.counts.iter()) {
        *slot = c.as_u64();
    }
    wide.total_count = h.total_count;
    wide.start_timestamp = h.start_timestamp;
    wide.end_timestamp = h.end_timestamp;
    wide.tag = h.tag.clone();
    wide
}

/// Decode any supported encoding, picking the counter type from the cookie.
///
/// Raw and compressed encodings decode into the counter width they were written with. Packed
/// encodings decode as `u64`. `min_bar_for_highest` raises the highest trackable value of the
/// result to at least that much.
pub fn decode_any(
    buf: &mut Cursor<&[u8]>,
    min_bar_for_highest: u64,
) -> Result<AnyHistogram, DecodeError> {
    let start = buf.position();
    let cookie = buf.read_u32::<LittleEndian>()?;
    buf.set_position(start);

    let base = cookie_base(cookie);
    if base == ENCODING_COOKIE_BASE || base == COMPRESSED_ENCODING_COOKIE_BASE {
        let compressed = base == COMPRESSED_ENCODING_COOKIE_BASE;
        return match word_size_of(cookie) {
            2 => decode_word(buf, min_bar_for_highest, compressed).map(AnyHistogram::U16),
            4 => decode_word(buf, min_bar_for_highest, compressed).map(AnyHistogram::U32),
            8 => decode_word(buf, min_bar_for_highest, compressed).map(AnyHistogram::U64),
            w => Err(DecodeError::UnsupportedWordSize(w)),
        };
    }

    // packed cookies are big-endian
    let packed = cookie.swap_bytes();
    if packed == PACKED_COOKIE || packed == PACKED_COMPRESSED_COOKIE {
        return decode_packed(buf, min_bar_for_highest).map(AnyHistogram::U64);
    }

    debug!("unrecognized cookie {:#010x}", cookie);
    Err(DecodeError::InvalidCookie)
}

fn decode_word<T: Counter>(
    buf: &mut Cursor<&[u8]>,
    min_bar_for_highest: u64,
    compressed: bool,
) -> Result<Histogram<T>, DecodeError> {
    if compressed {
        decode_compressed(buf, min_bar_for_highest)
    } else {
        decode(buf, min_bar_for_highest)
    }
}

/// Bytes left to read in `buf`.
fn remaining(buf: &Cursor<&[u8]>) -> usize {
    buf.get_ref()
        .len()
        .saturating_sub(buf.position() as usize)
}

/// Read exactly `len` bytes into a fresh vec.
fn read_exact_vec<R: Read>(reader: &mut R, len: usize) -> Result<Vec<u8>, DecodeError> {
    let mut v = vec![0; len];
    reader.read_exact(&mut v)?;
    Ok(v)
}
