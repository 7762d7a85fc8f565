use std::cmp;
use std::io::{self, Cursor, Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use log::{debug, trace};
use num_traits::ToPrimitive;

use super::{
    read_exact_vec, DecodeError, EncodeError, PACKED_COMPRESSED_COOKIE, PACKED_COOKIE,
    PACKED_HEADER_SIZE,
};
use crate::{Counter, Histogram};

/// LEB128-64b9B never needs more than 9 bytes.
const MAX_VARINT_LEN: usize = 9;

/// Encode `h` in the packed format into `writer`. Returns the number of bytes written.
///
/// Only slots up to the largest recorded value are written, and runs of empty slots take a
/// single varint, so sparse histograms over huge ranges stay small.
pub fn encode_packed<T: Counter, W: Write>(
    h: &Histogram<T>,
    writer: &mut W,
) -> Result<usize, EncodeError> {
    let buf = packed_bytes(h)?;
    writer.write_all(&buf)?;
    Ok(buf.len())
}

/// Encode `h` in the compressed packed format into `writer`. Returns the number of bytes
/// written.
///
/// Despite the "deflate" name other implementations give it, the stream uses zlib framing.
pub fn encode_packed_compressed<T: Counter, W: Write>(
    h: &Histogram<T>,
    writer: &mut W,
) -> Result<usize, EncodeError> {
    let uncompressed = packed_bytes(h)?;

    let mut compressor = ZlibEncoder::new(
        Vec::with_capacity(uncompressed.len() / 2),
        Compression::default(),
    );
    compressor.write_all(&uncompressed)?;
    let compressed = compressor.finish()?;

    writer.write_u32::<BigEndian>(PACKED_COMPRESSED_COOKIE)?;
    writer.write_u32::<BigEndian>(compressed.len() as u32)?;
    writer.write_all(&compressed)?;

    Ok(8 + compressed.len())
}

fn packed_bytes<T: Counter>(h: &Histogram<T>) -> Result<Vec<u8>, EncodeError> {
    let index_limit = h.counts.iter().rposition(|c| *c != T::zero()).unwrap_or(0);
    let counts = &h.counts[..=index_limit];

    let mut buf = Vec::with_capacity(PACKED_HEADER_SIZE + MAX_VARINT_LEN * counts.len());
    buf.write_u32::<BigEndian>(PACKED_COOKIE)?;
    // payload length, filled in below
    buf.write_u32::<BigEndian>(0)?;
    // normalizing index offset
    buf.write_u32::<BigEndian>(0)?;
    buf.write_u32::<BigEndian>(u32::from(h.significant_value_digits))?;
    buf.write_u64::<BigEndian>(h.lowest_discernible_value)?;
    buf.write_u64::<BigEndian>(h.highest_trackable_value)?;
    // integer to double conversion ratio
    buf.write_f64::<BigEndian>(1.0)?;
    debug_assert_eq!(PACKED_HEADER_SIZE, buf.len());

    encode_counts(counts, &mut buf)?;

    // at most 9 bytes for each of a few million slots
    let payload_len = (buf.len() - PACKED_HEADER_SIZE) as u32;
    (&mut buf[4..8]).write_u32::<BigEndian>(payload_len)?;
    trace!(
        "packed {} slots into a {} byte payload",
        counts.len(),
        payload_len
    );

    Ok(buf)
}

/// Append `counts` as zig-zag varints. Non-negative numbers are counts; a negative number `-n`
/// stands for `n` consecutive empty slots.
fn encode_counts<T: Counter>(counts: &[T], buf: &mut Vec<u8>) -> Result<(), EncodeError> {
    let mut index = 0;
    while index < counts.len() {
        let count = counts[index];
        index += 1;

        let count_or_zeros = if count == T::zero() {
            let mut zeros = 1_i64;
            while index < counts.len() && counts[index] == T::zero() {
                zeros += 1;
                index += 1;
            }
            if zeros > 1 {
                -zeros
            } else {
                0
            }
        } else {
            count.to_i64().ok_or(EncodeError::CountNotSerializable)?
        };

        varint_write(zig_zag_encode(count_or_zeros), buf);
    }
    Ok(())
}

/// Decode a packed or compressed packed encoding from `reader`.
///
/// The highest trackable value is raised to `min_bar_for_highest` if the encoded one is lower.
/// The packed format has no total count, so it is summed from the decoded counts.
pub fn decode_packed<T: Counter, R: Read>(
    reader: &mut R,
    min_bar_for_highest: u64,
) -> Result<Histogram<T>, DecodeError> {
    let cookie = reader.read_u32::<BigEndian>()?;
    match cookie {
        PACKED_COOKIE => decode_body(reader, min_bar_for_highest),
        PACKED_COMPRESSED_COOKIE => {
            let compressed_len = reader.read_u32::<BigEndian>()?;
            let mut inflater = ZlibDecoder::new(reader.by_ref().take(u64::from(compressed_len)));
            if inflater.read_u32::<BigEndian>()? != PACKED_COOKIE {
                return Err(DecodeError::InvalidCookie);
            }
            let h = decode_body(&mut inflater, min_bar_for_highest)?;
            // leave the reader at the end of the compressed block
            io::copy(&mut inflater.into_inner(), &mut io::sink())?;
            Ok(h)
        }
        _ => {
            debug!("not a packed histogram encoding: cookie {:#010x}", cookie);
            Err(DecodeError::InvalidCookie)
        }
    }
}

#[allow(clippy::float_cmp)]
fn decode_body<T: Counter, R: Read>(
    reader: &mut R,
    min_bar_for_highest: u64,
) -> Result<Histogram<T>, DecodeError> {
    let payload_len = reader.read_u32::<BigEndian>()? as usize;
    let normalizing_offset = reader.read_u32::<BigEndian>()?;
    if normalizing_offset != 0 {
        return Err(DecodeError::UnsupportedFeature);
    }
    let sigfig = reader
        .read_u32::<BigEndian>()?
        .to_u8()
        .ok_or(DecodeError::InvalidParameters)?;
    let low = reader.read_u64::<BigEndian>()?;
    let high = reader.read_u64::<BigEndian>()?;
    let int_double_ratio = reader.read_f64::<BigEndian>()?;
    if int_double_ratio != 1.0 {
        return Err(DecodeError::UnsupportedFeature);
    }

    let high = cmp::max(high, min_bar_for_highest);
    let mut h = Histogram::<T>::new_with_bounds(low, high, sigfig)
        .map_err(|_| DecodeError::InvalidParameters)?;

    // every slot takes at most one varint, so anything longer can't be a valid payload
    if payload_len > h.counts.len().saturating_mul(MAX_VARINT_LEN) {
        return Err(DecodeError::EncodedArrayTooLong);
    }
    let payload = read_exact_vec(reader, payload_len)?;
    decode_counts(&mut h, &payload)?;

    Ok(h)
}

fn decode_counts<T: Counter>(h: &mut Histogram<T>, payload: &[u8]) -> Result<(), DecodeError> {
    let mut cursor = Cursor::new(payload);
    let mut index = 0_usize;
    let mut total_count = 0_u64;

    while (cursor.position() as usize) < payload.len() {
        let count_or_zeros = zig_zag_decode(varint_read(&mut cursor)?);

        if count_or_zeros < 0 {
            let zeros = count_or_zeros
                .checked_neg()
                .and_then(|z| z.to_usize())
                .ok_or(DecodeError::EncodedArrayTooLong)?;
            index = index
                .checked_add(zeros)
                .filter(|&i| i <= h.counts.len())
                .ok_or(DecodeError::EncodedArrayTooLong)?;
        } else {
            let count = T::from_i64(count_or_zeros).ok_or(DecodeError::UnsuitableCounterType)?;
            let slot = h
                .counts
                .get_mut(index)
                .ok_or(DecodeError::EncodedArrayTooLong)?;
            *slot = count;
            total_count = total_count.wrapping_add(count_or_zeros as u64);
            index += 1;
        }
    }

    h.total_count = total_count;
    Ok(())
}

/// Write a number as a LEB128-64b9B varint. This is not quite protobuf's LEB128: 64 bit values
/// take at most 9 bytes, not 10. The first 8 bytes carry 7 bits each with a continuation bit;
/// a 9th byte, if needed, carries the remaining 8 bits whole.
///
/// Returns the number of bytes written, in [1, 9].
fn varint_write(input: u64, buf: &mut Vec<u8>) -> usize {
    let mut rest = input;
    for written in 1..MAX_VARINT_LEN {
        if rest >> 7 == 0 {
            buf.push(rest as u8);
            return written;
        }
        buf.push(0x80 | (rest as u8 & 0x7f));
        rest >>= 7;
    }
    buf.push(rest as u8);
    MAX_VARINT_LEN
}

/// Read a LEB128-64b9B varint written by `varint_write`.
fn varint_read<R: Read>(reader: &mut R) -> io::Result<u64> {
    let mut value = 0_u64;
    for chunk in 0..(MAX_VARINT_LEN as u32 - 1) {
        let b = reader.read_u8()?;
        value |= u64::from(b & 0x7f) << (7 * chunk);
        if b & 0x80 == 0 {
            return Ok(value);
        }
    }
    let last = reader.read_u8()?;
    Ok(value | u64::from(last) << 56)
}

/// Map signed numbers to unsigned: 0 to 0, -1 to 1, 1 to 2, -2 to 3, etc
fn zig_zag_encode(num: i64) -> u64 {
    // If num < 0, num >> 63 is all 1 and vice versa.
    ((num << 1) ^ (num >> 63)) as u64
}

/// Inverse of `zig_zag_encode`.
fn zig_zag_decode(encoded: u64) -> i64 {
    ((encoded >> 1) as i64) ^ -((encoded & 1) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn varint_bytes(input: u64) -> Vec<u8> {
        let mut buf = Vec::new();
        let len = varint_write(input, &mut buf);
        assert_eq!(len, buf.len());
        buf
    }

    #[test]
    fn varint_lengths_at_chunk_boundaries() {
        assert_eq!(vec![0], varint_bytes(0));
        assert_eq!(vec![0x7f], varint_bytes(127));
        assert_eq!(vec![0x80, 0x01], varint_bytes(128));
        for shift in 1..8 {
            // largest value that fits in `shift` bytes, then the smallest that doesn't
            assert_eq!(shift as usize, varint_bytes((1 << (7 * shift)) - 1).len());
            assert_eq!(shift as usize + 1, varint_bytes(1 << (7 * shift)).len());
        }
        assert_eq!(9, varint_bytes(1 << 56).len());
        assert_eq!(9, varint_bytes(u64::max_value()).len());
    }

    #[test]
    fn ninth_byte_is_written_whole() {
        let buf = varint_bytes(u64::max_value());
        assert_eq!(&[0xff; 9][..], &buf[..]);
        let buf = varint_bytes(0xab << 56);
        assert_eq!(0xab, buf[8]);
    }

    #[test]
    fn varint_reads_back_what_was_written() {
        for &v in &[0, 1, 300, 1 << 35, (1 << 56) - 1, 1 << 56, u64::max_value()] {
            let buf = varint_bytes(v);
            assert_eq!(v, varint_read(&mut &buf[..]).unwrap());
        }
    }

    #[test]
    fn varint_read_of_truncated_input_is_eof() {
        let err = varint_read(&mut &[0x80, 0x80][..]).unwrap_err();
        assert_eq!(io::ErrorKind::UnexpectedEof, err.kind());
    }

    #[test]
    fn zig_zag_interleaves_signs() {
        assert_eq!(0, zig_zag_encode(0));
        assert_eq!(1, zig_zag_encode(-1));
        assert_eq!(2, zig_zag_encode(1));
        assert_eq!(3, zig_zag_encode(-2));
        assert_eq!(u64::max_value() - 1, zig_zag_encode(i64::max_value()));
        assert_eq!(u64::max_value(), zig_zag_encode(i64::min_value()));

        for &n in &[0, -1, 1, i64::max_value(), i64::min_value(), -12_345] {
            assert_eq!(n, zig_zag_decode(zig_zag_encode(n)));
        }
    }

    #[test]
    fn zero_runs_collapse_to_one_negative_number() {
        let counts = [3_u64, 0, 0, 0, 0, 7, 0, 1];
        let mut buf = Vec::new();
        encode_counts(&counts, &mut buf).unwrap();
        // 3, -4, 7, 0, 1
        assert_eq!(vec![6, 7, 14, 0, 2], buf);
    }

    #[test]
    fn count_above_i64_max_is_not_serializable() {
        let counts = [u64::max_value()];
        let mut buf = Vec::new();
        match encode_counts(&counts, &mut buf) {
            Err(EncodeError::CountNotSerializable) => {}
            other => panic!("unexpected {:?}", other),
        }
    }
}
