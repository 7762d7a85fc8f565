use std::cmp;
use std::io::{Cursor, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use log::{debug, trace};
use num_traits::ToPrimitive;

use super::{
    cookie_base, cookie_for, remaining, word_size_of, DecodeError, EncodeError,
    COMPRESSED_ENCODING_COOKIE_BASE, ENCODING_COOKIE_BASE,
};
use crate::{encoded_header_len, Counter, Histogram};

/// Encode `h` in the raw format at the cursor's position, advancing it.
///
/// Writes the 32 byte header followed by the counts needed to cover the largest recorded value,
/// each at the counter type's width. `h.needed_byte_buffer_capacity()` bytes are always enough.
/// Returns the number of bytes written.
///
/// Fails with `EncodeError::BufferTooSmall` without writing anything if the rest of the buffer
/// cannot hold the encoding.
pub fn encode_into<T: Counter>(
    h: &Histogram<T>,
    buf: &mut Cursor<&mut [u8]>,
) -> Result<usize, EncodeError> {
    let relevant_len = h.relevant_len();
    let needed = encoded_header_len() + relevant_len * T::WORD_SIZE;
    let available = buf.get_ref().len().saturating_sub(buf.position() as usize);
    trace!(
        "raw encoding {} of {} slots into {} bytes",
        relevant_len,
        h.counts.len(),
        needed
    );
    if needed > available {
        return Err(EncodeError::BufferTooSmall { needed, available });
    }

    buf.write_u32::<LittleEndian>(cookie_for(ENCODING_COOKIE_BASE, T::WORD_SIZE))?;
    buf.write_u32::<LittleEndian>(u32::from(h.significant_value_digits))?;
    buf.write_u64::<LittleEndian>(h.lowest_discernible_value)?;
    buf.write_u64::<LittleEndian>(h.highest_trackable_value)?;
    buf.write_u64::<LittleEndian>(h.total_count)?;
    for c in &h.counts[..relevant_len] {
        c.write_le(buf)?;
    }

    Ok(needed)
}

/// Encode `h` in the raw format into a new vec sized to fit.
pub fn encode_to_vec<T: Counter>(h: &Histogram<T>) -> Result<Vec<u8>, EncodeError> {
    let mut v = vec![0; h.needed_byte_buffer_capacity()];
    let len = encode_into(h, &mut Cursor::new(&mut v[..]))?;
    v.truncate(len);
    Ok(v)
}

/// Encode `h` in the compressed format at the cursor's position, advancing it.
///
/// The compressed format is a cookie, the length of the zlib stream, and the zlib stream of the
/// raw encoding. Returns the number of bytes written.
pub fn encode_compressed_into<T: Counter>(
    h: &Histogram<T>,
    buf: &mut Cursor<&mut [u8]>,
) -> Result<usize, EncodeError> {
    let encoded = encode_compressed_to_vec(h)?;
    let available = buf.get_ref().len().saturating_sub(buf.position() as usize);
    if encoded.len() > available {
        return Err(EncodeError::BufferTooSmall {
            needed: encoded.len(),
            available,
        });
    }
    buf.write_all(&encoded)?;
    Ok(encoded.len())
}

/// Encode `h` in the compressed format into a new vec.
pub fn encode_compressed_to_vec<T: Counter>(h: &Histogram<T>) -> Result<Vec<u8>, EncodeError> {
    let raw = encode_to_vec(h)?;

    // assume 50% compression as a starting point
    let mut compressor =
        ZlibEncoder::new(Vec::with_capacity(raw.len() / 2), Compression::default());
    compressor.write_all(&raw)?;
    let compressed = compressor.finish()?;
    trace!(
        "compressed {} raw bytes into {}",
        raw.len(),
        compressed.len()
    );

    let mut v = Vec::with_capacity(8 + compressed.len());
    v.write_u32::<LittleEndian>(cookie_for(COMPRESSED_ENCODING_COOKIE_BASE, T::WORD_SIZE))?;
    // zlib of at most ~50MiB of counts stays far below 4GiB
    v.write_u32::<LittleEndian>(compressed.len() as u32)?;
    v.extend_from_slice(&compressed);
    Ok(v)
}

/// Decode a raw encoding at the cursor's position into a histogram with counter type `T`.
///
/// The highest trackable value is raised to `min_bar_for_highest` if the encoded one is lower.
/// The total count is taken from the header rather than summed.
///
/// The raw format does not record how many counts follow the header, so counts are read until
/// either the histogram's counts array is full or the input runs out. Concatenated raw encodings
/// therefore cannot be told apart; concatenate compressed ones instead.
pub fn decode<T: Counter>(
    buf: &mut Cursor<&[u8]>,
    min_bar_for_highest: u64,
) -> Result<Histogram<T>, DecodeError> {
    let cookie = buf.read_u32::<LittleEndian>()?;
    if cookie_base(cookie) != ENCODING_COOKIE_BASE {
        debug!("not a raw histogram encoding: cookie {:#010x}", cookie);
        return Err(DecodeError::InvalidCookie);
    }
    check_word_size::<T>(cookie)?;

    let sigfig = buf
        .read_u32::<LittleEndian>()?
        .to_u8()
        .ok_or(DecodeError::InvalidParameters)?;
    let low = buf.read_u64::<LittleEndian>()?;
    let high = buf.read_u64::<LittleEndian>()?;
    let total_count = buf.read_u64::<LittleEndian>()?;

    let high = cmp::max(high, min_bar_for_highest);
    let mut h = Histogram::<T>::new_with_bounds(low, high, sigfig)
        .map_err(|_| DecodeError::InvalidParameters)?;
    h.total_count = total_count;

    let available = remaining(buf);
    let words = cmp::min(available / T::WORD_SIZE, h.counts.len());
    if words < h.counts.len() && available % T::WORD_SIZE != 0 {
        // a partial word means the input was cut off mid-count
        return Err(DecodeError::BufferTooShort);
    }
    trace!(
        "decoding {} of {} slots with word size {}",
        words,
        h.counts.len(),
        T::WORD_SIZE
    );

    let start = buf.position() as usize;
    let end = start + words * T::WORD_SIZE;
    let bytes: &[u8] = *buf.get_ref();
    T::read_slice_le(&bytes[start..end], &mut h.counts[..words]);
    buf.set_position(end as u64);

    if words < h.counts.len() {
        let decoded = h.counts[..words]
            .iter()
            .fold(0_u64, |t, c| t.wrapping_add(c.as_u64()));
        if total_count > decoded {
            debug!(
                "raw encoding ends after {} slots holding {} of its {} counts; input may be truncated",
                words, decoded, total_count
            );
        }
    }

    Ok(h)
}

/// Decode a compressed encoding at the cursor's position into a histogram with counter type
/// `T`. See `decode` for `min_bar_for_highest`.
///
/// The cursor is left just past the compressed block.
pub fn decode_compressed<T: Counter>(
    buf: &mut Cursor<&[u8]>,
    min_bar_for_highest: u64,
) -> Result<Histogram<T>, DecodeError> {
    let cookie = buf.read_u32::<LittleEndian>()?;
    if cookie_base(cookie) != COMPRESSED_ENCODING_COOKIE_BASE {
        debug!("not a compressed histogram encoding: cookie {:#010x}", cookie);
        return Err(DecodeError::InvalidCookie);
    }
    check_word_size::<T>(cookie)?;

    let compressed_len = buf.read_u32::<LittleEndian>()? as usize;
    if compressed_len > remaining(buf) {
        return Err(DecodeError::BufferTooShort);
    }

    let start = buf.position() as usize;
    let end = start + compressed_len;
    let bytes: &[u8] = *buf.get_ref();
    let mut raw = Vec::new();
    ZlibDecoder::new(&bytes[start..end]).read_to_end(&mut raw)?;
    buf.set_position(end as u64);

    decode(&mut Cursor::new(&raw[..]), min_bar_for_highest)
}

fn check_word_size<T: Counter>(cookie: u32) -> Result<(), DecodeError> {
    match word_size_of(cookie) {
        w @ 2 | w @ 4 | w @ 8 if w as usize == T::WORD_SIZE => Ok(()),
        w @ 2 | w @ 4 | w @ 8 => Err(DecodeError::WordSizeMismatch {
            encoded: w as usize,
            expected: T::WORD_SIZE,
        }),
        w => Err(DecodeError::UnsupportedWordSize(w)),
    }
}
