use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use num_traits as num;
use std::{fmt, io};

/// This trait represents the operations a histogram must be able to perform on the underlying
/// counter type. The `ToPrimitive` trait is needed to perform floating point operations on the
/// counts (usually for percentiles). The `FromPrimitive` to convert back into an integer count.
/// Partial ordering is used for threshholding, also usually in the context of percentiles.
///
/// Slot arithmetic on the recording path wraps on overflow (see `WrappingAdd`). A wrapped slot is
/// only detectable after the fact with `Histogram::has_overflowed`.
pub trait Counter:
    num::Num
    + num::ToPrimitive
    + num::FromPrimitive
    + num::WrappingAdd
    + Copy
    + PartialOrd<Self>
    + fmt::Debug
{
    /// Width of one encoded count, in bytes. This is also the word size nibble stored in an
    /// encoding cookie.
    const WORD_SIZE: usize;

    /// Counter as a u64.
    fn as_u64(&self) -> u64;
    /// Keep the low `WORD_SIZE` bytes of `count`, the same way an overflowing slot would.
    fn truncate_from_u64(count: u64) -> Self;

    /// Write this count little-endian at its native width.
    fn write_le<W: io::Write>(&self, writer: &mut W) -> io::Result<()>;
    /// Decode a whole run of little-endian counts from `src` into `dst`.
    /// `src` must hold exactly `dst.len() * WORD_SIZE` bytes.
    fn read_slice_le(src: &[u8], dst: &mut [Self]);
}

impl Counter for u16 {
    const WORD_SIZE: usize = 2;

    #[inline]
    fn as_u64(&self) -> u64 {
        u64::from(*self)
    }
    #[inline]
    fn truncate_from_u64(count: u64) -> Self {
        count as u16
    }
    fn write_le<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_u16::<LittleEndian>(*self)
    }
    fn read_slice_le(src: &[u8], dst: &mut [Self]) {
        LittleEndian::read_u16_into(src, dst)
    }
}

impl Counter for u32 {
    const WORD_SIZE: usize = 4;

    #[inline]
    fn as_u64(&self) -> u64 {
        u64::from(*self)
    }
    #[inline]
    fn truncate_from_u64(count: u64) -> Self {
        count as u32
    }
    fn write_le<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_u32::<LittleEndian>(*self)
    }
    fn read_slice_le(src: &[u8], dst: &mut [Self]) {
        LittleEndian::read_u32_into(src, dst)
    }
}

impl Counter for u64 {
    const WORD_SIZE: usize = 8;

    #[inline]
    fn as_u64(&self) -> u64 {
        *self
    }
    #[inline]
    fn truncate_from_u64(count: u64) -> Self {
        count
    }
    fn write_le<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_u64::<LittleEndian>(*self)
    }
    fn read_slice_le(src: &[u8], dst: &mut [Self]) {
        LittleEndian::read_u64_into(src, dst)
    }
}
