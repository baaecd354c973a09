//! Bounds-checked bit cursor over an immutable byte buffer.

use std::cmp::Ordering;

use stormline_model::FVector;

use crate::{Result, WireError};

/// Packed integers never span more than this many 7-bit groups.
const MAX_PACKED_GROUPS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekOrigin {
    Begin,
    Current,
    End,
}

/// Reads an immutable bit sequence of fixed length with a zero-based cursor.
///
/// The cursor never leaves `[0, len]`. A single saved position is kept for
/// [`mark`](Self::mark) / [`pop`](Self::pop); it is a register, not a stack.
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    bit_len: usize,
    position: usize,
    mark: usize,
}

impl<'a> BitReader<'a> {
    /// Reader over every bit of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            bit_len: data.len().saturating_mul(8),
            position: 0,
            mark: 0,
        }
    }

    /// Reader over the first `bit_len` bits of `data`.
    ///
    /// # Errors
    ///
    /// `BitLengthExceedsData` if `data` holds fewer than `bit_len` bits.
    pub fn with_bit_len(data: &'a [u8], bit_len: usize) -> Result<Self> {
        let available = data.len().saturating_mul(8);
        if bit_len > available {
            return Err(WireError::BitLengthExceedsData { bit_len, available });
        }
        Ok(Self {
            bit_len,
            ..Self::new(data)
        })
    }

    pub fn len(&self) -> usize {
        self.bit_len
    }

    pub fn is_empty(&self) -> bool {
        self.bit_len == 0
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn bits_left(&self) -> usize {
        self.bit_len - self.position
    }

    pub fn at_end(&self) -> bool {
        self.position >= self.bit_len
    }

    // ------------------------------------------------------------------------
    // Cursor control
    // ------------------------------------------------------------------------

    /// Move the cursor relative to `origin`.
    ///
    /// `End` counts backwards from the last bit. The cursor is left unchanged
    /// on error.
    pub fn seek(&mut self, offset: usize, origin: SeekOrigin) -> Result<()> {
        let len = self.bit_len;
        let target = match origin {
            SeekOrigin::Begin => Some(offset),
            SeekOrigin::Current => self.position.checked_add(offset),
            SeekOrigin::End => len.checked_sub(offset),
        };
        match target {
            Some(target) if target <= len => {
                self.position = target;
                Ok(())
            }
            _ => Err(WireError::SeekOutOfRange {
                offset,
                origin,
                len,
            }),
        }
    }

    /// Save the current position, replacing any earlier mark.
    pub fn mark(&mut self) {
        self.mark = self.position;
    }

    /// Return to the last mark, or to the start if none was set.
    pub fn pop(&mut self) {
        self.position = self.mark;
    }

    // ------------------------------------------------------------------------
    // Bits
    // ------------------------------------------------------------------------

    fn ensure(&self, bits: usize) -> Result<()> {
        if bits > self.bits_left() {
            return Err(WireError::OutOfRange {
                position: self.position,
                bits,
                len: self.bit_len,
            });
        }
        Ok(())
    }

    fn bit_at(&self, index: usize) -> bool {
        self.data
            .get(index >> 3)
            .is_some_and(|byte| (byte >> (index & 7)) & 1 == 1)
    }

    pub fn peek_bit(&self) -> Result<bool> {
        self.ensure(1)?;
        Ok(self.bit_at(self.position))
    }

    pub fn read_bit(&mut self) -> Result<bool> {
        let bit = self.peek_bit()?;
        self.position += 1;
        Ok(bit)
    }

    /// Read `count` bits into `ceil(count / 8)` bytes, bit 0 first.
    ///
    /// A trailing partial byte is zero-padded in its high bits.
    pub fn read_bits(&mut self, count: usize) -> Result<Vec<u8>> {
        self.ensure(count)?;

        let start = self.position;
        let out = if start % 8 == 0 && count % 8 == 0 {
            let first = start / 8;
            self.data[first..first + count / 8].to_vec()
        } else {
            let mut out = vec![0u8; count.div_ceil(8)];
            for i in 0..count {
                if self.bit_at(start + i) {
                    out[i >> 3] |= 1 << (i & 7);
                }
            }
            out
        };

        self.position += count;
        Ok(out)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let bytes = self.read_bits(N * 8)?;
        let mut out = [0u8; N];
        out.copy_from_slice(&bytes);
        Ok(out)
    }

    // ------------------------------------------------------------------------
    // Variable-width integers
    // ------------------------------------------------------------------------

    /// Decode a value in `[0, max_exclusive)`.
    ///
    /// Bits are consumed only while `value + mask < max_exclusive`, so the
    /// number of bits read depends on the bits already seen. `max_exclusive`
    /// of 0 or 1 reads nothing and yields 0.
    pub fn read_int(&mut self, max_exclusive: u32) -> Result<u32> {
        let max = u64::from(max_exclusive);
        let mut value = 0u64;
        let mut mask = 1u64;

        while value + mask < max {
            if self.read_bit()? {
                value |= mask;
            }
            mask <<= 1;
        }

        // value < max <= u32::MAX
        Ok(value as u32)
    }

    /// Decode up to five groups of one continuation bit and seven payload
    /// bits, least-significant group first.
    ///
    /// Payload beyond 35 bits is not representable; the continuation bit of
    /// the fifth group is read but ignored.
    pub fn read_int_packed(&mut self) -> Result<u64> {
        let mut value = 0u64;

        for group in 0..MAX_PACKED_GROUPS {
            let more = self.read_bit()?;
            let mut payload = 0u64;
            for bit in 0..7 {
                if self.read_bit()? {
                    payload |= 1 << bit;
                }
            }
            value |= payload << (7 * group);

            if !more {
                break;
            }
        }

        Ok(value)
    }

    /// Decode a quantized vector.
    ///
    /// A selector `b = read_int(max_bits)` fixes `bias = 1 << (b + 1)` and
    /// `max = 1 << (b + 2)`; each axis is `read_int(max) - bias / scale_factor`
    /// with the division truncating toward zero.
    ///
    /// # Errors
    ///
    /// `InvalidPackedVector` for a zero scale factor or a selector whose
    /// `max` does not fit in 32 bits.
    pub fn read_packed_vector(&mut self, scale_factor: i32, max_bits: u32) -> Result<FVector> {
        let bits = self.read_int(max_bits)?;

        let invalid = WireError::InvalidPackedVector {
            bits,
            scale: scale_factor,
        };
        if scale_factor == 0 {
            return Err(invalid);
        }
        let Some(max) = bits.checked_add(2).and_then(|shift| 1u32.checked_shl(shift)) else {
            return Err(invalid);
        };

        let bias = i64::from(max >> 1);
        let offset = bias / i64::from(scale_factor);

        let x = i64::from(self.read_int(max)?) - offset;
        let y = i64::from(self.read_int(max)?) - offset;
        let z = i64::from(self.read_int(max)?) - offset;

        Ok(FVector::new(x as f32, y as f32, z as f32))
    }

    // ------------------------------------------------------------------------
    // Byte-level helpers
    // ------------------------------------------------------------------------

    pub fn read_byte(&mut self) -> Result<u8> {
        let [byte] = self.read_array::<1>()?;
        Ok(byte)
    }

    pub fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>> {
        let bits = byte_count_to_bits(count)?;
        self.read_bits(bits)
    }

    pub fn skip_bytes(&mut self, count: usize) -> Result<()> {
        let bits = byte_count_to_bits(count)?;
        self.ensure(bits)?;
        self.position += bits;
        Ok(())
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(i64::from_le_bytes(self.read_array()?))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_le_bytes(self.read_array()?))
    }

    /// A `u32` that is true only when exactly 1.
    pub fn read_u32_as_bool(&mut self) -> Result<bool> {
        Ok(self.read_u32()? == 1)
    }

    /// Read a length-prefixed string.
    ///
    /// A negative length `n` denotes `-2n` bytes of UTF-16LE; a positive one
    /// `n` bytes of single-byte text. Trailing spaces and NULs are trimmed.
    pub fn read_fstring(&mut self) -> Result<String> {
        let length = self.read_i32()?;
        let invalid = || WireError::InvalidLength(i64::from(length));

        let text = match length.cmp(&0) {
            Ordering::Equal => return Ok(String::new()),
            Ordering::Less => {
                let byte_len = usize::try_from(length.unsigned_abs())
                    .ok()
                    .and_then(|units| units.checked_mul(2))
                    .ok_or_else(invalid)?;
                let bytes = self.read_bytes(byte_len)?;
                let units: Vec<u16> = bytes
                    .chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                    .collect();
                String::from_utf16_lossy(&units)
            }
            Ordering::Greater => {
                let byte_len = usize::try_from(length).map_err(|_| invalid())?;
                let bytes = self.read_bytes(byte_len)?;
                bytes.iter().map(|&b| char::from(b)).collect()
            }
        };

        Ok(text.trim_end_matches([' ', '\0']).to_string())
    }
}

fn byte_count_to_bits(count: usize) -> Result<usize> {
    count
        .checked_mul(8)
        .ok_or(WireError::InvalidLength(i64::try_from(count).unwrap_or(i64::MAX)))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Encoder mirroring the reader, for fixtures only.
    #[derive(Default)]
    struct BitWriter {
        bytes: Vec<u8>,
        len: usize,
    }

    impl BitWriter {
        fn write_bit(&mut self, bit: bool) {
            if self.len % 8 == 0 {
                self.bytes.push(0);
            }
            if bit {
                *self.bytes.last_mut().unwrap() |= 1 << (self.len % 8);
            }
            self.len += 1;
        }

        fn write_bits(&mut self, value: u64, count: u32) {
            for i in 0..count {
                self.write_bit((value >> i) & 1 == 1);
            }
        }

        fn write_int(&mut self, value: u32, max: u32) {
            let (value, max) = (u64::from(value), u64::from(max));
            let mut written = 0u64;
            let mut mask = 1u64;
            while written + mask < max {
                let bit = value & mask != 0;
                self.write_bit(bit);
                if bit {
                    written |= mask;
                }
                mask <<= 1;
            }
        }

        fn write_int_packed(&mut self, value: u64) {
            let mut remaining = value;
            for group in 0..MAX_PACKED_GROUPS {
                let payload = remaining & 0x7f;
                remaining >>= 7;
                let more = remaining != 0 && group + 1 < MAX_PACKED_GROUPS;
                self.write_bit(more);
                self.write_bits(payload, 7);
                if !more {
                    break;
                }
            }
        }

        fn reader(&self) -> BitReader<'_> {
            BitReader::with_bit_len(&self.bytes, self.len).unwrap()
        }
    }

    fn max_and_value() -> impl Strategy<Value = (u32, u32)> {
        (1u32..=u32::MAX).prop_flat_map(|max| (Just(max), 0..max))
    }

    proptest! {
        #[test]
        fn test_read_int_round_trip((max, value) in max_and_value()) {
            let mut writer = BitWriter::default();
            writer.write_int(value, max);
            let mut reader = writer.reader();
            prop_assert_eq!(reader.read_int(max).unwrap(), value);
            prop_assert!(reader.at_end());
        }

        #[test]
        fn test_read_int_packed_round_trip(value in 0u64..(1 << 35)) {
            let mut writer = BitWriter::default();
            writer.write_int_packed(value);
            let mut reader = writer.reader();
            prop_assert_eq!(reader.read_int_packed().unwrap(), value);
            prop_assert!(reader.at_end());
        }
    }

    #[test]
    fn test_bits_are_read_lsb_first() {
        let mut reader = BitReader::new(&[0b0000_0101]);
        assert!(reader.peek_bit().unwrap());
        assert!(reader.read_bit().unwrap());
        assert!(!reader.read_bit().unwrap());
        assert!(reader.read_bit().unwrap());
        assert_eq!(reader.position(), 3);
        assert_eq!(reader.bits_left(), 5);
    }

    #[test]
    fn test_read_past_end_is_out_of_range() {
        let mut reader = BitReader::with_bit_len(&[0xff], 3).unwrap();
        assert_eq!(reader.read_bits(3).unwrap(), vec![0b111]);
        assert_eq!(
            reader.read_bit(),
            Err(WireError::OutOfRange {
                position: 3,
                bits: 1,
                len: 3
            })
        );
        assert!(reader.at_end());
    }

    #[test]
    fn test_with_bit_len_rejects_longer_than_data() {
        assert_eq!(
            BitReader::with_bit_len(&[0, 0], 17).unwrap_err(),
            WireError::BitLengthExceedsData {
                bit_len: 17,
                available: 16
            }
        );
    }

    #[test]
    fn test_read_int_small_ranges_consume_nothing() {
        let mut reader = BitReader::new(&[0xff]);
        assert_eq!(reader.read_int(0).unwrap(), 0);
        assert_eq!(reader.read_int(1).unwrap(), 0);
        assert_eq!(reader.position(), 0);
    }

    #[test]
    fn test_read_int_stops_once_value_plus_mask_reaches_max() {
        // max 10: after bits 1,1 the value is 3; 3+4 < 10 reads a third bit,
        // 3+8 >= 10 stops.
        let mut reader = BitReader::new(&[0b0000_0011]);
        assert_eq!(reader.read_int(10).unwrap(), 3);
        assert_eq!(reader.position(), 3);
    }

    #[test]
    fn test_read_int_packed_ignores_fifth_continuation_bit() {
        let mut writer = BitWriter::default();
        for _ in 0..5 {
            writer.write_bit(true);
            writer.write_bits(0x7f, 7);
        }
        writer.write_bits(0xff, 8);

        let mut reader = writer.reader();
        assert_eq!(reader.read_int_packed().unwrap(), (1 << 35) - 1);
        assert_eq!(reader.position(), 40);
    }

    #[test]
    fn test_read_packed_vector_fixture() {
        // selector 3 (bits 1,1,0), then x=20, y=16, z=5 as 5-bit read_int(32)
        let bytes = [0xA3, 0xB0, 0x00];
        let mut reader = BitReader::with_bit_len(&bytes, 18).unwrap();

        let vector = reader.read_packed_vector(100, 10).unwrap();

        assert_eq!(vector, FVector::new(20.0, 16.0, 5.0));
        assert!(reader.at_end());
    }

    #[test]
    fn test_read_packed_vector_subtracts_scaled_bias() {
        let mut writer = BitWriter::default();
        writer.write_int(3, 10);
        for axis in [0, 16, 31] {
            writer.write_int(axis, 32);
        }

        let vector = writer.reader().read_packed_vector(1, 10).unwrap();

        assert_eq!(vector, FVector::new(-16.0, 0.0, 15.0));
    }

    #[test]
    fn test_read_packed_vector_rejects_zero_scale() {
        let mut writer = BitWriter::default();
        writer.write_int(3, 10);
        assert_eq!(
            writer.reader().read_packed_vector(0, 10),
            Err(WireError::InvalidPackedVector { bits: 3, scale: 0 })
        );
    }

    #[test]
    fn test_read_packed_vector_rejects_wide_selector() {
        let mut writer = BitWriter::default();
        writer.write_int(30, 64);
        assert!(matches!(
            writer.reader().read_packed_vector(1, 64),
            Err(WireError::InvalidPackedVector { bits: 30, .. })
        ));
    }

    fn fstring_bytes(length: i32, payload: &[u8]) -> Vec<u8> {
        let mut bytes = length.to_le_bytes().to_vec();
        bytes.extend_from_slice(payload);
        bytes
    }

    #[test]
    fn test_read_fstring_empty() {
        let bytes = fstring_bytes(0, &[]);
        let mut reader = BitReader::new(&bytes);
        assert_eq!(reader.read_fstring().unwrap(), "");
        assert!(reader.at_end());
    }

    #[test]
    fn test_read_fstring_utf16() {
        // -4 means four UTF-16 units, eight bytes
        let bytes = fstring_bytes(-4, &[b'H', 0, b'i', 0, b' ', 0, 0, 0]);
        let mut reader = BitReader::new(&bytes);
        assert_eq!(reader.read_fstring().unwrap(), "Hi");
        assert!(reader.at_end());
    }

    #[test]
    fn test_read_fstring_single_byte() {
        let bytes = fstring_bytes(5, b" ab\0\0");
        let mut reader = BitReader::new(&bytes);
        assert_eq!(reader.read_fstring().unwrap(), " ab");
        assert!(reader.at_end());
    }

    #[test]
    fn test_read_fstring_truncated_payload() {
        let bytes = fstring_bytes(8, b"abc");
        let mut reader = BitReader::new(&bytes);
        assert!(matches!(
            reader.read_fstring(),
            Err(WireError::OutOfRange { position: 32, bits: 64, .. })
        ));
    }

    #[test]
    fn test_unaligned_little_endian_reads() {
        let mut writer = BitWriter::default();
        writer.write_bit(true);
        writer.write_bits(0xDEAD_BEEF, 32);
        writer.write_bits(1, 32);

        let mut reader = writer.reader();
        assert!(reader.read_bit().unwrap());
        assert_eq!(reader.read_u32().unwrap(), 0xDEAD_BEEF);
        assert!(reader.read_u32_as_bool().unwrap());
    }

    #[test]
    fn test_byte_helpers() {
        let mut bytes = vec![7u8];
        bytes.extend_from_slice(&0x0102u16.to_le_bytes());
        bytes.extend_from_slice(&(-5i64).to_le_bytes());
        bytes.extend_from_slice(&1.5f32.to_le_bytes());
        bytes.extend_from_slice(&[9, 9]);

        let mut reader = BitReader::new(&bytes);
        assert_eq!(reader.read_byte().unwrap(), 7);
        assert_eq!(reader.read_u16().unwrap(), 0x0102);
        assert_eq!(reader.read_i64().unwrap(), -5);
        assert_eq!(reader.read_f32().unwrap(), 1.5);
        reader.skip_bytes(1).unwrap();
        assert_eq!(reader.read_bytes(1).unwrap(), vec![9]);
        assert!(reader.skip_bytes(1).is_err());
    }

    #[test]
    fn test_seek_origins() {
        let mut reader = BitReader::new(&[0, 0]);
        reader.seek(4, SeekOrigin::Begin).unwrap();
        assert_eq!(reader.position(), 4);
        reader.seek(3, SeekOrigin::Current).unwrap();
        assert_eq!(reader.position(), 7);
        reader.seek(2, SeekOrigin::End).unwrap();
        assert_eq!(reader.position(), 14);
        reader.seek(16, SeekOrigin::Begin).unwrap();
        assert!(reader.at_end());
    }

    #[test]
    fn test_seek_out_of_range_keeps_position() {
        let mut reader = BitReader::new(&[0]);
        reader.seek(5, SeekOrigin::Begin).unwrap();

        assert_eq!(
            reader.seek(4, SeekOrigin::Current),
            Err(WireError::SeekOutOfRange {
                offset: 4,
                origin: SeekOrigin::Current,
                len: 8
            })
        );
        assert!(reader.seek(9, SeekOrigin::Begin).is_err());
        assert!(reader.seek(9, SeekOrigin::End).is_err());
        assert_eq!(reader.position(), 5);
    }

    #[test]
    fn test_mark_is_a_single_register() {
        let mut reader = BitReader::new(&[0, 0]);

        reader.seek(3, SeekOrigin::Begin).unwrap();
        reader.pop();
        assert_eq!(reader.position(), 0);

        reader.seek(3, SeekOrigin::Begin).unwrap();
        reader.mark();
        reader.seek(6, SeekOrigin::Begin).unwrap();
        reader.mark();
        reader.seek(12, SeekOrigin::Begin).unwrap();

        reader.pop();
        assert_eq!(reader.position(), 6);
        reader.pop();
        assert_eq!(reader.position(), 6);
    }
}
