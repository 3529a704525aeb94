//! Wire format encoding and decoding.
//!
//! Upload direction starts with an 8-byte dimension header:
//! ```text
//! ┌──────────┬──────────┐
//! │ Width    │ Height   │
//! │ 4 bytes  │ 4 bytes  │
//! │ uint32 BE│ uint32 BE│
//! └──────────┴──────────┘
//! ```
//!
//! Every reply record starts with a 16-byte header:
//! ```text
//! ┌──────────┬──────────┬──────────┬────────────┐
//! │ Scale    │ Width    │ Height   │ Word count │
//! │ int32 BE │ int32 BE │ int32 BE │ int32 BE   │
//! └──────────┴──────────┴──────────┴────────────┘
//! ```
//!
//! All multi-byte integers are Big Endian.

use crate::error::DecodeError;

/// Dimension header size in bytes (fixed, exactly 8).
pub const DIMENSION_HEADER_SIZE: usize = 8;

/// Reply record header size in bytes (four int32 fields).
pub const RECORD_HEADER_SIZE: usize = 16;

/// Size of the record count that opens every reply.
pub const COUNT_SIZE: usize = 4;

/// Size of one packed word in bytes.
pub const WORD_SIZE: usize = 4;

/// Pixels carried by one packed word.
pub const BITS_PER_WORD: usize = 32;

/// Text payload that ends an upload.
pub const END_MARKER: &str = "KONIEC";

/// Default chunk size for flow-controlled links (8 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;

/// Chunk size for transports that handle large messages natively (20 MiB).
pub const LARGE_CHUNK_SIZE: usize = 20 * 1024 * 1024;

/// Divisor turning the fixed-point scale field into its real value.
pub const SCALE_DIVISOR: f64 = 1_000_000.0;

/// First frame of every upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DimensionHeader {
    pub width: u32,
    pub height: u32,
}

impl DimensionHeader {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Encode header to bytes (Big Endian).
    ///
    /// # Example
    ///
    /// ```
    /// use leadwire::protocol::DimensionHeader;
    ///
    /// let bytes = DimensionHeader::new(100, 50).encode();
    /// assert_eq!(bytes, [0, 0, 0, 100, 0, 0, 0, 50]);
    /// ```
    pub fn encode(&self) -> [u8; DIMENSION_HEADER_SIZE] {
        let mut buf = [0u8; DIMENSION_HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.width.to_be_bytes());
        buf[4..8].copy_from_slice(&self.height.to_be_bytes());
        buf
    }

    /// Decode header from bytes.
    ///
    /// Returns `None` unless the buffer is exactly 8 bytes; a dimension
    /// frame never carries anything else.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() != DIMENSION_HEADER_SIZE {
            return None;
        }
        Some(Self {
            width: u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]),
            height: u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
        })
    }
}

/// Metadata preceding each packed bitmap in a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    /// Fixed-point scale, real value is `scale / 1_000_000`.
    pub scale: i32,
    pub width: i32,
    pub height: i32,
    /// Number of packed 32-bit words that follow.
    pub word_count: i32,
}

impl RecordHeader {
    pub fn new(scale: i32, width: i32, height: i32, word_count: i32) -> Self {
        Self {
            scale,
            width,
            height,
            word_count,
        }
    }

    pub fn encode(&self) -> [u8; RECORD_HEADER_SIZE] {
        let mut buf = [0u8; RECORD_HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.scale.to_be_bytes());
        buf[4..8].copy_from_slice(&self.width.to_be_bytes());
        buf[8..12].copy_from_slice(&self.height.to_be_bytes());
        buf[12..16].copy_from_slice(&self.word_count.to_be_bytes());
        buf
    }

    /// Returns `None` if buffer is too short.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < RECORD_HEADER_SIZE {
            return None;
        }
        Some(Self {
            scale: i32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]),
            width: i32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
            height: i32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]),
            word_count: i32::from_be_bytes([buf[12], buf[13], buf[14], buf[15]]),
        })
    }

    /// Check dimensions against the word count.
    ///
    /// `index` only feeds the error report.
    pub fn validate(&self, index: usize) -> Result<(), DecodeError> {
        let invalid = DecodeError::InvalidDimensions {
            index,
            width: self.width,
            height: self.height,
            word_count: self.word_count,
        };

        if self.width <= 0 || self.height <= 0 {
            return Err(invalid);
        }

        match words_for(self.width as u32, self.height as u32) {
            Some(expected) if expected as i64 == self.word_count as i64 => Ok(()),
            _ => Err(invalid),
        }
    }

    /// Payload length in bytes, valid only after `validate`.
    #[inline]
    pub fn payload_len(&self) -> usize {
        self.word_count.max(0) as usize * WORD_SIZE
    }

    /// Real scale value.
    #[inline]
    pub fn scale_value(&self) -> f64 {
        scale_value(self.scale)
    }
}

/// Number of packed words needed for a `width` x `height` bitmap.
///
/// Returns `None` on overflow.
///
/// # Example
///
/// ```
/// use leadwire::protocol::words_for;
///
/// assert_eq!(words_for(4, 2), Some(1));
/// assert_eq!(words_for(33, 1), Some(2));
/// ```
pub fn words_for(width: u32, height: u32) -> Option<usize> {
    let bits = (width as usize).checked_mul(height as usize)?;
    Some(bits.div_ceil(BITS_PER_WORD))
}

/// Convert a fixed-point scale field to its real value.
#[inline]
pub fn scale_value(raw: i32) -> f64 {
    raw as f64 / SCALE_DIVISOR
}
