//! Reply envelope parsing.
//!
//! ```text
//! int32 imageCount
//! repeat imageCount times:
//!   int32 scale
//!   int32 width
//!   int32 height
//!   int32 wordCount              // ceil(width*height/32)
//!   int32[wordCount] packedBits
//! ```
//!
//! Records are validated as they are read: a record whose word count
//! disagrees with its dimensions would misalign every record after it.

use bytes::{BufMut, BytesMut};

use super::wire_format::{RecordHeader, COUNT_SIZE, RECORD_HEADER_SIZE, WORD_SIZE};
use crate::error::DecodeError;

/// One packed bitmap as carried on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubBitmapRecord {
    pub header: RecordHeader,
    /// Packed pixels, LSB-first within each word.
    pub words: Vec<u32>,
}

impl SubBitmapRecord {
    /// Build a record from its fields, deriving the word count from `words`.
    pub fn new(scale: i32, width: i32, height: i32, words: Vec<u32>) -> Self {
        let word_count = i32::try_from(words.len()).unwrap_or(i32::MAX);
        Self {
            header: RecordHeader::new(scale, width, height, word_count),
            words,
        }
    }

    #[inline]
    pub fn width(&self) -> i32 {
        self.header.width
    }

    #[inline]
    pub fn height(&self) -> i32 {
        self.header.height
    }

    /// Real scale value (`scale / 1_000_000`).
    #[inline]
    pub fn scale_value(&self) -> f64 {
        self.header.scale_value()
    }

    /// Validate dimensions against the words actually held.
    pub fn validate(&self, index: usize) -> Result<(), DecodeError> {
        self.header.validate(index)?;
        if self.words.len() != self.header.word_count as usize {
            return Err(DecodeError::InvalidDimensions {
                index,
                width: self.header.width,
                height: self.header.height,
                word_count: self.header.word_count,
            });
        }
        Ok(())
    }
}

/// A fully parsed reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseEnvelope {
    pub records: Vec<SubBitmapRecord>,
}

impl ResponseEnvelope {
    pub fn new(records: Vec<SubBitmapRecord>) -> Self {
        Self { records }
    }

    /// Parse a complete reply message.
    ///
    /// # Errors
    ///
    /// - `Truncated` if the buffer ends before a declared field or word
    /// - `InvalidDimensions` if a record header is inconsistent
    /// - `NegativeCount` if the record count is below zero
    ///
    /// Trailing bytes after the last record are logged and ignored.
    pub fn parse(buf: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = Reader::new(buf);

        let count = reader.read_i32()?;
        if count < 0 {
            return Err(DecodeError::NegativeCount(count));
        }
        let count = count as usize;
        tracing::debug!("Reply declares {} records", count);

        // Each record needs at least its header, so a hostile count
        // cannot force a huge allocation.
        let mut records = Vec::with_capacity(count.min(reader.remaining() / RECORD_HEADER_SIZE));

        for index in 0..count {
            let header_bytes = reader.take(RECORD_HEADER_SIZE)?;
            let header = RecordHeader::decode(header_bytes).ok_or(DecodeError::Truncated {
                offset: reader.offset,
                needed: RECORD_HEADER_SIZE,
                available: header_bytes.len(),
            })?;
            header.validate(index)?;

            let payload = reader.take(header.payload_len())?;
            let words = payload
                .chunks_exact(WORD_SIZE)
                .map(|w| u32::from_be_bytes([w[0], w[1], w[2], w[3]]))
                .collect();

            tracing::debug!(
                "Record {}: {}x{}, {} words, scale {}",
                index,
                header.width,
                header.height,
                header.word_count,
                header.scale_value()
            );
            records.push(SubBitmapRecord { header, words });
        }

        if reader.remaining() > 0 {
            tracing::warn!(
                "Ignoring {} trailing bytes after {} records",
                reader.remaining(),
                count
            );
        }

        Ok(Self { records })
    }

    /// Encode into the wire layout.
    ///
    /// Word counts are written from the records' headers as-is.
    pub fn encode(&self) -> BytesMut {
        let len = COUNT_SIZE
            + self
                .records
                .iter()
                .map(|r| RECORD_HEADER_SIZE + r.words.len() * WORD_SIZE)
                .sum::<usize>();
        let mut buf = BytesMut::with_capacity(len);

        buf.put_i32(self.records.len() as i32);
        for record in &self.records {
            buf.put_slice(&record.header.encode());
            for word in &record.words {
                buf.put_u32(*word);
            }
        }
        buf
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Bounds-checked cursor over a reply buffer.
struct Reader<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, offset: 0 }
    }

    #[inline]
    fn remaining(&self) -> usize {
        self.buf.len() - self.offset
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < n {
            return Err(DecodeError::Truncated {
                offset: self.offset,
                needed: n,
                available: self.remaining(),
            });
        }
        let slice = &self.buf[self.offset..self.offset + n];
        self.offset += n;
        Ok(slice)
    }

    fn read_i32(&mut self) -> Result<i32, DecodeError> {
        let b = self.take(4)?;
        Ok(i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }
}
