//! Reply decoder.
//!
//! Pure transformation of one assembled reply message into labeled
//! bitmaps. No files are written here and nothing outlives the call.

use std::fmt;

use bytes::Bytes;

use super::bitpack::BitMatrix;
use super::labels::label_for;
use crate::error::DecodeError;
use crate::protocol::{scale_value, ResponseEnvelope, SubBitmapRecord};

/// Fixed-point scale attached to each bitmap (informational only).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scale(pub i32);

impl Scale {
    /// Real value: `raw / 1_000_000`.
    #[inline]
    pub fn value(&self) -> f64 {
        scale_value(self.0)
    }

    #[inline]
    pub fn raw(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

/// A decoded bitmap with its position-derived label.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledBitmap {
    pub label: String,
    pub scale: Scale,
    pub matrix: BitMatrix,
}

/// Decode one complete reply message.
///
/// # Errors
///
/// See [`ResponseEnvelope::parse`]. A failure anywhere discards the whole
/// reply; no partial list is returned.
pub fn decode(message: Bytes) -> Result<Vec<LabeledBitmap>, DecodeError> {
    let envelope = ResponseEnvelope::parse(&message)?;
    bitmaps_from_records(envelope.records)
}

/// Validate, unpack and label records in reply order.
///
/// Shared by the binary envelope path and transports that deliver records
/// already split apart.
pub fn bitmaps_from_records(
    records: Vec<SubBitmapRecord>,
) -> Result<Vec<LabeledBitmap>, DecodeError> {
    records
        .into_iter()
        .enumerate()
        .map(|(index, record)| {
            record.validate(index)?;
            let invalid = || DecodeError::InvalidDimensions {
                index,
                width: record.header.width,
                height: record.header.height,
                word_count: record.header.word_count,
            };
            let matrix = BitMatrix::unpack(
                record.header.width as usize,
                record.header.height as usize,
                &record.words,
            )
            .ok_or_else(invalid)?;

            Ok(LabeledBitmap {
                label: label_for(index).into_owned(),
                scale: Scale(record.header.scale),
                matrix,
            })
        })
        .collect()
}
