//! Protocol module - wire format, framing, and reply envelopes.
//!
//! This module implements both directions of the raster protocol:
//! - 8-byte dimension header and chunked upload frames
//! - 16-byte record headers and the count-prefixed reply envelope

mod envelope;
mod frame;
mod wire_format;

pub use envelope::{ResponseEnvelope, SubBitmapRecord};
pub use frame::{chunk_bytes, chunk_count, Frame, UploadFrames};
pub use wire_format::{
    scale_value, words_for, DimensionHeader, RecordHeader, BITS_PER_WORD, COUNT_SIZE,
    DEFAULT_CHUNK_SIZE, DIMENSION_HEADER_SIZE, END_MARKER, LARGE_CHUNK_SIZE,
    RECORD_HEADER_SIZE, SCALE_DIVISOR, WORD_SIZE,
};
