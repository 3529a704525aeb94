//! Codec module - bit-packed bitmaps and the reply decoder.
//!
//! - [`BitMatrix`] - LSB-first packing and unpacking of monochrome pixels
//! - [`decode`] - turns one reply message into labeled bitmaps
//! - [`label_for`] - lead names assigned in reply order
//!
//! # Example
//!
//! ```
//! use leadwire::codec::decode;
//! use leadwire::protocol::{ResponseEnvelope, SubBitmapRecord};
//!
//! let reply = ResponseEnvelope::new(vec![SubBitmapRecord::new(1_000_000, 4, 2, vec![0xF5])]);
//! let bitmaps = decode(reply.encode().freeze()).unwrap();
//!
//! assert_eq!(bitmaps[0].label, "I");
//! assert_eq!(bitmaps[0].matrix.count_set(), 6);
//! ```

mod bitpack;
mod decoder;
mod labels;

pub use bitpack::BitMatrix;
pub use decoder::{bitmaps_from_records, decode, LabeledBitmap, Scale};
pub use labels::{label_for, LEAD_NAMES, OVERFLOW_PREFIX};
