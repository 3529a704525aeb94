//! # leadwire
//!
//! Rust client for the chart-extraction raster protocol.
//!
//! A scanned chart is uploaded to a remote processor, which answers with
//! one binary message packing every extracted lead strip as a 1-bit
//! bitmap.
//!
//! ## Wire protocol
//!
//! - **Upload**: 8-byte dimension header, raw pixel chunks, `KONIEC` text frame
//! - **Reply**: count-prefixed records of scale, dimensions and LSB-first
//!   packed words (all integers big-endian)
//!
//! ## Example
//!
//! ```ignore
//! use leadwire::{export_bitmaps, Client, RasterImage};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::builder("ws://localhost:9998/ws").connect().await?;
//!
//!     let image = RasterImage::open("scan.png")?;
//!     let bitmaps = client.process(&image).await?;
//!     export_bitmaps("ekg", &bitmaps)?;
//!
//!     client.close().await;
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod error;
pub mod exchange;
pub mod export;
pub mod protocol;
pub mod transport;
pub mod writer;

mod client;
mod raster;
mod upload;

pub use client::{Client, ClientBuilder, ClientConfig, DEFAULT_REPLY_TIMEOUT};
pub use codec::{decode, BitMatrix, LabeledBitmap, Scale};
pub use error::{DecodeError, EncodeError, LeadwireError, TransportError, UploadError};
pub use export::export_bitmaps;
pub use raster::RasterImage;
pub use upload::{FrameSink, Uploader};
