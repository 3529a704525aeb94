//! Transport module - how frames reach the processor.
//!
//! - [`ws`] - persistent WebSocket connection (primary)
//! - [`http`] - single POST per exchange

pub mod http;
pub mod ws;

pub use http::{parse_reply_body, BitmapRecord, HttpTransport, UploadRequest};
pub use ws::{connect, read_loop, WsStream, DEFAULT_MAX_MESSAGE_SIZE};
