//! Error types for leadwire.
//!
//! Errors are split by phase so callers can tell an upload failure from a
//! decode failure:
//!
//! - [`TransportError`] - connection-level failures (send, receive, close)
//! - [`EncodeError`] - nothing sensible to upload
//! - [`UploadError`] - anything that stops an upload
//! - [`DecodeError`] - malformed or unsolicited reply
//! - [`LeadwireError`] - top-level error for a whole exchange

use std::time::Duration;

use thiserror::Error;

/// Connection-level failure. Never retried by this crate.
#[derive(Debug, Error)]
pub enum TransportError {
    /// WebSocket protocol or socket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// HTTP request failed or returned an error status.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O error on the underlying socket.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Writing a frame to the connection failed.
    #[error("Send failed: {0}")]
    Send(String),

    /// The writer task did not confirm a frame in time.
    #[error("Send not confirmed within {0:?}")]
    SendTimeout(Duration),

    /// Connection closed unexpectedly.
    #[error("Connection closed")]
    ConnectionClosed,
}

/// The image cannot be turned into an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// The image holds zero pixel bytes.
    #[error("Image has no pixel data")]
    EmptyImage,

    /// A chunk size of zero would never make progress.
    #[error("Chunk size must be greater than zero")]
    ZeroChunkSize,
}

/// Failure while emitting the upload frame sequence.
///
/// Transport errors are carried through unchanged.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Failure while decoding a reply envelope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The buffer ends before the envelope says it should.
    #[error("Truncated reply: need {needed} bytes at offset {offset}, only {available} left")]
    Truncated {
        /// Byte offset where the read was attempted.
        offset: usize,
        /// Bytes required by the envelope.
        needed: usize,
        /// Bytes actually remaining.
        available: usize,
    },

    /// Record dimensions are non-positive or disagree with its word count.
    #[error(
        "Invalid dimensions in record {index}: {width}x{height} with {word_count} words"
    )]
    InvalidDimensions {
        /// Zero-based record index.
        index: usize,
        width: i32,
        height: i32,
        word_count: i32,
    },

    /// The envelope declares a negative record count.
    #[error("Negative record count: {0}")]
    NegativeCount(i32),

    /// An HTTP reply body is not the expected JSON record list.
    #[error("Malformed reply body: {0}")]
    MalformedBody(String),

    /// A binary message arrived while no decode was pending.
    #[error("Unexpected message: no decode pending")]
    UnexpectedMessage,
}

/// Top-level error for a complete upload/decode exchange.
#[derive(Debug, Error)]
pub enum LeadwireError {
    /// The upload phase failed.
    #[error("Upload failed: {0}")]
    Upload(#[from] UploadError),

    /// The decode phase failed.
    #[error("Decode failed: {0}")]
    Decode(#[from] DecodeError),

    /// The connection failed outside of an upload (connect, receive, close).
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// No reply arrived within the configured timeout.
    #[error("No reply within {0:?}")]
    ReplyTimeout(Duration),

    /// Another exchange is still waiting for its reply.
    #[error("An exchange is already in flight")]
    ExchangeInFlight,

    /// Loading or encoding an image file failed.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Filesystem error while exporting.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LeadwireError {
    /// Name of the phase that failed, for user-facing reports.
    pub fn phase(&self) -> &'static str {
        match self {
            LeadwireError::Upload(_) => "upload",
            LeadwireError::Decode(_) => "decode",
            LeadwireError::Transport(_) | LeadwireError::ReplyTimeout(_) => "transport",
            LeadwireError::ExchangeInFlight => "exchange",
            LeadwireError::Image(_) | LeadwireError::Io(_) => "io",
        }
    }
}

/// Result type alias using LeadwireError.
pub type Result<T> = std::result::Result<T, LeadwireError>;
