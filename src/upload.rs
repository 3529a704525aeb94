//! Uploader - sends one raster as a frame sequence.
//!
//! The uploader only knows the [`FrameSink`] seam. It emits:
//! 1. the 8-byte dimension header (binary)
//! 2. pixel chunks of at most `max_chunk_size` bytes (binary, in order)
//! 3. the `KONIEC` end marker (text)
//!
//! # Example
//!
//! ```ignore
//! use leadwire::{RasterImage, Uploader};
//!
//! let uploader = Uploader::new(8 * 1024);
//! uploader.upload(&image, &mut writer).await?;
//! ```

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{TransportError, UploadError};
use crate::protocol::{Frame, UploadFrames, DEFAULT_CHUNK_SIZE};
use crate::raster::RasterImage;

/// Destination for outgoing frames.
///
/// Implementations must deliver frames in the order sent and keep each
/// frame's boundaries intact.
#[async_trait]
pub trait FrameSink: Send {
    /// Send one binary frame.
    async fn send_binary(&mut self, payload: Bytes) -> Result<(), TransportError>;

    /// Send one text frame.
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// Send either kind of frame.
    async fn send_frame(&mut self, frame: Frame) -> Result<(), TransportError> {
        match frame {
            Frame::Binary(payload) => self.send_binary(payload).await,
            Frame::Text(text) => self.send_text(text).await,
        }
    }
}

/// Collects frames in memory.
#[async_trait]
impl FrameSink for Vec<Frame> {
    async fn send_binary(&mut self, payload: Bytes) -> Result<(), TransportError> {
        self.push(Frame::Binary(payload));
        Ok(())
    }

    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.push(Frame::Text(text));
        Ok(())
    }
}

/// Splits rasters into upload frames and pushes them into a sink.
#[derive(Debug, Clone, Copy)]
pub struct Uploader {
    max_chunk_size: usize,
}

impl Uploader {
    pub fn new(max_chunk_size: usize) -> Self {
        Self { max_chunk_size }
    }

    #[inline]
    pub fn max_chunk_size(&self) -> usize {
        self.max_chunk_size
    }

    /// Upload `image` into `sink`.
    ///
    /// Stops at the first failing send; nothing is retried.
    ///
    /// # Errors
    ///
    /// - `UploadError::Encode` if the image is empty or the chunk size is 0
    ///   (no frame is sent)
    /// - `UploadError::Transport` with the sink's own error otherwise
    pub async fn upload<S>(&self, image: &RasterImage, sink: &mut S) -> Result<(), UploadError>
    where
        S: FrameSink + ?Sized,
    {
        let frames = UploadFrames::new(image, self.max_chunk_size)?;
        let total = frames.frame_count();
        tracing::debug!(
            "Uploading {}x{} raster: {} bytes in {} frames",
            image.width(),
            image.height(),
            image.pixels().len(),
            total
        );

        for (index, frame) in frames.enumerate() {
            if let Err(e) = sink.send_frame(frame).await {
                tracing::error!("Upload aborted at frame {}/{}: {}", index + 1, total, e);
                return Err(UploadError::Transport(e));
            }
        }

        Ok(())
    }
}

impl Default for Uploader {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EncodeError;

    /// Sink that fails after accepting `limit` frames.
    struct FailingSink {
        accepted: Vec<Frame>,
        limit: usize,
    }

    #[async_trait]
    impl FrameSink for FailingSink {
        async fn send_binary(&mut self, payload: Bytes) -> Result<(), TransportError> {
            if self.accepted.len() >= self.limit {
                return Err(TransportError::ConnectionClosed);
            }
            self.accepted.push(Frame::Binary(payload));
            Ok(())
        }

        async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
            if self.accepted.len() >= self.limit {
                return Err(TransportError::Send("socket gone".into()));
            }
            self.accepted.push(Frame::Text(text));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_upload_frame_sequence() {
        let image = RasterImage::new(100, 50, vec![0xABu8; 5000]);
        let mut sink: Vec<Frame> = Vec::new();

        Uploader::new(2048).upload(&image, &mut sink).await.unwrap();

        assert_eq!(sink.len(), 1 + 3 + 1);
        assert_eq!(sink[0].payload(), &[0, 0, 0, 100, 0, 0, 0, 50]);
        assert_eq!(sink[1].payload_len(), 2048);
        assert_eq!(sink[2].payload_len(), 2048);
        assert_eq!(sink[3].payload_len(), 904);
        assert!(sink[4].is_end_marker());
    }

    #[tokio::test]
    async fn test_upload_chunks_reassemble() {
        let pixels: Vec<u8> = (0..10_000u32).map(|i| (i * 7 % 256) as u8).collect();
        let image = RasterImage::new(100, 100, pixels.clone());
        let mut sink: Vec<Frame> = Vec::new();

        Uploader::default().upload(&image, &mut sink).await.unwrap();

        let body: Vec<u8> = sink[1..sink.len() - 1]
            .iter()
            .flat_map(|f| f.payload().to_vec())
            .collect();
        assert_eq!(body, pixels);
    }

    #[tokio::test]
    async fn test_empty_image_sends_nothing() {
        let image = RasterImage::new(0, 0, Vec::<u8>::new());
        let mut sink: Vec<Frame> = Vec::new();

        let err = Uploader::default().upload(&image, &mut sink).await.unwrap_err();

        assert!(matches!(err, UploadError::Encode(EncodeError::EmptyImage)));
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_transport_error_propagated_unchanged() {
        let image = RasterImage::new(4, 4, vec![1u8; 16]);
        let mut sink = FailingSink {
            accepted: Vec::new(),
            limit: 2,
        };

        let err = Uploader::new(4).upload(&image, &mut sink).await.unwrap_err();

        assert!(matches!(
            err,
            UploadError::Transport(TransportError::ConnectionClosed)
        ));
        // Header + first chunk only; no end marker after a failure.
        assert_eq!(sink.accepted.len(), 2);
        assert!(!sink.accepted.iter().any(Frame::is_end_marker));
    }

    #[tokio::test]
    async fn test_end_marker_failure_reported() {
        let image = RasterImage::new(2, 1, vec![1u8, 2]);
        let mut sink = FailingSink {
            accepted: Vec::new(),
            limit: 2,
        };

        let err = Uploader::new(8).upload(&image, &mut sink).await.unwrap_err();
        assert!(matches!(err, UploadError::Transport(TransportError::Send(_))));
    }

    #[tokio::test]
    async fn test_upload_through_dyn_sink() {
        let image = RasterImage::new(1, 1, vec![9u8]);
        let mut frames: Vec<Frame> = Vec::new();
        let sink: &mut dyn FrameSink = &mut frames;

        Uploader::default().upload(&image, sink).await.unwrap();
        assert_eq!(frames.len(), 3);
    }
}
