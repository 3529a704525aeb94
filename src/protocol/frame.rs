//! Frames and the upload frame sequence.
//!
//! A [`Frame`] is one discrete message on the duplex channel. Binary
//! payloads use `bytes::Bytes`, so chunks are zero-copy slices of the
//! raster's pixel buffer.
//!
//! # Example
//!
//! ```
//! use leadwire::protocol::{Frame, UploadFrames};
//! use leadwire::RasterImage;
//!
//! let image = RasterImage::new(2, 2, vec![0u8, 1, 2, 3]);
//! let frames: Vec<Frame> = UploadFrames::new(&image, 3).unwrap().collect();
//!
//! assert_eq!(frames.len(), 4); // header, 2 chunks, end marker
//! assert_eq!(frames[0].payload(), &[0, 0, 0, 2, 0, 0, 0, 2]);
//! assert!(frames[3].is_end_marker());
//! ```

use bytes::Bytes;

use super::wire_format::{DimensionHeader, END_MARKER};
use crate::error::EncodeError;
use crate::raster::RasterImage;

/// One message on the duplex channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Binary(Bytes),
    Text(String),
}

impl Frame {
    /// The end-of-upload text frame.
    pub fn end_marker() -> Self {
        Frame::Text(END_MARKER.to_string())
    }

    #[inline]
    pub fn is_binary(&self) -> bool {
        matches!(self, Frame::Binary(_))
    }

    #[inline]
    pub fn is_text(&self) -> bool {
        matches!(self, Frame::Text(_))
    }

    /// Check if this is the `KONIEC` text frame.
    #[inline]
    pub fn is_end_marker(&self) -> bool {
        matches!(self, Frame::Text(text) if text == END_MARKER)
    }

    /// Raw payload bytes (UTF-8 bytes for text frames).
    #[inline]
    pub fn payload(&self) -> &[u8] {
        match self {
            Frame::Binary(bytes) => bytes,
            Frame::Text(text) => text.as_bytes(),
        }
    }

    #[inline]
    pub fn payload_len(&self) -> usize {
        self.payload().len()
    }
}

/// Split `data` into consecutive slices of at most `max_chunk_size` bytes.
///
/// Slices share the input buffer. The last slice may be shorter.
pub fn chunk_bytes(
    data: &Bytes,
    max_chunk_size: usize,
) -> Result<impl Iterator<Item = Bytes> + '_, EncodeError> {
    if max_chunk_size == 0 {
        return Err(EncodeError::ZeroChunkSize);
    }
    let len = data.len();
    Ok((0..len)
        .step_by(max_chunk_size)
        .map(move |start| data.slice(start..(start + max_chunk_size).min(len))))
}

/// Number of chunks `len` bytes split into.
#[inline]
pub fn chunk_count(len: usize, max_chunk_size: usize) -> usize {
    if max_chunk_size == 0 {
        return 0;
    }
    len.div_ceil(max_chunk_size)
}

/// Where the upload sequence currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Header,
    Chunks,
    EndMarker,
    Done,
}

/// Iterator over the full upload sequence of one image:
/// dimension header, pixel chunks, end marker.
///
/// Construction fails before anything is produced, so a caller never
/// sends a header for an upload that cannot complete.
#[derive(Debug, Clone)]
pub struct UploadFrames {
    header: DimensionHeader,
    pixels: Bytes,
    max_chunk_size: usize,
    offset: usize,
    stage: Stage,
}

impl UploadFrames {
    /// Build the frame sequence for `image`.
    ///
    /// # Errors
    ///
    /// - `EncodeError::EmptyImage` if the image has no pixel bytes
    /// - `EncodeError::ZeroChunkSize` if `max_chunk_size` is 0
    pub fn new(image: &RasterImage, max_chunk_size: usize) -> Result<Self, EncodeError> {
        if image.is_empty() {
            return Err(EncodeError::EmptyImage);
        }
        if max_chunk_size == 0 {
            return Err(EncodeError::ZeroChunkSize);
        }
        Ok(Self {
            header: DimensionHeader::new(image.width(), image.height()),
            pixels: image.pixel_bytes(),
            max_chunk_size,
            offset: 0,
            stage: Stage::Header,
        })
    }

    /// Total frames in the sequence (header + chunks + end marker).
    pub fn frame_count(&self) -> usize {
        chunk_count(self.pixels.len(), self.max_chunk_size) + 2
    }
}

impl Iterator for UploadFrames {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        match self.stage {
            Stage::Header => {
                self.stage = Stage::Chunks;
                Some(Frame::Binary(Bytes::copy_from_slice(&self.header.encode())))
            }
            Stage::Chunks => {
                let end = (self.offset + self.max_chunk_size).min(self.pixels.len());
                let chunk = self.pixels.slice(self.offset..end);
                self.offset = end;
                if self.offset >= self.pixels.len() {
                    self.stage = Stage::EndMarker;
                }
                Some(Frame::Binary(chunk))
            }
            Stage::EndMarker => {
                self.stage = Stage::Done;
                Some(Frame::end_marker())
            }
            Stage::Done => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::DIMENSION_HEADER_SIZE;

    fn image(len: usize) -> RasterImage {
        let pixels: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        RasterImage::new(len as u32, 1, pixels)
    }

    #[test]
    fn test_header_frame_is_only_dimensions() {
        let img = RasterImage::new(100, 50, vec![7u8; 5000]);
        let mut frames = UploadFrames::new(&img, 1024).unwrap();

        let first = frames.next().unwrap();
        assert!(first.is_binary());
        assert_eq!(first.payload_len(), DIMENSION_HEADER_SIZE);
        assert_eq!(first.payload(), &[0, 0, 0, 100, 0, 0, 0, 50]);
    }

    #[test]
    fn test_sequence_shape() {
        let frames: Vec<Frame> = UploadFrames::new(&image(20), 8).unwrap().collect();

        assert_eq!(frames.len(), 1 + 3 + 1);
        assert_eq!(frames[1].payload_len(), 8);
        assert_eq!(frames[2].payload_len(), 8);
        assert_eq!(frames[3].payload_len(), 4);
        assert!(frames[4].is_end_marker());
        assert!(frames[..4].iter().all(Frame::is_binary));
    }

    #[test]
    fn test_exactly_one_end_marker_last() {
        let frames: Vec<Frame> = UploadFrames::new(&image(33), 4).unwrap().collect();

        let markers = frames.iter().filter(|f| f.is_end_marker()).count();
        assert_eq!(markers, 1);
        assert!(frames.last().unwrap().is_end_marker());
    }

    #[test]
    fn test_frame_count_matches_iteration() {
        for (len, size) in [(1, 1), (10, 3), (8192, 8192), (8193, 8192)] {
            let frames = UploadFrames::new(&image(len), size).unwrap();
            let expected = frames.frame_count();
            assert_eq!(frames.count(), expected);
        }
    }

    #[test]
    fn test_single_oversized_chunk() {
        let frames: Vec<Frame> = UploadFrames::new(&image(100), crate::protocol::LARGE_CHUNK_SIZE)
            .unwrap()
            .collect();

        assert_eq!(frames.len(), 3);
        assert_eq!(frames[1].payload_len(), 100);
    }

    #[test]
    fn test_chunks_are_zero_copy() {
        let img = image(16);
        let frames: Vec<Frame> = UploadFrames::new(&img, 8).unwrap().collect();

        match &frames[2] {
            Frame::Binary(bytes) => assert_eq!(bytes.as_ptr(), img.pixels()[8..].as_ptr()),
            other => panic!("expected binary chunk, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_image_rejected() {
        let img = RasterImage::new(10, 10, Vec::<u8>::new());
        assert_eq!(UploadFrames::new(&img, 8).unwrap_err(), EncodeError::EmptyImage);
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        assert_eq!(
            UploadFrames::new(&image(4), 0).unwrap_err(),
            EncodeError::ZeroChunkSize
        );
        assert!(chunk_bytes(&Bytes::from_static(b"abc"), 0).is_err());
    }

    #[test]
    fn test_chunk_bytes_concatenation() {
        let data = Bytes::from_static(b"0123456789");
        let chunks: Vec<Bytes> = chunk_bytes(&data, 4).unwrap().collect();

        assert_eq!(chunks.len(), chunk_count(data.len(), 4));
        assert_eq!(chunks.concat(), data.to_vec());
        assert_eq!(chunks[2], Bytes::from_static(b"89"));
    }

    #[test]
    fn test_end_marker_text() {
        let marker = Frame::end_marker();
        assert!(marker.is_text());
        assert_eq!(marker.payload(), b"KONIEC");
        assert!(!Frame::Text("koniec".into()).is_end_marker());
        assert!(!Frame::Binary(Bytes::from_static(b"KONIEC")).is_end_marker());
    }
}
