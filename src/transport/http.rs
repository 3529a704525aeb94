//! HTTP request/response variant.
//!
//! Same exchange as the WebSocket path, carried as one POST:
//!
//! - request: JSON `{"width": w, "height": h, "pixels": [..bytes..]}`
//! - reply: JSON array of `{"scale", "width", "height", "bits": [..words..]}`
//!
//! Reply records go through the same validation and unpacking as the
//! binary envelope.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::codec::{bitmaps_from_records, LabeledBitmap};
use crate::error::{DecodeError, EncodeError, Result, TransportError, UploadError};
use crate::protocol::SubBitmapRecord;
use crate::raster::RasterImage;

/// Upload body.
#[derive(Debug, Serialize)]
pub struct UploadRequest<'a> {
    pub width: u32,
    pub height: u32,
    pub pixels: &'a [u8],
}

/// One bitmap in the reply body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitmapRecord {
    pub scale: i32,
    pub width: i32,
    pub height: i32,
    /// Packed words as signed 32-bit integers.
    pub bits: Vec<i32>,
}

impl From<BitmapRecord> for SubBitmapRecord {
    fn from(record: BitmapRecord) -> Self {
        let words = record.bits.into_iter().map(|w| w as u32).collect();
        SubBitmapRecord::new(record.scale, record.width, record.height, words)
    }
}

/// Decode a JSON reply body.
///
/// # Errors
///
/// - `MalformedBody` if the body is not a JSON list of records
/// - the same record errors as the binary envelope
pub fn parse_reply_body(body: &[u8]) -> std::result::Result<Vec<LabeledBitmap>, DecodeError> {
    let records: Vec<BitmapRecord> =
        serde_json::from_slice(body).map_err(|e| DecodeError::MalformedBody(e.to_string()))?;
    tracing::info!("Received {} bitmaps", records.len());

    bitmaps_from_records(records.into_iter().map(Into::into).collect())
}

/// Client for the HTTP variant.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    /// Create a transport posting to `endpoint`.
    ///
    /// `timeout` bounds the whole request including the reply body.
    pub fn new(endpoint: impl Into<String>, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(limit) = timeout {
            builder = builder.timeout(limit);
        }
        let client = builder.build().map_err(TransportError::from)?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Upload `image` and decode the reply.
    pub async fn process(&self, image: &RasterImage) -> Result<Vec<LabeledBitmap>> {
        if image.is_empty() {
            return Err(UploadError::Encode(EncodeError::EmptyImage).into());
        }

        let body = UploadRequest {
            width: image.width(),
            height: image.height(),
            pixels: image.pixels(),
        };
        tracing::info!(
            "Posting {}x{} raster to {}",
            body.width,
            body.height,
            self.endpoint
        );

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| UploadError::Transport(TransportError::Http(e)))?;

        let body = response.bytes().await.map_err(TransportError::from)?;
        Ok(parse_reply_body(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::BitMatrix;
    use crate::error::{DecodeError, LeadwireError};

    #[test]
    fn test_request_pixels_are_plain_array() {
        let pixels = [0u8, 128, 255];
        let body = UploadRequest {
            width: 3,
            height: 1,
            pixels: &pixels,
        };

        let json = serde_json::to_string(&body).unwrap();
        assert_eq!(json, r#"{"width":3,"height":1,"pixels":[0,128,255]}"#);
    }

    #[test]
    fn test_reply_parses_into_records() {
        let json = r#"[{"scale":2500000,"width":4,"height":2,"bits":[245]},
                       {"scale":1000000,"width":32,"height":1,"bits":[-1]}]"#;
        let records: Vec<BitmapRecord> = serde_json::from_str(json).unwrap();
        let records: Vec<SubBitmapRecord> = records.into_iter().map(Into::into).collect();

        assert_eq!(records[1].words, vec![u32::MAX]);

        let bitmaps = bitmaps_from_records(records).unwrap();
        assert_eq!(bitmaps[0].scale.value(), 2.5);
        assert_eq!(bitmaps[0].matrix, BitMatrix::unpack(4, 2, &[0xF5]).unwrap());
        assert_eq!(bitmaps[1].matrix.count_set(), 32);
    }

    #[test]
    fn test_reply_word_count_validated() {
        let record = BitmapRecord {
            scale: 0,
            width: 40,
            height: 1,
            bits: vec![0],
        };

        let err = bitmaps_from_records(vec![record.into()]).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidDimensions { .. }));
    }

    #[test]
    fn test_malformed_body_is_decode_failure() {
        let err = parse_reply_body(b"<html>502 Bad Gateway</html>").unwrap_err();
        assert!(matches!(err, DecodeError::MalformedBody(_)));
        assert_eq!(LeadwireError::from(err).phase(), "decode");

        let err = parse_reply_body(br#"[{"scale":1,"width":2}]"#).unwrap_err();
        assert!(matches!(err, DecodeError::MalformedBody(_)));
    }

    #[test]
    fn test_reply_body_decoded() {
        let bitmaps = parse_reply_body(br#"[{"scale":1000000,"width":4,"height":2,"bits":[245]}]"#)
            .unwrap();

        assert_eq!(bitmaps.len(), 1);
        assert_eq!(bitmaps[0].label, "I");
        assert_eq!(bitmaps[0].matrix.to_text(), "1010\n1111\n");
    }

    #[tokio::test]
    async fn test_empty_image_rejected_before_request() {
        let transport = HttpTransport::new("http://127.0.0.1:9/never", None).unwrap();
        let image = RasterImage::new(1, 1, Vec::<u8>::new());

        let err = transport.process(&image).await.unwrap_err();
        assert!(matches!(
            err,
            LeadwireError::Upload(UploadError::Encode(EncodeError::EmptyImage))
        ));
    }
}
